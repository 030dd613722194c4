use std::str::FromStr;

use chrono::{DateTime, Utc};
use fxra_models::storage_schema::STORAGE_DDL;
use fxra_models::{
    Action, Candle, Rationale, RationaleKind, Recommendation, Run, RunStatus, Timeframe,
    VerificationReport,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;

/// SQLite-backed audit trail: runs, recommendations, rationales,
/// verification reports and cached candles.
///
/// `rusqlite::Connection` is not `Sync`; share it behind a `Mutex`.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database file. Creates the schema and enables WAL.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(STORAGE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database with the schema applied.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(STORAGE_DDL)?;
        Ok(Self { conn })
    }

    pub fn create_run(&self, run: &Run) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO runs (id, symbol, timeframe, start_time, end_time, status, error_message) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                run.id.to_string(),
                run.symbol,
                run.timeframe.as_str(),
                run.start_time,
                run.end_time,
                run.status.as_str(),
                run.error_message,
            ],
        )?;
        debug!(run_id = %run.id, symbol = %run.symbol, "Run created");
        Ok(())
    }

    /// Set the terminal status of a run and stamp its end time.
    pub fn finish_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE runs SET status = ?1, error_message = ?2, end_time = ?3 WHERE id = ?4",
            rusqlite::params![
                status.as_str(),
                error_message,
                Utc::now(),
                run_id.to_string()
            ],
        )?;
        Ok(())
    }

    pub fn get_run(&self, run_id: Uuid) -> Result<Option<Run>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, symbol, timeframe, start_time, end_time, status, error_message \
             FROM runs WHERE id = ?1",
        )?;
        let run = stmt
            .query_row(rusqlite::params![run_id.to_string()], |row| {
                Ok(Run {
                    id: uuid_col(row, 0)?,
                    symbol: row.get(1)?,
                    timeframe: timeframe_col(row, 2)?,
                    start_time: row.get(3)?,
                    end_time: row.get(4)?,
                    status: parsed_col(row, 5, RunStatus::parse)?,
                    error_message: row.get(6)?,
                })
            })
            .optional()?;
        Ok(run)
    }

    /// Insert a recommendation. A second save of the same id is an error.
    pub fn save_recommendation(&self, rec: &Recommendation) -> Result<(), StoreError> {
        let reason_codes_json = serde_json::to_string(&rec.reason_codes)?;
        self.conn.execute(
            "INSERT INTO recommendations \
             (id, run_id, symbol, timestamp, timeframe, action, confidence, brief, reason_codes_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                rec.id.to_string(),
                rec.run_id.map(|id| id.to_string()),
                rec.symbol,
                rec.timestamp,
                rec.timeframe.as_str(),
                rec.action.as_str(),
                rec.confidence,
                rec.brief,
                reason_codes_json,
            ],
        )?;
        debug!(id = %rec.id, symbol = %rec.symbol, action = %rec.action, "Recommendation saved");
        Ok(())
    }

    pub fn get_recommendation(&self, id: Uuid) -> Result<Option<Recommendation>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, run_id, symbol, timestamp, timeframe, action, confidence, brief, reason_codes_json \
             FROM recommendations WHERE id = ?1",
        )?;
        let rec = stmt
            .query_row(rusqlite::params![id.to_string()], recommendation_from_row)
            .optional()?;
        Ok(rec)
    }

    /// Most recent recommendation for a symbol, if any.
    pub fn latest_recommendation(&self, symbol: &str) -> Result<Option<Recommendation>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, run_id, symbol, timestamp, timeframe, action, confidence, brief, reason_codes_json \
             FROM recommendations WHERE symbol = ?1 ORDER BY timestamp DESC LIMIT 1",
        )?;
        let rec = stmt
            .query_row(rusqlite::params![symbol], recommendation_from_row)
            .optional()?;
        Ok(rec)
    }

    pub fn recommendations_for_run(&self, run_id: Uuid) -> Result<Vec<Recommendation>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, run_id, symbol, timestamp, timeframe, action, confidence, brief, reason_codes_json \
             FROM recommendations WHERE run_id = ?1 ORDER BY timestamp",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![run_id.to_string()], recommendation_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Insert rationales in one transaction.
    pub fn save_rationales(&mut self, rationales: &[Rationale]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO rationales \
                 (run_id, kind, content, raw_data, provider_name, model_name, latency_ms, attempts, error) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for r in rationales {
                stmt.execute(rusqlite::params![
                    r.run_id.to_string(),
                    r.kind.as_str(),
                    r.content,
                    r.raw_data,
                    r.provider_name,
                    r.model_name,
                    r.latency_ms.map(|v| v as i64),
                    r.attempts,
                    r.error,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn rationales_for_run(&self, run_id: Uuid) -> Result<Vec<Rationale>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT run_id, kind, content, raw_data, provider_name, model_name, latency_ms, attempts, error \
             FROM rationales WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![run_id.to_string()], |row| {
                Ok(Rationale {
                    run_id: uuid_col(row, 0)?,
                    kind: parsed_col(row, 1, RationaleKind::parse)?,
                    content: row.get(2)?,
                    raw_data: row.get(3)?,
                    provider_name: row.get(4)?,
                    model_name: row.get(5)?,
                    latency_ms: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
                    attempts: row.get(7)?,
                    error: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn save_verification_report(
        &self,
        run_id: Uuid,
        report: &VerificationReport,
    ) -> Result<(), StoreError> {
        let report_json = serde_json::to_string(report)?;
        self.conn.execute(
            "INSERT INTO verification_reports (run_id, passed, report_json, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![run_id.to_string(), report.passed, report_json, Utc::now()],
        )?;
        Ok(())
    }

    pub fn verification_reports_for_run(
        &self,
        run_id: Uuid,
    ) -> Result<Vec<VerificationReport>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT report_json FROM verification_reports WHERE run_id = ?1 ORDER BY id",
        )?;
        let raw = stmt
            .query_map(rusqlite::params![run_id.to_string()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut reports = Vec::with_capacity(raw.len());
        for json in raw {
            reports.push(serde_json::from_str(&json)?);
        }
        Ok(reports)
    }

    /// Upsert candles in one transaction. Returns the number written.
    pub fn upsert_candles(&mut self, candles: &[Candle]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO candles \
                 (symbol, timeframe, timestamp, open, high, low, close, volume) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for c in candles {
                stmt.execute(rusqlite::params![
                    c.symbol,
                    c.timeframe.as_str(),
                    c.timestamp,
                    c.open.to_string(),
                    c.high.to_string(),
                    c.low.to_string(),
                    c.close.to_string(),
                    c.volume.map(|v| v.to_string()),
                ])?;
            }
        }
        tx.commit()?;
        Ok(candles.len())
    }

    /// The latest `limit` candles, oldest first.
    pub fn recent_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT symbol, timeframe, timestamp, open, high, low, close, volume FROM candles \
             WHERE symbol = ?1 AND timeframe = ?2 ORDER BY timestamp DESC LIMIT ?3",
        )?;
        let mut rows = stmt
            .query_map(
                rusqlite::params![symbol, timeframe.as_str(), limit as i64],
                |row| {
                    Ok(Candle {
                        symbol: row.get(0)?,
                        timeframe: timeframe_col(row, 1)?,
                        timestamp: row.get::<_, DateTime<Utc>>(2)?,
                        open: decimal_col(row, 3)?,
                        high: decimal_col(row, 4)?,
                        low: decimal_col(row, 5)?,
                        close: decimal_col(row, 6)?,
                        volume: match row.get::<_, Option<String>>(7)? {
                            Some(_) => Some(decimal_col(row, 7)?),
                            None => None,
                        },
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.reverse();
        Ok(rows)
    }
}

fn recommendation_from_row(row: &Row<'_>) -> rusqlite::Result<Recommendation> {
    let run_id = match row.get::<_, Option<String>>(1)? {
        Some(_) => Some(uuid_col(row, 1)?),
        None => None,
    };
    let reason_codes_json: String = row.get(8)?;
    let reason_codes: Vec<String> = serde_json::from_str(&reason_codes_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;
    Ok(Recommendation {
        id: uuid_col(row, 0)?,
        run_id,
        symbol: row.get(2)?,
        timestamp: row.get(3)?,
        timeframe: timeframe_col(row, 4)?,
        action: parsed_col(row, 5, Action::parse)?,
        confidence: row.get(6)?,
        brief: row.get(7)?,
        reason_codes,
    })
}

fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timeframe_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timeframe> {
    let text: String = row.get(idx)?;
    Timeframe::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parsed_col<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse(&text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unrecognised value '{text}'").into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxra_models::{Severity, VerificationIssue};
    use rust_decimal_macros::dec;

    fn make_recommendation(run_id: Uuid, confidence: f64) -> Recommendation {
        let mut rec = Recommendation::new(
            "EURUSD",
            Timeframe::H1,
            Action::Put,
            confidence,
            "Bearish structure below SMA200.",
        );
        rec.run_id = Some(run_id);
        rec.reason_codes = vec![
            "WEAK_MOMENTUM".to_string(),
            "RANGE_STRUCTURE".to_string(),
            "CONFLICT_TREND_STRUCTURE".to_string(),
            "PARSING_FAILED".to_string(),
        ];
        rec
    }

    fn make_candle(minute: u32, close: Decimal) -> Candle {
        Candle {
            symbol: "GBPUSD".to_string(),
            timeframe: Timeframe::M1,
            timestamp: format!("2024-05-02T09:{minute:02}:00Z").parse().unwrap(),
            open: close,
            high: close + dec!(0.0005),
            low: close - dec!(0.0005),
            close,
            volume: None,
        }
    }

    #[test]
    fn recommendation_roundtrip_is_exact() {
        let store = Store::open_in_memory().unwrap();
        let run = Run::start("EURUSD", Timeframe::H1);
        store.create_run(&run).unwrap();

        let confidence = 0.1 + 0.2; // 0.30000000000000004
        let rec = make_recommendation(run.id, confidence);
        store.save_recommendation(&rec).unwrap();

        let loaded = store.get_recommendation(rec.id).unwrap().unwrap();
        assert_eq!(loaded.action, Action::Put);
        assert_eq!(loaded.confidence.to_bits(), confidence.to_bits());
        assert_eq!(loaded.reason_codes, rec.reason_codes);
        assert_eq!(loaded.run_id, Some(run.id));
        assert_eq!(loaded.timestamp, rec.timestamp);
    }

    #[test]
    fn recommendation_is_saved_once() {
        let store = Store::open_in_memory().unwrap();
        let rec = make_recommendation(Uuid::new_v4(), 0.5);
        store.save_recommendation(&rec).unwrap();
        assert!(store.save_recommendation(&rec).is_err());
    }

    #[test]
    fn get_missing_recommendation() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_recommendation(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn run_lifecycle() {
        let store = Store::open_in_memory().unwrap();
        let run = Run::start("USDJPY", Timeframe::M5);
        store.create_run(&run).unwrap();

        let pending = store.get_run(run.id).unwrap().unwrap();
        assert_eq!(pending.status, RunStatus::Pending);
        assert!(pending.end_time.is_none());

        store
            .finish_run(run.id, RunStatus::Failed, Some("Insufficient candles"))
            .unwrap();
        let failed = store.get_run(run.id).unwrap().unwrap();
        assert_eq!(failed.status, RunStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("Insufficient candles"));
        assert!(failed.end_time.is_some());
    }

    #[test]
    fn rationales_keep_insert_order() {
        let mut store = Store::open_in_memory().unwrap();
        let run_id = Uuid::new_v4();
        let rationales = vec![
            Rationale::new(run_id, RationaleKind::Technical, "{\"bias\":\"BULLISH\"}"),
            Rationale::new(run_id, RationaleKind::News, "Not enough relevant news"),
            Rationale::new(run_id, RationaleKind::Synthesis, "brief").with_raw_data("{}"),
        ];
        store.save_rationales(&rationales).unwrap();

        let loaded = store.rationales_for_run(run_id).unwrap();
        assert_eq!(loaded, rationales);
    }

    #[test]
    fn verification_reports_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let run_id = Uuid::new_v4();
        let report = VerificationReport {
            passed: false,
            issues: vec![VerificationIssue {
                code: "unsupported_claim".to_string(),
                message: "Brief cites an NFP print not in inputs".to_string(),
                severity: Severity::Medium,
                evidence: None,
            }],
            suggested_fix: Some("Remove the NFP reference".to_string()),
            policy_version: "1.0".to_string(),
            provider_name: Some("ollama_local".to_string()),
            model_name: Some("llama3:latest".to_string()),
        };
        store.save_verification_report(run_id, &report).unwrap();
        assert_eq!(store.verification_reports_for_run(run_id).unwrap(), vec![report]);
    }

    #[test]
    fn candles_upsert_and_window() {
        let mut store = Store::open_in_memory().unwrap();
        let candles: Vec<Candle> = (0..5)
            .map(|i| make_candle(i, dec!(1.2500) + Decimal::from(i) * dec!(0.0001)))
            .collect();
        assert_eq!(store.upsert_candles(&candles).unwrap(), 5);
        // Re-writing the same bars replaces rather than duplicates.
        store.upsert_candles(&candles[3..]).unwrap();

        let window = store.recent_candles("GBPUSD", Timeframe::M1, 3).unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0], candles[2]);
        assert_eq!(window[2], candles[4]);
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fxra.db");
        let rec = make_recommendation(Uuid::new_v4(), 0.65);
        {
            let store = Store::open(path.to_str().unwrap()).unwrap();
            store.save_recommendation(&rec).unwrap();
        }
        let reopened = Store::open(path.to_str().unwrap()).unwrap();
        let latest = reopened.latest_recommendation("EURUSD").unwrap().unwrap();
        assert_eq!(latest.id, rec.id);
    }
}
