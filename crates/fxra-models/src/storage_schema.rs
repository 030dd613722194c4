/// SQLite schema for the audit trail.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS runs (
///     id            TEXT PRIMARY KEY,
///     symbol        TEXT NOT NULL,
///     timeframe     TEXT NOT NULL,
///     start_time    TEXT NOT NULL,
///     end_time      TEXT,
///     status        TEXT NOT NULL,
///     error_message TEXT
/// );
///
/// CREATE TABLE IF NOT EXISTS recommendations (
///     id                TEXT PRIMARY KEY,
///     run_id            TEXT,
///     symbol            TEXT NOT NULL,
///     timestamp         TEXT NOT NULL,
///     timeframe         TEXT NOT NULL,
///     action            TEXT NOT NULL,
///     confidence        REAL NOT NULL,
///     brief             TEXT NOT NULL,
///     reason_codes_json TEXT NOT NULL
/// );
/// ```
///
/// `rationales`, `verification_reports` and `candles` follow the same pattern.
/// Confidence is stored as REAL so an f64 round-trips bit-for-bit.
pub const STORAGE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS runs (
    id            TEXT PRIMARY KEY,
    symbol        TEXT NOT NULL,
    timeframe     TEXT NOT NULL,
    start_time    TEXT NOT NULL,
    end_time      TEXT,
    status        TEXT NOT NULL,
    error_message TEXT
);
CREATE TABLE IF NOT EXISTS recommendations (
    id                TEXT PRIMARY KEY,
    run_id            TEXT,
    symbol            TEXT NOT NULL,
    timestamp         TEXT NOT NULL,
    timeframe         TEXT NOT NULL,
    action            TEXT NOT NULL,
    confidence        REAL NOT NULL,
    brief             TEXT NOT NULL,
    reason_codes_json TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS rationales (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id        TEXT NOT NULL,
    kind          TEXT NOT NULL,
    content       TEXT NOT NULL,
    raw_data      TEXT,
    provider_name TEXT,
    model_name    TEXT,
    latency_ms    INTEGER,
    attempts      INTEGER,
    error         TEXT
);
CREATE TABLE IF NOT EXISTS verification_reports (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id      TEXT NOT NULL,
    passed      INTEGER NOT NULL,
    report_json TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS candles (
    symbol    TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    open      TEXT NOT NULL,
    high      TEXT NOT NULL,
    low       TEXT NOT NULL,
    close     TEXT NOT NULL,
    volume    TEXT,
    PRIMARY KEY (symbol, timeframe, timestamp)
);
CREATE INDEX IF NOT EXISTS idx_recommendations_run ON recommendations(run_id);
CREATE INDEX IF NOT EXISTS idx_recommendations_symbol ON recommendations(symbol, timestamp);
CREATE INDEX IF NOT EXISTS idx_rationales_run ON rationales(run_id);
CREATE INDEX IF NOT EXISTS idx_runs_symbol ON runs(symbol, start_time);
";

/// Tables created by [`STORAGE_DDL`].
pub const TABLES: [&str; 5] = [
    "runs",
    "recommendations",
    "rationales",
    "verification_reports",
    "candles",
];
