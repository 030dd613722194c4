//! Agents driven through the router by scripted providers.

use std::collections::HashMap;
use std::sync::Arc;

use fxra_agents::news::NOT_ENOUGH_NEWS;
use fxra_agents::safety::DISCLAIMER;
use fxra_agents::synthesizer::FALLBACK_BRIEF;
use fxra_agents::test_support::ScriptedProvider;
use fxra_agents::{
    LlmProvider, LlmRouter, NewsAnalyst, SynthesisInput, Synthesizer, TechnicalAnalyst, Verifier,
};
use fxra_decision::IndicatorBag;
use fxra_models::{
    Action, Bias, DecisionConfig, LastResortConfig, LlmConfig, LlmRouteStep, NewsArticle,
    NewsDigest, NewsQuality, Recommendation, Sentiment, TechnicalAnalysisResult, Timeframe,
    VerificationReport,
};

fn scripted_router(provider: Arc<ScriptedProvider>) -> Arc<LlmRouter> {
    let mut config = LlmConfig {
        last_resort: LastResortConfig {
            provider: "none".to_string(),
            model: "none".to_string(),
        },
        ..LlmConfig::default()
    };
    for task in ["tech_analysis", "news_analysis", "synthesis", "verification"] {
        config
            .routes
            .insert(task.to_string(), vec![LlmRouteStep::new("scripted", "script-model")]);
    }
    let mut registry: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
    registry.insert("scripted".to_string(), provider);
    Arc::new(LlmRouter::new(&config, registry))
}

fn bullish_indicators() -> IndicatorBag {
    IndicatorBag::new()
        .with("structure", "BULLISH")
        .with("dist_sma200_pct", 1.0)
        .with("ema9_sma50_crossover_type", "BULLISH")
        .with("ema9_sma50_crossover_age_bars", 2.0)
        .with("roc_5", 1.0)
        .with("rsi_delta_1", 0.2)
        .with("rsi_delta_5", 0.1)
        .with("atr_pct", 1.0)
        .with("bb_squeeze_flag", 1.0)
}

fn bullish_view(confidence: f64) -> TechnicalAnalysisResult {
    TechnicalAnalysisResult {
        bias: Bias::Bullish,
        confidence,
        evidence: vec!["Price above SMA200".to_string()],
        contradictions: vec![],
        setup_type: Some("trend_continuation".to_string()),
        no_trade_flags: vec![],
        fallback: false,
    }
}

fn digest(quality: NewsQuality, titles: &[&str]) -> NewsDigest {
    let mut d = NewsDigest::low_quality("EURUSD", Timeframe::H1, "fixture");
    d.quality = quality;
    d.articles = titles
        .iter()
        .map(|t| NewsArticle {
            title: t.to_string(),
            url: None,
            source: Some("Reuters".to_string()),
            published_at: None,
            relevance_score: 0.8,
            query_tag: "EUR".to_string(),
        })
        .collect();
    d
}

#[tokio::test]
async fn synthesizer_discards_model_action() {
    let provider = Arc::new(ScriptedProvider::replies(
        "scripted",
        &[r#"{"action":"PUT","confidence":0.1,"brief":"Momentum and structure favour upside."}"#],
    ));
    let synthesizer = Synthesizer::new(scripted_router(provider.clone()), DecisionConfig::default());
    let indicators = bullish_indicators();
    let technical = bullish_view(0.85);

    let outcome = synthesizer
        .synthesize(SynthesisInput {
            symbol: "EURUSD",
            timeframe: Timeframe::H1,
            technical: &technical,
            indicators: &indicators,
            news: None,
        })
        .await;

    let rec = &outcome.recommendation;
    assert_eq!(rec.action, Action::Call);
    assert_eq!(rec.confidence, 0.85);
    assert!(rec.brief.starts_with("Momentum and structure favour upside."));
    assert!(rec.brief.ends_with(DISCLAIMER));
    assert_eq!(outcome.debug["llm_suggested_action"], "PUT");
    assert_eq!(outcome.debug["llm_suggested_confidence"], 0.1);
    assert_eq!(outcome.debug["parse_ok"], true);
    assert_eq!(outcome.debug["decision"]["action"], "CALL");
    assert!(outcome.scores.bull_score > outcome.scores.bear_score);

    let prompt = &provider.requests().await[0].user_prompt;
    assert!(prompt.contains("Decided Action (fixed): CALL"));
    assert!(prompt.contains("EUR/USD"));
}

#[tokio::test]
async fn synthesizer_low_news_caps_confidence() {
    let provider = Arc::new(ScriptedProvider::replies(
        "scripted",
        &[r#"{"action":"CALL","confidence":0.85,"brief":"Technical view is bullish."}"#],
    ));
    let synthesizer = Synthesizer::new(scripted_router(provider), DecisionConfig::default());
    let indicators = bullish_indicators();
    let technical = bullish_view(0.85);
    let news = digest(NewsQuality::Low, &[]);

    let outcome = synthesizer
        .synthesize(SynthesisInput {
            symbol: "EURUSD",
            timeframe: Timeframe::H1,
            technical: &technical,
            indicators: &indicators,
            news: Some(&news),
        })
        .await;

    assert_eq!(outcome.recommendation.action, Action::Call);
    assert_eq!(outcome.recommendation.confidence, 0.65);
}

#[tokio::test]
async fn synthesizer_repairs_once() {
    let provider = Arc::new(ScriptedProvider::replies(
        "scripted",
        &[
            "I would go with CALL here, fairly confident.",
            r#"{"action":"CALL","confidence":0.85,"brief":"Bullish structure with a fresh crossover."}"#,
        ],
    ));
    let synthesizer = Synthesizer::new(scripted_router(provider.clone()), DecisionConfig::default());
    let indicators = bullish_indicators();
    let technical = bullish_view(0.85);

    let outcome = synthesizer
        .synthesize(SynthesisInput {
            symbol: "EURUSD",
            timeframe: Timeframe::H1,
            technical: &technical,
            indicators: &indicators,
            news: None,
        })
        .await;

    assert_eq!(outcome.recommendation.action, Action::Call);
    assert_eq!(outcome.debug["retry_used"], true);
    assert_eq!(outcome.debug["repair_attempts"], 1);
    assert_eq!(outcome.debug["parse_ok"], true);

    let requests = provider.requests().await;
    assert_eq!(requests.len(), 2);
    assert!(requests[1].user_prompt.contains("I would go with CALL here"));
    assert!(requests[1].user_prompt.starts_with("Convert this into STRICT valid JSON"));
    assert!(outcome.response.text.contains("fresh crossover"));
}

#[tokio::test]
async fn synthesizer_falls_back_to_wait() {
    let provider = Arc::new(ScriptedProvider::replies(
        "scripted",
        &["not json", "still not json"],
    ));
    let synthesizer = Synthesizer::new(scripted_router(provider), DecisionConfig::default());
    let indicators = bullish_indicators();
    let technical = bullish_view(0.85);

    let outcome = synthesizer
        .synthesize(SynthesisInput {
            symbol: "EURUSD",
            timeframe: Timeframe::H1,
            technical: &technical,
            indicators: &indicators,
            news: None,
        })
        .await;

    let rec = &outcome.recommendation;
    assert_eq!(rec.action, Action::Wait);
    assert_eq!(rec.confidence, 0.0);
    assert!(rec.brief.starts_with(FALLBACK_BRIEF));
    assert_eq!(outcome.debug["parse_ok"], false);
    assert!(outcome.debug["parse_error"]
        .as_str()
        .unwrap()
        .starts_with("Initial:"));
    assert_eq!(outcome.response.text, "still not json");
}

#[tokio::test]
async fn synthesizer_skips_repair_after_llm_error() {
    let provider = Arc::new(ScriptedProvider::new(
        "scripted",
        vec![Err("connection refused".to_string()), Ok("unused".to_string())],
    ));
    let synthesizer = Synthesizer::new(scripted_router(provider.clone()), DecisionConfig::default());
    let indicators = IndicatorBag::new();
    let technical = TechnicalAnalysisResult::parsing_failed(true);

    let outcome = synthesizer
        .synthesize(SynthesisInput {
            symbol: "GBPUSD",
            timeframe: Timeframe::M5,
            technical: &technical,
            indicators: &indicators,
            news: None,
        })
        .await;

    assert_eq!(outcome.recommendation.action, Action::Wait);
    assert_eq!(outcome.debug["repair_attempts"], 0);
    assert_eq!(outcome.debug["technical_parse_ok"], false);
    assert!(outcome
        .recommendation
        .reason_codes
        .contains(&"PARSING_FAILED".to_string()));
    assert!(outcome.response.error.is_some());
    assert_eq!(provider.remaining().await, 1);
}

#[tokio::test]
async fn model_emitted_parse_flag_is_not_a_parse_failure() {
    let provider = Arc::new(ScriptedProvider::replies(
        "scripted",
        &[r#"{"action":"WAIT","confidence":0.3,"brief":"Mixed signals, no clear edge."}"#],
    ));
    let synthesizer = Synthesizer::new(scripted_router(provider), DecisionConfig::default());
    let indicators = IndicatorBag::new();
    let mut technical = bullish_view(0.4);
    technical.no_trade_flags = vec!["PARSING_FAILED".to_string()];

    let outcome = synthesizer
        .synthesize(SynthesisInput {
            symbol: "EURUSD",
            timeframe: Timeframe::H1,
            technical: &technical,
            indicators: &indicators,
            news: None,
        })
        .await;

    assert_eq!(outcome.debug["technical_parse_ok"], true);
    assert!(!outcome
        .recommendation
        .reason_codes
        .contains(&"PARSING_FAILED".to_string()));
}

#[tokio::test]
async fn forbidden_phrase_forces_wait() {
    let provider = Arc::new(ScriptedProvider::replies(
        "scripted",
        &[r#"{"action":"CALL","confidence":0.85,"brief":"A sure win on the breakout."}"#],
    ));
    let synthesizer = Synthesizer::new(scripted_router(provider), DecisionConfig::default());
    let indicators = bullish_indicators();
    let technical = bullish_view(0.85);

    let outcome = synthesizer
        .synthesize(SynthesisInput {
            symbol: "EURUSD",
            timeframe: Timeframe::H1,
            technical: &technical,
            indicators: &indicators,
            news: None,
        })
        .await;

    assert_eq!(outcome.recommendation.action, Action::Wait);
    assert!(outcome.recommendation.confidence <= 0.3);
    assert!(!outcome.recommendation.brief.to_lowercase().contains("sure win"));
}

#[tokio::test]
async fn technical_analyst_parses_and_falls_back() {
    let provider = Arc::new(ScriptedProvider::new(
        "scripted",
        vec![
            Ok(r#"```json
{"bias":"BEARISH","confidence":0.7,"evidence":["RSI 38 and falling"],"contradictions":[],"setup_type":null,"no_trade_flags":[]}
```"#
                .to_string()),
            Ok("Bearish, maybe.".to_string()),
            Err("Request timed out after 60 seconds".to_string()),
        ],
    ));
    let analyst = TechnicalAnalyst::new(scripted_router(provider.clone()));

    let first = analyst.analyze("## Snapshot", "usdjpy", Timeframe::M15).await;
    assert_eq!(first.result.bias, Bias::Bearish);
    assert_eq!(first.result.confidence, 0.7);

    let second = analyst.analyze("## Snapshot", "usdjpy", Timeframe::M15).await;
    assert_eq!(second.result.no_trade_flags, vec!["PARSING_FAILED"]);
    assert_eq!(second.result.confidence, 0.0);

    let third = analyst.analyze("## Snapshot", "usdjpy", Timeframe::M15).await;
    assert_eq!(third.result.no_trade_flags, vec!["PARSING_FAILED", "LLM_ERROR"]);
    assert!(third.response.error.is_some());

    let requests = provider.requests().await;
    assert!(requests[0].system_prompt.contains("USD/JPY"));
    assert_eq!(requests[0].user_prompt, "## Snapshot");
}

#[tokio::test]
async fn news_analyst_skips_low_quality() {
    let provider = Arc::new(ScriptedProvider::replies("scripted", &["unused"]));
    let analyst = NewsAnalyst::new(scripted_router(provider.clone()));

    let analysis = analyst.analyze(digest(NewsQuality::Low, &["Headline"])).await;
    assert!(analysis.response.is_none());
    assert_eq!(analysis.digest.summary.as_deref(), Some(NOT_ENOUGH_NEWS));
    assert_eq!(analysis.digest.sentiment, Some(Sentiment::Neu));

    let empty = analyst.analyze(digest(NewsQuality::High, &[])).await;
    assert!(empty.response.is_none());
    assert_eq!(provider.remaining().await, 1);
}

#[tokio::test]
async fn news_analyst_fills_digest() {
    let provider = Arc::new(ScriptedProvider::replies(
        "scripted",
        &[r#"{"summary":"ECB keeps rates on hold.","sentiment":"NEG","impact_score":0.6,
             "evidence_titles":["ECB holds rates","Made up"]}"#],
    ));
    let analyst = NewsAnalyst::new(scripted_router(provider));

    let analysis = analyst
        .analyze(digest(NewsQuality::Medium, &["ECB holds rates", "Euro slips"]))
        .await;
    let d = analysis.digest;
    assert_eq!(d.summary.as_deref(), Some("ECB keeps rates on hold."));
    assert_eq!(d.sentiment, Some(Sentiment::Neg));
    assert_eq!(d.impact_score, Some(0.6));
    assert_eq!(d.evidence_titles, vec!["ECB holds rates"]);
    assert_eq!(d.provider_used.as_deref(), Some("scripted"));
}

#[tokio::test]
async fn news_analyst_parse_failure_is_neutral() {
    let provider = Arc::new(ScriptedProvider::replies("scripted", &["no idea"]));
    let analyst = NewsAnalyst::new(scripted_router(provider));

    let analysis = analyst
        .analyze(digest(NewsQuality::High, &["Fed hikes"]))
        .await;
    assert_eq!(analysis.digest.summary.as_deref(), Some(NOT_ENOUGH_NEWS));
    assert_eq!(analysis.digest.impact_score, Some(0.0));
    assert!(analysis.response.is_some());
}

#[tokio::test]
async fn verifier_reports_model_metadata() {
    let provider = Arc::new(ScriptedProvider::replies(
        "scripted",
        &[r#"{"passed":false,"issues":[{"code":"inconsistency","message":"Brief says bearish","severity":"medium"}],"suggested_fix":"Align brief with CALL","policy_version":"1.0"}"#],
    ));
    let verifier = Verifier::new(scripted_router(provider.clone()));

    let (report, response) = verifier
        .verify("synthesis", "EURUSD 1h", r#"{"action":"CALL"}"#)
        .await;
    assert!(!report.passed);
    assert_eq!(report.issues[0].code, "inconsistency");
    assert_eq!(report.suggested_fix.as_deref(), Some("Align brief with CALL"));
    assert_eq!(report.provider_name.as_deref(), Some("scripted"));
    assert_eq!(report.model_name.as_deref(), Some("script-model"));
    assert!(response.error.is_none());

    let prompt = &provider.requests().await[0].user_prompt;
    assert!(prompt.starts_with("Verify the following agent output for task: synthesis"));
}

#[tokio::test]
async fn brief_repair_keeps_decision() {
    let provider = Arc::new(ScriptedProvider::replies(
        "scripted",
        &[r#"{"action":"PUT","confidence":0.2,"brief":"Trend and structure both point up."}"#],
    ));
    let synthesizer = Synthesizer::new(scripted_router(provider.clone()), DecisionConfig::default());
    let recommendation =
        Recommendation::new("EURUSD", Timeframe::H1, Action::Call, 0.7, "Bearish momentum fades.");
    let report = VerificationReport::invalid_json("Brief contradicts action", None, "Align brief with CALL");

    let (brief, response) = synthesizer.repair_brief(&recommendation, &report).await;
    let brief = brief.unwrap();
    assert!(brief.starts_with("Trend and structure both point up."));
    assert!(brief.ends_with(DISCLAIMER));
    assert!(response.error.is_none());

    let prompt = &provider.requests().await[0].user_prompt;
    assert!(prompt.starts_with("Previous synthesis failed verification. Apply the following fix:"));
    assert!(prompt.contains("Align brief with CALL"));
    assert!(prompt.contains("Action (fixed): CALL"));
}

#[tokio::test]
async fn brief_repair_rejects_forbidden_phrase() {
    let provider = Arc::new(ScriptedProvider::replies(
        "scripted",
        &[r#"{"action":"CALL","confidence":0.7,"brief":"This is risk-free."}"#],
    ));
    let synthesizer = Synthesizer::new(scripted_router(provider), DecisionConfig::default());
    let recommendation = Recommendation::new("EURUSD", Timeframe::H1, Action::Call, 0.7, "Old.");
    let report = VerificationReport::invalid_json("bad", None, "fix it");

    let (brief, _) = synthesizer.repair_brief(&recommendation, &report).await;
    assert!(brief.is_none());
}
