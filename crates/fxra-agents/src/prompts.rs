use fxra_models::{Action, NewsArticle, NewsDigest, NewsQuality, Timeframe};

use fxra_decision::DecisionScores;

const MAX_HEADLINES_IN_SYNTHESIS: usize = 5;

/// Strict output template for the synthesizer. Also embedded in the repair prompt.
pub const SYNTHESIS_SCHEMA: &str = r#"{"action":"CALL|PUT|WAIT","confidence":0.0,"brief":"..."}"#;

pub fn technical_system_prompt(display_symbol: &str, timeframe: Timeframe) -> String {
    format!(
        "You are a professional Forex technical analyst. You are analyzing {display_symbol} \
         on the {timeframe} timeframe.\n\n\
         ## INPUT\n\n\
         You receive a feature snapshot in markdown: recent candles, trend, market structure, \
         moving averages and crossovers, RSI, rate of change, ATR and Bollinger Bands. \
         Use ONLY these values. Do not discuss any other instrument.\n\n\
         ## OUTPUT (STRICT)\n\n\
         Return ONLY a single JSON object, no markdown, no code fences, no commentary:\n\
         {{\"bias\":\"BULLISH|BEARISH|NEUTRAL\",\"confidence\":0.0,\"evidence\":[\"...\"],\
         \"contradictions\":[\"...\"],\"setup_type\":\"...\",\"no_trade_flags\":[\"...\"]}}\n\n\
         Rules:\n\
         - bias must be exactly BULLISH, BEARISH or NEUTRAL\n\
         - confidence is a number between 0.0 and 1.0\n\
         - evidence lists the indicator readings that support the bias\n\
         - contradictions lists readings that argue against it\n\
         - setup_type is a short label (e.g. trend_continuation, breakout, range) or null\n\
         - no_trade_flags lists reasons to stay out (e.g. LOW_VOLATILITY, CHOPPY); empty if none\n\
         - Do NOT add any other fields"
    )
}

pub fn news_system_prompt() -> String {
    "You are a professional Forex news analyst.\n\n\
     Your task is to analyze news headlines and provide a grounded summary, sentiment, \
     and impact assessment.\n\n\
     CRITICAL RULES:\n\
     - Use ONLY the headlines provided. Do NOT invent, assume, or fabricate information.\n\
     - If the headlines are insufficient or unclear, say so in the summary.\n\
     - Do NOT reference articles that are not in the list.\n\n\
     Respond with a valid JSON object in this exact format:\n\
     {\"summary\":\"2-3 sentences\",\"sentiment\":\"POS|NEG|NEU\",\"impact_score\":0.0,\
     \"evidence_titles\":[\"Exact title\"]}\n\n\
     Guidelines:\n\
     - POS means the news is bullish for the pair, NEG bearish, NEU neutral or unclear\n\
     - impact_score: 0.0 = no impact, 0.5 = moderate, 1.0 = high\n\
     - evidence_titles must be EXACT headlines from the list\n\
     - If sentiment can't be determined, use NEU and impact_score 0.0\n\n\
     Respond ONLY with the JSON object, no additional text."
        .to_string()
}

pub fn news_user_prompt(symbol: &str, articles: &[NewsArticle]) -> String {
    let mut prompt = format!("Analyze the following news headlines for {symbol}:\n\n");
    for article in articles {
        match &article.source {
            Some(source) => prompt.push_str(&format!("- {} (Source: {source})\n", article.title)),
            None => prompt.push_str(&format!("- {}\n", article.title)),
        }
    }
    prompt.push_str("\nProvide your analysis as JSON.");
    prompt
}

pub fn synthesis_system_prompt() -> String {
    format!(
        "You are a professional Forex trading advisor.\n\n\
         The trading decision (action and confidence) has ALREADY been made by a deterministic \
         policy. Your job is to explain it in a short brief using the technical analysis and \
         news context.\n\n\
         CRITICAL OUTPUT RULES:\n\
         - Output must be VALID JSON ONLY. No markdown, no code fences, no explanations.\n\
         - The JSON must contain EXACTLY 3 fields: action, confidence, brief.\n\
         - action and confidence MUST equal the fixed values you are given.\n\
         - brief is a PLAIN STRING: one line, 2-3 sentences, no newlines, no curly braces.\n\n\
         STRICT TEMPLATE:\n{SYNTHESIS_SCHEMA}\n\n\
         RULES FOR NEWS HANDLING:\n\
         - News Quality LOW: ignore the news and explain from the technical analysis only.\n\
         - News Quality MEDIUM: mention news with moderate weight.\n\
         - News Quality HIGH: discuss how the news supports or contradicts the technical view.\n\
         - Never promise profits. Be objective and risk-aware. Write in English."
    )
}

pub fn synthesis_repair_system_prompt() -> String {
    "You repair malformed model output into strict JSON. Return ONLY the JSON object, \
     nothing before or after it."
        .to_string()
}

/// Inputs for the synthesis user prompt.
pub struct SynthesisPromptInput<'a> {
    pub display_symbol: &'a str,
    pub timeframe: Timeframe,
    pub action: Action,
    pub confidence: f64,
    pub scores: &'a DecisionScores,
    pub reason_codes: &'a [String],
    pub technical_json: &'a str,
    pub news: Option<&'a NewsDigest>,
}

pub fn synthesis_user_prompt(input: &SynthesisPromptInput<'_>) -> String {
    let reason_codes = if input.reason_codes.is_empty() {
        "NONE".to_string()
    } else {
        input.reason_codes.join(", ")
    };

    format!(
        "Instrument: {} ({})\n\n\
         Deterministic Decision (already decided, do NOT change):\n\
         Decided Action (fixed): {}\n\
         Decided Confidence (fixed): {:.4}\n\
         Scores: bull={:.1}, bear={:.1}, no_trade={:.1}\n\
         Reason Codes: {reason_codes}\n\n\
         Technical Analysis:\n{}\n\n\
         News Context:\n{}\n\n\
         Return JSON matching this schema exactly:\n{SYNTHESIS_SCHEMA}\n\
         Constraints: action must be \"{}\", confidence must be {:.4}, brief is one plain line.",
        input.display_symbol,
        input.timeframe,
        input.action,
        input.confidence,
        input.scores.bull_score,
        input.scores.bear_score,
        input.scores.no_trade_score,
        input.technical_json,
        news_section(input.news),
        input.action,
        input.confidence,
    )
}

fn news_section(news: Option<&NewsDigest>) -> String {
    let Some(digest) = news else {
        return "News Quality: LOW (ignore news, rely on technical analysis)".to_string();
    };
    if digest.quality == NewsQuality::Low {
        return "News Quality: LOW (ignore news, rely on technical analysis)".to_string();
    }

    let mut section = format!(
        "News Quality: {}\nSentiment: {}\nImpact Score: {:.2}\nSummary: {}",
        digest.quality.as_str(),
        digest.sentiment.map_or("NEU", |s| s.as_str()),
        digest.impact_score.unwrap_or(0.0),
        digest.summary.as_deref().unwrap_or("N/A"),
    );
    let headlines: Vec<&str> = digest
        .titles()
        .into_iter()
        .take(MAX_HEADLINES_IN_SYNTHESIS)
        .collect();
    if !headlines.is_empty() {
        section.push_str("\nTop Headlines:");
        for title in headlines {
            section.push_str(&format!("\n- {title}"));
        }
    }
    section
}

pub fn synthesis_repair_prompt(invalid_output: &str) -> String {
    format!(
        "Convert this into STRICT valid JSON for schema. Return JSON only.\n\n\
         Schema: {SYNTHESIS_SCHEMA}\n\n\
         Invalid output:\n{invalid_output}"
    )
}

pub fn verifier_system_prompt() -> String {
    "You are a strict compliance verifier for a Forex research assistant. You review \
     another agent's output against the data it was given.\n\n\
     Flag:\n\
     - unsupported_claim: statements not backed by the input data\n\
     - policy_violation: promises of profit, certainty language, or instructions to \
     trade automatically\n\
     - inconsistency: the brief contradicts the action or confidence\n\
     - invalid_structure: missing or malformed required fields\n\n\
     Severity is one of low, medium, high. Set passed to false if any medium or high issue \
     exists. Return ONLY a JSON object."
        .to_string()
}

pub fn verifier_user_prompt(task: &str, inputs_summary: &str, author_output: &str) -> String {
    format!(
        "Verify the following agent output for task: {task}\n\n\
         INPUT DATA SUMMARY:\n{inputs_summary}\n\n\
         AUTHOR OUTPUT:\n{author_output}\n\n\
         Analyze the output and return a VerificationReport in JSON format. Check for:\n\
         1. Unsupported claims (hallucinations)\n\
         2. Policy violations (forbidden patterns)\n\
         3. Inconsistencies between action and brief\n\
         4. Invalid structure or missing required fields\n\n\
         OUTPUT REQUIREMENTS (STRICT):\n\
         - Return ONLY a single JSON object matching the VerificationReport schema.\n\
         - Do NOT wrap the JSON in markdown or code fences.\n\
         - Output must start with '{{' and end with '}}'.\n\n\
         Required JSON fields:\n\
         - passed (boolean)\n\
         - issues (array of objects with: code, message, severity, evidence?)\n\
         - suggested_fix (string or null)\n\
         - policy_version (string)"
    )
}

/// Ask for a corrected brief only; action and confidence stay as decided.
pub fn brief_repair_prompt(
    action: Action,
    confidence: f64,
    brief: &str,
    issues_json: &str,
    suggested_fix: Option<&str>,
) -> String {
    format!(
        "Previous synthesis failed verification. Apply the following fix:\n\
         Issues: {issues_json}\n\
         Suggested fix: {}\n\n\
         Action (fixed): {action}\n\
         Confidence (fixed): {confidence:.4}\n\
         Previous brief: {brief}\n\n\
         Return JSON matching this schema exactly:\n{SYNTHESIS_SCHEMA}",
        suggested_fix.unwrap_or("Rewrite the brief so it is supported by the data."),
    )
}
