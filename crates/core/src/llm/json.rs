use crate::domain::contract::LlmSignalSummary;
use crate::domain::summary::SignalSummary;
use anyhow::Context;

/// Pulls a JSON object out of a model reply: the body of a Markdown fence if
/// the reply is fenced, otherwise the outermost `{ … }` span.
pub fn extract_json(text: &str) -> Option<String> {
    let reply = text.trim();
    if let Some(fenced) = reply.strip_prefix("```") {
        let body = fenced.split_once('\n').map_or("", |(_, rest)| rest);
        let body = body.rsplit_once("```").map_or(body, |(inside, _)| inside);
        return Some(body.trim().to_string());
    }

    let open = reply.find('{')?;
    let close = reply.rfind('}')?;
    (close > open).then(|| reply[open..=close].to_string())
}

pub fn parse_summary(text: &str) -> anyhow::Result<SignalSummary> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmSignalSummary>(&json_str)
        .with_context(|| format!("LLM output is not valid JSON for summary schema: {json_str}"))?;
    parsed.validate_and_into_summary()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::summary::{Action, Confidence, TimeHorizon};

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "Here you go: {\"a\":1} hope that helps";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
        assert_eq!(extract_json("no json at all"), None);
    }

    #[test]
    fn parse_summary_accepts_fenced_payload() {
        let text = "```json\n{\"summary_bullets\":[\"Long TSLA into earnings\"],\"tickers\":[\"tsla\"],\"action\":\"buy\",\"time_horizon\":\"weeks\",\"confidence\":\"high\"}\n```";
        let summary = parse_summary(text).unwrap();
        assert_eq!(summary.tickers, vec!["TSLA"]);
        assert_eq!(summary.action, Action::Buy);
        assert_eq!(summary.time_horizon, TimeHorizon::Weeks);
        assert_eq!(summary.confidence, Confidence::High);
    }

    #[test]
    fn parse_summary_rejects_prose() {
        assert!(parse_summary("I could not find a signal in this tweet.").is_err());
    }

    #[test]
    fn parse_summary_rejects_unknown_enum_values() {
        let text = r#"{"summary_bullets":["x"],"action":"yolo"}"#;
        let err = parse_summary(text).unwrap_err();
        assert!(err.to_string().contains("yolo"));
    }
}
