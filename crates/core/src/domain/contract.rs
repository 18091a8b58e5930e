use crate::domain::summary::{Action, Confidence, SignalSummary, TimeHorizon, MAX_SUMMARY_BULLETS};
use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};

/// Summary exactly as the model emits it, before validation.
///
/// Optional fields fall back to the documented defaults; enum-valued fields
/// arrive as free text and are checked against the closed sets in
/// [`validate_and_into_summary`](LlmSignalSummary::validate_and_into_summary).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmSignalSummary {
    pub summary_bullets: Vec<String>,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub time_horizon: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub key_claims: Vec<String>,
    #[serde(default)]
    pub risks_or_unknowns: Vec<String>,
    #[serde(default)]
    pub what_to_verify: Vec<String>,
}

impl LlmSignalSummary {
    pub fn validate_and_into_summary(self) -> anyhow::Result<SignalSummary> {
        let summary_bullets = clean_list(self.summary_bullets);
        ensure!(
            summary_bullets.len() <= MAX_SUMMARY_BULLETS,
            "summary_bullets must have at most {MAX_SUMMARY_BULLETS} entries (got {})",
            summary_bullets.len()
        );

        let action = match self.action.as_deref().map(str::trim) {
            None | Some("") => Action::Unknown,
            Some(raw) => match Action::parse(raw) {
                Some(a) => a,
                None => bail!("unrecognized action: {raw:?}"),
            },
        };

        let time_horizon = match self.time_horizon.as_deref().map(str::trim) {
            None | Some("") => TimeHorizon::Unknown,
            Some(raw) => match TimeHorizon::parse(raw) {
                Some(h) => h,
                None => bail!("unrecognized time_horizon: {raw:?}"),
            },
        };

        let confidence = match self.confidence.as_deref().map(str::trim) {
            None | Some("") => Confidence::Low,
            Some(raw) => match Confidence::parse(raw) {
                Some(c) => c,
                None => bail!("unrecognized confidence: {raw:?}"),
            },
        };

        let mut tickers = Vec::with_capacity(self.tickers.len());
        for t in self.tickers {
            let t = t.trim().trim_start_matches('$').to_ascii_uppercase();
            if !t.is_empty() && !tickers.contains(&t) {
                tickers.push(t);
            }
        }

        Ok(SignalSummary {
            summary_bullets,
            tickers,
            action,
            time_horizon,
            confidence,
            key_claims: clean_list(self.key_claims),
            risks_or_unknowns: clean_list(self.risks_or_unknowns),
            what_to_verify: clean_list(self.what_to_verify),
        })
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
