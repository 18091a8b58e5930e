use serde::{Deserialize, Serialize};

pub const MAX_SUMMARY_BULLETS: usize = 5;

/// Primary investment action a post suggests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Add,
    Trim,
    Short,
    Cover,
    Watch,
    Unknown,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::Add => "add",
            Action::Trim => "trim",
            Action::Short => "short",
            Action::Cover => "cover",
            Action::Watch => "watch",
            Action::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let v = match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Action::Buy,
            "sell" => Action::Sell,
            "add" => Action::Add,
            "trim" => Action::Trim,
            "short" => Action::Short,
            "cover" => Action::Cover,
            "watch" => Action::Watch,
            "unknown" => Action::Unknown,
            _ => return None,
        };
        Some(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeHorizon {
    Intraday,
    Days,
    Weeks,
    Months,
    Years,
    Unknown,
}

impl TimeHorizon {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeHorizon::Intraday => "intraday",
            TimeHorizon::Days => "days",
            TimeHorizon::Weeks => "weeks",
            TimeHorizon::Months => "months",
            TimeHorizon::Years => "years",
            TimeHorizon::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let v = match s.trim().to_ascii_lowercase().as_str() {
            "intraday" => TimeHorizon::Intraday,
            "days" => TimeHorizon::Days,
            "weeks" => TimeHorizon::Weeks,
            "months" => TimeHorizon::Months,
            "years" => TimeHorizon::Years,
            "unknown" => TimeHorizon::Unknown,
            _ => return None,
        };
        Some(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let v = match s.trim().to_ascii_lowercase().as_str() {
            "low" => Confidence::Low,
            "medium" => Confidence::Medium,
            "high" => Confidence::High,
            _ => return None,
        };
        Some(v)
    }
}

/// Validated summary of a post's investment signal.
///
/// This is also the persisted shape (JSONB), so field names are part of the
/// stored format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub summary_bullets: Vec<String>,
    pub tickers: Vec<String>,
    pub action: Action,
    pub time_horizon: TimeHorizon,
    pub confidence: Confidence,
    pub key_claims: Vec<String>,
    pub risks_or_unknowns: Vec<String>,
    pub what_to_verify: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enums_serialize_lowercase() {
        let summary = SignalSummary {
            summary_bullets: vec!["Point 1".into()],
            tickers: vec!["TSLA".into()],
            action: Action::Buy,
            time_horizon: TimeHorizon::Weeks,
            confidence: Confidence::High,
            key_claims: vec![],
            risks_or_unknowns: vec![],
            what_to_verify: vec![],
        };
        let v = serde_json::to_value(&summary).unwrap();
        assert_eq!(v["action"], json!("buy"));
        assert_eq!(v["time_horizon"], json!("weeks"));
        assert_eq!(v["confidence"], json!("high"));
        assert_eq!(v["tickers"], json!(["TSLA"]));
    }

    #[test]
    fn parse_is_closed_over_known_values() {
        assert_eq!(Action::parse(" SHORT "), Some(Action::Short));
        assert_eq!(Action::parse("hodl"), None);
        assert_eq!(TimeHorizon::parse("Intraday"), Some(TimeHorizon::Intraday));
        assert_eq!(Confidence::parse("super_high"), None);
    }
}
