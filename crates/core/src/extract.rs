//! Regex-based ticker and action extraction.
//!
//! Pure and deterministic: used for the fallback section of an alert when the
//! summarizer gives up, and computed for every new post regardless.

use crate::domain::summary::Action;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static SIGIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z]{1,5})\b").expect("valid sigil regex"));
static PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([A-Z]{1,5})\)").expect("valid paren regex"));

const CRYPTO_TICKERS: &[&str] = &[
    "BTC", "ETH", "SOL", "ADA", "DOT", "AVAX", "MATIC", "LINK", "UNI", "ATOM", "XRP", "DOGE",
    "SHIB", "BNB", "USDT", "USDC",
];

const STOP_WORDS: &[&str] = &[
    "IT", "IS", "IN", "ON", "AT", "TO", "BE", "OR", "AND", "THE", "FOR", "ARE", "WAS", "BUT",
    "NOT", "YOU", "ALL", "CAN", "HER", "HIS", "ITS", "OUR", "OUT", "MAY", "SEE", "GET", "HAS",
    "HAD", "DAY", "WAY", "NEW", "NOW", "OLD", "TOP", "BIG", "BAD", "HOT", "PM", "AM", "US", "UK",
    "CEO", "CFO", "CTO", "IPO", "API", "AI", "ML", "VC", "PE", "RE", "PR", "HR", "IR", "DD",
    "YTD", "QOQ",
];

const WORD_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '(', ')', '[', ']', '{', '}', '"', '\'',
];

// Emission order is this table's order.
const ACTION_KEYWORDS: [(Action, &[&str]); 7] = [
    (Action::Buy, &["buy", "buying", "bought", "long", "bullish"]),
    (Action::Sell, &["sell", "selling", "sold", "bearish"]),
    (
        Action::Add,
        &["add", "adding", "added", "accumulate", "accumulating"],
    ),
    (
        Action::Trim,
        &["trim", "trimming", "trimmed", "reduce", "reducing", "reduced"],
    ),
    (Action::Short, &["short", "shorting", "shorted"]),
    (Action::Cover, &["cover", "covering", "covered", "closing"]),
    (
        Action::Watch,
        &["watch", "watching", "monitor", "monitoring", "eyeing", "tracking"],
    ),
];

static ACTION_RES: LazyLock<Vec<(Action, Regex)>> = LazyLock::new(|| {
    ACTION_KEYWORDS
        .iter()
        .map(|(action, keywords)| {
            let pattern = format!(r"(?i)\b(?:{})\b", keywords.join("|"));
            (*action, Regex::new(&pattern).expect("valid action regex"))
        })
        .collect()
});

/// Best-effort signal derived without the summarizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackSignal {
    pub tickers: Vec<String>,
    pub actions: Vec<Action>,
}

impl FallbackSignal {
    pub fn from_text(text: &str) -> Self {
        Self {
            tickers: extract_tickers(text),
            actions: extract_action_keywords(text),
        }
    }
}

/// Sorted, de-duplicated, upper-cased ticker symbols found in `text`.
pub fn extract_tickers(text: &str) -> Vec<String> {
    let mut out = BTreeSet::new();

    for re in [&*SIGIL_RE, &*PAREN_RE] {
        for caps in re.captures_iter(text) {
            let ticker = caps[1].to_ascii_uppercase();
            if !STOP_WORDS.contains(&ticker.as_str()) {
                out.insert(ticker);
            }
        }
    }

    for word in text.split_whitespace() {
        let word = word.trim_matches(WORD_PUNCTUATION).to_ascii_uppercase();
        if CRYPTO_TICKERS.contains(&word.as_str()) {
            out.insert(word);
        }
    }

    out.into_iter().collect()
}

/// Action categories mentioned in `text`, at most once each, in table order.
pub fn extract_action_keywords(text: &str) -> Vec<Action> {
    ACTION_RES
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(action, _)| *action)
        .collect()
}
