//! Alert rendering and payload chunking.
//!
//! Output targets Telegram's legacy `Markdown` parse mode. Free text coming
//! from the post or the summarizer is escaped; handles, tickers and urls are
//! emitted as-is.

use crate::domain::post::CandidatePost;
use crate::domain::summary::{Action, Confidence, SignalSummary, TimeHorizon};

pub const MAX_RAW_TEXT_CHARS: usize = 500;
pub const MAX_LISTED_ITEMS: usize = 3;
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

/// Renders the alert and splits it into chunks of at most `max_chars` characters.
pub fn format(
    post: &CandidatePost,
    summary: Option<&SignalSummary>,
    fallback_tickers: &[String],
    fallback_actions: &[Action],
    max_chars: usize,
) -> Vec<String> {
    let message = format_alert(post, summary, fallback_tickers, fallback_actions);
    split_message(&message, max_chars)
}

pub fn format_alert(
    post: &CandidatePost,
    summary: Option<&SignalSummary>,
    fallback_tickers: &[String],
    fallback_actions: &[Action],
) -> String {
    let mut lines = vec![
        format!("🚨 *New Tweet from @{}*", post.author),
        format!("🔗 [View Tweet]({})", post.url),
        String::new(),
        "📝 *Raw Tweet:*".to_string(),
        escape_markdown(&truncate_chars(&post.text, MAX_RAW_TEXT_CHARS)),
        String::new(),
    ];

    match summary {
        Some(summary) => push_summary(&mut lines, summary),
        None => push_fallback(&mut lines, fallback_tickers, fallback_actions),
    }

    lines.join("\n")
}

fn push_summary(lines: &mut Vec<String>, summary: &SignalSummary) {
    lines.push("🤖 *AI Summary:*".to_string());
    lines.extend(summary.summary_bullets.iter().map(|b| bullet(b)));
    lines.push(String::new());

    if !summary.tickers.is_empty() {
        lines.push(format!("📊 *Tickers:* {}", dollar_list(&summary.tickers)));
    }
    if summary.action != Action::Unknown {
        lines.push(format!(
            "⚡ *Action:* {}",
            summary.action.as_str().to_ascii_uppercase()
        ));
    }
    if summary.time_horizon != TimeHorizon::Unknown {
        lines.push(format!("⏱️ *Horizon:* {}", summary.time_horizon.as_str()));
    }
    lines.push(format!(
        "{} *Confidence:* {}",
        confidence_marker(summary.confidence),
        summary.confidence.as_str()
    ));
    lines.push(String::new());

    if !summary.risks_or_unknowns.is_empty() {
        lines.push("⚠️ *Risks:*".to_string());
        lines.extend(
            summary
                .risks_or_unknowns
                .iter()
                .take(MAX_LISTED_ITEMS)
                .map(|r| bullet(r)),
        );
        lines.push(String::new());
    }

    if !summary.what_to_verify.is_empty() {
        lines.push("✅ *Verify:*".to_string());
        lines.extend(
            summary
                .what_to_verify
                .iter()
                .take(MAX_LISTED_ITEMS)
                .map(|v| bullet(v)),
        );
    }
}

fn push_fallback(lines: &mut Vec<String>, tickers: &[String], actions: &[Action]) {
    lines.push("⚠️ *AI summary unavailable - using fallback extraction*".to_string());
    if !tickers.is_empty() {
        lines.push(format!("📊 *Detected Tickers:* {}", dollar_list(tickers)));
    }
    if !actions.is_empty() {
        let joined = actions
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("⚡ *Detected Actions:* {joined}"));
    }
}

fn bullet(text: &str) -> String {
    format!("• {}", escape_markdown(text))
}

fn dollar_list(tickers: &[String]) -> String {
    tickers
        .iter()
        .map(|t| format!("${t}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn confidence_marker(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::Low => "🟡",
        Confidence::Medium => "🟠",
        Confidence::High => "🟢",
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Escapes the entity markers of Telegram's legacy Markdown.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Splits `message` on line boundaries into chunks of at most `max_chars`
/// characters, keeping line order.
///
/// Joining the chunks with `\n` gives back the message unless a single line
/// was itself longer than `max_chars`; such a line is cut into pieces.
pub fn split_message(message: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if message.chars().count() <= max_chars {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for piece in message.split('\n').flat_map(|line| hard_wrap(line, max_chars)) {
        let piece_len = piece.chars().count();
        let joined_len = if current.is_empty() {
            piece_len
        } else {
            current_len + 1 + piece_len
        };

        if joined_len > max_chars && !current.is_empty() {
            chunks.push(current.join("\n"));
            current.clear();
            current_len = piece_len;
        } else {
            current_len = joined_len;
        }
        current.push(piece);
    }

    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }
    chunks
}

fn hard_wrap(line: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = line;
    while let Some((cut, _)) = rest.char_indices().nth(max_chars) {
        pieces.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    pieces.push(rest);
    pieces
}
