pub mod anthropic;
pub mod error;
pub mod json;

use crate::domain::summary::SignalSummary;
use crate::error::SignalError;

pub use anthropic::AnthropicSummarizer;

#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// One attempt at a structured summary of `text`, posted by `author`.
    ///
    /// Transport failures come back as `Transient`, unusable output as `Parse`.
    async fn summarize(&self, text: &str, author: &str) -> Result<SignalSummary, SignalError>;
}
