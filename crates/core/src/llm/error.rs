use crate::error::{is_retryable_status, SignalError, Stage};
use serde_json::Value;
use std::fmt;

const RAW_OUTPUT_PREVIEW_CHARS: usize = 200;

/// Whether the provider could not be reached, refused the request, or answered
/// with something unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Rejected,
    Output,
}

#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: &'static str,
    pub kind: FailureKind,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl LlmDiagnosticsError {
    pub fn transport(provider: &'static str, stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            provider,
            kind: FailureKind::Transport,
            stage,
            detail: detail.into(),
            raw_output: None,
            raw_response_json: None,
        }
    }

    /// Unsuccessful HTTP status: 5xx and 429 are transport failures, the rest rejections.
    pub fn status(
        provider: &'static str,
        stage: &'static str,
        status: reqwest::StatusCode,
        detail: impl Into<String>,
    ) -> Self {
        let mut err = Self::transport(provider, stage, detail);
        if !is_retryable_status(status) {
            err.kind = FailureKind::Rejected;
        }
        err
    }

    pub fn output(provider: &'static str, stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            provider,
            kind: FailureKind::Output,
            stage,
            detail: detail.into(),
            raw_output: None,
            raw_response_json: None,
        }
    }

    pub fn with_raw_output(mut self, raw: impl Into<String>) -> Self {
        self.raw_output = Some(raw.into());
        self
    }

    pub fn with_raw_response_json(mut self, raw: Value) -> Self {
        self.raw_response_json = Some(raw);
        self
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={}, stage={}): {}",
            self.provider, self.stage, self.detail
        )?;
        if let Some(raw) = &self.raw_output {
            let preview: String = raw.chars().take(RAW_OUTPUT_PREVIEW_CHARS).collect();
            write!(f, " [raw_output={preview:?}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for LlmDiagnosticsError {}

impl From<LlmDiagnosticsError> for SignalError {
    fn from(err: LlmDiagnosticsError) -> Self {
        if let Some(raw) = &err.raw_response_json {
            tracing::debug!(provider = err.provider, stage = err.stage, %raw, "LLM raw response");
        }
        match err.kind {
            FailureKind::Transport => SignalError::transient(Stage::Summarize, err.to_string()),
            FailureKind::Rejected => SignalError::rejected(Stage::Summarize, err.to_string()),
            FailureKind::Output => SignalError::parse(Stage::Summarize, err.to_string()),
        }
    }
}
