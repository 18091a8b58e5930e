use crate::config::Settings;
use crate::domain::contract::LlmSignalSummary;
use crate::domain::summary::{SignalSummary, MAX_SUMMARY_BULLETS};
use crate::error::SignalError;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json;
use crate::llm::Summarizer;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const TEMPERATURE: f32 = 0.3;

const TOOL_NAME_EMIT_SUMMARY: &str = "emit_summary";

#[derive(Debug, Clone)]
pub struct AnthropicSummarizer {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicSummarizer {
    /// `timeout` bounds each HTTP request; callers pass the per-attempt call timeout.
    pub fn from_settings(settings: &Settings, timeout: Duration) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        Self::new(api_key, base_url, model, max_tokens, timeout)
    }

    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    async fn create_message(
        &self,
        req: &CreateMessageRequest,
    ) -> Result<(serde_json::Value, CreateMessageResponse), LlmDiagnosticsError> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&self.api_key).map_err(|e| {
            LlmDiagnosticsError::transport(PROVIDER, "headers", format!("invalid api key header: {e}"))
        })?;
        headers.insert("x-api-key", api_key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(req)
            .send()
            .await
            .map_err(|e| LlmDiagnosticsError::transport(PROVIDER, "http", format!("request failed: {e}")))?;

        let status = res.status();
        let text = res.text().await.map_err(|e| {
            LlmDiagnosticsError::transport(PROVIDER, "http", format!("failed to read body: {e}"))
        })?;
        if !status.is_success() {
            let mut err = LlmDiagnosticsError::status(PROVIDER, "http", status, format!("status={status}"))
                .with_raw_output(text.clone());
            if let Ok(raw) = serde_json::from_str::<serde_json::Value>(&text) {
                err = err.with_raw_response_json(raw);
            }
            return Err(err);
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text).map_err(|e| {
            LlmDiagnosticsError::output(PROVIDER, "decode", format!("response is not JSON: {e}"))
                .with_raw_output(text.clone())
        })?;
        let parsed = serde_json::from_value::<CreateMessageResponse>(raw_json.clone()).map_err(|e| {
            LlmDiagnosticsError::output(PROVIDER, "decode", format!("unexpected response shape: {e}"))
                .with_raw_response_json(raw_json.clone())
        })?;
        Ok((raw_json, parsed))
    }

    fn tools() -> Vec<Tool> {
        let string_list = serde_json::json!({"type": "array", "items": {"type": "string"}});
        let schema = serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["summary_bullets", "tickers", "action", "time_horizon", "confidence"],
            "properties": {
                "summary_bullets": {
                    "type": "array",
                    "maxItems": MAX_SUMMARY_BULLETS,
                    "items": {"type": "string"}
                },
                "tickers": string_list,
                "action": {
                    "type": "string",
                    "enum": ["buy", "sell", "add", "trim", "short", "cover", "watch", "unknown"]
                },
                "time_horizon": {
                    "type": "string",
                    "enum": ["intraday", "days", "weeks", "months", "years", "unknown"]
                },
                "confidence": {"type": "string", "enum": ["low", "medium", "high"]},
                "key_claims": string_list,
                "risks_or_unknowns": string_list,
                "what_to_verify": string_list
            }
        });

        vec![Tool {
            name: TOOL_NAME_EMIT_SUMMARY,
            description: "Emit the investment-signal summary of the post as structured JSON",
            input_schema: schema,
        }]
    }

    fn tool_choice() -> ToolChoice {
        ToolChoice::Tool {
            name: TOOL_NAME_EMIT_SUMMARY,
        }
    }

    fn system_prompt() -> String {
        [
            "You are a financial analyst assistant. Analyze social-media posts for investment signals.",
            "Respond by calling the emit_summary tool. If you cannot, return ONLY a JSON object with the same keys.",
            "Guidelines:",
            "- summary_bullets: up to 5 concise points summarizing the post's investment thesis",
            "- tickers: every stock or crypto ticker mentioned, without the $ sign",
            "- action: the primary investment action (unknown if there is no clear action)",
            "- time_horizon: the suggested holding period (unknown if not specified)",
            "- confidence: your confidence in the signal (low/medium/high)",
            "- key_claims: factual claims that drive the thesis",
            "- risks_or_unknowns: potential risks or uncertainties",
            "- what_to_verify: what a trader should independently verify",
            "If the post has no investment signal (news or commentary only), set action to unknown and say so in summary_bullets.",
        ]
        .join("\n")
    }

    fn user_prompt(text: &str, author: &str) -> String {
        format!("Post by @{author}:\n{text}")
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    fn response_tool_summary(
        res: &CreateMessageResponse,
    ) -> Result<Option<LlmSignalSummary>, LlmDiagnosticsError> {
        for block in &res.content {
            if let ContentBlock::ToolUse { name, input, .. } = block {
                if name == TOOL_NAME_EMIT_SUMMARY {
                    let parsed = serde_json::from_value::<LlmSignalSummary>(input.clone())
                        .map_err(|e| {
                            LlmDiagnosticsError::output(
                                PROVIDER,
                                "tool_input",
                                format!("tool_use.input does not match the summary schema: {e}"),
                            )
                            .with_raw_output(input.to_string())
                        })?;
                    return Ok(Some(parsed));
                }
            }
        }
        Ok(None)
    }

    async fn summarize_once(
        &self,
        text: &str,
        author: &str,
    ) -> Result<SignalSummary, LlmDiagnosticsError> {
        let req = CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: Some(TEMPERATURE),
            system: Some(Self::system_prompt()),
            messages: vec![Message {
                role: "user",
                content: Self::user_prompt(text, author),
            }],
            tools: Some(Self::tools()),
            tool_choice: Some(Self::tool_choice()),
        };

        let (raw_json, res) = self.create_message(&req).await?;

        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            return Err(LlmDiagnosticsError::output(
                PROVIDER,
                "truncated",
                format!("stop_reason=max_tokens at max_tokens={}", self.max_tokens),
            )
            .with_raw_response_json(raw_json));
        }

        if let Some(tool_summary) = Self::response_tool_summary(&res)? {
            return tool_summary.validate_and_into_summary().map_err(|e| {
                LlmDiagnosticsError::output(PROVIDER, "validate", e.to_string())
                    .with_raw_response_json(raw_json)
            });
        }

        // Text fallback (should be rare with a forced tool).
        let text = Self::response_text(&res);
        json::parse_summary(&text).map_err(|e| {
            LlmDiagnosticsError::output(PROVIDER, "parse_text", format!("{e:#}"))
                .with_raw_output(text)
        })
    }
}

#[async_trait::async_trait]
impl Summarizer for AnthropicSummarizer {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    async fn summarize(&self, text: &str, author: &str) -> Result<SignalSummary, SignalError> {
        let summary = self.summarize_once(text, author).await?;
        tracing::info!(
            %author,
            action = summary.action.as_str(),
            confidence = summary.confidence.as_str(),
            "summarized post"
        );
        Ok(summary)
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(other)]
    Unknown,
}
