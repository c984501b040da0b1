use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::request::{build_payload, AnalysisRequest, GenerationSettings};
use crate::llm::schema::{SchemaViolation, ANALYSIS_SCHEMA};
use crate::llm::types::AnalysisResult;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

/// Everything that can go wrong between sending the request and holding a
/// typed result. The session only ever shows one generic message for these;
/// the variants exist for the logs.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("no Gemini API key configured")]
    MissingApiKey,
    #[error("Gemini request failed: {0}")]
    Transport(String),
    #[error("Gemini request failed with status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("Gemini returned no text (reason: {0:?})")]
    EmptyResponse(Option<String>),
    #[error("Gemini returned text that is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiAnalyzer {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    settings: GenerationSettings,
}

impl GeminiAnalyzer {
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
        settings: GenerationSettings,
    ) -> Self {
        GeminiAnalyzer {
            client,
            api_key: api_key.into(),
            api_base: api_base.into(),
            model: model.into(),
            settings,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        GeminiAnalyzer::new(
            get_http_client().clone(),
            config.gemini_api_key.clone(),
            config.gemini_api_base.clone(),
            config.gemini_model.clone(),
            GenerationSettings {
                temperature: config.gemini_temperature,
                safety: config.gemini_safety_settings,
            },
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    fn redact(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    async fn call_gemini_api(&self, payload: &Value) -> Result<GeminiResponse, AnalysisError> {
        if self.api_key.trim().is_empty() {
            return Err(AnalysisError::MissingApiKey);
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_gemini_payload(payload);
            debug!(target: "llm.gemini", model = %self.model, payload = %payload_summary);
        }

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                let err_text = self.redact(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect()
                );
                AnalysisError::Transport(err_text)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                detail: self.redact(&message.unwrap_or(body_summary)),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| AnalysisError::Transport(self.redact(&err.to_string())))?;
        let value = serde_json::from_str::<GeminiResponse>(&body).map_err(|err| {
            warn!(
                "Gemini response envelope could not be decoded: {} body={}",
                err,
                truncate_for_log(&body, 2000)
            );
            AnalysisError::MalformedJson(err)
        })?;
        Ok(value)
    }
}

#[async_trait]
impl Analyzer for GeminiAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let payload = build_payload(request, &self.settings);
        let metadata = json!({ "images": request.image_count() });

        let payload = &payload;
        log_llm_timing(
            "gemini",
            &self.model,
            "analyze_photo",
            Some(metadata),
            move || async move {
                let response = self.call_gemini_api(payload).await?;
                let text = extract_text_from_response(response)?;
                parse_analysis(&text)
            },
        )
        .await
    }
}

/// Decodes the model's JSON text. Anything that isn't valid JSON or doesn't
/// match [`ANALYSIS_SCHEMA`] is an error, never a half-filled result.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let value: Value = serde_json::from_str(strip_code_fence(text))?;
    ANALYSIS_SCHEMA.validate(&value)?;
    Ok(serde_json::from_value(value)?)
}

// Models occasionally wrap JSON-mode output in a markdown fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let tag_end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    let rest = if rest[..tag_end].eq_ignore_ascii_case("json") {
        &rest[tag_end..]
    } else {
        rest
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn extract_text_from_response(response: GeminiResponse) -> Result<String, AnalysisError> {
    let block_reason = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason);
    let mut finish_reason = None;
    let mut text_parts = Vec::new();

    for candidate in response.candidates.unwrap_or_default() {
        if finish_reason.is_none() {
            finish_reason = candidate.finish_reason;
        }
        let parts = candidate
            .content
            .and_then(|content| content.parts)
            .unwrap_or_default();
        for part in parts {
            if let Some(text) = part.text {
                if !text.trim().is_empty() {
                    text_parts.push(text);
                }
            }
        }
        if !text_parts.is_empty() {
            break;
        }
    }

    if text_parts.is_empty() {
        return Err(AnalysisError::EmptyResponse(block_reason.or(finish_reason)));
    }
    Ok(text_parts.join(""))
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let mut summarized_contents = Vec::new();
        for content in contents {
            let role = content
                .get("role")
                .and_then(|value| value.as_str())
                .unwrap_or("user");
            let parts = content
                .get("parts")
                .and_then(|value| value.as_array())
                .map(|parts| summarize_gemini_parts(parts))
                .unwrap_or_default();
            summarized_contents.push(json!({ "role": role, "parts": parts }));
        }
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        let mime = config.get("responseMimeType").cloned().unwrap_or(Value::Null);
        summary.insert(
            "generationConfig".to_string(),
            json!({ "responseMimeType": mime, "hasSchema": config.get("responseSchema").is_some() }),
        );
    }

    if let Some(safety) = payload
        .get("safetySettings")
        .and_then(|value| value.as_array())
    {
        summary.insert("safetySettingsCount".to_string(), json!(safety.len()));
    }

    Value::Object(summary)
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}
