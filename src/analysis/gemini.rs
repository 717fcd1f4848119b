//! Generative Language API client

use crate::analysis::client::{AnalysisClient, ServiceError};
use crate::analysis::session::{Exchange, Outcome};
use crate::analysis::tokens::TokenCounter;
use crate::config::AnalysisConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Content filters are relaxed; the corpus is scanned for attack surface and
/// routinely trips them.
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
];

pub struct GeminiClient {
    api_base: String,
    model: String,
    api_key: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_base: &str, model: &str, api_key: String) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client,
        })
    }

    /// Builds a client from configuration, reading the key from the environment
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, ServiceError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ServiceError::Auth(format!("{} is not set", config.api_key_env)))?;
        Self::new(&config.api_base, &config.model, api_key)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.api_base, self.model, method)
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<R, ServiceError> {
        let resp = self
            .client
            .post(self.endpoint(method))
            .query(&[("key", self.api_key.trim())])
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ServiceError::from_status(status, text));
        }

        resp.json::<R>()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))
    }
}

/// Replays successful exchanges as alternating user/model contents
fn conversation<'a>(context: &'a [Exchange], message: &'a str) -> Vec<Content<'a>> {
    let mut contents = Vec::with_capacity(context.len() * 2 + 1);
    for exchange in context {
        if let Outcome::Success(reply) = &exchange.outcome {
            contents.push(Content::text("user", &exchange.request));
            contents.push(Content::text("model", reply));
        }
    }
    contents.push(Content::text("user", message));
    contents
}

#[async_trait]
impl AnalysisClient for GeminiClient {
    async fn send(&self, context: &[Exchange], message: &str) -> Result<String, ServiceError> {
        let body = GenerateRequest {
            contents: conversation(context, message),
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        };

        let parsed: GenerateResponse = self.post("generateContent", &body).await?;

        if parsed.candidates.is_empty() {
            if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(ServiceError::Blocked(reason));
            }
            return Err(ServiceError::EmptyResponse);
        }

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ServiceError::EmptyResponse);
        }
        Ok(text)
    }
}

#[async_trait]
impl TokenCounter for GeminiClient {
    async fn count(&self, text: &str) -> Result<u64, ServiceError> {
        if text.trim().is_empty() {
            return Ok(0);
        }
        let body = CountRequest {
            contents: vec![Content::text("user", text)],
        };
        let parsed: CountResponse = self.post("countTokens", &body).await?;
        Ok(parsed.total_tokens)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "safetySettings")]
    safety_settings: Vec<SafetySetting<'a>>,
}

#[derive(Serialize)]
struct CountRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn text(role: &'a str, text: &'a str) -> Self {
        Self {
            role,
            parts: vec![Part { text }],
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SafetySetting<'a> {
    category: &'a str,
    threshold: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback", default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason", default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    #[serde(rename = "totalTokens", default)]
    total_tokens: u64,
}
