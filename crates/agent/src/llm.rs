use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use opsdesk_core::config::{LlmConfig, LlmProvider};

use crate::prompt::{section, CONTEXT_HEADER, MESSAGE_HEADER};
use crate::router::{keyword_intent, ROUTING_MARKER};

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Builds the client selected by `llm.provider`.
pub fn client_from_config(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider {
        LlmProvider::Gemini => Ok(Box::new(GeminiClient::from_config(config)?)),
        LlmProvider::Offline => Ok(Box::new(OfflineLlm)),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
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
    text: String,
}

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("llm.api_key is required for the gemini provider"))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build gemini http client")?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: [RequestContent { role: "user", parts: [RequestPart { text: prompt }] }],
            generation_config: GenerationConfig { temperature: self.temperature },
        };

        debug!(
            event_name = "llm.request",
            model = %self.model,
            prompt_chars = prompt.len(),
            "sending generateContent request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("gemini request failed")?;

        let status = response.status();
        let text = response.text().await.context("failed to read gemini response")?;
        if !status.is_success() {
            bail!("gemini returned HTTP {status}: {}", truncate(&text, 200));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).context("gemini response is not valid JSON")?;
        extract_text(parsed)
    }
}

fn extract_text(response: GenerateResponse) -> Result<String> {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content.parts.into_iter().map(|part| part.text).collect::<Vec<_>>().join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        bail!("gemini returned no candidate text");
    }
    Ok(text.trim().to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Deterministic stand-in used when `llm.provider = "offline"`.
///
/// Routing prompts are answered with a keyword classification; every other
/// prompt gets a short reply built from its context section.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineLlm;

#[async_trait]
impl LlmClient for OfflineLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let message = section(prompt, MESSAGE_HEADER).unwrap_or_default();

        if prompt.contains(ROUTING_MARKER) {
            return Ok(keyword_intent(message).label().to_string());
        }

        let reply = match section(prompt, CONTEXT_HEADER) {
            Some(context) if !context.is_empty() => {
                format!("Here is what I found for you:\n{context}")
            }
            _ => "Thanks for your message. A member of our team will follow up shortly."
                .to_string(),
        };
        Ok(reply)
    }
}

/// Test double that replays queued replies and records every prompt it receives.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scripted = Self::default();
        for reply in replies {
            scripted.push_reply(reply);
        }
        scripted
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Ok(reply.into()));
        }
    }

    pub fn push_failure(&self, error: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(error.into()));
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|prompts| prompts.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let next = self
            .replies
            .lock()
            .map_err(|_| anyhow!("scripted llm lock poisoned"))?
            .pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(error)) => Err(anyhow!(error)),
            None => bail!("scripted llm has no reply queued"),
        }
    }
}
