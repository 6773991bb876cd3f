use crate::client::read_capped;
use crate::config::RewriteConfig;
use crate::content::{check_base_url, ServiceError};
use crate::util::{decode_entities, strip_markup};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024; // 2MB

const TITLE_SYSTEM_PROMPT: &str = "You are a news editor. Rewrite the given headline as a short, \
engaging headline of at most 14 words. Keep every fact. Reply with the headline only, \
without quotes.";

const BODY_SYSTEM_PROMPT: &str = "You are a news writer. Rewrite the given article as an original, \
SEO-friendly piece of three to five paragraphs separated by blank lines. Expand on context \
where useful but never invent facts, names or numbers. Reply with the article text only.";

/// What a rewrite call is for; selects the prompt and token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    Title,
    Body,
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("Rewrite service token not configured")]
    MissingCredential,
    #[error("Nothing to rewrite")]
    EmptyInput,
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Service returned no text")]
    EmptyResponse,
}

/// Result of a rewrite: either the service's text or the original, with the reason.
#[derive(Debug)]
pub enum RewriteOutcome {
    Rewritten(String),
    Fallback { text: String, reason: RewriteError },
}

impl RewriteOutcome {
    pub fn text(&self) -> &str {
        match self {
            RewriteOutcome::Rewritten(text) | RewriteOutcome::Fallback { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            RewriteOutcome::Rewritten(text) | RewriteOutcome::Fallback { text, .. } => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, RewriteOutcome::Fallback { .. })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Rewrites titles and bodies through an OpenAI-compatible chat completion API.
///
/// The contract is total: [`rewrite`](Self::rewrite) always yields usable
/// text. Any failure (no token, timeout, bad status, unparsable or empty
/// reply) falls back to the entity-decoded input.
pub struct ContentRewriter {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    title_max_tokens: u32,
    body_max_tokens: u32,
}

impl ContentRewriter {
    pub fn new(client: reqwest::Client, config: &RewriteConfig) -> Self {
        let api_key = config
            .api_key
            .as_ref()
            .filter(|k| !k.trim().is_empty())
            .map(|k| SecretString::from(k.clone()));

        if api_key.is_none() {
            tracing::info!("No rewrite service token configured, entries will pass through unchanged");
        }

        Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
            title_max_tokens: config.title_max_tokens,
            body_max_tokens: config.body_max_tokens,
        }
    }

    pub async fn rewrite(&self, text: &str, mode: RewriteMode) -> RewriteOutcome {
        match self.try_rewrite(text, mode).await {
            Ok(rewritten) => RewriteOutcome::Rewritten(rewritten),
            Err(reason) => {
                match &reason {
                    RewriteError::MissingCredential | RewriteError::EmptyInput => {
                        tracing::debug!(mode = ?mode, reason = %reason, "Rewrite skipped, passing text through");
                    }
                    _ => {
                        tracing::warn!(mode = ?mode, error = %reason, "Rewrite failed, using original text");
                    }
                }
                RewriteOutcome::Fallback {
                    text: decode_entities(text).into_owned(),
                    reason,
                }
            }
        }
    }

    async fn try_rewrite(&self, text: &str, mode: RewriteMode) -> Result<String, RewriteError> {
        let api_key = self.api_key.as_ref().ok_or(RewriteError::MissingCredential)?;

        let input = strip_markup(text);
        if input.is_empty() {
            return Err(RewriteError::EmptyInput);
        }

        check_base_url(&self.endpoint)?;

        let (system, max_tokens) = match mode {
            RewriteMode::Title => (TITLE_SYSTEM_PROMPT, self.title_max_tokens),
            RewriteMode::Body => (BODY_SYSTEM_PROMPT, self.body_max_tokens),
        };

        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: &input,
                },
            ],
        };

        let send = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send();

        let body = tokio::time::timeout(self.timeout, async {
            let response = send.await.map_err(ServiceError::Network)?;
            if !response.status().is_success() {
                return Err(ServiceError::HttpStatus(response.status().as_u16()));
            }
            Ok(read_capped(response, MAX_RESPONSE_SIZE).await?)
        })
        .await
        .map_err(|_| ServiceError::Timeout)??;

        let parsed: ChatResponse =
            serde_json::from_slice(&body).map_err(|e| RewriteError::Malformed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(RewriteError::EmptyResponse)?;

        let cleaned = clean_response(&content, mode);
        if cleaned.is_empty() {
            return Err(RewriteError::EmptyResponse);
        }
        Ok(cleaned)
    }
}

/// Trims and entity-decodes model output; headlines also lose wrapping
/// quotes and a `Headline:` lead-in.
fn clean_response(content: &str, mode: RewriteMode) -> String {
    let decoded = decode_entities(content.trim());
    match mode {
        RewriteMode::Body => decoded.trim().to_string(),
        RewriteMode::Title => {
            let first_line = decoded.trim().lines().next().unwrap_or_default();
            let without_label = first_line
                .strip_prefix("Headline:")
                .or_else(|| first_line.strip_prefix("Title:"))
                .unwrap_or(first_line);
            without_label
                .trim()
                .trim_matches(|c| matches!(c, '"' | '\'' | '\u{201c}' | '\u{201d}' | '*'))
                .trim()
                .to_string()
        }
    }
}
