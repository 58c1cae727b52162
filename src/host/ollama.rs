//! Ollama-backed host capability.
//!
//! Maps the host contract onto a local Ollama server:
//!
//! - availability: `GET /api/tags` (model pulled → ready, server up but model
//!   missing → downloading, server unreachable → unavailable)
//! - create: `POST /api/pull` when the model is missing, streaming
//!   `completed/total` as progress
//! - prompt: `POST /api/chat` with the session's initial prompts followed by
//!   the user message
//!
//! See: <https://github.com/ollama/ollama/blob/main/docs/api.md>

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{LanguageModelHost, ModelSession, SessionConfig, TextStream};
use crate::types::{Availability, Message};
use crate::{HuginnError, Result};

/// Default base URL for a local Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default model pulled and prompted.
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Default per-request timeout for prompt calls.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Host capability backed by an Ollama server.
#[derive(Clone)]
pub struct OllamaHost {
    http: Client,
    base_url: String,
    model: String,
    request_timeout: Duration,
}

impl OllamaHost {
    /// Host for `model` on the default local server.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, model)
    }

    /// Host with a custom base URL (also used for testing with wiremock).
    pub fn with_base_url(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the timeout for prompt requests. Model pulls are not bounded.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether `name` from `/api/tags` refers to our model.
    fn matches_model(&self, name: &str) -> bool {
        name == self.model
            || name.strip_suffix(":latest") == Some(self.model.as_str())
            || self.model.strip_suffix(":latest") == Some(name)
    }

    /// Pull the model, forwarding progress to `monitor`.
    async fn pull(&self, config: &SessionConfig) -> Result<()> {
        info!(model = %self.model, "pulling model");
        let response = self
            .http
            .post(format!("{}/api/pull", self.base_url))
            .json(&PullRequest {
                model: &self.model,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| HuginnError::Http(e.to_string()))?;
        let response = check_status(response).await?;

        let mut lines = ndjson_stream::<PullStatus>(response);
        let mut succeeded = false;
        while let Some(line) = lines.next().await {
            let status = line?;
            if let Some(error) = status.error {
                return Err(HuginnError::SessionCreation {
                    provider: self.name().to_string(),
                    message: format!("pulling {} failed: {error}", self.model),
                });
            }
            let done = status.status.as_deref() == Some("success");
            succeeded |= done;
            if let Some(monitor) = &config.monitor {
                if let (Some(completed), Some(total)) = (status.completed, status.total) {
                    monitor.report_bytes(completed, total);
                }
                if done {
                    monitor.report(1.0);
                }
            }
            debug!(status = ?status.status, "pull progress");
        }
        if !succeeded {
            return Err(HuginnError::SessionCreation {
                provider: self.name().to_string(),
                message: format!("pulling {} ended before completion", self.model),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LanguageModelHost for OllamaHost {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn availability(&self) -> Availability {
        let response = match self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = response.status().as_u16(), "ollama tags request failed");
                return Availability::Unavailable;
            }
            Err(e) => {
                debug!(error = %e, "ollama not reachable");
                return Availability::Unavailable;
            }
        };

        match response.json::<TagsResponse>().await {
            Ok(tags) if tags.models.iter().any(|m| self.matches_model(&m.name)) => {
                Availability::Ready
            }
            Ok(_) => Availability::Downloading,
            Err(e) => {
                warn!(error = %e, "unexpected /api/tags payload");
                Availability::Unavailable
            }
        }
    }

    async fn create(&self, config: SessionConfig) -> Result<Box<dyn ModelSession>> {
        match self.availability().await {
            Availability::Ready => {}
            Availability::Downloading => self.pull(&config).await?,
            Availability::Unavailable => {
                return Err(HuginnError::SessionCreation {
                    provider: self.name().to_string(),
                    message: format!("ollama is not reachable at {}", self.base_url),
                });
            }
        }

        Ok(Box::new(OllamaSession {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            request_timeout: self.request_timeout,
            initial_prompts: Arc::new(config.initial_prompts),
            destroyed: AtomicBool::new(false),
        }))
    }
}

/// Session over `/api/chat`.
///
/// Ollama is stateless; every prompt is sent together with the initial
/// prompts, so prompts on one session do not see each other.
pub struct OllamaSession {
    http: Client,
    base_url: String,
    model: String,
    request_timeout: Duration,
    initial_prompts: Arc<Vec<Message>>,
    destroyed: AtomicBool,
}

impl OllamaSession {
    fn request<'a>(&'a self, text: &'a str, stream: bool) -> Result<ChatRequest<'a>> {
        if self.is_destroyed() {
            return Err(HuginnError::SessionDestroyed);
        }
        let messages = self
            .initial_prompts
            .iter()
            .map(ChatMessage::from)
            .chain(std::iter::once(ChatMessage::owned(Message::user(text))))
            .collect();
        Ok(ChatRequest {
            model: &self.model,
            messages,
            stream,
        })
    }
}

#[async_trait]
impl ModelSession for OllamaSession {
    async fn prompt(&self, text: &str) -> Result<String> {
        let request = self.request(text, false)?;
        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| HuginnError::Http(e.to_string()))?;
        let response = check_status(response).await?;

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| HuginnError::Http(e.to_string()))?;
        let content = chat.message.map(|m| m.content).unwrap_or_default();
        if content.trim().is_empty() {
            return Err(HuginnError::EmptyResponse);
        }
        Ok(content)
    }

    async fn prompt_streaming(&self, text: &str) -> Result<TextStream> {
        let request = self.request(text, true)?;
        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| HuginnError::Http(e.to_string()))?;
        let response = check_status(response).await?;

        let chunks = ndjson_stream::<ChatResponse>(response).filter_map(|line| async move {
            match line {
                Ok(chunk) => chunk
                    .message
                    .map(|m| m.content)
                    .filter(|c| !c.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(e)),
            }
        });
        Ok(Box::pin(chunks))
    }

    async fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// Map non-success statuses to [`HuginnError::Api`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(HuginnError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Decode a newline-delimited JSON response body line by line.
fn ndjson_stream<T>(response: reqwest::Response) -> Pin<Box<dyn Stream<Item = Result<T>> + Send>>
where
    T: DeserializeOwned + Send + 'static,
{
    let bytes = Box::pin(response.bytes_stream());
    let state = (bytes, Vec::<u8>::new(), false);

    Box::pin(futures_util::stream::unfold(
        state,
        |(mut bytes, mut buf, mut done)| async move {
            loop {
                if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = line.trim_ascii();
                    if line.is_empty() {
                        continue;
                    }
                    let item = serde_json::from_slice::<T>(line).map_err(HuginnError::from);
                    return Some((item, (bytes, buf, done)));
                }
                if done {
                    if buf.trim_ascii().is_empty() {
                        return None;
                    }
                    let rest = std::mem::take(&mut buf);
                    let item = serde_json::from_slice::<T>(rest.trim_ascii())
                        .map_err(HuginnError::from);
                    return Some((item, (bytes, buf, done)));
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        buf.clear();
                        done = true;
                        return Some((Err(HuginnError::Http(e.to_string())), (bytes, buf, done)));
                    }
                    None => done = true,
                }
            }
        },
    ))
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct PullStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: crate::types::Role,
    content: std::borrow::Cow<'a, str>,
}

impl<'a> From<&'a Message> for ChatMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            role: message.role,
            content: std::borrow::Cow::Borrowed(&message.content),
        }
    }
}

impl ChatMessage<'_> {
    fn owned(message: Message) -> Self {
        Self {
            role: message.role,
            content: std::borrow::Cow::Owned(message.content),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}
