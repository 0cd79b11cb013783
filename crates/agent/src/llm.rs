use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use relay_core::config::{LlmConfig, LlmProvider};
use relay_core::errors::APOLOGY_MESSAGE;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl CompletionRequest {
    pub fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|message| message.content.len()).sum()
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request timed out")]
    Timeout,
    #[error("oracle transport failure: {0}")]
    Network(String),
    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("oracle response could not be decoded: {0}")]
    Decode(String),
    #[error("oracle returned an empty completion")]
    Empty,
    #[error("oracle client is misconfigured: {0}")]
    Configuration(String),
}

impl OracleError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Network(_) => "network",
            Self::Status { .. } => "status",
            Self::Decode(_) => "decode",
            Self::Empty => "empty",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Whether a caller-level retry could plausibly succeed. The core itself
    /// never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::Empty | Self::Configuration(_) => false,
        }
    }

    fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(error.to_string())
        }
    }
}

#[async_trait]
pub trait LanguageOracle: Send + Sync {
    fn name(&self) -> &'static str;
    async fn complete(&self, request: CompletionRequest) -> Result<String, OracleError>;
}

/// Chat-completions client for OpenAI and OpenAI-compatible endpoints
/// (Ollama exposes one under `/v1`).
pub struct OpenAiCompatibleOracle {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    provider: LlmProvider,
}

impl OpenAiCompatibleOracle {
    pub fn from_config(config: &LlmConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| OracleError::Configuration(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.completions_url(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            provider: config.provider,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

const MAX_ERROR_BODY_CHARS: usize = 512;

#[async_trait]
impl LanguageOracle for OpenAiCompatibleOracle {
    fn name(&self) -> &'static str {
        match self.provider {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Ollama => "ollama",
        }
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, OracleError> {
        let body = ChatCompletionBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder.send().await.map_err(OracleError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|error| OracleError::Decode(error.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(OracleError::Empty);
        }
        Ok(content)
    }
}

/// Failure boundary around a [`LanguageOracle`]: every error becomes the
/// fixed apology text and is logged, never propagated.
#[derive(Clone)]
pub struct OracleClient {
    oracle: Arc<dyn LanguageOracle>,
}

impl OracleClient {
    pub fn new(oracle: Arc<dyn LanguageOracle>) -> Self {
        Self { oracle }
    }

    pub fn oracle_name(&self) -> &'static str {
        self.oracle.name()
    }

    pub async fn ask(
        &self,
        request: CompletionRequest,
        conversation_id: &str,
        purpose: &'static str,
    ) -> String {
        debug!(
            event_name = "agent.oracle.request_started",
            conversation_id,
            purpose,
            oracle = self.oracle.name(),
            messages = request.messages.len(),
            prompt_chars = request.prompt_chars(),
            temperature = request.temperature,
            "sending oracle request"
        );

        match self.oracle.complete(request).await {
            Ok(text) => text,
            Err(error) => {
                warn!(
                    event_name = "agent.oracle.request_failed",
                    conversation_id,
                    purpose,
                    oracle = self.oracle.name(),
                    error_kind = error.kind(),
                    retryable = error.is_retryable(),
                    error = %error,
                    "oracle request failed; replying with apology"
                );
                APOLOGY_MESSAGE.to_string()
            }
        }
    }
}

/// Oracle double that replays canned replies in order and records every
/// request it receives. Once the script runs out it answers with
/// [`OracleError::Empty`].
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String, OracleError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|reply| Ok(reply.into())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().await.push_back(Ok(reply.into()));
    }

    pub async fn push_failure(&self, error: OracleError) {
        self.replies.lock().await.push_back(Err(error));
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl LanguageOracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, OracleError> {
        self.requests.lock().await.push(request);
        self.replies.lock().await.pop_front().unwrap_or(Err(OracleError::Empty))
    }
}
