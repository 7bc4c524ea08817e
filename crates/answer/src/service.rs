use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Budget after which an answer request is abandoned.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(15_000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerServiceConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl AnswerServiceConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim().to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Wire body sent to the answer endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRequest {
    pub prompt: String,
}

impl AnswerRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Wire body returned by the answer endpoint on success.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Answer {
    pub text: String,
}

impl Answer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type AnswerResult<T> = Result<T, AnswerError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AnswerError {
    #[snafu(display("answer endpoint '{endpoint}' is not a valid URL"))]
    InvalidEndpoint {
        stage: &'static str,
        endpoint: String,
        source: url::ParseError,
    },
    #[snafu(display("failed to build HTTP client on `{stage}`, {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("answer request timed out after {}ms", timeout.as_millis()))]
    Timeout {
        stage: &'static str,
        timeout: Duration,
    },
    #[snafu(display("answer request failed on `{stage}`, {source}"))]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("answer endpoint returned status {status}: {body}"))]
    Status {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode answer payload: {source}"))]
    DecodeBody {
        stage: &'static str,
        source: serde_json::Error,
    },
}

impl AnswerError {
    /// Returns true when the request was abandoned because it ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidEndpoint { stage, .. }
            | Self::BuildClient { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::Transport { stage, .. }
            | Self::Status { stage, .. }
            | Self::DecodeBody { stage, .. } => stage,
        }
    }
}

/// Remote collaborator that turns a prompt into answer text.
pub trait AnswerService: Send + Sync {
    fn id(&self) -> &str;
    fn answer<'a>(&'a self, request: AnswerRequest) -> BoxFuture<'a, AnswerResult<Answer>>;
}
