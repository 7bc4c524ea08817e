use reqwest::Url;
use snafu::ResultExt;

use super::service::{
    Answer, AnswerError, AnswerRequest, AnswerResult, AnswerService, AnswerServiceConfig,
    BoxFuture, BuildClientSnafu, DecodeBodySnafu, InvalidEndpointSnafu, StatusSnafu,
};

pub const HTTP_SERVICE_ID: &str = "http";

/// Longest slice of an error response body kept in [`AnswerError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 512;

pub struct HttpAnswerService {
    config: AnswerServiceConfig,
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpAnswerService {
    pub fn new(config: AnswerServiceConfig) -> AnswerResult<Self> {
        let endpoint = Url::parse(&config.endpoint).context(InvalidEndpointSnafu {
            stage: "http-service-new",
            endpoint: config.endpoint.clone(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context(BuildClientSnafu {
                stage: "build-client",
            })?;

        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post_prompt(&self, request: AnswerRequest) -> AnswerResult<Answer> {
        tracing::debug!(
            endpoint = %self.endpoint,
            prompt_chars = request.prompt.chars().count(),
            "posting answer request"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|source| self.classify(source, "send-answer-request"))?;

        let status = response.status();
        let payload = response
            .text()
            .await
            .map_err(|source| self.classify(source, "read-answer-response"))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "answer endpoint rejected request");
            return StatusSnafu {
                stage: "answer-http-status",
                status: status.as_u16(),
                body: truncate_body(&payload),
            }
            .fail();
        }

        let answer: Answer = serde_json::from_str(&payload).context(DecodeBodySnafu {
            stage: "decode-answer-response",
        })?;

        tracing::info!(answer_chars = answer.text.chars().count(), "answer received");
        Ok(answer)
    }

    fn classify(&self, source: reqwest::Error, stage: &'static str) -> AnswerError {
        if source.is_timeout() {
            AnswerError::Timeout {
                stage,
                timeout: self.config.timeout,
            }
        } else {
            AnswerError::Transport { stage, source }
        }
    }
}

impl AnswerService for HttpAnswerService {
    fn id(&self) -> &str {
        HTTP_SERVICE_ID
    }

    fn answer<'a>(&'a self, request: AnswerRequest) -> BoxFuture<'a, AnswerResult<Answer>> {
        Box::pin(self.post_prompt(request))
    }
}

fn truncate_body(payload: &str) -> String {
    payload.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
