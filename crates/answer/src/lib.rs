use std::sync::Arc;

mod http;
mod service;

pub use http::{HTTP_SERVICE_ID, HttpAnswerService};
pub use service::{
    Answer, AnswerError, AnswerRequest, AnswerResult, AnswerService, AnswerServiceConfig,
    BoxFuture, DEFAULT_REQUEST_TIMEOUT,
};

pub fn create_service(config: AnswerServiceConfig) -> AnswerResult<Arc<dyn AnswerService>> {
    Ok(Arc::new(HttpAnswerService::new(config)?))
}
