use std::time::Duration;

use artinfo_answer::{Answer, AnswerError, AnswerRequest, AnswerService};

use crate::ids::{ExchangeId, SubmissionId};

/// Fixed budget for one answer request.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// The two failure classes surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Timeout,
    RequestFailed,
}

/// A recovered submission error with its user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Underlying cause for logs; never shown as the primary message.
    pub detail: Option<String>,
}

impl SubmitFailure {
    pub fn timeout(budget: Duration) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: format!(
                "Timed out: no answer arrived within {} seconds.",
                budget.as_secs()
            ),
            detail: None,
        }
    }

    pub fn request_failed(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::RequestFailed,
            message: "An error occurred while generating the answer.".to_string(),
            detail: Some(detail.into()),
        }
    }

    pub fn from_answer_error(error: &AnswerError, budget: Duration) -> Self {
        if error.is_timeout() {
            Self {
                detail: Some(error.to_string()),
                ..Self::timeout(budget)
            }
        } else {
            Self::request_failed(error.to_string())
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }
}

/// Lifecycle of the question currently being asked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting {
        submission: SubmissionId,
        prompt: String,
        attachment_count: usize,
    },
    Succeeded {
        submission: SubmissionId,
        exchange: ExchangeId,
    },
    Failed {
        submission: SubmissionId,
        failure: SubmitFailure,
    },
}

/// Input to [`SubmissionState::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionTransition {
    Start {
        submission: SubmissionId,
        prompt: String,
        attachment_count: usize,
    },
    Succeed {
        submission: SubmissionId,
        exchange: ExchangeId,
    },
    Fail {
        submission: SubmissionId,
        failure: SubmitFailure,
    },
    ResetToIdle,
}

/// Rejection reason for an illegal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionRejection {
    AlreadySubmitting {
        active: SubmissionId,
        attempted: SubmissionId,
    },
    NotSubmitting {
        attempted: SubmissionId,
    },
    StaleSubmission {
        active: SubmissionId,
        attempted: SubmissionId,
    },
}

pub type SubmissionTransitionResult = Result<SubmissionState, SubmissionRejection>;

impl SubmissionState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting { .. })
    }

    /// Returns the in-flight submission if and only if state is `Submitting`.
    pub fn active_submission(&self) -> Option<SubmissionId> {
        match self {
            Self::Submitting { submission, .. } => Some(*submission),
            Self::Idle | Self::Succeeded { .. } | Self::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&SubmitFailure> {
        match self {
            Self::Failed { failure, .. } => Some(failure),
            Self::Idle | Self::Submitting { .. } | Self::Succeeded { .. } => None,
        }
    }

    /// Applies one transition.
    ///
    /// Any non-submitting state may start; `Succeed`/`Fail` must name the
    /// submission that is currently in flight.
    pub fn apply(&self, transition: SubmissionTransition) -> SubmissionTransitionResult {
        match transition {
            SubmissionTransition::Start {
                submission,
                prompt,
                attachment_count,
            } => self.apply_start(submission, prompt, attachment_count),
            SubmissionTransition::Succeed {
                submission,
                exchange,
            } => self
                .ensure_in_flight(submission)
                .map(|()| Self::Succeeded {
                    submission,
                    exchange,
                }),
            SubmissionTransition::Fail {
                submission,
                failure,
            } => self
                .ensure_in_flight(submission)
                .map(|()| Self::Failed {
                    submission,
                    failure,
                }),
            SubmissionTransition::ResetToIdle => Ok(Self::Idle),
        }
    }

    /// Returns the prompt and attachment count captured when `attempted` started.
    pub fn in_flight(&self, attempted: SubmissionId) -> Result<(&str, usize), SubmissionRejection> {
        self.ensure_in_flight(attempted)?;
        match self {
            Self::Submitting {
                prompt,
                attachment_count,
                ..
            } => Ok((prompt.as_str(), *attachment_count)),
            Self::Idle | Self::Succeeded { .. } | Self::Failed { .. } => {
                Err(SubmissionRejection::NotSubmitting { attempted })
            }
        }
    }

    fn apply_start(
        &self,
        submission: SubmissionId,
        prompt: String,
        attachment_count: usize,
    ) -> SubmissionTransitionResult {
        match self {
            Self::Submitting {
                submission: active, ..
            } => Err(SubmissionRejection::AlreadySubmitting {
                active: *active,
                attempted: submission,
            }),
            Self::Idle | Self::Succeeded { .. } | Self::Failed { .. } => Ok(Self::Submitting {
                submission,
                prompt,
                attachment_count,
            }),
        }
    }

    fn ensure_in_flight(&self, attempted: SubmissionId) -> Result<(), SubmissionRejection> {
        match self.active_submission() {
            Some(active) if active == attempted => Ok(()),
            Some(active) => Err(SubmissionRejection::StaleSubmission { active, attempted }),
            None => Err(SubmissionRejection::NotSubmitting { attempted }),
        }
    }
}

/// A submission accepted by the session and waiting for the remote answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    pub submission: SubmissionId,
    pub request: AnswerRequest,
    pub budget: Duration,
}

/// Calls the answer service, abandoning the call once `budget` elapses.
pub async fn resolve_answer(
    service: &dyn AnswerService,
    request: AnswerRequest,
    budget: Duration,
) -> Result<Answer, SubmitFailure> {
    match tokio::time::timeout(budget, service.answer(request)).await {
        Ok(Ok(answer)) => Ok(answer),
        Ok(Err(error)) => {
            tracing::warn!(
                service = service.id(),
                stage = error.stage(),
                "answer request failed: {error}"
            );
            Err(SubmitFailure::from_answer_error(&error, budget))
        }
        Err(_elapsed) => {
            tracing::warn!(
                service = service.id(),
                budget_ms = budget.as_millis() as u64,
                "answer request exceeded its budget"
            );
            Err(SubmitFailure::timeout(budget))
        }
    }
}
