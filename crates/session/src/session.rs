use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use artinfo_answer::{Answer, AnswerRequest, AnswerService};

use crate::attachment::{AttachmentLimit, IncomingImage, PreviewRegistry};
use crate::draft::{Eligibility, QuestionDraft};
use crate::history::{ActiveSelection, ExchangeRecord, HistoryStore, NewExchange};
use crate::ids::{ExchangeId, IdSequence, SubmissionId};
use crate::submission::{
    PendingSubmission, SUBMIT_TIMEOUT, SubmissionRejection, SubmissionState, SubmissionTransition,
    SubmitFailure, resolve_answer,
};

/// Behaviour switches where the question flow has more than one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    #[serde(rename = "max_attachments")]
    pub attachment_limit: AttachmentLimit,
    /// Prompt input stays read-only until the first answer of the session.
    pub lock_prompt_until_answered: bool,
    /// `new_session` also wipes the history sidebar.
    pub clear_history_on_new_session: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            attachment_limit: AttachmentLimit::default(),
            lock_prompt_until_answered: true,
            clear_history_on_new_session: false,
        }
    }
}

/// Why `begin_submit` refused to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitBlocked {
    InFlight(SubmissionId),
    Ineligible(Eligibility),
}

/// Result of settling an in-flight submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    Answered(ExchangeId),
    Failed(SubmitFailure),
}

/// Result of a full [`Session::submit`] round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Blocked(SubmitBlocked),
    Answered(ExchangeId),
    Failed(SubmitFailure),
    Discarded(SubmissionRejection),
}

/// Aggregate of draft, history, active selection and transient UI flags.
#[derive(Debug)]
pub struct Session {
    policy: SessionPolicy,
    draft: QuestionDraft,
    history: HistoryStore,
    submission: SubmissionState,
    active: ActiveSelection,
    sidebar_visible: bool,
    submission_ids: IdSequence,
    previews: PreviewRegistry,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionPolicy::default())
    }
}

impl Session {
    pub fn new(policy: SessionPolicy) -> Self {
        let previews = PreviewRegistry::new();

        Self {
            policy,
            draft: QuestionDraft::new(
                policy.attachment_limit,
                previews.clone(),
                policy.lock_prompt_until_answered,
            ),
            history: HistoryStore::new(),
            submission: SubmissionState::Idle,
            active: ActiveSelection::Draft,
            sidebar_visible: false,
            submission_ids: IdSequence::default(),
            previews,
        }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub fn draft(&self) -> &QuestionDraft {
        &self.draft
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn submission_state(&self) -> &SubmissionState {
        &self.submission
    }

    pub fn active_selection(&self) -> ActiveSelection {
        self.active
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn sidebar_visible(&self) -> bool {
        self.sidebar_visible
    }

    pub fn is_loading(&self) -> bool {
        self.submission.is_submitting()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.submission
            .failure()
            .map(|failure| failure.message.as_str())
    }

    /// The record shown in the answer pane, if any.
    pub fn active_answer(&self) -> Option<&ExchangeRecord> {
        self.active
            .exchange()
            .and_then(|exchange| self.history.get(exchange))
    }

    pub fn can_submit(&self) -> bool {
        !self.is_loading() && self.draft.eligibility().is_ready()
    }

    pub fn can_add_attachment(&self) -> bool {
        self.draft.attachments().intake_enabled()
    }

    pub fn can_edit_prompt(&self) -> bool {
        self.draft.prompt_editable()
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) -> bool {
        self.draft.set_prompt(prompt)
    }

    pub fn add_attachments(&mut self, images: impl IntoIterator<Item = IncomingImage>) -> usize {
        self.draft.attachments_mut().add(images)
    }

    pub fn remove_attachment(&mut self, index: usize) -> bool {
        self.draft.attachments_mut().remove(index)
    }

    pub fn toggle_sidebar(&mut self) -> bool {
        self.sidebar_visible = !self.sidebar_visible;
        self.sidebar_visible
    }

    pub fn set_sidebar_visible(&mut self, visible: bool) {
        self.sidebar_visible = visible;
    }

    /// Points the answer pane at a stored exchange. Unknown ids are ignored.
    pub fn select(&mut self, exchange: ExchangeId) -> bool {
        if !self.history.contains(exchange) {
            tracing::debug!(exchange = %exchange, "ignoring selection of unknown exchange");
            return false;
        }

        self.active = ActiveSelection::Exchange(exchange);
        true
    }

    /// Moves to `Submitting` when the draft is eligible and nothing is in flight.
    pub fn begin_submit(&mut self) -> Result<PendingSubmission, SubmitBlocked> {
        if let Some(active) = self.submission.active_submission() {
            tracing::debug!(submission = %active, "submit ignored while another is in flight");
            return Err(SubmitBlocked::InFlight(active));
        }

        let eligibility = self.draft.eligibility();
        if !eligibility.is_ready() {
            tracing::debug!(?eligibility, "submit ignored for ineligible draft");
            return Err(SubmitBlocked::Ineligible(eligibility));
        }

        let submission: SubmissionId = self.submission_ids.next();
        let prompt = self.draft.prompt().to_string();
        let attachment_count = self.draft.attachments().len();

        match self.submission.apply(SubmissionTransition::Start {
            submission,
            prompt: prompt.clone(),
            attachment_count,
        }) {
            Ok(next) => self.submission = next,
            Err(rejection) => {
                tracing::debug!(?rejection, "submission start rejected");
                return Err(SubmitBlocked::InFlight(submission));
            }
        }

        tracing::info!(
            submission = %submission,
            attachment_count,
            first_question = self.draft.is_first_question(),
            "submission started"
        );

        Ok(PendingSubmission {
            submission,
            request: AnswerRequest::new(prompt),
            budget: SUBMIT_TIMEOUT,
        })
    }

    /// Applies the outcome of `submission`.
    ///
    /// Outcomes for anything other than the in-flight submission are rejected
    /// and leave the session untouched.
    pub fn settle(
        &mut self,
        submission: SubmissionId,
        outcome: Result<Answer, SubmitFailure>,
        settled_at: DateTime<Local>,
    ) -> Result<Settled, SubmissionRejection> {
        let (prompt, attachment_count) = match self.submission.in_flight(submission) {
            Ok((prompt, attachment_count)) => (prompt.to_string(), attachment_count),
            Err(rejection) => {
                tracing::warn!(?rejection, "discarding outcome of a submission no longer in flight");
                return Err(rejection);
            }
        };

        match outcome {
            Ok(answer) => {
                let exchange = self.history.record_exchange(
                    NewExchange {
                        prompt,
                        answer: answer.text,
                        attachment_count,
                    },
                    settled_at,
                );
                self.submission = self.submission.apply(SubmissionTransition::Succeed {
                    submission,
                    exchange,
                })?;
                self.active = ActiveSelection::Exchange(exchange);
                self.draft.mark_answered();

                tracing::info!(submission = %submission, exchange = %exchange, "submission answered");
                Ok(Settled::Answered(exchange))
            }
            Err(failure) => {
                tracing::warn!(
                    submission = %submission,
                    kind = ?failure.kind,
                    detail = failure.detail.as_deref().unwrap_or_default(),
                    "submission failed"
                );
                self.submission = self.submission.apply(SubmissionTransition::Fail {
                    submission,
                    failure: failure.clone(),
                })?;
                Ok(Settled::Failed(failure))
            }
        }
    }

    /// Starts a blank conversation.
    ///
    /// Any in-flight submission is abandoned; its late outcome will be rejected.
    pub fn new_session(&mut self) {
        if let Some(abandoned) = self.submission.active_submission() {
            tracing::info!(submission = %abandoned, "abandoning in-flight submission");
        }

        self.draft.reset();
        self.submission = SubmissionState::Idle;
        self.active = ActiveSelection::Draft;

        if self.policy.clear_history_on_new_session {
            self.history.clear();
        }

        tracing::info!(history_len = self.history.len(), "new session started");
    }

    /// Runs begin, resolve and settle in one call, stamping results with local time.
    pub async fn submit(&mut self, service: &dyn AnswerService) -> SubmitOutcome {
        self.submit_with_clock(service, Local::now).await
    }

    pub async fn submit_with_clock(
        &mut self,
        service: &dyn AnswerService,
        clock: impl FnOnce() -> DateTime<Local>,
    ) -> SubmitOutcome {
        let pending = match self.begin_submit() {
            Ok(pending) => pending,
            Err(blocked) => return SubmitOutcome::Blocked(blocked),
        };

        let outcome = resolve_answer(service, pending.request, pending.budget).await;

        match self.settle(pending.submission, outcome, clock()) {
            Ok(Settled::Answered(exchange)) => SubmitOutcome::Answered(exchange),
            Ok(Settled::Failed(failure)) => SubmitOutcome::Failed(failure),
            Err(rejection) => SubmitOutcome::Discarded(rejection),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use artinfo_answer::{AnswerError, AnswerResult, BoxFuture};
    use chrono::TimeZone;

    use super::*;
    use crate::attachment::ImageKind;
    use crate::history::MonthLabel;
    use crate::submission::FailureKind;

    /// Replies with canned answers and remembers the prompts it saw.
    struct ScriptedService {
        replies: Mutex<Vec<AnswerResult<Answer>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedService {
        fn new(replies: Vec<AnswerResult<Answer>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("prompts lock").clone()
        }
    }

    impl AnswerService for ScriptedService {
        fn id(&self) -> &str {
            "scripted"
        }

        fn answer<'a>(&'a self, request: AnswerRequest) -> BoxFuture<'a, AnswerResult<Answer>> {
            self.prompts.lock().expect("prompts lock").push(request.prompt);
            let reply = self
                .replies
                .lock()
                .expect("replies lock")
                .pop()
                .expect("scripted reply available");
            Box::pin(async move { reply })
        }
    }

    /// Never answers.
    struct SilentService;

    impl AnswerService for SilentService {
        fn id(&self) -> &str {
            "silent"
        }

        fn answer<'a>(&'a self, _request: AnswerRequest) -> BoxFuture<'a, AnswerResult<Answer>> {
            Box::pin(futures::future::pending())
        }
    }

    fn image(name: &str) -> IncomingImage {
        IncomingImage::new(name, ImageKind::Jpeg, name.as_bytes().to_vec())
    }

    fn at(year: i32, month: u32, day: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .expect("unambiguous local noon")
    }

    fn open_policy() -> SessionPolicy {
        SessionPolicy {
            lock_prompt_until_answered: false,
            ..SessionPolicy::default()
        }
    }

    fn answered_session() -> Session {
        let mut session = Session::default();
        session.add_attachments([image("a.jpg")]);
        let pending = session.begin_submit().expect("first question eligible");
        session
            .settle(pending.submission, Ok(Answer::new("first")), at(2024, 1, 5))
            .expect("settles");
        session
    }

    #[test]
    fn first_question_without_images_stays_idle() {
        let mut session = Session::new(open_policy());
        session.set_prompt("Who painted this?");

        assert_eq!(
            session.begin_submit(),
            Err(SubmitBlocked::Ineligible(Eligibility::MissingAttachments))
        );
        assert_eq!(session.submission_state(), &SubmissionState::Idle);
        assert!(!session.can_submit());
    }

    #[test]
    fn follow_up_without_prompt_stays_put() {
        let mut session = answered_session();
        let before = session.submission_state().clone();

        assert_eq!(
            session.begin_submit(),
            Err(SubmitBlocked::Ineligible(Eligibility::MissingPrompt))
        );
        assert_eq!(session.submission_state(), &before);
    }

    #[test]
    fn loading_spans_exactly_begin_to_settle() {
        let mut session = Session::default();
        session.add_attachments([image("a.jpg")]);
        assert!(!session.is_loading());

        let pending = session.begin_submit().expect("eligible");
        assert!(session.is_loading());
        assert_eq!(session.error_message(), None);

        session
            .settle(
                pending.submission,
                Err(SubmitFailure::request_failed("refused")),
                at(2024, 1, 5),
            )
            .expect("settles");
        assert!(!session.is_loading());
        assert!(session.error_message().is_some());

        session.add_attachments([image("b.jpg")]);
        let retry = session.begin_submit().expect("retry allowed after failure");
        assert!(session.is_loading());
        assert_eq!(session.error_message(), None);

        session
            .settle(retry.submission, Ok(Answer::new("ok")), at(2024, 1, 5))
            .expect("settles");
        assert!(!session.is_loading());
        assert_eq!(session.error_message(), None);
    }

    #[test]
    fn second_submit_while_in_flight_is_ignored() {
        let mut session = Session::default();
        session.add_attachments([image("a.jpg")]);
        let pending = session.begin_submit().expect("eligible");

        assert_eq!(
            session.begin_submit(),
            Err(SubmitBlocked::InFlight(pending.submission))
        );
        assert_eq!(
            session.submission_state().active_submission(),
            Some(pending.submission)
        );
    }

    #[test]
    fn success_records_into_month_bucket_and_selects_it() {
        let mut session = Session::default();
        session.add_attachments([image("a.jpg"), image("b.jpg")]);
        let pending = session.begin_submit().expect("eligible");

        let settled = session
            .settle(pending.submission, Ok(Answer::new("A Monet.")), at(2024, 1, 20))
            .expect("settles");

        let Settled::Answered(exchange) = settled else {
            panic!("expected answered, got {settled:?}");
        };
        assert_eq!(session.history().len(), 1);
        let bucket = session
            .history()
            .bucket(&MonthLabel::from_timestamp(&at(2024, 1, 20)))
            .expect("january bucket");
        assert_eq!(bucket.records[0].id, exchange);
        assert_eq!(bucket.records[0].attachment_count, 2);
        assert_eq!(session.active_selection(), ActiveSelection::Exchange(exchange));
        assert_eq!(
            session.active_answer().map(|record| record.answer.as_str()),
            Some("A Monet.")
        );
        assert!(!session.draft().is_first_question());
    }

    #[test]
    fn failure_leaves_history_and_first_question_untouched() {
        let mut session = Session::default();
        session.add_attachments([image("a.jpg")]);
        let pending = session.begin_submit().expect("eligible");

        session
            .settle(
                pending.submission,
                Err(SubmitFailure::timeout(SUBMIT_TIMEOUT)),
                at(2024, 1, 5),
            )
            .expect("settles");

        assert!(session.history().is_empty());
        assert!(session.draft().is_first_question());
        assert_eq!(session.active_selection(), ActiveSelection::Draft);
        assert_eq!(
            session.submission_state().failure().map(|failure| failure.kind),
            Some(FailureKind::Timeout)
        );
    }

    #[test]
    fn late_outcome_after_reset_is_discarded() {
        let mut session = Session::default();
        session.add_attachments([image("a.jpg")]);
        let pending = session.begin_submit().expect("eligible");

        session.new_session();
        let result = session.settle(pending.submission, Ok(Answer::new("late")), at(2024, 1, 5));

        assert_eq!(
            result,
            Err(SubmissionRejection::NotSubmitting {
                attempted: pending.submission,
            })
        );
        assert!(session.history().is_empty());
        assert!(session.draft().is_first_question());
    }

    #[test]
    fn new_session_resets_draft_and_flags() {
        let mut session = answered_session();
        session.set_prompt("What style is this?");
        session.add_attachments([image("b.jpg")]);
        let _pending = session.begin_submit().expect("follow-up eligible");
        session.set_sidebar_visible(true);

        session.new_session();

        assert_eq!(session.draft().prompt(), "");
        assert!(session.draft().attachments().is_empty());
        assert!(session.draft().is_first_question());
        assert!(!session.is_loading());
        assert_eq!(session.error_message(), None);
        assert_eq!(session.active_selection(), ActiveSelection::Draft);
        assert_eq!(session.previews().live_count(), 0);
        assert_eq!(session.history().len(), 1);
        assert!(session.sidebar_visible());
    }

    #[test]
    fn new_session_can_clear_history_by_policy() {
        let mut session = Session::new(SessionPolicy {
            clear_history_on_new_session: true,
            ..SessionPolicy::default()
        });
        session.add_attachments([image("a.jpg")]);
        let pending = session.begin_submit().expect("eligible");
        session
            .settle(pending.submission, Ok(Answer::new("answer")), at(2024, 2, 1))
            .expect("settles");

        session.new_session();

        assert!(session.history().is_empty());
    }

    #[test]
    fn select_only_accepts_known_exchanges() {
        let mut session = answered_session();
        let first = session.history().records().next().map(|record| record.id);
        let first = first.expect("one record");

        session.new_session();
        assert_eq!(session.active_selection(), ActiveSelection::Draft);

        assert!(!session.select(ExchangeId::new(99)));
        assert!(session.select(first));
        assert_eq!(session.active_answer().map(|record| record.id), Some(first));
    }

    #[tokio::test]
    async fn image_question_then_text_follow_up() {
        let service = ScriptedService::new(vec![
            Ok(Answer::new("This is a Hokusai print.")),
            Ok(Answer::new("Ukiyo-e.")),
        ]);
        let mut session = Session::default();
        session.add_attachments([image("wave.jpg"), image("detail.jpg")]);

        let first = session
            .submit_with_clock(&service, || at(2024, 3, 2))
            .await;
        assert!(matches!(first, SubmitOutcome::Answered(_)));
        assert!(!session.draft().is_first_question());
        assert_eq!(session.history().len(), 1);

        assert!(session.set_prompt("What style is this?"));
        let second = session
            .submit_with_clock(&service, || at(2024, 3, 9))
            .await;

        let SubmitOutcome::Answered(exchange) = second else {
            panic!("expected answered, got {second:?}");
        };
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history().buckets().len(), 1);
        assert_eq!(session.active_selection(), ActiveSelection::Exchange(exchange));
        assert_eq!(service.prompts(), ["", "What style is this?"]);
    }

    #[tokio::test]
    async fn service_error_becomes_request_failed() {
        let service = ScriptedService::new(vec![Err(AnswerError::Status {
            stage: "answer-http-status",
            status: 502,
            body: "bad gateway".to_string(),
        })]);
        let mut session = Session::default();
        session.add_attachments([image("a.jpg")]);

        let outcome = session.submit(&service).await;

        let failure = match outcome {
            SubmitOutcome::Failed(failure) => failure,
            other => panic!("expected failure, got {other:?}"),
        };
        assert_eq!(failure.kind, FailureKind::RequestFailed);
        assert!(session.history().is_empty());
        assert!(!session.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out_after_fifteen_seconds() {
        let mut session = Session::default();
        session.add_attachments([image("a.jpg")]);
        let started = tokio::time::Instant::now();

        let outcome = session.submit(&SilentService).await;

        assert!(started.elapsed() >= Duration::from_millis(15_000));
        let failure = match outcome {
            SubmitOutcome::Failed(failure) => failure,
            other => panic!("expected timeout, got {other:?}"),
        };
        assert!(failure.is_timeout());
        assert_eq!(session.error_message(), Some(failure.message.as_str()));
        assert!(!session.is_loading());
        assert!(session.history().is_empty());
        assert!(session.draft().is_first_question());
    }
}
