#![deny(unsafe_code)]

//! Question/answer session state for the Art Info client.
//!
//! Everything here is presentation-agnostic: the GUI renders [`SessionView`]
//! and forwards [`Intent`]s, while the submission round trip is split into
//! [`Session::begin_submit`] and [`Session::settle`] so the caller decides
//! where the network await happens.

pub mod attachment;
pub mod config;
pub mod draft;
pub mod history;
pub mod ids;
pub mod intake;
pub mod session;
pub mod submission;
pub mod view;

pub use attachment::{
    Attachment, AttachmentLimit, AttachmentSet, DEFAULT_MAX_ATTACHMENTS, ImageKind, IncomingImage,
    PreviewHandle, PreviewRegistry,
};
pub use config::{
    ConfigError, ConfigResult, ConfigStore, DEFAULT_ENDPOINT, ENV_PREFIX, SETTINGS_DIRECTORY_NAME,
    SETTINGS_FILE_NAME, SessionConfig,
};
pub use draft::{Eligibility, QuestionDraft};
pub use history::{
    ActiveSelection, ExchangeRecord, HistoryBucket, HistoryStore, MonthLabel, NewExchange,
};
pub use ids::{ExchangeId, PreviewId, SubmissionId};
pub use intake::load_images;
pub use session::{Session, SessionPolicy, Settled, SubmitBlocked, SubmitOutcome};
pub use submission::{
    FailureKind, PendingSubmission, SUBMIT_TIMEOUT, SubmissionRejection, SubmissionState,
    SubmissionTransition, SubmitFailure, resolve_answer,
};
pub use view::{AttachmentView, HistoryBucketView, HistoryEntryView, Intent, SessionView};
