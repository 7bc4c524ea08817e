use crate::attachment::{AttachmentLimit, ImageKind, IncomingImage};
use crate::ids::{ExchangeId, PreviewId};
use crate::session::Session;
use crate::submission::PendingSubmission;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentView {
    pub index: usize,
    pub file_name: String,
    pub kind: ImageKind,
    pub preview: PreviewId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntryView {
    pub exchange: ExchangeId,
    pub title: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryBucketView {
    pub label: String,
    pub entries: Vec<HistoryEntryView>,
}

/// Read-only projection of a [`Session`] for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub prompt: String,
    pub can_edit_prompt: bool,
    pub attachments: Vec<AttachmentView>,
    pub can_add_attachment: bool,
    pub intake_hint: String,
    pub loading: bool,
    pub error_message: Option<String>,
    pub active_answer: Option<String>,
    pub history: Vec<HistoryBucketView>,
    pub sidebar_visible: bool,
    pub can_submit: bool,
}

impl SessionView {
    pub fn project(session: &Session) -> Self {
        let draft = session.draft();
        let active = session.active_selection().exchange();

        let attachments = draft
            .attachments()
            .iter()
            .enumerate()
            .map(|(index, attachment)| AttachmentView {
                index,
                file_name: attachment.file_name().to_string(),
                kind: attachment.kind(),
                preview: attachment.preview_id(),
            })
            .collect();

        let history = session
            .history()
            .buckets()
            .iter()
            .map(|bucket| HistoryBucketView {
                label: bucket.label.to_string(),
                entries: bucket
                    .records
                    .iter()
                    .map(|record| HistoryEntryView {
                        exchange: record.id,
                        title: record.answer.clone(),
                        is_active: active == Some(record.id),
                    })
                    .collect(),
            })
            .collect();

        Self {
            prompt: draft.prompt().to_string(),
            can_edit_prompt: session.can_edit_prompt(),
            attachments,
            can_add_attachment: session.can_add_attachment(),
            intake_hint: intake_hint(draft.attachments().limit(), session.can_add_attachment()),
            loading: session.is_loading(),
            error_message: session.error_message().map(str::to_string),
            active_answer: session.active_answer().map(|record| record.answer.clone()),
            history,
            sidebar_visible: session.sidebar_visible(),
            can_submit: session.can_submit(),
        }
    }
}

fn intake_hint(limit: AttachmentLimit, enabled: bool) -> String {
    match (limit, enabled) {
        (AttachmentLimit::Capped(max), false) => {
            format!("Maximum of {max} images attached")
        }
        (AttachmentLimit::Capped(max), true) => {
            format!("Drag and drop images here (up to {max})")
        }
        (AttachmentLimit::Unbounded, _) => "Drag and drop images here".to_string(),
    }
}

/// User actions forwarded by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    EditPrompt(String),
    AddAttachments(Vec<IncomingImage>),
    RemoveAttachment(usize),
    ToggleSidebar,
    SelectExchange(ExchangeId),
    Submit,
    NewSession,
}

impl Session {
    /// Routes one intent. Returns the submission to resolve when `Submit` was accepted.
    pub fn dispatch(&mut self, intent: Intent) -> Option<PendingSubmission> {
        match intent {
            Intent::EditPrompt(prompt) => {
                self.set_prompt(prompt);
            }
            Intent::AddAttachments(images) => {
                self.add_attachments(images);
            }
            Intent::RemoveAttachment(index) => {
                self.remove_attachment(index);
            }
            Intent::ToggleSidebar => {
                self.toggle_sidebar();
            }
            Intent::SelectExchange(exchange) => {
                self.select(exchange);
            }
            Intent::Submit => return self.begin_submit().ok(),
            Intent::NewSession => self.new_session(),
        }

        None
    }
}
