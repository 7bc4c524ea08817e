use crate::attachment::{AttachmentLimit, AttachmentSet, PreviewRegistry};

/// Why a draft can or cannot be submitted right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Ready,
    /// First question of a session needs at least one image.
    MissingAttachments,
    /// Follow-up questions need prompt text.
    MissingPrompt,
}

impl Eligibility {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// The in-progress question: prompt text, attached images and first-question flag.
#[derive(Debug)]
pub struct QuestionDraft {
    prompt: String,
    attachments: AttachmentSet,
    is_first_question: bool,
    lock_prompt_until_answered: bool,
}

impl QuestionDraft {
    pub fn new(
        limit: AttachmentLimit,
        previews: PreviewRegistry,
        lock_prompt_until_answered: bool,
    ) -> Self {
        Self {
            prompt: String::new(),
            attachments: AttachmentSet::new(limit, previews),
            is_first_question: true,
            lock_prompt_until_answered,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Replaces the prompt text. Ignored while the prompt is locked.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) -> bool {
        if !self.prompt_editable() {
            tracing::debug!("prompt is locked until the first answer arrives");
            return false;
        }

        self.prompt = prompt.into();
        true
    }

    pub fn prompt_editable(&self) -> bool {
        !(self.lock_prompt_until_answered && self.is_first_question)
    }

    pub fn attachments(&self) -> &AttachmentSet {
        &self.attachments
    }

    pub fn attachments_mut(&mut self) -> &mut AttachmentSet {
        &mut self.attachments
    }

    pub fn is_first_question(&self) -> bool {
        self.is_first_question
    }

    pub fn eligibility(&self) -> Eligibility {
        if self.is_first_question {
            if self.attachments.is_empty() {
                Eligibility::MissingAttachments
            } else {
                Eligibility::Ready
            }
        } else if self.prompt.trim().is_empty() {
            Eligibility::MissingPrompt
        } else {
            Eligibility::Ready
        }
    }

    pub(crate) fn mark_answered(&mut self) {
        self.is_first_question = false;
    }

    /// Clears prompt and attachments and returns to first-question mode.
    pub(crate) fn reset(&mut self) {
        self.prompt.clear();
        self.attachments.clear();
        self.is_first_question = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{ImageKind, IncomingImage};

    fn draft(lock_prompt: bool) -> QuestionDraft {
        QuestionDraft::new(AttachmentLimit::Capped(3), PreviewRegistry::new(), lock_prompt)
    }

    fn image() -> IncomingImage {
        IncomingImage::new("painting.png", ImageKind::Png, vec![1, 2, 3])
    }

    #[test]
    fn first_question_needs_images_not_text() {
        let mut draft = draft(false);
        assert_eq!(draft.eligibility(), Eligibility::MissingAttachments);

        draft.set_prompt("Who painted this?");
        assert_eq!(draft.eligibility(), Eligibility::MissingAttachments);

        draft.attachments_mut().add([image()]);
        draft.set_prompt("");
        assert_eq!(draft.eligibility(), Eligibility::Ready);
    }

    #[test]
    fn follow_up_needs_non_blank_text() {
        let mut draft = draft(false);
        draft.attachments_mut().add([image()]);
        draft.mark_answered();

        draft.set_prompt("   ");
        assert_eq!(draft.eligibility(), Eligibility::MissingPrompt);

        draft.set_prompt("What style is this?");
        assert_eq!(draft.eligibility(), Eligibility::Ready);

        draft.attachments_mut().clear();
        assert_eq!(draft.eligibility(), Eligibility::Ready);
    }

    #[test]
    fn locked_prompt_ignores_edits_until_answered() {
        let mut draft = draft(true);
        assert!(!draft.prompt_editable());
        assert!(!draft.set_prompt("typed too early"));
        assert_eq!(draft.prompt(), "");

        draft.mark_answered();
        assert!(draft.set_prompt("now allowed"));
        assert_eq!(draft.prompt(), "now allowed");
    }

    #[test]
    fn reset_returns_to_blank_first_question() {
        let mut draft = draft(false);
        draft.attachments_mut().add([image()]);
        draft.set_prompt("hello");
        draft.mark_answered();

        draft.reset();

        assert_eq!(draft.prompt(), "");
        assert!(draft.attachments().is_empty());
        assert!(draft.is_first_question());
        assert_eq!(draft.attachments().previews().live_count(), 0);
    }
}
