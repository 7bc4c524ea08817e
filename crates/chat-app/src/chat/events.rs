use std::path::PathBuf;

use artinfo_session::ExchangeId;

/// Emitted when a history entry is clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeSelected {
    pub exchange: ExchangeId,
}

/// Emitted whenever the prompt input text changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptEdited {
    pub prompt: String,
}

/// Emitted when files are dropped onto the intake zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagesDropped {
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentRemoved {
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmitRequested;
