/// Events emitted by the chat child views.
pub mod events;
pub mod composer;
pub mod sidebar;
pub mod view;

pub use composer::QuestionComposer;
pub use events::{AttachmentRemoved, ExchangeSelected, ImagesDropped, PromptEdited, SubmitRequested};
pub use sidebar::HistorySidebar;
pub use view::ChatView;
