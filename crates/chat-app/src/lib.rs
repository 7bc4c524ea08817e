#![deny(unsafe_code)]

/// Art Info desktop client.
///
/// The window shell and its views render a [`artinfo_session::SessionView`] and
/// forward user actions back to the session as intents.
pub mod app;
/// Question composer, history sidebar and the answer pane.
pub mod chat;
