use crate::aggregate::User;
use crate::value_objects::{Metadata, NextState};

/// A terminal state: shows its text and accepts no further input
#[derive(Debug, Clone)]
pub struct EndState {
    name: String,
    metadata: Metadata,
    text: String,
    send_reply: bool,
    next: Option<NextState>,
}

impl EndState {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: Metadata::new(),
            text: text.into(),
            send_reply: true,
            next: None,
        }
    }

    /// Whether the text is sent back at all
    pub fn with_send_reply(mut self, send_reply: bool) -> Self {
        self.send_reply = send_reply;
        self
    }

    /// State the session moves to once this one has been shown
    pub fn with_next(mut self, next: impl Into<NextState>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn send_reply(&self) -> bool {
        self.send_reply
    }

    pub fn next(&self) -> Option<&NextState> {
        self.next.as_ref()
    }

    pub fn display(&self, user: &User) -> String {
        user.i18n().gettext(&self.text).to_string()
    }
}
