//! Client-side notification synchronization engine
//!
//! Keeps a local inbox of notifications in step with a remote backend. The
//! inbox is loaded over REST, kept live by a WebSocket push channel, and
//! mutated optimistically: local changes apply immediately and are then
//! forwarded to the backend without rollback on failure.
//!
//! The usual entry point is [`NotificationSession`], which wires the
//! [`HttpGateway`], the [`PushChannelClient`] and the [`NotificationStore`]
//! together for one signed-in principal.

pub mod backends;
pub mod components;
pub mod session;
pub mod store;

pub use backends::*;
pub use components::*;
pub use session::NotificationSession;
pub use store::{LoadOutcome, NotificationStore, StoreSnapshot};

/// Builder for locally added notifications with fluent API
#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    data: NewNotification,
}

impl NotificationBuilder {
    pub fn new() -> Self {
        Self {
            data: NewNotification::new("Notification", ""),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.data.title = title.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.data.message = message.into();
        self
    }

    pub fn with_kind(mut self, kind: NotificationKind) -> Self {
        self.data.kind = kind;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.data.priority = priority;
        self
    }

    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.data.action_url = Some(url.into());
        self
    }

    pub fn build(self) -> NewNotification {
        self.data
    }
}

impl Default for NotificationBuilder {
    fn default() -> Self {
        Self::new()
    }
}
