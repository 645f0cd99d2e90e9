//! Session lifecycle notifications.
//!
//! The client never decides what the host does when a session ends. It
//! broadcasts a [`SessionEvent`] and leaves navigation (prompting for a new
//! login, closing windows, ...) to whoever subscribed.

use std::fmt;

use tokio::sync::broadcast;

/// Capacity of the session event channel. Slow subscribers that fall further
/// behind than this observe `RecvError::Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// A change in the client's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login or registration established a new session.
    LoggedIn,
    /// The access token was rotated by a successful refresh.
    Refreshed,
    /// The user ended the session explicitly.
    LoggedOut,
    /// The session could not be recovered and has been cleared.
    Expired {
        /// Why recovery was impossible.
        reason: ExpiryReason,
    },
}

/// Why a session was terminated by the request pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryReason {
    /// The server rejected the access token and no refresh token was stored.
    MissingRefreshToken,
    /// The refresh endpoint answered with a non-success status.
    RefreshRejected {
        /// Status returned by the refresh endpoint.
        status: u16,
    },
    /// The refresh call failed in transport or returned an unreadable body.
    RefreshFailed {
        /// Description of the failure.
        message: String,
    },
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryReason::MissingRefreshToken => write!(f, "no refresh token available"),
            ExpiryReason::RefreshRejected { status } => {
                write!(f, "refresh rejected with status {}", status)
            }
            ExpiryReason::RefreshFailed { message } => write!(f, "refresh failed: {}", message),
        }
    }
}

/// Fan-out of session events to any number of subscribers.
#[derive(Debug, Clone)]
pub(crate) struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is fine.
    pub(crate) fn emit(&self, event: SessionEvent) {
        tracing::debug!(?event, "session event");
        let _ = self.tx.send(event);
    }
}
