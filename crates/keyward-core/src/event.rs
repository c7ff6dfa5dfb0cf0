//! Session lifecycle events carried by the bus.

use std::fmt;

use crate::config::ClientId;

/// A lifecycle event published by a session handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The requester is about to redirect to the login page.
    Login {
        /// Publishing handle.
        requester: ClientId,
    },

    /// The requester is about to redirect to the logout endpoint.
    Logout {
        /// Publishing handle.
        requester: ClientId,
    },

    /// The requester's handshake settled successfully.
    Initialized {
        /// Whether the provider reported an authenticated session.
        authenticated: bool,
        /// Publishing handle.
        requester: ClientId,
    },
}

/// Tag of a [`SessionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`SessionEvent::Login`]
    Login,
    /// [`SessionEvent::Logout`]
    Logout,
    /// [`SessionEvent::Initialized`]
    Initialized,
}

impl SessionEvent {
    /// The event's tag.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Login { .. } => EventKind::Login,
            Self::Logout { .. } => EventKind::Logout,
            Self::Initialized { .. } => EventKind::Initialized,
        }
    }

    /// Handle that published the event.
    pub fn requester(&self) -> &ClientId {
        match self {
            Self::Login { requester }
            | Self::Logout { requester }
            | Self::Initialized { requester, .. } => requester,
        }
    }

    /// True if `client_id` published this event.
    pub fn is_from(&self, client_id: &ClientId) -> bool {
        self.requester() == client_id
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Initialized => "initialized",
        })
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized { authenticated, requester } => {
                write!(f, "initialized(authenticated={authenticated}) from {requester}")
            },
            other => write!(f, "{} from {}", other.kind(), other.requester()),
        }
    }
}
