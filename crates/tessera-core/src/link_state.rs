use std::fmt;

use crate::error::CoreError;

/// The states of a pairwise link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// Invitation verified, remote party not yet contacted.
    Pending,
    /// Remote party confirmed the invitation.
    Synced,
    /// Both sides accepted the link.
    Accepted,
    /// Soft-expired. Final state; the link record is kept.
    Expired,
}

impl LinkState {
    /// Whether this is a final (terminal) state.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Synced => write!(f, "synced"),
            Self::Accepted => write!(f, "accepted"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Events that drive link state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The remote party confirmed the invitation.
    Sync,
    /// The remote party confirmed our acceptance.
    Accept,
    /// The link was expired locally.
    Expire,
}

/// Link transition table.
///
/// Valid transitions:
/// - Pending → Synced (Sync)
/// - Synced → Synced (Sync, refresh)
/// - Synced → Accepted (Accept)
/// - Accepted → Accepted (Sync, refresh)
/// - Pending | Synced | Accepted → Expired (Expire)
pub struct LinkStateMachine;

impl LinkStateMachine {
    pub fn transition(current: LinkState, event: LinkEvent) -> Result<LinkState, CoreError> {
        let next = match (current, event) {
            (LinkState::Pending, LinkEvent::Sync) => LinkState::Synced,
            (LinkState::Synced, LinkEvent::Sync) => LinkState::Synced,
            (LinkState::Accepted, LinkEvent::Sync) => LinkState::Accepted,

            (LinkState::Synced, LinkEvent::Accept) => LinkState::Accepted,

            (LinkState::Pending, LinkEvent::Expire)
            | (LinkState::Synced, LinkEvent::Expire)
            | (LinkState::Accepted, LinkEvent::Expire) => LinkState::Expired,

            _ => {
                return Err(CoreError::InvalidLinkTransition {
                    from: current,
                    event,
                })
            }
        };

        tracing::debug!(from = %current, to = %next, event = ?event, "link state transition");

        Ok(next)
    }

    pub fn can_transition(current: LinkState, event: LinkEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
