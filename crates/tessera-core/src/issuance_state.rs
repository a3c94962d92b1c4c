use std::fmt;

use crate::error::CoreError;

/// The states of a credential issuance exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssuanceState {
    /// Issuer has offered a credential to a holder.
    Offered,
    /// Holder has requested the offered credential over a link.
    Requested,
    /// Issuer signed and delivered the credential. Final state.
    Issued,
}

impl IssuanceState {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Issued)
    }
}

impl fmt::Display for IssuanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offered => write!(f, "offered"),
            Self::Requested => write!(f, "requested"),
            Self::Issued => write!(f, "issued"),
        }
    }
}

/// Events that drive issuance transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceEvent {
    /// Holder requests the offered credential.
    Request,
    /// Issuer issues the requested credential.
    Issue,
}

/// Issuance transition table: Offered → Requested → Issued.
pub struct IssuanceStateMachine;

impl IssuanceStateMachine {
    pub fn transition(
        current: IssuanceState,
        event: IssuanceEvent,
    ) -> Result<IssuanceState, CoreError> {
        let next = match (current, event) {
            (IssuanceState::Offered, IssuanceEvent::Request) => IssuanceState::Requested,
            (IssuanceState::Requested, IssuanceEvent::Issue) => IssuanceState::Issued,
            _ => {
                return Err(CoreError::InvalidIssuanceTransition {
                    from: current,
                    event,
                })
            }
        };

        tracing::debug!(from = %current, to = %next, event = ?event, "issuance state transition");

        Ok(next)
    }
}
