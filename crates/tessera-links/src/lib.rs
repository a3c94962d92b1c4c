//! Tessera Links
//!
//! Pairwise trust links between two published identities:
//! - signed `link-invitation` documents and their verification
//! - link records driven through pending → synced → accepted
//! - inviter-side handling of sync, accept and ping
//! - the transport seam and an in-process network

pub mod error;
pub mod invitation;
pub mod link;
pub mod manager;
pub mod transport;

pub use error::LinkError;
pub use invitation::{generate_nonce, Invitation, InvitationBody};
pub use link::{IssuedInvitation, Link};
pub use manager::{LinkManager, PartyInfo};
pub use transport::{
    AcceptRequest, AcceptResponse, LinkHandler, LinkTransport, LocalNetwork, SyncRequest,
    SyncResponse,
};
