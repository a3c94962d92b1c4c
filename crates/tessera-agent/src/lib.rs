//! Tessera Agent
//!
//! Wires the registry, link manager, issuer, wallet and verifier into one
//! party per identity, and runs the getting-started scenario between
//! Faber College, Acme Corp, Thrift Bank and Alice.

pub mod agent;
pub mod config;
pub mod error;
pub mod pool;
pub mod walkthrough;

pub use agent::Agent;
pub use config::{AgentConfig, LogFormat};
pub use error::AgentError;
pub use pool::Pool;
pub use walkthrough::{run, WalkthroughReport};
