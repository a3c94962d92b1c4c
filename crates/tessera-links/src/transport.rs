use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use tessera_core::{canonical_bytes, Identifier};

use crate::error::LinkError;

/// Invitee → inviter: "I hold your invitation with this nonce", signed by
/// the invitee's current key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub nonce: String,
    pub from: Identifier,
    /// Base58 signature over [`SyncRequest::payload`].
    pub signature: String,
}

impl SyncRequest {
    pub fn payload(nonce: &str, from: &Identifier) -> Result<Vec<u8>, LinkError> {
        Ok(canonical_bytes(&serde_json::json!({
            "op": "sync",
            "nonce": nonce,
            "from": from,
        }))?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub nonce: String,
    pub identifier: Identifier,
    pub endpoint: String,
}

/// Invitee → inviter acceptance, signed by the invitee's current key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptRequest {
    pub nonce: String,
    pub identifier: Identifier,
    /// Base58 signature over [`AcceptRequest::payload`].
    pub signature: String,
}

impl AcceptRequest {
    pub fn payload(nonce: &str, identifier: &Identifier) -> Result<Vec<u8>, LinkError> {
        Ok(canonical_bytes(&serde_json::json!({
            "op": "accept",
            "nonce": nonce,
            "identifier": identifier,
        }))?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptResponse {
    pub nonce: String,
    pub identifier: Identifier,
}

/// Outbound link calls to a remote party's endpoint.
#[async_trait]
pub trait LinkTransport: Send + Sync {
    async fn sync(&self, endpoint: &str, request: SyncRequest) -> Result<SyncResponse, LinkError>;

    async fn accept(
        &self,
        endpoint: &str,
        request: AcceptRequest,
    ) -> Result<AcceptResponse, LinkError>;

    async fn ping(&self, endpoint: &str, nonce: &str) -> Result<(), LinkError>;
}

/// Inbound side of the link protocol, served at a party's endpoint.
#[async_trait]
pub trait LinkHandler: Send + Sync {
    async fn handle_sync(&self, request: SyncRequest) -> Result<SyncResponse, LinkError>;

    async fn handle_accept(&self, request: AcceptRequest) -> Result<AcceptResponse, LinkError>;

    async fn handle_ping(&self, nonce: &str) -> Result<(), LinkError>;
}

/// In-process network routing calls by endpoint string.
///
/// Handlers are held weakly, so a dropped party shows up as an unreachable
/// endpoint. Failures and latency can be injected per endpoint.
#[derive(Default)]
pub struct LocalNetwork {
    handlers: DashMap<String, Weak<dyn LinkHandler>>,
    /// endpoint → number of upcoming calls to fail
    failures: DashMap<String, u32>,
    latency: DashMap<String, Duration>,
    calls: AtomicU64,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H: LinkHandler + 'static>(&self, endpoint: impl Into<String>, handler: &Arc<H>) {
        let endpoint = endpoint.into();
        let weak: Weak<H> = Arc::downgrade(handler);
        let weak: Weak<dyn LinkHandler> = weak;
        tracing::debug!(endpoint = %endpoint, "endpoint registered");
        self.handlers.insert(endpoint, weak);
    }

    pub fn unregister(&self, endpoint: &str) {
        self.handlers.remove(endpoint);
    }

    /// Make the next `count` calls to `endpoint` fail with a transport error.
    pub fn fail_next(&self, endpoint: &str, count: u32) {
        self.failures.insert(endpoint.to_string(), count);
    }

    pub fn set_latency(&self, endpoint: &str, latency: Duration) {
        self.latency.insert(endpoint.to_string(), latency);
    }

    /// Total calls attempted, including injected failures.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    async fn route(&self, endpoint: &str) -> Result<Arc<dyn LinkHandler>, LinkError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let latency = self.latency.get(endpoint).map(|d| *d);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(mut remaining) = self.failures.get_mut(endpoint) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(LinkError::Transport(format!(
                    "connection to {} refused",
                    endpoint
                )));
            }
        }

        self.handlers
            .get(endpoint)
            .and_then(|weak| weak.upgrade())
            .ok_or_else(|| LinkError::Transport(format!("{} is unreachable", endpoint)))
    }
}

#[async_trait]
impl LinkTransport for LocalNetwork {
    async fn sync(&self, endpoint: &str, request: SyncRequest) -> Result<SyncResponse, LinkError> {
        self.route(endpoint).await?.handle_sync(request).await
    }

    async fn accept(
        &self,
        endpoint: &str,
        request: AcceptRequest,
    ) -> Result<AcceptResponse, LinkError> {
        self.route(endpoint).await?.handle_accept(request).await
    }

    async fn ping(&self, endpoint: &str, nonce: &str) -> Result<(), LinkError> {
        self.route(endpoint).await?.handle_ping(nonce).await
    }
}
