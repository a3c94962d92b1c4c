use std::sync::Arc;

use tessera_core::{EngineConfig, Identifier, Role};
use tessera_credentials::{RevocationRegistry, SchemaRegistry};
use tessera_crypto::{sign, KeyPair};
use tessera_identity::{Identity, IdentityRegistry, IdentityResolver, LocalResolver};
use tessera_links::LocalNetwork;

use crate::agent::Agent;
use crate::error::AgentError;

/// The shared world a set of in-process agents live in: the identity
/// registry, published schemas, revocations and the link network.
pub struct Pool {
    config: EngineConfig,
    registry: Arc<IdentityRegistry>,
    resolver: Arc<dyn IdentityResolver>,
    schemas: Arc<SchemaRegistry>,
    revocations: Arc<RevocationRegistry>,
    network: Arc<LocalNetwork>,
}

impl Pool {
    pub fn new(config: EngineConfig) -> Self {
        let registry = Arc::new(IdentityRegistry::new());
        let resolver: Arc<dyn IdentityResolver> = Arc::new(LocalResolver::new(registry.clone()));
        Self {
            config,
            revocations: Arc::new(RevocationRegistry::new(resolver.clone())),
            registry,
            resolver,
            schemas: Arc::new(SchemaRegistry::new()),
            network: Arc::new(LocalNetwork::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<IdentityRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<dyn IdentityResolver> {
        &self.resolver
    }

    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    pub fn revocations(&self) -> &Arc<RevocationRegistry> {
        &self.revocations
    }

    pub fn network(&self) -> &Arc<LocalNetwork> {
        &self.network
    }

    /// Create the genesis steward.
    pub fn bootstrap_steward(&self, name: &str, endpoint: &str) -> Result<Arc<Agent>, AgentError> {
        let keypair = KeyPair::generate();
        let identifier = Identifier::from_verkey_bytes(keypair.public_key().as_bytes());
        self.registry
            .bootstrap_steward(identifier, keypair.verkey(), Some(endpoint.to_string()))?;
        tracing::info!(name, endpoint, "steward bootstrapped");
        Ok(Agent::new(self, name, endpoint, keypair))
    }

    /// Publish a new identity sponsored by `sponsor` and start its agent.
    pub fn onboard(
        &self,
        sponsor: &Agent,
        name: &str,
        endpoint: &str,
        role: Role,
    ) -> Result<Arc<Agent>, AgentError> {
        let keypair = KeyPair::generate();
        let identity = Identity::new(
            Identifier::from_verkey_bytes(keypair.public_key().as_bytes()),
            keypair.verkey(),
            role,
            Some(endpoint.to_string()),
        );
        let signature = sign(&identity.publish_payload()?, &sponsor.keypair());
        self.registry
            .publish(sponsor.identifier(), identity, &signature)?;
        tracing::info!(name, endpoint, role = %role, sponsor = %sponsor.name(), "agent onboarded");
        Ok(Agent::new(self, name, endpoint, keypair))
    }
}
