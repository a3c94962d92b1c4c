use std::sync::Arc;

use async_trait::async_trait;

use tessera_core::Identifier;

use crate::error::IdentityError;
use crate::identity::Identity;
use crate::registry::IdentityRegistry;

/// Resolves an identifier to its current published identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, identifier: &Identifier) -> Result<Identity, IdentityError>;
}

/// Resolves from an in-process [`IdentityRegistry`].
pub struct LocalResolver {
    registry: Arc<IdentityRegistry>,
}

impl LocalResolver {
    pub fn new(registry: Arc<IdentityRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl IdentityResolver for LocalResolver {
    async fn resolve(&self, identifier: &Identifier) -> Result<Identity, IdentityError> {
        self.registry
            .resolve(identifier)
            .ok_or_else(|| IdentityError::UnknownIdentity(identifier.to_string()))
    }
}

/// Tries multiple resolvers in order.
///
/// Returns the first successful resolution, or the last error.
pub struct CompositeResolver {
    resolvers: Vec<Box<dyn IdentityResolver>>,
}

impl CompositeResolver {
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    pub fn add_resolver(&mut self, resolver: Box<dyn IdentityResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }
}

impl Default for CompositeResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityResolver for CompositeResolver {
    async fn resolve(&self, identifier: &Identifier) -> Result<Identity, IdentityError> {
        let mut last_error = IdentityError::UnknownIdentity(identifier.to_string());

        for resolver in &self.resolvers {
            match resolver.resolve(identifier).await {
                Ok(identity) => return Ok(identity),
                Err(e) => {
                    tracing::debug!(identifier = %identifier, error = %e, "resolver failed, trying next");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
