//! Hot-path entry point for the authentication pipeline.

use std::sync::Arc;
use tracing::{instrument, warn};

use super::engine::BlockEngine;
use super::error::FlowError;
use super::models::BlockCheck;
use super::registry::FlowRegistry;

/// Maps a request path to its flow and asks the engine about the subjects.
#[derive(Debug, Clone)]
pub struct BlockCheckService {
    registry: Arc<FlowRegistry>,
    engine: Arc<BlockEngine>,
}

impl BlockCheckService {
    #[must_use]
    pub fn new(registry: Arc<FlowRegistry>, engine: Arc<BlockEngine>) -> Self {
        Self { registry, engine }
    }

    #[must_use]
    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    #[must_use]
    pub fn engine(&self) -> &BlockEngine {
        &self.engine
    }

    /// Call before performing the operation behind `path`. On a blocked result
    /// the caller must abort without side effects and surface the reason.
    ///
    /// Unguarded paths are never blocked and never touch the store.
    ///
    /// # Errors
    /// Returns `FlowError::Store` if the store has to be consulted and fails.
    #[instrument(skip(self, subjects), fields(kind = %self.engine.kind()))]
    pub async fn check(
        &self,
        path: &str,
        tenant_id: &str,
        subjects: &[String],
    ) -> Result<BlockCheck, FlowError> {
        let Some(flow_name) = self.registry.reverse_resolve(path) else {
            return Ok(BlockCheck::allowed());
        };

        let check = self
            .engine
            .check_blocked_any(tenant_id, subjects, flow_name)
            .await?;

        if check.blocked {
            warn!(
                "{flow_name} flow is blocked in tenant {tenant_id} with reason: {}",
                check.reason.as_deref().unwrap_or_default()
            );
        }

        Ok(check)
    }

    /// `check`, with a denial turned into `FlowError::Blocked`.
    ///
    /// # Errors
    /// Returns `FlowError::Blocked` when denied, `FlowError::Store` on store failure.
    pub async fn ensure_allowed(
        &self,
        path: &str,
        tenant_id: &str,
        subjects: &[String],
    ) -> Result<(), FlowError> {
        self.check(path, tenant_id, subjects).await?.ensure_allowed()
    }
}
