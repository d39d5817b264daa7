pub mod blocks;
pub mod check;
pub mod contacts;
pub mod health;
pub mod types;
pub mod users;

use std::sync::Arc;

use crate::flows::{BlockCache, BlockCheckService, BlockEngine, BlockStore, FlowRegistry, SubjectKind};

/// Shared handler state: the registry plus one check service per subject kind.
#[derive(Debug, Clone)]
pub struct FlowState {
    registry: Arc<FlowRegistry>,
    contacts: BlockCheckService,
    users: BlockCheckService,
}

impl FlowState {
    #[must_use]
    pub fn new(registry: FlowRegistry, contacts: BlockEngine, users: BlockEngine) -> Self {
        let registry = Arc::new(registry);
        Self {
            contacts: BlockCheckService::new(registry.clone(), Arc::new(contacts)),
            users: BlockCheckService::new(registry.clone(), Arc::new(users)),
            registry,
        }
    }

    /// Build both engines over a shared store factory and cache.
    #[must_use]
    pub fn with_backends<F>(registry: FlowRegistry, store: F, cache: Arc<dyn BlockCache>) -> Self
    where
        F: Fn(SubjectKind) -> Arc<dyn BlockStore>,
    {
        Self::new(
            registry,
            BlockEngine::new(SubjectKind::Contact, store(SubjectKind::Contact), cache.clone()),
            BlockEngine::new(SubjectKind::User, store(SubjectKind::User), cache),
        )
    }

    #[must_use]
    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    #[must_use]
    pub fn checks(&self, kind: SubjectKind) -> &BlockCheckService {
        match kind {
            SubjectKind::Contact => &self.contacts,
            SubjectKind::User => &self.users,
        }
    }

    #[must_use]
    pub fn engine(&self, kind: SubjectKind) -> &BlockEngine {
        self.checks(kind).engine()
    }
}
