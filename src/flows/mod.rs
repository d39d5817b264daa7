//! Flow blocking engine.
//!
//! - `registry`: which flow guards which request path.
//! - `store`: Postgres tables, the source of truth.
//! - `cache`: Redis write-through copy of active blocks, never authoritative.
//! - `engine`: batched block/unblock and checks for one subject kind.
//! - `check`: path → flow → engine, the call the auth pipeline makes.

mod cache;
mod check;
mod clock;
mod engine;
mod error;
mod models;
mod registry;
mod store;
pub mod subjects;
#[cfg(test)]
pub(crate) mod testing;

pub use cache::{BlockCache, DisabledBlockCache, RedisBlockCache};
pub use check::BlockCheckService;
pub use clock::{Clock, SystemClock};
pub use engine::BlockEngine;
pub use error::{CacheError, FlowError, StoreError};
pub use models::{BlockCheck, BlockRecord, SubjectKind};
pub use registry::{FlowDefinition, FlowRegistry};
pub use store::{BlockStore, PgBlockStore};
