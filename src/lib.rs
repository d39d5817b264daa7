//! # Flowgate (Authentication Flow Blocking)
//!
//! `flowgate` lets an operator temporarily deny a named authentication flow
//! (sign-in, sign-up, passwordless, ...) to a single subject inside a tenant, and
//! lets the authentication pipeline ask, before doing any work, whether the
//! request it is about to serve is blocked.
//!
//! ## Subjects
//!
//! A subject is either a contact address (email or phone number) or an internal
//! user identifier. Each kind has its own engine, its own table and its own cache
//! namespace; the contract is identical.
//!
//! ## Storage
//!
//! - **Postgres is authoritative.** Every block is an upserted row keyed by
//!   `(tenant_id, subject, flow_name)`. Unblocking flips `is_active`; rows are
//!   never deleted.
//! - **Redis is a volatile copy.** Blocked records are written through with a TTL
//!   that ends at the unblock time and are evicted explicitly on unblock. Checks
//!   never trust it over Postgres. Cache failures are logged and never fail a
//!   request.
//! - **Expiry is lazy.** A block stops denying once `unblocked_at` has passed,
//!   whether or not the row was ever touched again.
//!
//! ## Guarded Paths
//!
//! Flows are declared once at startup with the request paths they guard. The
//! check endpoint maps an inbound path back to its flow; unguarded paths are
//! never blocked and never reach the database.

pub mod api;
pub mod cli;
pub mod flows;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
