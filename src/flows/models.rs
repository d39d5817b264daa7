//! Block records and check outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use super::error::FlowError;

/// Which kind of key a block is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// Email address or phone number.
    Contact,
    /// Internal user identifier.
    #[serde(alias = "user_identifier")]
    User,
}

impl SubjectKind {
    /// Table holding this kind's block rows.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Contact => "contact_flow_blocks",
            Self::User => "user_flow_blocks",
        }
    }

    /// Leading segment of this kind's cache keys.
    #[must_use]
    pub const fn cache_prefix(self) -> &'static str {
        match self {
            Self::Contact => "block",
            Self::User => "user_block",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::User => "user",
        }
    }

    /// Cache key for a `(tenant, subject, flow)` triple.
    #[must_use]
    pub fn cache_key(self, tenant_id: &str, subject: &str, flow_name: &str) -> String {
        format!(
            "{}:{tenant_id}:{subject}:{flow_name}",
            self.cache_prefix()
        )
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a block table, also the cached value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub tenant_id: String,
    pub subject: String,
    pub flow_name: String,
    pub reason: String,
    pub unblocked_at: i64,
    pub active: bool,
}

impl BlockRecord {
    /// A record denies its flow only while active and before its unblock time.
    #[must_use]
    pub const fn denies_at(&self, now: i64) -> bool {
        self.active && now < self.unblocked_at
    }

    /// Seconds the cached copy should live: never less than one.
    #[must_use]
    pub fn cache_ttl_seconds(&self, now: i64) -> u64 {
        u64::try_from(self.unblocked_at.saturating_sub(now).max(1)).unwrap_or(1)
    }
}

/// Outcome of a block check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BlockCheck {
    pub blocked: bool,
    pub reason: Option<String>,
    /// Flow the checked path resolved to, if it is guarded.
    pub flow: Option<String>,
}

impl BlockCheck {
    #[must_use]
    pub fn allowed() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn allowed_for(flow: impl Into<String>) -> Self {
        Self {
            blocked: false,
            reason: None,
            flow: Some(flow.into()),
        }
    }

    #[must_use]
    pub fn blocked(flow: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.into()),
            flow: Some(flow.into()),
        }
    }

    /// Turn a denial into `FlowError::Blocked` so callers can bail with `?`.
    ///
    /// # Errors
    /// Returns `FlowError::Blocked` carrying the stored reason when blocked.
    pub fn ensure_allowed(self) -> Result<(), FlowError> {
        if !self.blocked {
            return Ok(());
        }
        Err(FlowError::Blocked {
            flow: self.flow.unwrap_or_default(),
            reason: self.reason.unwrap_or_default(),
        })
    }
}
