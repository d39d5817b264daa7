//! Immutable flow → guarded-path registry.
//!
//! Built once at startup, shared behind an `Arc`, and only ever read afterwards.
//! A reverse index maps each guarded path to the first flow that registered it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use utoipa::ToSchema;

use super::error::FlowError;

/// A named authentication flow and the request paths it guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FlowDefinition {
    pub name: String,
    pub paths: BTreeSet<String>,
}

impl FlowDefinition {
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn guards(&self, path: &str) -> bool {
        self.paths.contains(path)
    }
}

#[derive(Debug, Clone)]
pub struct FlowRegistry {
    // Registration order is preserved; it decides reverse-lookup ties.
    flows: Vec<FlowDefinition>,
    by_name: HashMap<String, usize>,
    by_path: HashMap<String, usize>,
}

impl FlowRegistry {
    /// Build a registry from definitions in registration order.
    ///
    /// A flow name registered twice keeps its first definition. A path guarded by
    /// several flows resolves to the earliest one.
    #[must_use]
    pub fn new(definitions: impl IntoIterator<Item = FlowDefinition>) -> Self {
        let mut flows = Vec::new();
        let mut by_name = HashMap::new();
        let mut by_path = HashMap::new();

        for definition in definitions {
            if by_name.contains_key(&definition.name) {
                continue;
            }
            let index = flows.len();
            by_name.insert(definition.name.clone(), index);
            for path in &definition.paths {
                by_path.entry(path.clone()).or_insert(index);
            }
            flows.push(definition);
        }

        Self {
            flows,
            by_name,
            by_path,
        }
    }

    /// Flows shipped with the service when no flows file is configured.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new([
            FlowDefinition::new("signin", ["/v1/signin"]),
            FlowDefinition::new("signup", ["/v1/signup"]),
            FlowDefinition::new(
                "passwordless",
                ["/v1/passwordless/init", "/v1/passwordless/complete"],
            ),
            FlowDefinition::new("social_auth", ["/v1/auth/fb", "/v1/auth/google"]),
            FlowDefinition::new("otp_verify", ["/v1/otp/verify"]),
        ])
    }

    /// Parse a JSON array of `{ "name": ..., "paths": [...] }` objects.
    ///
    /// # Errors
    /// Returns an error if the document is not a valid flow list or is empty.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let definitions: Vec<FlowDefinition> = serde_json::from_str(json)?;
        if definitions.is_empty() {
            anyhow::bail!("flow configuration must declare at least one flow");
        }
        if let Some(blank) = definitions.iter().find(|d| d.name.trim().is_empty()) {
            anyhow::bail!("flow configuration contains a blank flow name: {blank:?}");
        }
        Ok(Self::new(definitions))
    }

    /// Look up a flow by name.
    ///
    /// # Errors
    /// Returns `FlowError::UnknownFlow` if no flow with that name is registered.
    pub fn resolve(&self, name: &str) -> Result<&FlowDefinition, FlowError> {
        self.by_name
            .get(name)
            .map(|&index| &self.flows[index])
            .ok_or_else(|| FlowError::UnknownFlow(name.to_string()))
    }

    /// Name of the first registered flow guarding `path`, if any.
    #[must_use]
    pub fn reverse_resolve(&self, path: &str) -> Option<&str> {
        self.by_path
            .get(path)
            .map(|&index| self.flows[index].name.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.flows.iter().map(|flow| flow.name.as_str())
    }

    #[must_use]
    pub fn flows(&self) -> &[FlowDefinition] {
        &self.flows
    }
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
