use crate::{api, flows::FlowRegistry};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub redis_url: Option<SecretString>,
    pub flows_file: Option<PathBuf>,
    pub db_max_connections: u32,
}

/// Load flow definitions from `path`, or fall back to the built-in set.
///
/// # Errors
/// Returns an error if the file cannot be read or holds invalid definitions.
pub fn load_registry(path: Option<&PathBuf>) -> Result<FlowRegistry> {
    let Some(path) = path else {
        return Ok(FlowRegistry::builtin());
    };

    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read flows file: {}", path.display()))?;
    FlowRegistry::from_json(&json)
        .with_context(|| format!("Invalid flows file: {}", path.display()))
}

/// Execute the server action.
/// # Errors
/// Returns an error if the flows file is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let registry = load_registry(args.flows_file.as_ref())?;
    debug!("Guarded flows: {:?}", registry.names().collect::<Vec<_>>());

    api::new(api::Config {
        port: args.port,
        dsn: args.dsn,
        redis_url: args.redis_url,
        db_max_connections: args.db_max_connections,
        registry,
    })
    .await
}
