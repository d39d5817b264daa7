//! Maps validated CLI matches to an action.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{
    ARG_DB_MAX_CONNECTIONS, ARG_DSN, ARG_FLOWS_FILE, ARG_PORT, ARG_REDIS_URL,
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;
use url::Url;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or malformed.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    let parsed = Url::parse(&dsn).context("invalid FLOWGATE_DSN")?;
    if !matches!(parsed.scheme(), "postgres" | "postgresql") {
        return Err(anyhow!(
            "invalid FLOWGATE_DSN: unsupported scheme {}",
            parsed.scheme()
        ));
    }

    let redis_url = matches
        .get_one::<String>(ARG_REDIS_URL)
        .filter(|url| !url.trim().is_empty())
        .map(|url| SecretString::from(url.clone()));

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        redis_url,
        flows_file: matches.get_one::<String>(ARG_FLOWS_FILE).map(PathBuf::from),
        db_max_connections: matches
            .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
            .copied()
            .unwrap_or(5),
    }))
}
