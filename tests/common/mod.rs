//! Shared Postgres + Redis containers for integration tests.

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, os::unix::net::UnixStream, path::Path};
use testcontainers_modules::{
    postgres::Postgres,
    redis::Redis,
    testcontainers::{runners::AsyncRunner, ContainerAsync},
};

pub struct Backends {
    pub pool: PgPool,
    pub redis_url: String,
    _postgres: ContainerAsync<Postgres>,
    _redis: ContainerAsync<Redis>,
}

/// Whether testcontainers can reach a Docker-compatible API.
fn container_runtime() -> Result<(), String> {
    if env::var("DOCKER_HOST").is_ok() {
        return Ok(());
    }
    let socket = Path::new("/var/run/docker.sock");
    UnixStream::connect(socket)
        .map(|_| ())
        .map_err(|err| format!("no container runtime at {}: {err}", socket.display()))
}

impl Backends {
    /// Start fresh containers and run migrations; `None` when containers are unavailable.
    pub async fn start() -> Result<Option<Self>> {
        if let Err(err) = container_runtime() {
            eprintln!("Skipping integration test: {err}");
            return Ok(None);
        }

        let postgres = match Postgres::default().start().await {
            Ok(container) => container,
            Err(err) => {
                eprintln!("Skipping integration test: failed to start Postgres: {err}");
                return Ok(None);
            }
        };
        let redis = match Redis::default().start().await {
            Ok(container) => container,
            Err(err) => {
                eprintln!("Skipping integration test: failed to start Redis: {err}");
                return Ok(None);
            }
        };

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let dsn = format!("postgres://postgres:postgres@{pg_host}:{pg_port}/postgres");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&dsn)
            .await
            .context("Failed to connect to Postgres container")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        let redis_host = redis.get_host().await?;
        let redis_port = redis.get_host_port_ipv4(6379).await?;

        Ok(Some(Self {
            pool,
            redis_url: format!("redis://{redis_host}:{redis_port}"),
            _postgres: postgres,
            _redis: redis,
        }))
    }
}
