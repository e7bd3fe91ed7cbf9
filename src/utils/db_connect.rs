// src/utils/db_connect.rs - Postgres connection pool for the entry store
use anyhow::{Context, Result};
use deadpool_postgres::{Config as PgConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use log::info;
use std::env;
use tokio_postgres::NoTls;

pub type PgPool = Pool;

/// Build a connection pool from `POSTGRES_*` environment variables.
pub async fn connect() -> Result<PgPool> {
    let host = env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port: u16 = env::var("POSTGRES_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5432);
    let dbname = env::var("POSTGRES_DB").unwrap_or_else(|_| "entity_resolution".to_string());

    let mut cfg = PgConfig::new();
    cfg.host = Some(host.clone());
    cfg.port = Some(port);
    cfg.user = Some(env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string()));
    cfg.password = env::var("POSTGRES_PASSWORD").ok();
    cfg.dbname = Some(dbname.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let pool = cfg
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .context("Failed to create Postgres connection pool")?;

    // Verify connectivity up front rather than on the first lookup.
    let conn = pool
        .get()
        .await
        .context("Failed to get initial DB connection")?;
    conn.simple_query("SELECT 1")
        .await
        .context("Failed to verify DB connectivity")?;
    drop(conn);

    info!("Connected to Postgres at {}:{}/{}", host, port, dbname);
    Ok(pool)
}

/// Current pool usage as (size, available).
pub fn get_pool_status(pool: &PgPool) -> (usize, usize) {
    let status = pool.status();
    (status.size, status.available.max(0) as usize)
}
