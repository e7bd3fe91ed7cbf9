// src/cache/store.rs - Persistent entry store behind the exact-match cache
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio_postgres::types::Json;

use crate::models::CacheEntry;
use crate::utils::db_connect::PgPool;

/// Accessor for per-entity cached match history.
///
/// `put_entries_for_entity` must be atomic with respect to concurrent
/// writers for the same id; the Postgres implementation uses a transaction,
/// the in-memory one a single map write.
#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn entries_for_entity(&self, entity_id: &str) -> Result<Vec<CacheEntry>>;

    async fn put_entries_for_entity(&self, entity_id: &str, entries: Vec<CacheEntry>) -> Result<()>;

    /// Cross-entity lookup by normalized query and context hash. Returns the
    /// owning entity id alongside the matching entry, preferring the highest
    /// confidence when several entities carry the same normalized query.
    async fn find_by_normalized_query(
        &self,
        normalized_query: &str,
        context_hash: Option<&str>,
    ) -> Result<Option<(String, CacheEntry)>>;
}

/// In-memory store used by tests and as the degraded fallback when no
/// database is configured.
#[derive(Default)]
pub struct InMemoryEntryStore {
    entries: RwLock<HashMap<String, Vec<CacheEntry>>>,
}

impl InMemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntryStore for InMemoryEntryStore {
    async fn entries_for_entity(&self, entity_id: &str) -> Result<Vec<CacheEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .get(entity_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_entries_for_entity(&self, entity_id: &str, entries: Vec<CacheEntry>) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(entity_id.to_string(), entries);
        Ok(())
    }

    async fn find_by_normalized_query(
        &self,
        normalized_query: &str,
        context_hash: Option<&str>,
    ) -> Result<Option<(String, CacheEntry)>> {
        let entries = self.entries.read().await;
        let mut best: Option<(String, CacheEntry)> = None;
        for (entity_id, entity_entries) in entries.iter() {
            for entry in entity_entries {
                if entry.normalized_query == normalized_query
                    && entry.context_hash.as_deref() == context_hash
                    && best
                        .as_ref()
                        .map_or(true, |(_, b)| entry.confidence > b.confidence)
                {
                    best = Some((entity_id.clone(), entry.clone()));
                }
            }
        }
        Ok(best)
    }
}

/// Postgres-backed store. One row per cache entry, keyed by entity id and
/// normalized query, entry payload as JSONB.
pub struct PostgresEntryStore {
    pool: PgPool,
}

impl PostgresEntryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntryStore for PostgresEntryStore {
    async fn entries_for_entity(&self, entity_id: &str) -> Result<Vec<CacheEntry>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for entries_for_entity")?;

        let rows = conn
            .query(
                "SELECT entry FROM match_cache.entity_query_cache WHERE entity_id = $1",
                &[&entity_id],
            )
            .await
            .context("Failed to query cache entries from match_cache.entity_query_cache")?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let Json(entry): Json<CacheEntry> = row.get("entry");
            entries.push(entry);
        }
        Ok(entries)
    }

    async fn put_entries_for_entity(&self, entity_id: &str, entries: Vec<CacheEntry>) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for put_entries_for_entity")?;

        let tx = conn
            .transaction()
            .await
            .context("Failed to open transaction for cache entry replacement")?;

        tx.execute(
            "DELETE FROM match_cache.entity_query_cache WHERE entity_id = $1",
            &[&entity_id],
        )
        .await
        .context("Failed to clear previous cache entries")?;

        let insert = "
            INSERT INTO match_cache.entity_query_cache
            (entity_id, normalized_query, context_hash, entry)
            VALUES ($1, $2, $3, $4)";
        for entry in &entries {
            tx.execute(
                insert,
                &[
                    &entity_id,
                    &entry.normalized_query,
                    &entry.context_hash,
                    &Json(entry),
                ],
            )
            .await
            .context("Failed to insert cache entry")?;
        }

        tx.commit()
            .await
            .context("Failed to commit cache entry replacement")?;

        debug!(
            "Persisted {} cache entries for entity {}",
            entries.len(),
            entity_id
        );
        Ok(())
    }

    async fn find_by_normalized_query(
        &self,
        normalized_query: &str,
        context_hash: Option<&str>,
    ) -> Result<Option<(String, CacheEntry)>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for find_by_normalized_query")?;

        let row = conn
            .query_opt(
                "SELECT entity_id, entry
                 FROM match_cache.entity_query_cache
                 WHERE normalized_query = $1
                   AND context_hash IS NOT DISTINCT FROM $2
                 ORDER BY (entry->>'confidence')::float8 DESC
                 LIMIT 1",
                &[&normalized_query, &context_hash],
            )
            .await
            .context("Failed to query cache by normalized query")?;

        match row {
            Some(row) => {
                let entity_id: String = row.get("entity_id");
                let Json(entry): Json<CacheEntry> = row.get("entry");
                Ok(Some((entity_id, entry)))
            }
            None => Ok(None),
        }
    }
}
