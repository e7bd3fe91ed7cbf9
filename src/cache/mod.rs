// src/cache/mod.rs - Confidence-gated exact-match cache with bounded per-entity history
pub mod store;

use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::matching::confidence::QueryContext;
use crate::matching::normalize::normalize;
use crate::models::{CacheEntry, CacheStatsSnapshot, MatchType};
use store::EntryStore;

const HIT_RATE_LOG_INTERVAL: u64 = 100;

/// Result of one cache probe.
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub hit: bool,
    pub entity_id: Option<String>,
    pub entry: Option<CacheEntry>,
}

impl CacheLookup {
    fn miss() -> Self {
        Self {
            hit: false,
            entity_id: None,
            entry: None,
        }
    }
}

/// Per-entity cache of previously confirmed query -> entity mappings.
///
/// The service owns no long-lived match state of its own: entries live in
/// the [`EntryStore`], and only the process-wide statistics counters are
/// in-memory. Updates to the same entity are serialized through a per-entity
/// lock so the eviction and match-count invariants hold under concurrency;
/// lookups and updates to other entities proceed without coordination.
pub struct ExactMatchCache {
    store: Arc<dyn EntryStore>,
    enabled: bool,
    min_confidence: f64,
    max_entries_per_entity: usize,
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    updates: AtomicU64,
    entity_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ExactMatchCache {
    pub fn new(
        store: Arc<dyn EntryStore>,
        enabled: bool,
        min_confidence: f64,
        max_entries_per_entity: usize,
    ) -> Self {
        info!(
            "Initializing exact-match cache: enabled={}, min_confidence={}, max_entries_per_entity={}",
            enabled, min_confidence, max_entries_per_entity
        );
        Self {
            store,
            enabled,
            min_confidence,
            max_entries_per_entity,
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            entity_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Stable hash of the caller's context, `None` for an empty context.
    pub fn context_hash(context: &QueryContext) -> Option<String> {
        if context.is_empty() {
            return None;
        }
        let mut hasher = Sha256::new();
        hasher.update(context.canonical_string().as_bytes());
        Some(hex::encode(hasher.finalize()))
    }

    /// Probe the cache for a previously confirmed mapping of this query.
    ///
    /// Entries below the confidence minimum are never stored, so a hit is
    /// always directly usable without re-verification. A store failure
    /// degrades to a miss; the live tiers still run.
    pub async fn lookup(&self, query: &str, context: &QueryContext) -> CacheLookup {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return CacheLookup::miss();
        }

        let normalized_query = normalize(query).canonical;
        if normalized_query.is_empty() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return CacheLookup::miss();
        }

        let context_hash = Self::context_hash(context);
        match self
            .store
            .find_by_normalized_query(&normalized_query, context_hash.as_deref())
            .await
        {
            Ok(Some((entity_id, entry))) => {
                let hits = self.hits.fetch_add(1, Ordering::Relaxed) + 1;
                if hits % HIT_RATE_LOG_INTERVAL == 0 {
                    let snapshot = self.stats();
                    info!(
                        "Exact-match cache stats - hits: {}, misses: {}, hit rate: {:.2}%",
                        snapshot.hits,
                        snapshot.misses,
                        snapshot.hit_rate() * 100.0
                    );
                }
                debug!(
                    "Cache hit: query {:?} -> entity {} (confidence {:.3})",
                    query, entity_id, entry.confidence
                );
                CacheLookup {
                    hit: true,
                    entity_id: Some(entity_id),
                    entry: Some(entry),
                }
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                CacheLookup::miss()
            }
            Err(e) => {
                warn!("Cache store unavailable during lookup, degrading to miss: {:#}", e);
                self.misses.fetch_add(1, Ordering::Relaxed);
                CacheLookup::miss()
            }
        }
    }

    /// Record a confirmed match. No-op when the cache is disabled or the
    /// confidence is below the configured minimum.
    ///
    /// Repeated confirmation of the same normalized query bumps the match
    /// count and never lowers a confirmed confidence. When an entity is at
    /// its entry cap, the least frequently and least recently confirmed
    /// entry is evicted before the new one is inserted.
    pub async fn update(
        &self,
        entity_id: &str,
        query: &str,
        confidence: f64,
        match_type: Option<MatchType>,
        context: &QueryContext,
    ) {
        if !self.enabled || confidence < self.min_confidence {
            return;
        }

        let normalized_query = normalize(query).canonical;
        if normalized_query.is_empty() {
            return;
        }
        let context_hash = Self::context_hash(context);

        let entity_lock = {
            let mut locks = self.entity_locks.lock().await;
            locks
                .entry(entity_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = entity_lock.lock().await;

        let mut entries = match self.store.entries_for_entity(entity_id).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Cache store unavailable, skipping update for entity {}: {:#}",
                    entity_id, e
                );
                return;
            }
        };

        let existing = entries.iter_mut().find(|entry| {
            entry.normalized_query == normalized_query
                && entry.context_hash.as_deref() == context_hash.as_deref()
        });

        match existing {
            Some(entry) => {
                entry.match_count += 1;
                entry.confidence = entry.confidence.max(confidence);
                entry.last_matched_at = chrono::Utc::now();
                if entry.match_type.is_none() {
                    entry.match_type = match_type;
                }
            }
            None => {
                if entries.len() >= self.max_entries_per_entity {
                    evict_least_valuable(&mut entries);
                }
                entries.push(CacheEntry::new(
                    query,
                    &normalized_query,
                    confidence,
                    match_type,
                    context_hash,
                ));
            }
        }

        // Least valuable last, so operational consumers can truncate.
        entries.sort_by(|a, b| {
            (b.match_count, b.last_matched_at).cmp(&(a.match_count, a.last_matched_at))
        });

        match self.store.put_entries_for_entity(entity_id, entries).await {
            Ok(()) => {
                self.updates.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cache update: entity {} now caches query {:?} at {:.3}",
                    entity_id, query, confidence
                );
            }
            Err(e) => {
                warn!(
                    "Cache store unavailable, update lost for entity {}: {:#}",
                    entity_id, e
                );
            }
        }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.lookups.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.updates.store(0, Ordering::Relaxed);
        info!("Exact-match cache statistics reset");
    }
}

fn evict_least_valuable(entries: &mut Vec<CacheEntry>) {
    if let Some((index, _)) = entries
        .iter()
        .enumerate()
        .min_by_key(|(_, entry)| (entry.match_count, entry.last_matched_at))
    {
        let evicted = entries.remove(index);
        debug!(
            "Evicted cache entry {:?} (match_count {}, last matched {})",
            evicted.normalized_query, evicted.match_count, evicted.last_matched_at
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::InMemoryEntryStore;

    fn cache_with_cap(cap: usize) -> ExactMatchCache {
        ExactMatchCache::new(Arc::new(InMemoryEntryStore::new()), true, 0.9, cap)
    }

    #[tokio::test]
    async fn test_update_then_lookup_hits() {
        let cache = cache_with_cap(50);
        let ctx = QueryContext::default();

        cache.update("e1", "Acme Corp", 0.95, Some(MatchType::Exact), &ctx).await;

        let result = cache.lookup("Acme Corp", &ctx).await;
        assert!(result.hit);
        assert_eq!(result.entity_id.as_deref(), Some("e1"));

        // Suffix variants normalize to the same key.
        let variant = cache.lookup("Acme Corporation", &ctx).await;
        assert!(variant.hit);

        let stats = cache.stats();
        assert_eq!(stats.lookups, 2);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.updates, 1);
    }

    #[tokio::test]
    async fn test_low_confidence_update_is_dropped() {
        let cache = cache_with_cap(50);
        let ctx = QueryContext::default();

        cache.update("e1", "Acme Corp", 0.85, Some(MatchType::Variation), &ctx).await;

        let result = cache.lookup("Acme Corp", &ctx).await;
        assert!(!result.hit);
        assert_eq!(cache.stats().updates, 0);
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits_or_stores() {
        let cache = ExactMatchCache::new(Arc::new(InMemoryEntryStore::new()), false, 0.9, 50);
        let ctx = QueryContext::default();

        cache.update("e1", "Acme", 0.99, None, &ctx).await;
        let result = cache.lookup("Acme", &ctx).await;
        assert!(!result.hit);

        let stats = cache.stats();
        assert_eq!(stats.lookups, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.updates, 0);
    }

    #[tokio::test]
    async fn test_repeat_confirmation_bumps_count_and_keeps_max_confidence() {
        let cache = cache_with_cap(50);
        let ctx = QueryContext::default();

        cache.update("e1", "Acme Corp", 0.98, Some(MatchType::Exact), &ctx).await;
        cache.update("e1", "Acme Corp", 0.92, Some(MatchType::Exact), &ctx).await;

        let entry = cache.lookup("Acme Corp", &ctx).await.entry.unwrap();
        assert_eq!(entry.match_count, 2);
        // Never lowered by a weaker confirmation.
        assert!((entry.confidence - 0.98).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_eviction_respects_cap_and_value_order() {
        let store = Arc::new(InMemoryEntryStore::new());
        let cache = ExactMatchCache::new(store.clone(), true, 0.9, 3);
        let ctx = QueryContext::default();

        cache.update("e1", "Alpha Industries", 0.95, None, &ctx).await;
        cache.update("e1", "Beta Industries", 0.95, None, &ctx).await;
        cache.update("e1", "Gamma Industries", 0.95, None, &ctx).await;

        // Reconfirm alpha and gamma so beta is the least valuable.
        cache.update("e1", "Alpha Industries", 0.95, None, &ctx).await;
        cache.update("e1", "Gamma Industries", 0.95, None, &ctx).await;

        cache.update("e1", "Delta Industries", 0.95, None, &ctx).await;

        let entries = store.entries_for_entity("e1").await.unwrap();
        assert_eq!(entries.len(), 3);
        let keys: Vec<&str> = entries.iter().map(|e| e.normalized_query.as_str()).collect();
        assert!(!keys.contains(&"beta industries"));
        assert!(keys.contains(&"delta industries"));
    }

    #[tokio::test]
    async fn test_cap_never_exceeded_under_many_inserts() {
        let store = Arc::new(InMemoryEntryStore::new());
        let cache = ExactMatchCache::new(store.clone(), true, 0.9, 5);
        let ctx = QueryContext::default();

        for i in 0..20 {
            cache
                .update("e1", &format!("Company Number {}", i), 0.95, None, &ctx)
                .await;
            let entries = store.entries_for_entity("e1").await.unwrap();
            assert!(entries.len() <= 5, "cap exceeded: {}", entries.len());
        }
    }

    #[tokio::test]
    async fn test_context_hash_partitions_entries() {
        let cache = cache_with_cap(50);
        let no_ctx = QueryContext::default();
        let biotech = QueryContext {
            industry: Some("biotech".to_string()),
            region: None,
        };

        cache.update("e1", "Acme", 0.95, None, &biotech).await;

        assert!(!cache.lookup("Acme", &no_ctx).await.hit);
        assert!(cache.lookup("Acme", &biotech).await.hit);
    }

    #[tokio::test]
    async fn test_concurrent_updates_to_one_entity_serialize() {
        let store = Arc::new(InMemoryEntryStore::new());
        let cache = Arc::new(ExactMatchCache::new(store.clone(), true, 0.9, 50));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache
                    .update("e1", "Acme Corp", 0.95, None, &QueryContext::default())
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Lost updates would leave the count short of the confirmations.
        let entries = store.entries_for_entity("e1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].match_count, 16);
        assert_eq!(cache.stats().updates, 16);
    }

    #[tokio::test]
    async fn test_stats_reset() {
        let cache = cache_with_cap(50);
        cache.lookup("anything", &QueryContext::default()).await;
        assert_eq!(cache.stats().lookups, 1);

        cache.reset_stats();
        let stats = cache.stats();
        assert_eq!(stats.lookups, 0);
        assert_eq!(stats.hit_rate(), 0.0);
    }
}
