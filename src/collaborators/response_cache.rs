// src/collaborators/response_cache.rs - LRU memo of AI verdicts per name pair
use log::info;
use lru::LruCache;
use std::num::NonZero;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::collaborators::AiVerdict;

// Default cache size - can be configured via environment variable
const DEFAULT_CACHE_SIZE: usize = 10_000;

/// Caches AI disambiguation verdicts so repeated escalations of the same
/// name pair do not pay for another remote call. Keys are the ordered name
/// pair plus the context hash, so reversed arguments share one slot.
pub struct AiResponseCache {
    verdicts: LruCache<String, AiVerdict>,
    pub hits: usize,
    pub misses: usize,
}

impl AiResponseCache {
    pub fn new() -> Self {
        let cache_size = std::env::var("AI_RESPONSE_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_CACHE_SIZE);

        info!("Initializing AiResponseCache with cache size: {}", cache_size);

        Self {
            verdicts: LruCache::new(NonZero::new(cache_size).unwrap()),
            hits: 0,
            misses: 0,
        }
    }

    /// Cache key for a name pair under a context hash.
    pub fn pair_key(name_a: &str, name_b: &str, context_hash: Option<&str>) -> String {
        let ctx = context_hash.unwrap_or("");
        if name_a <= name_b {
            format!("{}|{}|{}", name_a, name_b, ctx)
        } else {
            format!("{}|{}|{}", name_b, name_a, ctx)
        }
    }

    pub fn get(&mut self, key: &str) -> Option<AiVerdict> {
        match self.verdicts.get(key) {
            Some(verdict) => {
                self.hits += 1;
                if self.hits % 100 == 0 {
                    info!(
                        "AiResponseCache stats - hits: {}, misses: {}, hit rate: {:.2}%",
                        self.hits,
                        self.misses,
                        (self.hits as f64 / (self.hits + self.misses) as f64) * 100.0
                    );
                }
                Some(verdict.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, key: String, verdict: AiVerdict) {
        self.verdicts.put(key, verdict);
    }

    pub fn clear(&mut self) {
        self.verdicts.clear();
        self.hits = 0;
        self.misses = 0;
        info!("AI response cache cleared");
    }

    pub fn cache_info(&self) -> (usize, usize) {
        (self.verdicts.len(), self.verdicts.cap().get())
    }
}

impl Default for AiResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe wrapper for the AiResponseCache
pub type SharedAiResponseCache = Arc<Mutex<AiResponseCache>>;

/// Create a new shared cache for AI verdicts
pub fn create_shared_cache() -> SharedAiResponseCache {
    Arc::new(Mutex::new(AiResponseCache::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(
            AiResponseCache::pair_key("acme", "apex", None),
            AiResponseCache::pair_key("apex", "acme", None)
        );
        assert_ne!(
            AiResponseCache::pair_key("acme", "apex", None),
            AiResponseCache::pair_key("acme", "apex", Some("ctx"))
        );
    }

    #[test]
    fn test_get_put_and_counters() {
        let mut cache = AiResponseCache::new();
        let key = AiResponseCache::pair_key("acme", "apex", None);

        assert!(cache.get(&key).is_none());
        assert_eq!(cache.misses, 1);

        cache.put(
            key.clone(),
            AiVerdict {
                confidence: 0.9,
                rationale: "same entity".to_string(),
                token_usage: Some(120),
            },
        );

        let verdict = cache.get(&key).unwrap();
        assert!((verdict.confidence - 0.9).abs() < 1e-9);
        assert_eq!(cache.hits, 1);
    }
}
