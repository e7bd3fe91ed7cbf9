// src/models/mod.rs
pub mod core;
pub mod matching;

pub use self::core::{CacheEntry, CacheStatsSnapshot, Candidate, NormalizedName};
pub use self::matching::{ConfidenceFactors, Disposition, MatchDecision, MatchTier, MatchType};
