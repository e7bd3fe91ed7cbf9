use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use resolution_lib::cache::store::{EntryStore, InMemoryEntryStore, PostgresEntryStore};
use resolution_lib::cache::ExactMatchCache;
use resolution_lib::collaborators::http::{HttpAiDisambiguator, HttpCandidateSearch, HttpWebEvidence};
use resolution_lib::collaborators::response_cache::create_shared_cache;
use resolution_lib::matching::confidence::WeightRegistry;
use resolution_lib::matching::manager::run_batch_resolution;
use resolution_lib::matching::orchestrator::MatchOrchestrator;
use resolution_lib::review::ReviewQueue;
use resolution_lib::utils::config::MatcherConfig;
use resolution_lib::utils::db_connect::connect;
use resolution_lib::utils::env::load_env;
use resolution_lib::utils::get_memory_usage;
use resolution_lib::QueryContext;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Resolve entity-name queries against the candidate search index.
#[derive(Parser, Debug)]
#[command(name = "resolve")]
struct Args {
    /// Queries to resolve; read from --input when omitted.
    queries: Vec<String>,

    /// File with one query per line.
    #[arg(long)]
    input: Option<std::path::PathBuf>,

    /// Industry hint applied to every query in the batch.
    #[arg(long)]
    industry: Option<String>,

    /// Region hint applied to every query in the batch.
    #[arg(long)]
    region: Option<String>,

    /// Maximum queries resolved concurrently.
    #[arg(long)]
    max_concurrent: Option<usize>,
}

fn collaborator_url(var: &str) -> Result<Url> {
    let raw = env::var(var).with_context(|| format!("{} is not set", var))?;
    Url::parse(&raw).with_context(|| format!("{} is not a valid URL: {}", var, raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("Starting entity-name resolution");
    load_env();

    let args = Args::parse();

    let config = MatcherConfig::from_env();
    config.log_config();

    let registry = WeightRegistry::builtin();
    let weights = registry
        .get(&config.weight_profile)
        .with_context(|| {
            format!(
                "Unknown weight profile '{}' (available: {:?})",
                config.weight_profile,
                registry.names()
            )
        })?
        .clone();

    let initial_memory = get_memory_usage().await;
    info!("Initial memory usage: {} MB", initial_memory);

    let mut queries = args.queries.clone();
    if let Some(path) = &args.input {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read query file {}", path.display()))?;
        queries.extend(
            contents
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
        );
    }
    if queries.is_empty() {
        anyhow::bail!("No queries supplied; pass queries as arguments or via --input");
    }

    // Cache entry store: Postgres when configured, in-memory otherwise.
    let store: Arc<dyn EntryStore> = if env::var("POSTGRES_HOST").is_ok() {
        let pool = connect().await.context("Failed to connect to database")?;
        Arc::new(PostgresEntryStore::new(pool))
    } else {
        warn!("POSTGRES_HOST not set; exact-match cache will not persist across runs");
        Arc::new(InMemoryEntryStore::new())
    };

    let cache = Arc::new(ExactMatchCache::new(
        store,
        config.cache_enabled,
        config.cache_min_confidence,
        config.cache_max_entries_per_entity,
    ));
    let review_queue = Arc::new(ReviewQueue::new());

    let search = Arc::new(HttpCandidateSearch::new(
        collaborator_url("SEARCH_SERVICE_URL")?,
        Duration::from_millis(config.search_timeout_ms),
    ));
    let ai = Arc::new(HttpAiDisambiguator::new(
        collaborator_url("AI_SERVICE_URL")?,
        Duration::from_millis(config.ai_timeout_ms),
    ));
    let web_evidence = Arc::new(HttpWebEvidence::new(
        collaborator_url("WEB_EVIDENCE_URL")?,
        Duration::from_millis(config.web_timeout_ms),
    ));

    let max_concurrent = args.max_concurrent.unwrap_or_else(num_cpus::get);
    let context = QueryContext {
        industry: args.industry.clone(),
        region: args.region.clone(),
    };

    let mut orchestrator = MatchOrchestrator::new(
        search,
        ai,
        web_evidence,
        cache.clone(),
        review_queue.clone(),
        config,
        weights,
    );
    orchestrator.set_ai_response_cache(create_shared_cache());
    let orchestrator = Arc::new(orchestrator);

    let (decisions, stats) =
        run_batch_resolution(orchestrator, queries, context, max_concurrent).await?;

    for decision in &decisions {
        println!("{}", serde_json::to_string(decision)?);
    }

    let cache_stats = cache.stats();
    info!(
        "Cache: {} lookups, {} hits, {} misses, {} updates (hit rate {:.1}%)",
        cache_stats.lookups,
        cache_stats.hits,
        cache_stats.misses,
        cache_stats.updates,
        cache_stats.hit_rate() * 100.0
    );

    let review_items = review_queue.drain().await;
    if !review_items.is_empty() {
        warn!(
            "{} decision(s) need human review:",
            review_items.len()
        );
        for item in &review_items {
            warn!(
                "  [{}] {:?} -> {:?} (confidence {:.3})",
                item.id, item.decision.query, item.decision.matched_entity_id, item.decision.confidence
            );
        }
    }

    let final_memory = get_memory_usage().await;
    info!(
        "Batch finished in {:.1}s: {} matched, {} review, {} no-match, {} rejected. Memory: {} MB (delta: {} MB)",
        stats.elapsed_secs,
        stats.matched,
        stats.review,
        stats.no_match,
        stats.rejected,
        final_memory,
        final_memory.saturating_sub(initial_memory)
    );

    Ok(())
}
