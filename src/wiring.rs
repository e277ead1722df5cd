//! Service construction and diagnostics. Builds every adapter and use case
//! once at startup into a typed container; downstream handlers take only
//! the services they need as explicit constructor parameters, never a
//! registry lookup by string key.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::adapters::cache::RedisCache;
use crate::adapters::llm::OpenAiAdapter;
use crate::adapters::store::PostgresStore;
use crate::adapters::telegram::GrammersTelegramAdapter;
use crate::domain::ReactionWeights;
use crate::ports::{CachePort, LlmPort};
use crate::shared::AppConfig;
use crate::usecases::{Collector, Enricher, Ranker, Scheduler, SearchEngine};

const FLOOD_WAIT_CAP: Duration = Duration::from_secs(300);
const TELEGRAM_RPS: u32 = 20;
const TELEGRAM_RPM: u32 = 600;

pub struct ServiceRegistry {
    pub store: Arc<PostgresStore>,
    pub telegram: Option<Arc<GrammersTelegramAdapter>>,
    pub cache: Option<Arc<dyn CachePort>>,
    pub collector: Option<Arc<Collector<GrammersTelegramAdapter, PostgresStore>>>,
    pub scheduler: Option<Arc<Scheduler<GrammersTelegramAdapter, PostgresStore>>>,
    pub enricher: Option<Arc<Enricher<OpenAiAdapter, PostgresStore>>>,
    pub search: Arc<SearchEngine<PostgresStore>>,
    pub allowed_user_ids: Vec<i64>,
}

impl ServiceRegistry {
    pub async fn build(cfg: &AppConfig, session_path: PathBuf) -> anyhow::Result<Self> {
        let database_url = cfg
            .resolved_database_url()
            .ok_or_else(|| anyhow::anyhow!("TNSE_DATABASE_URL (or TNSE_DB_HOST/PORT/NAME/USER) is required"))?;
        let store = Arc::new(
            PostgresStore::connect(&database_url)
                .await
                .map_err(|e| anyhow::anyhow!("postgres connect failed: {e}"))?,
        );

        let telegram = match (cfg.api_id, cfg.api_hash.clone()) {
            (Some(api_id), Some(api_hash)) if !api_hash.is_empty() => {
                Some(Arc::new(GrammersTelegramAdapter::new(
                    api_id,
                    api_hash,
                    session_path,
                    FLOOD_WAIT_CAP,
                    TELEGRAM_RPS,
                    TELEGRAM_RPM,
                )))
            }
            _ => None,
        };

        let cache: Option<Arc<dyn CachePort>> = match cfg.redis_url.as_deref() {
            Some(url) if !url.is_empty() => match RedisCache::connect(url).await {
                Ok(c) => Some(Arc::new(c) as Arc<dyn CachePort>),
                Err(e) => {
                    warn!(error = %e, "redis connect failed, result caching disabled");
                    None
                }
            },
            _ => None,
        };

        let weights = ReactionWeights(cfg.reaction_weights());
        let window_hours = cfg.content_window_hours_or_default();
        let max_age = Duration::from_secs_f64(window_hours * 3600.0);

        let collector = telegram.as_ref().map(|t| {
            Arc::new(Collector::new(
                Arc::clone(t),
                Arc::clone(&store),
                weights.clone(),
                max_age,
                cfg.fetch_batch_size_or_default(),
            ))
        });

        let scheduler = collector.as_ref().map(|c| {
            Arc::new(Scheduler::new(
                Arc::clone(c),
                Arc::clone(&store),
                cfg.max_concurrent_channels_or_default(),
                Duration::from_secs(cfg.manual_sync_cooldown_secs_or_default()),
            ))
        });

        let enricher = match (cfg.llm_api_key.clone(), cfg.llm_api_url.clone(), cfg.llm_model.clone()) {
            (Some(key), Some(url), Some(model)) if !key.is_empty() => {
                let llm: Arc<OpenAiAdapter> = Arc::new(OpenAiAdapter::new(url, key, cfg.enrichment_rpm_or_default()));
                let cap = crate::domain::MicroUsd::from_dollars(cfg.llm_daily_cost_cap_usd_or_default());
                Some(Arc::new(Enricher::new(llm, Arc::clone(&store), model, cap)))
            }
            _ => None,
        };

        let ranker = Ranker::new(window_hours, 1.0);
        let search = Arc::new(SearchEngine::new(
            Arc::clone(&store),
            cache.clone(),
            ranker,
            Duration::from_secs(cfg.cache_ttl_secs_or_default()),
        ));

        Ok(Self {
            store,
            telegram,
            cache,
            collector,
            scheduler,
            enricher,
            search,
            allowed_user_ids: cfg.allowed_user_ids(),
        })
    }
}

/// One structured log line per service, describing availability and, when
/// unavailable, the configuration key that would enable it.
pub fn log_service_status(registry: &ServiceRegistry) {
    info!("postgres store: connected");

    match &registry.telegram {
        Some(_) => info!("telegram adapter: enabled"),
        None => warn!("telegram adapter: disabled (set TNSE_API_ID and TNSE_API_HASH) -- channel addition and manual sync of new channels are unavailable"),
    }

    match &registry.enricher {
        Some(_) => info!("enrichment: enabled"),
        None => warn!("enrichment: disabled (set TNSE_LLM_API_KEY, TNSE_LLM_API_URL, TNSE_LLM_MODEL) -- search falls back to the full-text arm only"),
    }

    match &registry.cache {
        Some(_) => info!("result cache: enabled"),
        None => warn!("result cache: disabled (set TNSE_REDIS_URL) -- every search recomputes candidates"),
    }

    if registry.allowed_user_ids.is_empty() {
        warn!("TNSE_ALLOWED_USER_IDS is empty -- manual sync and search are open to any caller");
    } else {
        info!(count = registry.allowed_user_ids.len(), "caller allowlist: enabled");
    }
}
