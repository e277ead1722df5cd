//! Hybrid search entry point. Normalizes the query, checks the result cache,
//! delegates the candidate fetch to `Store::search_candidates`, ranks with
//! `Ranker`, paginates, and populates the cache on a miss. A cache failure
//! never blocks or fails the read path.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::domain::{DomainError, SearchQuery, SearchResultPage};
use crate::ports::outbound::{CachePort, Store};
use crate::usecases::ranker::Ranker;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "in", "on", "is", "are", "to", "for",
    "и", "в", "на", "с", "по", "от", "для", "не", "что", "это",
];

/// Lowercases, trims, dedups (preserving first-seen order), and drops
/// stopwords. Idempotent: running it twice on its own output is a no-op,
/// which is what keeps the derived cache key stable regardless of the
/// caller's keyword ordering.
pub fn normalize_keywords(raw: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && !STOPWORDS.contains(&k.as_str()))
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

fn cache_key(query: &SearchQuery) -> String {
    let mut sorted_keywords = query.keywords.clone();
    sorted_keywords.sort();
    let canonical = serde_json::json!({
        "keywords": sorted_keywords,
        "max_age_hours": query.max_age_hours,
        "sort_mode": query.sort_mode,
        "category": query.category,
        "sentiment": query.sentiment,
        "include_enrichment": query.include_enrichment,
        "limit": query.limit,
        "offset": query.offset,
    });
    let canonical_string = canonical.to_string();
    let mut hasher = DefaultHasher::new();
    canonical_string.hash(&mut hasher);
    format!("tnse:search:{:x}", hasher.finish())
}

pub struct SearchEngine<S: Store> {
    store: Arc<S>,
    cache: Option<Arc<dyn CachePort>>,
    ranker: Ranker,
    cache_ttl: Duration,
}

impl<S: Store> SearchEngine<S> {
    pub fn new(store: Arc<S>, cache: Option<Arc<dyn CachePort>>, ranker: Ranker, cache_ttl: Duration) -> Self {
        Self {
            store,
            cache,
            ranker,
            cache_ttl,
        }
    }

    pub async fn search(&self, mut query: SearchQuery) -> Result<SearchResultPage, DomainError> {
        query.keywords = normalize_keywords(&query.keywords);

        if query.keywords.is_empty() {
            return Ok(SearchResultPage {
                posts: Vec::new(),
                limit: query.limit,
                offset: query.offset,
            });
        }

        let key = cache_key(&query);
        if let Some(cache) = &self.cache {
            if let Some(bytes) = cache.get(&key).await {
                if let Ok(page) = serde_json::from_slice::<SearchResultPage>(&bytes) {
                    debug!(key, "search cache hit");
                    return Ok(page);
                }
            }
        }

        let candidates = self.store.search_candidates(&query).await?;
        info!(
            candidates = candidates.len(),
            keywords = ?query.keywords,
            "search candidates fetched"
        );

        let ranked = self.ranker.rank(candidates, query.sort_mode, chrono::Utc::now());
        let offset = query.offset as usize;
        let limit = query.limit as usize;
        let posts = ranked.into_iter().skip(offset).take(limit).collect();

        let page = SearchResultPage {
            posts,
            limit: query.limit,
            offset: query.offset,
        };

        if let Some(cache) = &self.cache {
            if let Ok(bytes) = serde_json::to_vec(&page) {
                cache.set(&key, &bytes, self.cache_ttl).await;
            }
        }

        Ok(page)
    }
}
