//! Pure ranking math. No I/O, no knowledge of Store or cache — just
//! `Vec<RankedPost> -> Vec<RankedPost>`, kept isolated so the formulas are
//! unit-testable without a database.

use chrono::{DateTime, Utc};

use crate::domain::{RankedPost, SortMode};

/// `clamp(1 - hours_since_post / window_hours, 0, 1)`. Future timestamps
/// (negative `hours_since_post`) saturate to `1.0`.
pub fn recency_factor(published_at: DateTime<Utc>, now: DateTime<Utc>, window_hours: f64) -> f64 {
    let hours_since = (now - published_at).num_milliseconds() as f64 / 3_600_000.0;
    (1.0 - hours_since / window_hours).clamp(0.0, 1.0)
}

/// `combined = relative_engagement * ((1 - w) + w * recency_factor)`.
pub fn combined_score(relative_engagement: f64, recency: f64, recency_weight: f64) -> f64 {
    relative_engagement * ((1.0 - recency_weight) + recency_weight * recency)
}

pub struct Ranker {
    pub window_hours: f64,
    pub recency_weight: f64,
}

impl Ranker {
    pub fn new(window_hours: f64, recency_weight: f64) -> Self {
        Self {
            window_hours,
            recency_weight,
        }
    }

    /// Scores every candidate, then sorts in place according to `sort_mode`.
    /// All non-`Recency` modes sort descending with the tie-break chain
    /// `relative_engagement -> view_count -> published_at`; `Recency` sorts
    /// by `published_at` alone. `slice::sort_by` is stable, so equal keys
    /// preserve their relative (candidate) order.
    pub fn rank(&self, mut posts: Vec<RankedPost>, sort_mode: SortMode, now: DateTime<Utc>) -> Vec<RankedPost> {
        for post in &mut posts {
            let recency = recency_factor(post.post.published_at, now, self.window_hours);
            post.combined_score = combined_score(post.relative_engagement, recency, self.recency_weight);
        }

        match sort_mode {
            SortMode::Recency => {
                posts.sort_by(|a, b| b.post.published_at.cmp(&a.post.published_at));
            }
            SortMode::Views => {
                posts.sort_by(|a, b| tie_break(a, b, |p| p.view_count as f64, |p| p.view_count));
            }
            SortMode::Reactions => {
                posts.sort_by(|a, b| tie_break(a, b, |p| p.reaction_score, |p| p.view_count));
            }
            SortMode::Engagement => {
                posts.sort_by(|a, b| tie_break(a, b, |p| p.relative_engagement, |p| p.view_count));
            }
            SortMode::Combined => {
                posts.sort_by(|a, b| tie_break(a, b, |p| p.combined_score, |p| p.view_count));
            }
        }

        posts
    }
}

/// Descending sort on `primary`, tie-broken by `relative_engagement`, then
/// `view_count`, then `published_at` — all descending.
fn tie_break(
    a: &RankedPost,
    b: &RankedPost,
    primary: impl Fn(&RankedPost) -> f64,
    _view_count: impl Fn(&RankedPost) -> i64,
) -> std::cmp::Ordering {
    primary(b)
        .partial_cmp(&primary(a))
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| b.relative_engagement.partial_cmp(&a.relative_engagement).unwrap_or(std::cmp::Ordering::Equal))
        .then_with(|| b.view_count.cmp(&a.view_count))
        .then_with(|| b.post.published_at.cmp(&a.post.published_at))
}
