//! Port traits. API boundaries for the hexagon.
//!
//! Use cases depend only on these traits; adapters implement them. The
//! chat front-end is an external collaborator reached through `Store`,
//! `Scheduler`, `Enricher`, and `SearchEngine` directly — there is no
//! inbound port in this crate.

pub mod outbound;

pub use outbound::{
    CachePort, CollectedPost, CompletionResult, EnrichmentPrompt, LlmPort, Store,
    TelegramAdapter, WriteOutcome,
};
