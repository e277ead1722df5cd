//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;

pub use entities::{
    BatchReport, Category, Channel, ChannelHealth, ChannelHealthStatus, ChannelInfo,
    CollectionError, CollectionReport, CollectionStatus, Entities, EngagementSnapshot,
    EnrichmentOutcome, FetchBatch, FetchedMedia, FetchedMessage, ForwardOrigin, LlmUsageEntry,
    ManualTarget, MediaKind, MicroUsd, Post, PostContent, PostEnrichment, PostMedia, RankedPost,
    ReactionCount, ReactionWeights, ResolveOutcome, SavedTopic, SchedulerReport, SearchQuery,
    SearchResultPage, Sentiment, SkipReason, SortMode, relative_engagement,
};
pub use errors::DomainError;
