//! tnse: collection, enrichment, and hybrid search pipeline for curated
//! Telegram channels, built with Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
pub mod wiring;
