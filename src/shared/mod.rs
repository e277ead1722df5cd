//! Cross-cutting concerns: configuration, logging setup.

pub mod config;

pub use config::AppConfig;
