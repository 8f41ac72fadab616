//! Input normalization and dataset ingestion for the valuation system.
//!
//! This crate handles:
//! - Coercing partially-specified client input into practice features
//! - Loading practice records from JSON and SQLite sources
//! - Dropping empty rows and de-duplicating records

pub mod normalizer;
pub mod dataset;

pub use normalizer::normalize;
pub use dataset::{
    clean_records, source_from_config, CleaningStats, DatasetSource, JsonFileSource, SqliteSource,
    StaticSource,
};
