//! Core types and configuration for the practice valuation system.
//!
//! This crate provides shared types used across all other crates:
//! - Province codes and practice input/feature types
//! - Benchmark rows and valuation results
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
