//! Metrics collection and export for kinvault.
//!
//! Metric names live in per-area modules ([`vault`], [`migration`]) and are
//! recorded through the `metrics` crate facade. With the `prometheus` feature
//! the recorder renders them in Prometheus text format.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kinvault_metrics::{counter, histogram, migration};
//!
//! counter!(migration::ATTRIBUTES_MIGRATED_TOTAL, "kind" => "children").increment(3);
//! histogram!(migration::PASS_DURATION_SECONDS).record(0.042);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
