//! Observability module providing logging and metrics.
//!
//! This module initializes and configures:
//! - Structured logging with configurable formats (pretty, compact, JSON)
//! - Counters for lifecycle transitions and admin actions (`prometheus` feature)

pub mod metrics;
mod tracing_init;

pub use tracing_init::*;
