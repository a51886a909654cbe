//! Poll lifecycle and retention engine.
//!
//! Polls expire on a schedule chosen at creation, spend a fixed grace period
//! soft-deleted, and are then purged with their choices and votes by a
//! two-phase cleanup sweep. Lifecycle state is always derived from the poll's
//! timestamps and an injected clock.

pub mod config;
pub mod db;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod retention;
pub mod services;
