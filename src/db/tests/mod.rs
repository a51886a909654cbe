//! Shared database repository test infrastructure
//!
//! Each repository has a test module (e.g., `polls.rs`) containing:
//! - Shared test functions that take `&dyn XxxRepo` and the manual clock
//! - SQLite-specific setup using in-memory databases
//!
//! Time never moves on its own in these tests; advance the clock from the
//! harness to cross expiry and grace boundaries.
