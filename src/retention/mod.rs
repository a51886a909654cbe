//! Poll retention: the cleanup sweep and its optional in-process worker.
//!
//! A sweep runs in two phases:
//! 1. Expired polls are soft-deleted (or purged outright with `force_expired`)
//! 2. Soft-deleted polls past their grace period are purged with their
//!    choices and votes
//!
//! Both phases support dry-run mode, and every transition is committed on its
//! own so a sweep can be cancelled or fail part-way without corrupting state.

mod sweep;
mod worker;

pub use sweep::{CleanupSweep, ExpiringPoll, SweepError, SweepOptions, SweepReport};
pub use worker::start_cleanup_worker;
