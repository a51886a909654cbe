mod common;
mod polls;

pub use polls::SqlitePollRepo;
