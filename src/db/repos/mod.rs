mod polls;

pub use polls::*;
