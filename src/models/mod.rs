mod poll;
mod validators;

pub use poll::*;
pub use validators::*;
