//! Token counting and usage estimation.

pub mod counter;

pub use counter::{count_tokens, estimate_usage};
