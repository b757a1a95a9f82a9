//! Token counter implementation
//!
//! Uses tiktoken-rs with the cl100k_base encoding for token counting.

use once_cell::sync::Lazy;
use tiktoken_rs::{cl100k_base, CoreBPE};

use crate::openai::Usage;

static ENCODER: Lazy<CoreBPE> =
    Lazy::new(|| cl100k_base().expect("cl100k_base encoder is bundled"));

/// Count tokens in a text string
pub fn count_tokens(text: &str) -> usize {
    ENCODER.encode_with_special_tokens(text).len()
}

/// Derive a usage triple from the assembled completion text and the spent
/// amount reported by the upstream.
///
/// The upstream reports a single spent total; prompt and completion tokens
/// are both derived as `spent - tokens(completion_text)` and can go negative.
pub fn estimate_usage(completion_text: &str, spent: i64) -> Usage {
    let completion_tokens = count_tokens(completion_text) as i64;
    Usage {
        prompt_tokens: spent - completion_tokens,
        completion_tokens: spent - completion_tokens,
        total_tokens: spent,
    }
}
