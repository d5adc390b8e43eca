//! Glue between the command generator and the batch pipeline: parsing its
//! output and describing the policy in its prompt.

pub mod input;
pub mod prompt;

pub use input::parse_generated_commands;
pub use prompt::{allowlist_prompt, blocked_patterns_prompt};

/// Rough token count used for budgeting prompts (about four bytes per token)
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}
