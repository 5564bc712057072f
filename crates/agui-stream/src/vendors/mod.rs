//! Completion sources for concrete backends.
pub mod openai;
