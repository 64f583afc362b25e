//! Configuration and text utilities.

/// Character-budget helpers for previews, prompts and file names.
pub mod text;
/// TOML configuration (`healthscope.toml`).
pub mod toml_config;
