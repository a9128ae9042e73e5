//! Infrastructure layer for Conversary.
//!
//! Implements the ports defined in `conversary-core`: SQLite repositories,
//! the configuration and template loaders, and the local inference engines
//! (GGUF model store, managed `llama-server`, optional in-process llama.cpp).

pub mod config;
pub mod llm;
pub mod sqlite;
pub mod templates;
