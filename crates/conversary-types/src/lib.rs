//! Shared domain types for Conversary.
//!
//! This crate contains the core domain types used across the workspace:
//! exchanges and history windows, persisted conversation records, model
//! runtime descriptors, configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod conversation;
pub mod error;
pub mod model;
