//! Business logic and port definitions for Conversary.
//!
//! This crate owns the response pipeline (prompt rendering, the model
//! runtime, output sanitizing) and defines the "ports" the infrastructure
//! layer implements: inference backends and repositories. It depends only on
//! `conversary-types` -- never on `conversary-infra` or any database/IO crate.

pub mod conversation;
pub mod pipeline;
pub mod prompt;
pub mod runtime;
pub mod sanitizer;
pub mod summary;

#[cfg(test)]
pub(crate) mod testing;
