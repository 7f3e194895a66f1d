//! Foundational types for the request workflow engine.
//!
//! Flow definitions (`graph`, `config`) are authored by the visual designer
//! and travel as JSON documents attached to a request type, so they keep
//! the designer's camelCase wire names. Persisted records (`records`) are
//! owned by the [`WorkflowStore`](crate::traits::WorkflowStore).
//!
//! Map fields use `BTreeMap` (or `serde_json::Map`, which is ordered) so
//! serialization is deterministic.

pub mod config;
pub mod graph;
pub mod records;

pub use config::*;
pub use graph::*;
pub use records::*;
