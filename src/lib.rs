//! Library facade over the export pipeline, so integration tests under
//! `tests/` can drive [`Orchestrator`] against a fake `GraphSource`
//! without going through the `graph-export` binary — mirrors the
//! teacher's `bpmn-lite-server` split, where `grpc.rs` is a thin
//! transport wrapper over logic the tests exercise directly.

pub mod cli;
pub mod config;
pub mod orchestrator;

pub use config::ExportConfig;
pub use orchestrator::{ExportOutcome, Orchestrator};
