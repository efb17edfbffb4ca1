//! `GraphSource` — the port trait through which C4/C5 reach the
//! (out-of-scope, §1) database driver.
//!
//! Mirrors the teacher's `SnapshotStore`/`ObjectStore` port-trait pattern
//! (`sem_os_core::ports`): core logic depends only on this trait, never on
//! a concrete Bolt/driver crate, so it is exercised in tests against
//! `FakeGraphSource` without a real database.

use async_trait::async_trait;
use export_core::{ExportError, Node, Relationship};

/// Schema snapshot collected once by the orchestrator's preflight step
/// (§4.8) and consumed by C7 (header `database_schema`/`database_statistics`)
/// and C5 (keyset-vs-skip/limit selection per entity kind).
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSnapshot {
    pub labels: Vec<String>,
    pub relationship_types: Vec<String>,
    pub node_count: u64,
    pub relationship_count: u64,
    pub database_name: String,
    pub database_version: String,
    pub database_edition: String,
}

/// One page of nodes or relationships, plus the keyset cursor value to
/// carry forward (the last-seen ordering key) when keyset pagination is
/// in use. `None` for skip/limit pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePage {
    pub nodes: Vec<Node>,
    pub last_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipPage {
    pub relationships: Vec<Relationship>,
    pub last_key: Option<String>,
}

/// The minimal interface C5 (pagination) and C4 (retry/breaker) need from
/// a property-graph database. Every method is one suspendable database
/// call (§5) and is exactly the unit C4 wraps.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Connect + version query (§4.8 step a). Also used to decide whether
    /// keyset pagination is available (§4.5: "advertises stable identifier
    /// ordering, version >= 5").
    async fn preflight(&self) -> Result<(), ExportError>;

    /// Whether the source advertises stable identifier ordering, making
    /// keyset pagination safe to use for every entity kind.
    async fn supports_keyset_pagination(&self) -> Result<bool, ExportError>;

    async fn schema_snapshot(&self) -> Result<SchemaSnapshot, ExportError>;

    async fn fetch_nodes_keyset(
        &self,
        label: &str,
        after_key: Option<&str>,
        batch_size: usize,
    ) -> Result<NodePage, ExportError>;

    async fn fetch_nodes_skip(&self, label: &str, skip: usize, batch_size: usize) -> Result<NodePage, ExportError>;

    async fn fetch_relationships_keyset(
        &self,
        rel_type: &str,
        after_key: Option<&str>,
        batch_size: usize,
    ) -> Result<RelationshipPage, ExportError>;

    async fn fetch_relationships_skip(
        &self,
        rel_type: &str,
        skip: usize,
        batch_size: usize,
    ) -> Result<RelationshipPage, ExportError>;
}
