//! In-memory `GraphSource` test double. The real Bolt-protocol driver is
//! out of scope (§1) — every test in this workspace that needs "a
//! database" uses this instead.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use export_core::{ExportError, Node, Relationship};

use crate::graph_source::{GraphSource, NodePage, RelationshipPage, SchemaSnapshot};

pub struct FakeGraphSource {
    nodes_by_label: HashMap<String, Vec<Node>>,
    relationships_by_type: HashMap<String, Vec<Relationship>>,
    supports_keyset: bool,
    /// If set, every fetch call whose 0-based call index is >= this value
    /// fails with a retryable `Connection` error.
    fail_from_call: Option<usize>,
    call_count: Mutex<usize>,
}

impl FakeGraphSource {
    /// A source with no labels and no relationship types at all — the
    /// "Empty DB" scenario (§8): a valid export with only the header.
    pub fn empty() -> Self {
        Self {
            nodes_by_label: HashMap::new(),
            relationships_by_type: HashMap::new(),
            supports_keyset: true,
            fail_from_call: None,
            call_count: Mutex::new(0),
        }
    }

    pub fn with_nodes(label: impl Into<String>, nodes: Vec<Node>) -> Self {
        let mut map = HashMap::new();
        map.insert(label.into(), nodes);
        Self {
            nodes_by_label: map,
            relationships_by_type: HashMap::new(),
            supports_keyset: true,
            fail_from_call: None,
            call_count: Mutex::new(0),
        }
    }

    pub fn with_relationships(rel_type: impl Into<String>, relationships: Vec<Relationship>) -> Self {
        let mut map = HashMap::new();
        map.insert(rel_type.into(), relationships);
        Self {
            nodes_by_label: HashMap::new(),
            relationships_by_type: map,
            supports_keyset: true,
            fail_from_call: None,
            call_count: Mutex::new(0),
        }
    }

    /// Adds another label's nodes to a source under construction, so a
    /// single fixture can carry more than one label (or nodes alongside
    /// relationships) — `with_nodes`/`with_relationships` alone can only
    /// populate one map each.
    pub fn and_nodes(mut self, label: impl Into<String>, nodes: Vec<Node>) -> Self {
        self.nodes_by_label.insert(label.into(), nodes);
        self
    }

    pub fn and_relationships(mut self, rel_type: impl Into<String>, relationships: Vec<Relationship>) -> Self {
        self.relationships_by_type.insert(rel_type.into(), relationships);
        self
    }

    pub fn without_keyset_support(mut self) -> Self {
        self.supports_keyset = false;
        self
    }

    pub fn failing_after(mut self, successful_calls: usize) -> Self {
        self.fail_from_call = Some(successful_calls);
        self
    }

    fn next_call_should_fail(&self) -> bool {
        let mut count = self.call_count.lock().expect("call_count mutex poisoned");
        let index = *count;
        *count += 1;
        matches!(self.fail_from_call, Some(threshold) if index >= threshold)
    }

    fn labels_sorted(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.nodes_by_label.keys().cloned().collect();
        labels.sort();
        labels
    }

    fn types_sorted(&self) -> Vec<String> {
        let mut types: Vec<String> = self.relationships_by_type.keys().cloned().collect();
        types.sort();
        types
    }
}

#[async_trait]
impl GraphSource for FakeGraphSource {
    async fn preflight(&self) -> Result<(), ExportError> {
        if self.next_call_should_fail() {
            return Err(ExportError::Connection("fake source: preflight failure injected".into()));
        }
        Ok(())
    }

    async fn supports_keyset_pagination(&self) -> Result<bool, ExportError> {
        Ok(self.supports_keyset)
    }

    async fn schema_snapshot(&self) -> Result<SchemaSnapshot, ExportError> {
        Ok(SchemaSnapshot {
            labels: self.labels_sorted(),
            relationship_types: self.types_sorted(),
            node_count: self.nodes_by_label.values().map(|v| v.len() as u64).sum(),
            relationship_count: self.relationships_by_type.values().map(|v| v.len() as u64).sum(),
            database_name: "fake".into(),
            database_version: "5.0".into(),
            database_edition: "test".into(),
        })
    }

    async fn fetch_nodes_keyset(&self, label: &str, after_key: Option<&str>, batch_size: usize) -> Result<NodePage, ExportError> {
        if self.next_call_should_fail() {
            return Err(ExportError::Connection("fake source: fetch_nodes_keyset failure injected".into()));
        }
        let all = self.nodes_by_label.get(label).cloned().unwrap_or_default();
        let start = match after_key {
            None => 0,
            Some(key) => all.iter().position(|n| n.element_id == key).map(|i| i + 1).unwrap_or(all.len()),
        };
        let page: Vec<Node> = all.into_iter().skip(start).take(batch_size).collect();
        let last_key = page.last().map(|n| n.element_id.clone());
        Ok(NodePage { nodes: page, last_key })
    }

    async fn fetch_nodes_skip(&self, label: &str, skip: usize, batch_size: usize) -> Result<NodePage, ExportError> {
        if self.next_call_should_fail() {
            return Err(ExportError::Connection("fake source: fetch_nodes_skip failure injected".into()));
        }
        let all = self.nodes_by_label.get(label).cloned().unwrap_or_default();
        let page: Vec<Node> = all.into_iter().skip(skip).take(batch_size).collect();
        Ok(NodePage { nodes: page, last_key: None })
    }

    async fn fetch_relationships_keyset(
        &self,
        rel_type: &str,
        after_key: Option<&str>,
        batch_size: usize,
    ) -> Result<RelationshipPage, ExportError> {
        if self.next_call_should_fail() {
            return Err(ExportError::Connection("fake source: fetch_relationships_keyset failure injected".into()));
        }
        let all = self.relationships_by_type.get(rel_type).cloned().unwrap_or_default();
        let start = match after_key {
            None => 0,
            Some(key) => all.iter().position(|r| r.element_id == key).map(|i| i + 1).unwrap_or(all.len()),
        };
        let page: Vec<Relationship> = all.into_iter().skip(start).take(batch_size).collect();
        let last_key = page.last().map(|r| r.element_id.clone());
        Ok(RelationshipPage { relationships: page, last_key })
    }

    async fn fetch_relationships_skip(
        &self,
        rel_type: &str,
        skip: usize,
        batch_size: usize,
    ) -> Result<RelationshipPage, ExportError> {
        if self.next_call_should_fail() {
            return Err(ExportError::Connection("fake source: fetch_relationships_skip failure injected".into()));
        }
        let all = self.relationships_by_type.get(rel_type).cloned().unwrap_or_default();
        let page: Vec<Relationship> = all.into_iter().skip(skip).take(batch_size).collect();
        Ok(RelationshipPage { relationships: page, last_key: None })
    }
}
