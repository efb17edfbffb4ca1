//! Pagination driver (§4.5, C5): keyset (preferred) or skip/limit, chosen
//! once per entity kind at the start of that kind's traversal.

use std::time::{Duration, Instant};

use export_core::{ExportError, Node, Relationship};

use crate::graph_source::GraphSource;
use crate::retry::RetryExecutor;

/// Constant-memory cursor (§4.5 guarantee iv): either an integer skip or a
/// single last-seen key string.
#[derive(Debug, Clone, PartialEq)]
pub enum Cursor {
    Keyset(Option<String>),
    Skip(usize),
}

/// One batch fetch's outcome, reported back to the orchestrator so it can
/// advance counters (C9) and detect exhaustion.
pub struct NodeBatch {
    pub nodes: Vec<Node>,
    pub duration: Duration,
}

pub struct RelationshipBatch {
    pub relationships: Vec<Relationship>,
    pub duration: Duration,
}

/// Drives pagination for exactly one entity kind (one label, or one
/// relationship type) for its full lifetime. Every fetch goes through the
/// shared [`RetryExecutor`] so C4 wraps it uniformly.
pub struct Paginator<'a> {
    source: &'a dyn GraphSource,
    retry: &'a RetryExecutor,
    batch_size: usize,
    use_keyset: bool,
    cursor: Cursor,
    /// Every 10th batch's duration is retained for trend analysis (§4.5),
    /// published in the header's `pagination_performance`.
    batch_index: u64,
    retained_samples: Vec<Duration>,
}

impl<'a> Paginator<'a> {
    pub fn new(source: &'a dyn GraphSource, retry: &'a RetryExecutor, batch_size: usize, use_keyset: bool) -> Self {
        let cursor = if use_keyset { Cursor::Keyset(None) } else { Cursor::Skip(0) };
        Self { source, retry, batch_size, use_keyset, cursor, batch_index: 0, retained_samples: Vec::new() }
    }

    pub fn retained_samples(&self) -> &[Duration] {
        &self.retained_samples
    }

    fn record_batch_timing(&mut self, duration: Duration) {
        self.batch_index += 1;
        if self.batch_index % 10 == 0 {
            self.retained_samples.push(duration);
        }
    }

    /// Fetch the next node batch for `label`. Returns `Ok(None)` once the
    /// kind is exhausted (an empty batch); `Err` surfaces a post-retry
    /// database failure as a [`ExportError::Pagination`] the caller can
    /// turn into a kind-terminating event while keeping already-emitted
    /// records (§4.5 failure semantics).
    pub async fn next_node_batch(&mut self, label: &str) -> Result<Option<NodeBatch>, ExportError> {
        let started = Instant::now();
        let page = match &self.cursor {
            Cursor::Keyset(after) => {
                let after = after.clone();
                self.retry
                    .call("fetch_nodes_keyset", || self.source.fetch_nodes_keyset(label, after.as_deref(), self.batch_size))
                    .await
                    .map_err(|cause| ExportError::Pagination { entity_kind: label.to_string(), cause: cause.to_string() })?
            }
            Cursor::Skip(skip) => {
                let skip = *skip;
                self.retry
                    .call("fetch_nodes_skip", || self.source.fetch_nodes_skip(label, skip, self.batch_size))
                    .await
                    .map_err(|cause| ExportError::Pagination { entity_kind: label.to_string(), cause: cause.to_string() })?
            }
        };
        let duration = started.elapsed();
        self.record_batch_timing(duration);

        if page.nodes.is_empty() {
            return Ok(None);
        }

        match &mut self.cursor {
            Cursor::Keyset(after) => *after = page.last_key.clone().or_else(|| page.nodes.last().map(|n| n.element_id.clone())),
            Cursor::Skip(skip) => *skip += page.nodes.len(),
        }

        Ok(Some(NodeBatch { nodes: page.nodes, duration }))
    }

    pub async fn next_relationship_batch(&mut self, rel_type: &str) -> Result<Option<RelationshipBatch>, ExportError> {
        let started = Instant::now();
        let page = match &self.cursor {
            Cursor::Keyset(after) => {
                let after = after.clone();
                self.retry
                    .call("fetch_relationships_keyset", || self.source.fetch_relationships_keyset(rel_type, after.as_deref(), self.batch_size))
                    .await
                    .map_err(|cause| ExportError::Pagination { entity_kind: rel_type.to_string(), cause: cause.to_string() })?
            }
            Cursor::Skip(skip) => {
                let skip = *skip;
                self.retry
                    .call("fetch_relationships_skip", || self.source.fetch_relationships_skip(rel_type, skip, self.batch_size))
                    .await
                    .map_err(|cause| ExportError::Pagination { entity_kind: rel_type.to_string(), cause: cause.to_string() })?
            }
        };
        let duration = started.elapsed();
        self.record_batch_timing(duration);

        if page.relationships.is_empty() {
            return Ok(None);
        }

        match &mut self.cursor {
            Cursor::Keyset(after) => {
                *after = page.last_key.clone().or_else(|| page.relationships.last().map(|r| r.element_id.clone()))
            }
            Cursor::Skip(skip) => *skip += page.relationships.len(),
        }

        Ok(Some(RelationshipBatch { relationships: page.relationships, duration }))
    }

    pub fn is_keyset(&self) -> bool {
        self.use_keyset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_source::FakeGraphSource;
    use crate::retry::RetryPolicy;
    use export_core::PropertyMap;
    use std::collections::HashSet;

    fn retry() -> RetryExecutor {
        RetryExecutor::new(RetryPolicy { max_retries: 1, retry_delay_ms: 1, max_retry_delay_ms: 2 }, 100, Duration::from_millis(1))
    }

    fn make_nodes(n: usize) -> Vec<Node> {
        (0..n).map(|i| Node::new(format!("n{i:04}"), vec!["Person".into()], PropertyMap::new())).collect()
    }

    #[tokio::test]
    async fn keyset_pagination_yields_all_nodes_without_duplicates() {
        let source = FakeGraphSource::with_nodes("Person", make_nodes(25));
        let retry = retry();
        let mut paginator = Paginator::new(&source, &retry, 7, true);
        let mut seen = HashSet::new();
        let mut total = 0;
        while let Some(batch) = paginator.next_node_batch("Person").await.unwrap() {
            assert!(!batch.nodes.is_empty(), "progress guarantee: a returned batch is never empty");
            for node in &batch.nodes {
                assert!(seen.insert(node.element_id.clone()), "no duplicates within a kind");
            }
            total += batch.nodes.len();
        }
        assert_eq!(total, 25);
        assert_eq!(seen.len(), 25);
    }

    #[tokio::test]
    async fn skip_limit_pagination_yields_all_nodes_without_duplicates() {
        let source = FakeGraphSource::with_nodes("Person", make_nodes(23));
        let retry = retry();
        let mut paginator = Paginator::new(&source, &retry, 5, false);
        let mut seen = HashSet::new();
        let mut total = 0;
        while let Some(batch) = paginator.next_node_batch("Person").await.unwrap() {
            for node in &batch.nodes {
                assert!(seen.insert(node.element_id.clone()));
            }
            total += batch.nodes.len();
        }
        assert_eq!(total, 23);
    }

    #[tokio::test]
    async fn empty_source_exhausts_on_first_batch() {
        let source = FakeGraphSource::with_nodes("Person", vec![]);
        let retry = retry();
        let mut paginator = Paginator::new(&source, &retry, 10, true);
        assert!(paginator.next_node_batch("Person").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn batch_failure_surfaces_as_pagination_error() {
        let source = FakeGraphSource::with_nodes("Person", make_nodes(5)).failing_after(0);
        let retry = RetryExecutor::new(RetryPolicy { max_retries: 0, retry_delay_ms: 1, max_retry_delay_ms: 1 }, 100, Duration::from_millis(1));
        let mut paginator = Paginator::new(&source, &retry, 10, true);
        let result = paginator.next_node_batch("Person").await;
        assert!(matches!(result, Err(ExportError::Pagination { .. })));
    }

    #[tokio::test]
    async fn every_tenth_batch_duration_is_retained() {
        let source = FakeGraphSource::with_nodes("Person", make_nodes(100));
        let retry = retry();
        let mut paginator = Paginator::new(&source, &retry, 10, true);
        while paginator.next_node_batch("Person").await.unwrap().is_some() {}
        assert_eq!(paginator.retained_samples().len(), 1);
    }
}
