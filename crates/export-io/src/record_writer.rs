//! Per-record JSONL line composer (§4.6, C6).
//!
//! One call ↔ one record ↔ one line. The writer itself never holds more
//! than one record's serialized bytes at a time, matching the teacher's
//! preference for streaming writers over building an in-memory buffer of
//! the whole file.

use std::collections::BTreeSet;

use export_core::{ExportError, Node, Relationship, SerializeIssue, SerializerLimits};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::coordinator::LineCoordinator;

/// Running per-kind and aggregate counters the record writer updates as
/// it goes; read by C7 at rewrite time and by C9 for progress reporting.
#[derive(Debug, Default, Clone)]
pub struct WriterStats {
    pub node_count: u64,
    pub relationship_count: u64,
    pub bytes_written: u64,
}

/// Composes one JSONL data line per call. Generic over the sink so the
/// same writer drives both the real output file and an in-memory buffer
/// in tests, mirroring the teacher's `AsyncWrite`-generic writer helpers.
pub struct RecordWriter<W> {
    sink: W,
    coordinator: LineCoordinator,
    stats: WriterStats,
    seen_kinds: BTreeSet<String>,
    wrote_first_record: bool,
    validate: bool,
}

impl<W: AsyncWrite + Unpin> RecordWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            coordinator: LineCoordinator::new(),
            stats: WriterStats::default(),
            seen_kinds: BTreeSet::new(),
            wrote_first_record: false,
            validate: false,
        }
    }

    /// Enables `validate_json_output` (§6): re-parses every serialized
    /// record before it is written, surfacing a malformed record as a
    /// `DataCorruption` error instead of writing it silently.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    pub fn coordinator(&self) -> &LineCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut LineCoordinator {
        &mut self.coordinator
    }

    /// Writes one node record, returning whatever serialization issues C1
    /// raised so the caller can route them into the error accumulator
    /// without re-serializing the record to inspect them. `kind` is the
    /// node's primary label, used only for `RecordTypeStartLines`
    /// bookkeeping — it does not affect the serialized record shape.
    pub async fn write_node(
        &mut self,
        node: &Node,
        kind: &str,
        limits: &SerializerLimits,
        enable_hashed_ids: bool,
        export_run_id: &str,
    ) -> Result<Vec<SerializeIssue>, ExportError> {
        let (value, issues) = export_core::serialize_node_record(node, limits, enable_hashed_ids, export_run_id);
        self.write_line(kind, &value).await?;
        self.stats.node_count += 1;
        Ok(issues)
    }

    pub async fn write_relationship(
        &mut self,
        rel: &Relationship,
        kind: &str,
        limits: &SerializerLimits,
        enable_hashed_ids: bool,
        export_run_id: &str,
    ) -> Result<Vec<SerializeIssue>, ExportError> {
        let (value, issues) = export_core::serialize_relationship_record(rel, limits, enable_hashed_ids, export_run_id);
        self.write_line(kind, &value).await?;
        self.stats.relationship_count += 1;
        Ok(issues)
    }

    /// Writes a pre-serialized error/warning record (from C3 via C10).
    /// `error`/`warning` are record kinds in their own right (§6) but are
    /// never the subject of `RecordTypeStartLines` bookkeeping, which
    /// exists to let a reader jump straight to a given label/type's first
    /// node or relationship record.
    pub async fn write_error_record(&mut self, value: serde_json::Value) -> Result<(), ExportError> {
        self.write_line_raw(&value).await
    }

    async fn write_line(&mut self, kind: &str, value: &serde_json::Value) -> Result<(), ExportError> {
        if self.seen_kinds.insert(kind.to_string()) {
            self.coordinator.note_first_occurrence(kind);
        }
        self.write_line_raw(value).await
    }

    async fn write_line_raw(&mut self, value: &serde_json::Value) -> Result<(), ExportError> {
        let mut line = serde_json::to_vec(value)?;
        if self.validate {
            serde_json::from_slice::<serde_json::Value>(&line)
                .map_err(|e| ExportError::DataCorruption(format!("record failed re-parse validation: {e}")))?;
        }
        if self.wrote_first_record {
            self.sink.write_all(b"\n").await?;
            self.stats.bytes_written += 1;
        }
        self.wrote_first_record = true;
        self.stats.bytes_written += line.len() as u64;
        line.shrink_to_fit();
        self.sink.write_all(&line).await?;
        self.coordinator.advance();
        Ok(())
    }

    /// Terminates the file with the trailing LF (§6: "the final line has
    /// a trailing LF"), added once here at the C8/flush level, never
    /// per-record.
    pub async fn finish(mut self) -> Result<W, ExportError> {
        if self.wrote_first_record {
            self.sink.write_all(b"\n").await?;
        }
        self.sink.flush().await?;
        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use export_core::PropertyMap;

    #[tokio::test]
    async fn newline_is_between_records_never_leading() {
        let buf = Vec::new();
        let mut writer = RecordWriter::new(buf);
        let n1 = Node::new("n1", vec!["Person".into()], PropertyMap::new());
        let n2 = Node::new("n2", vec!["Person".into()], PropertyMap::new());
        writer.write_node(&n1, "Person", &SerializerLimits::default(), false, "run-1").await.unwrap();
        writer.write_node(&n2, "Person", &SerializerLimits::default(), false, "run-1").await.unwrap();
        let out = writer.finish().await.unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(!text.starts_with('\n'));
        assert!(text.ends_with('\n'));
    }

    #[tokio::test]
    async fn line_counter_advances_once_per_record() {
        let buf = Vec::new();
        let mut writer = RecordWriter::new(buf);
        let n = Node::new("n1", vec!["Person".into()], PropertyMap::new());
        writer.write_node(&n, "Person", &SerializerLimits::default(), false, "run-1").await.unwrap();
        assert_eq!(writer.coordinator().current_line(), 2);
        writer.write_node(&n, "Person", &SerializerLimits::default(), false, "run-1").await.unwrap();
        assert_eq!(writer.coordinator().current_line(), 3);
    }

    #[tokio::test]
    async fn start_line_recorded_on_first_record_of_each_kind() {
        let buf = Vec::new();
        let mut writer = RecordWriter::new(buf);
        let person = Node::new("n1", vec!["Person".into()], PropertyMap::new());
        let company = Node::new("n2", vec!["Company".into()], PropertyMap::new());
        writer.write_node(&person, "Person", &SerializerLimits::default(), false, "run-1").await.unwrap();
        writer.write_node(&company, "Company", &SerializerLimits::default(), false, "run-1").await.unwrap();
        let starts = writer.coordinator().record_type_start_lines();
        assert_eq!(starts.get("Person"), Some(&2));
        assert_eq!(starts.get("Company"), Some(&3));
    }

    #[tokio::test]
    async fn stats_track_node_and_relationship_counts_separately() {
        let buf = Vec::new();
        let mut writer = RecordWriter::new(buf);
        let n = Node::new("n1", vec!["Person".into()], PropertyMap::new());
        let rel = Relationship::new("r1", "KNOWS", "n1", "n1", PropertyMap::new()).unwrap();
        writer.write_node(&n, "Person", &SerializerLimits::default(), false, "run-1").await.unwrap();
        writer.write_relationship(&rel, "KNOWS", &SerializerLimits::default(), false, "run-1").await.unwrap();
        assert_eq!(writer.stats().node_count, 1);
        assert_eq!(writer.stats().relationship_count, 1);
    }
}
