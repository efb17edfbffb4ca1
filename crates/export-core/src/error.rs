//! Error taxonomy shared by every component of the exporter.
//!
//! Two distinct error types live here. [`SerializeError`] covers the
//! per-value conditions from §4.1 — these never abort the enclosing
//! record; C1 turns them into a sentinel and hands them to the error
//! accumulator (C3). [`ExportError`] is the pipeline-level taxonomy from
//! §7 — these do abort the current kind (or the whole run) and carry an
//! exit code back out to `main`.

use thiserror::Error;

/// Whether an accumulated issue counts toward `error_summary.error_count`
/// or `error_summary.warning_count` in the metadata header (§4.7, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Per-value serialization failure (§4.1). Always recovered locally.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SerializeError {
    #[error("depth exceeded max_nested_depth")]
    DepthExceeded,
    #[error("path too long: {node_count} nodes exceeds max_path_length")]
    PathTooLong { node_count: usize },
    #[error("circular reference detected at element_id {element_id}")]
    CircularReference { element_id: String },
    #[error("failed to serialize property {key}: {cause}")]
    PropertySerializationFailed { key: String, cause: String },
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },
    #[error("non-finite float mapped to null")]
    NonFiniteFloat,
    #[error("temporal value truncated: {reason}")]
    TemporalTruncated { reason: String },
}

impl SerializeError {
    /// Stable type-name string used as half of the error-accumulator key
    /// (§4.3) — distinct from `Display`, which carries the per-instance
    /// message that varies by element_id/key.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SerializeError::DepthExceeded => "DepthExceeded",
            SerializeError::PathTooLong { .. } => "PathTooLong",
            SerializeError::CircularReference { .. } => "CircularReference",
            SerializeError::PropertySerializationFailed { .. } => "PropertySerializationFailed",
            SerializeError::InvalidValue { .. } => "InvalidValue",
            SerializeError::NonFiniteFloat => "NonFiniteFloat",
            SerializeError::TemporalTruncated { .. } => "TemporalTruncated",
        }
    }

    /// DepthExceeded/PathTooLong/PropertySerializationFailed/InvalidValue
    /// abort the offending subtree and are reported as errors;
    /// CircularReference and the two numeric/temporal coercions still
    /// produce a usable value and are reported as warnings (§9).
    pub fn severity(&self) -> Severity {
        match self {
            SerializeError::CircularReference { .. }
            | SerializeError::NonFiniteFloat
            | SerializeError::TemporalTruncated { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Pipeline-level error taxonomy (§7). `Aggregate` lets the orchestrator
/// (C8) carry forward more than one terminal failure across kinds
/// without losing any of them.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("data corruption: {0}")]
    DataCorruption(String),
    #[error("disk space error: {0}")]
    DiskSpace(String),
    #[error("memory error: {0}")]
    Memory(String),
    #[error("export error: {0}")]
    Export(String),
    #[error("filesystem error: {0}")]
    FileSystem(#[from] std::io::Error),
    #[error("security error: {0}")]
    Security(String),
    #[error("timeout error: {0}")]
    Timeout(String),
    #[error("pagination error in {entity_kind}: {cause}")]
    Pagination { entity_kind: String, cause: String },
    #[error("circuit breaker open: {0}")]
    CircuitOpen(String),
    #[error("metadata header overflow: reserved {reserved} bytes, needed at least {needed}")]
    MetadataOverflow { reserved: usize, needed: usize },
    #[error("{0} aggregate errors occurred")]
    Aggregate(Vec<ExportError>),
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Export(err.to_string())
    }
}

impl ExportError {
    /// §6 exit-code table.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExportError::Connection(_) => 2,
            ExportError::DiskSpace(_) | ExportError::Memory(_) | ExportError::FileSystem(_) => 3,
            ExportError::DataCorruption(_) | ExportError::Export(_) | ExportError::Timeout(_) => 5,
            ExportError::Configuration(_) | ExportError::Authentication(_) | ExportError::Security(_) => 6,
            ExportError::Query(_) | ExportError::Pagination { .. } => 7,
            ExportError::CircuitOpen(_) => 2,
            ExportError::MetadataOverflow { .. } => 5,
            ExportError::Aggregate(errors) => errors.iter().map(ExportError::exit_code).max().unwrap_or(6),
        }
    }

    /// Whether C4 should retry a failure classified as this kind.
    /// Service-unavailable / session-expired / transient / I/O / timeout
    /// failures are retryable (§4.4); everything else propagates at once.
    /// A breaker-open short-circuit is deliberately *not* retryable here —
    /// the breaker itself owns the re-open schedule.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExportError::Connection(_) | ExportError::Timeout(_) | ExportError::FileSystem(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_table() {
        assert_eq!(ExportError::Connection("x".into()).exit_code(), 2);
        assert_eq!(ExportError::Memory("x".into()).exit_code(), 3);
        assert_eq!(ExportError::Export("x".into()).exit_code(), 5);
        assert_eq!(ExportError::Configuration("x".into()).exit_code(), 6);
        assert_eq!(
            ExportError::Pagination { entity_kind: "Person".into(), cause: "x".into() }.exit_code(),
            7
        );
    }

    #[test]
    fn aggregate_takes_the_max_exit_code() {
        let agg = ExportError::Aggregate(vec![
            ExportError::Timeout("a".into()),
            ExportError::Configuration("b".into()),
        ]);
        assert_eq!(agg.exit_code(), 6);
    }

    #[test]
    fn retryability_matches_policy() {
        assert!(ExportError::Connection("x".into()).is_retryable());
        assert!(!ExportError::Configuration("x".into()).is_retryable());
        assert!(!ExportError::CircuitOpen("x".into()).is_retryable());
    }

    #[test]
    fn circuit_open_exits_like_connection_failure() {
        assert_eq!(ExportError::CircuitOpen("x".into()).exit_code(), 2);
    }

    #[test]
    fn serialize_error_severity_matches_design_notes() {
        assert_eq!(SerializeError::DepthExceeded.severity(), Severity::Error);
        assert_eq!(
            SerializeError::CircularReference { element_id: "n1".into() }.severity(),
            Severity::Warning
        );
        assert_eq!(SerializeError::NonFiniteFloat.severity(), Severity::Warning);
    }
}
