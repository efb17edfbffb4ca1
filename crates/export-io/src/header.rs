//! Fixed-size line-1 metadata header (§4.7, C7).
//!
//! The header is written twice: once as a provisional reservation before
//! any data record is emitted, once as a final rewrite after the body is
//! complete. Both phases go through [`render_padded`] so the byte
//! arithmetic lives in exactly one place.

use std::collections::BTreeMap;

use export_core::ExportError;
use serde::Serialize;
use serde_json::Value;

/// Reservation buckets from §4.7/§9 Open Question 2: the smallest bucket
/// that is still comfortably larger than any real phase-2 payload for a
/// schema of ordinary size. `estimate_header_size` picks among these (and
/// their 32768-multiples beyond the third) rather than reserving exactly
/// what phase 1 measures, because phase 2 adds fields phase 1 doesn't
/// have yet (error_summary, pagination_performance, export_manifest,
/// record_type_start_lines).
const RESERVATION_BUCKETS: [usize; 3] = [16384, 32768, 65536];

/// Literal length of `,"padding":""` — the wrapper inserted around the
/// padding run. Computed once here rather than re-derived at each call
/// site, since the literal itself is what must stay in sync with
/// [`render_padded`]'s actual field name.
const PADDING_WRAPPER: &str = ",\"padding\":\"\"";

/// Total fixed overhead `render_padded` adds on top of `base_len`, not
/// counting the padding spaces themselves or the trailing `\n`: the
/// wrapper field plus the object's closing `}` that was stripped off
/// `base` before this function saw it (§4.7: "constant length of the
/// inserted `,"padding":""` wrapper (14 bytes)").
const PADDING_OVERHEAD: usize = PADDING_WRAPPER.len() + 1;

#[derive(Debug, Clone, Serialize)]
pub struct ProducerIdentity {
    pub name: String,
    pub version: String,
    pub binary_checksum: String,
    pub runtime: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSystem {
    pub database_name: String,
    pub database_version: String,
    pub database_edition: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DatabaseStatistics {
    pub node_count: u64,
    pub relationship_count: u64,
    pub label_count: u64,
    pub relationship_type_count: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DatabaseSchema {
    pub labels: Vec<String>,
    pub relationship_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Environment {
    pub host: String,
    pub os: String,
    pub user: String,
    pub runtime: String,
    pub cpu_count: usize,
    pub memory_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityFlags {
    pub encryption_enabled: bool,
    pub auth_method: String,
    pub validation_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Compatibility {
    pub min_reader_version: String,
    pub breaking_change_version: String,
    pub deprecated_fields: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorSummary {
    pub error_count: u64,
    pub warning_count: u64,
    pub has_errors: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PaginationPerformance {
    /// Every-10th-batch sample durations, in milliseconds, keyed by kind.
    pub batch_duration_samples_ms: BTreeMap<String, Vec<u64>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportManifest {
    pub nodes_exported: u64,
    pub relationships_exported: u64,
    pub duration_ms: u64,
    pub completed: bool,
}

pub const SUPPORTED_RECORD_TYPES: [&str; 4] = ["node", "relationship", "error", "warning"];

/// Everything §4.7 lists. Phase 1 fills identity/schema/environment/
/// security fields; phase 2 additionally fills `record_type_start_lines`,
/// `error_summary`, `pagination_performance`, `export_manifest`.
#[derive(Debug, Clone, Serialize)]
pub struct MetadataHeader {
    pub format_version: String,
    pub export_id: String,
    pub export_timestamp: String,
    pub producer: ProducerIdentity,
    pub source_system: SourceSystem,
    pub database_statistics: DatabaseStatistics,
    pub database_schema: DatabaseSchema,
    pub environment: Environment,
    pub security: SecurityFlags,
    pub supported_record_types: Vec<&'static str>,
    pub compatibility: Compatibility,
    pub compression: Option<String>,
    pub record_type_start_lines: BTreeMap<String, u64>,
    pub error_summary: ErrorSummary,
    pub pagination_performance: PaginationPerformance,
    pub export_manifest: ExportManifest,
}

impl MetadataHeader {
    /// Computes the smallest reservation bucket ≥ the estimated phase-2
    /// payload size, per §9 Open Question 2's heuristic: `provisional_len
    /// + safety_margin`, where `safety_margin` is 2048 bytes per expected
    /// label/type name plus a 1024-byte constant.
    pub fn estimate_header_size(provisional_len: usize, expected_schema_names: usize) -> usize {
        let safety_margin = expected_schema_names.saturating_mul(2048) + 1024;
        let needed = provisional_len + safety_margin;
        RESERVATION_BUCKETS
            .into_iter()
            .find(|&bucket| bucket >= needed)
            .unwrap_or_else(|| {
                let mut bucket = *RESERVATION_BUCKETS.last().expect("non-empty");
                while bucket < needed {
                    bucket += 32768;
                }
                bucket
            })
    }

    /// Renders this header as exactly `target_size` bytes: the object
    /// serialized, its closing `}` removed, a `,"padding":"<spaces>"`
    /// field appended, closed, and a trailing `\n`. Fails with
    /// [`ExportError::MetadataOverflow`] if the unpadded form plus the
    /// wrapper overhead already exceeds the target (§4.7 byte
    /// arithmetic): the caller must retry with a larger reservation.
    pub fn render_padded(&self, target_size: usize) -> Result<Vec<u8>, ExportError> {
        let serialized = serde_json::to_string(self)?;
        let base = serialized
            .strip_suffix('}')
            .expect("serde_json object serialization always ends in '}'");
        let base_len = base.len();
        let overhead = PADDING_OVERHEAD;
        let needed = base_len + overhead + 1; // +1 for the trailing '\n'
        if needed > target_size {
            return Err(ExportError::MetadataOverflow { reserved: target_size, needed });
        }
        let padding_len = target_size - base_len - overhead - 1;
        let mut out = Vec::with_capacity(target_size);
        out.extend_from_slice(base.as_bytes());
        out.extend_from_slice(b",\"padding\":\"");
        out.resize(out.len() + padding_len, b' ');
        out.extend_from_slice(b"\"}");
        out.push(b'\n');
        debug_assert_eq!(out.len(), target_size);
        Ok(out)
    }
}

/// Parses a previously-rendered padded header back into plain JSON,
/// stripping the padding field — used by tests that want to assert on
/// header content without caring about the exact byte count.
pub fn strip_padding(rendered: &[u8]) -> Result<Value, ExportError> {
    let mut value: Value = serde_json::from_slice(rendered)?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("padding");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> MetadataHeader {
        MetadataHeader {
            format_version: "1.0".into(),
            export_id: "00000000-0000-0000-0000-000000000000".into(),
            export_timestamp: "2026-01-01T00:00:00Z".into(),
            producer: ProducerIdentity {
                name: "graph-export".into(),
                version: "0.1.0".into(),
                binary_checksum: "deadbeef".into(),
                runtime: "tokio".into(),
            },
            source_system: SourceSystem {
                database_name: "test-db".into(),
                database_version: "5.0".into(),
                database_edition: "enterprise".into(),
            },
            database_statistics: DatabaseStatistics::default(),
            database_schema: DatabaseSchema::default(),
            environment: Environment {
                host: "localhost".into(),
                os: "linux".into(),
                user: "svc".into(),
                runtime: "tokio-current-thread".into(),
                cpu_count: 4,
                memory_bytes: 0,
            },
            security: SecurityFlags { encryption_enabled: true, auth_method: "basic".into(), validation_enabled: true },
            supported_record_types: SUPPORTED_RECORD_TYPES.to_vec(),
            compatibility: Compatibility {
                min_reader_version: "1.0".into(),
                breaking_change_version: "2.0".into(),
                deprecated_fields: Vec::new(),
            },
            compression: None,
            record_type_start_lines: BTreeMap::new(),
            error_summary: ErrorSummary::default(),
            pagination_performance: PaginationPerformance::default(),
            export_manifest: ExportManifest::default(),
        }
    }

    #[test]
    fn padded_render_matches_target_size_exactly() {
        let header = sample_header();
        let target = MetadataHeader::estimate_header_size(serde_json::to_string(&header).unwrap().len(), 0);
        let rendered = header.render_padded(target).unwrap();
        assert_eq!(rendered.len(), target);
        assert_eq!(*rendered.last().unwrap(), b'\n');
    }

    #[test]
    fn padded_render_is_valid_json_on_its_own_line() {
        let header = sample_header();
        let target = MetadataHeader::estimate_header_size(serde_json::to_string(&header).unwrap().len(), 0);
        let rendered = header.render_padded(target).unwrap();
        let line = &rendered[..rendered.len() - 1];
        let value: Value = serde_json::from_slice(line).unwrap();
        assert_eq!(value["format_version"], Value::String("1.0".into()));
    }

    #[test]
    fn undersized_reservation_overflows() {
        let header = sample_header();
        let err = header.render_padded(16).unwrap_err();
        assert!(matches!(err, ExportError::MetadataOverflow { .. }));
    }

    #[test]
    fn estimate_picks_smallest_sufficient_bucket() {
        assert_eq!(MetadataHeader::estimate_header_size(100, 0), 16384);
        assert_eq!(MetadataHeader::estimate_header_size(20000, 0), 32768);
        assert_eq!(MetadataHeader::estimate_header_size(60000, 0), 65536);
    }

    #[test]
    fn large_schema_escalates_beyond_third_bucket() {
        let size = MetadataHeader::estimate_header_size(1000, 600);
        assert!(size > 65536);
        assert_eq!(size % 32768, 0);
    }

    #[test]
    fn strip_padding_removes_the_field_but_keeps_content() {
        let header = sample_header();
        let target = MetadataHeader::estimate_header_size(serde_json::to_string(&header).unwrap().len(), 0);
        let rendered = header.render_padded(target).unwrap();
        let value = strip_padding(&rendered).unwrap();
        assert!(value.get("padding").is_none());
        assert_eq!(value["export_id"], Value::String(header.export_id.clone()));
    }
}
