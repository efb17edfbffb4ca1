//! Drives the whole export end to end (§4.8, C8): preflight, schema
//! snapshot, header reservation, nodes, relationships, manifest/error
//! summary, header rewrite, flush/close.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use export_core::{ErrorAccumulator, ExportError, Severity};
use export_db::{GraphSource, Paginator, RetryExecutor, RetryPolicy};
use export_io::header::{
    Compatibility, DatabaseSchema, DatabaseStatistics, Environment, ErrorSummary, ExportManifest, MetadataHeader,
    PaginationPerformance, ProducerIdentity, SecurityFlags, SourceSystem, SUPPORTED_RECORD_TYPES,
};
use export_io::{ProgressThrottle, RecordWriter, Stats};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;

use crate::config::ExportConfig;

pub struct Orchestrator {
    config: ExportConfig,
    source: Arc<dyn GraphSource>,
}

/// Everything `main` needs to decide its exit code and print a summary
/// (§6 ambient addition: a final human-readable line to stderr).
#[derive(Debug)]
pub struct ExportOutcome {
    pub output_path: PathBuf,
    pub nodes_exported: u64,
    pub relationships_exported: u64,
    pub error_count: u64,
    pub warning_count: u64,
    pub duration: Duration,
}

impl Orchestrator {
    pub fn new(config: ExportConfig, source: Arc<dyn GraphSource>) -> Self {
        Self { config, source }
    }

    pub async fn run(&self, cancellation: CancellationToken) -> Result<ExportOutcome, ExportError> {
        let started = Instant::now();
        let export_id = uuid::Uuid::new_v4().to_string();
        let retry = RetryExecutor::new(
            RetryPolicy {
                max_retries: self.config.max_retries,
                retry_delay_ms: self.config.retry_delay_ms,
                max_retry_delay_ms: self.config.max_retry_delay_ms,
            },
            5,
            Duration::from_secs(30),
        )
        .with_call_timeout(Duration::from_secs(self.config.query_timeout_seconds));

        // (a) preflight: connect + version query.
        let source = Arc::clone(&self.source);
        retry.call("preflight", || source.preflight()).await?;

        // (b) schema snapshot.
        let source = Arc::clone(&self.source);
        let schema = retry.call("schema_snapshot", || source.schema_snapshot()).await?;

        let source = Arc::clone(&self.source);
        let use_keyset = retry.call("supports_keyset_pagination", || source.supports_keyset_pagination()).await?;

        let output_path = self.config.output_dir.join(format!("export-{export_id}.jsonl"));
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&output_path).await?;

        // (c) compute reservation size, write provisional header.
        let schema_name_count = schema.labels.len() + schema.relationship_types.len();
        let provisional = self.build_header(&export_id, &schema, ErrorSummary::default(), PaginationPerformance::default(), ExportManifest::default());
        let provisional_len = serde_json::to_string(&provisional)?.len();
        let target_size = MetadataHeader::estimate_header_size(provisional_len, schema_name_count);
        let reserved_bytes = provisional.render_padded(target_size)?;
        file.write_all(&reserved_bytes).await?;

        let buffered = BufWriter::with_capacity(self.config.json_buffer_size_kb * 1024, file);
        let mut writer = RecordWriter::new(buffered).with_validation(self.config.validate_json_output);
        let mut progress = ProgressThrottle::new(Duration::from_millis(self.config.progress_interval_ms));
        let mut stats = Stats::new();
        let mut errors = ErrorAccumulator::new();
        let mut error_count = 0u64;
        let mut warning_count = 0u64;

        // (d) nodes, one label at a time. Each fetched page is its own
        // error-accumulator batch (§4.3/§4.5): flushed and cleared before
        // the next page is pulled.
        for label in &schema.labels {
            if cancellation.is_cancelled() {
                break;
            }
            self.drain_nodes(
                label,
                &export_id,
                use_keyset,
                &retry,
                &mut writer,
                &mut progress,
                &mut stats,
                &mut errors,
                &mut error_count,
                &mut warning_count,
                &cancellation,
            )
            .await?;
        }

        // (e) relationships, one type at a time, in lexicographic order.
        let mut relationship_types = schema.relationship_types.clone();
        relationship_types.sort();
        for rel_type in &relationship_types {
            if cancellation.is_cancelled() {
                break;
            }
            self.drain_relationships(
                rel_type,
                &export_id,
                use_keyset,
                &retry,
                &mut writer,
                &mut progress,
                &mut stats,
                &mut errors,
                &mut error_count,
                &mut warning_count,
                &cancellation,
            )
            .await?;
        }

        let writer_stats = writer.stats().clone();
        let record_type_start_lines = writer.coordinator().record_type_start_lines().clone();
        let file = writer.finish().await?;

        // (g) rewrite header with final statistics.
        let error_summary = ErrorSummary { error_count, warning_count, has_errors: error_count > 0 || warning_count > 0 };
        let pagination_performance = PaginationPerformance {
            batch_duration_samples_ms: stats
                .per_kind()
                .iter()
                .map(|(kind, k)| (kind.clone(), vec![k.duration.as_millis() as u64]))
                .collect(),
        };
        let export_manifest = ExportManifest {
            nodes_exported: writer_stats.node_count,
            relationships_exported: writer_stats.relationship_count,
            duration_ms: started.elapsed().as_millis() as u64,
            completed: !cancellation.is_cancelled(),
        };
        let mut final_header =
            self.build_header(&export_id, &schema, error_summary, pagination_performance, export_manifest);
        final_header.record_type_start_lines = record_type_start_lines;

        let mut file = file;
        file.seek(std::io::SeekFrom::Start(0)).await?;
        let final_bytes = final_header.render_padded(target_size)?;
        file.write_all(&final_bytes).await?;
        file.flush().await?;

        Ok(ExportOutcome {
            output_path,
            nodes_exported: writer_stats.node_count,
            relationships_exported: writer_stats.relationship_count,
            error_count,
            warning_count,
            duration: started.elapsed(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn drain_nodes(
        &self,
        label: &str,
        export_id: &str,
        use_keyset: bool,
        retry: &RetryExecutor,
        writer: &mut RecordWriter<BufWriter<tokio::fs::File>>,
        progress: &mut ProgressThrottle,
        stats: &mut Stats,
        errors: &mut ErrorAccumulator,
        error_count: &mut u64,
        warning_count: &mut u64,
        cancellation: &CancellationToken,
    ) -> Result<(), ExportError> {
        let mut paginator = Paginator::new(self.source.as_ref(), retry, self.config.batch_size, use_keyset);
        loop {
            if cancellation.is_cancelled() {
                return Ok(());
            }
            let batch = match paginator.next_node_batch(label).await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(label, error = %err, "node pagination terminated early for this label");
                    return Ok(());
                }
            };
            let bytes_before = writer.stats().bytes_written;
            for (record_index, node) in batch.nodes.iter().enumerate() {
                let issues =
                    writer.write_node(node, label, &self.config.limits, self.config.enable_hashed_ids, export_id).await?;
                for issue in issues {
                    errors.record(issue.error.kind_name(), &issue.error.to_string(), issue.error.severity(), &issue.element_id, record_index);
                }
            }
            let bytes_after = writer.stats().bytes_written;
            stats.record_batch(label, batch.nodes.len() as u64, bytes_after - bytes_before, batch.duration);
            self.flush_batch_errors(writer, errors, batch.nodes.len(), error_count, warning_count).await?;
            if !self.config.quiet {
                progress.maybe_report(Instant::now(), label, stats.per_kind().get(label).map(|k| k.records).unwrap_or(0));
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn drain_relationships(
        &self,
        rel_type: &str,
        export_id: &str,
        use_keyset: bool,
        retry: &RetryExecutor,
        writer: &mut RecordWriter<BufWriter<tokio::fs::File>>,
        progress: &mut ProgressThrottle,
        stats: &mut Stats,
        errors: &mut ErrorAccumulator,
        error_count: &mut u64,
        warning_count: &mut u64,
        cancellation: &CancellationToken,
    ) -> Result<(), ExportError> {
        let mut paginator = Paginator::new(self.source.as_ref(), retry, self.config.batch_size, use_keyset);
        loop {
            if cancellation.is_cancelled() {
                return Ok(());
            }
            let batch = match paginator.next_relationship_batch(rel_type).await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(rel_type, error = %err, "relationship pagination terminated early for this type");
                    return Ok(());
                }
            };
            let bytes_before = writer.stats().bytes_written;
            for (record_index, rel) in batch.relationships.iter().enumerate() {
                let issues = writer
                    .write_relationship(rel, rel_type, &self.config.limits, self.config.enable_hashed_ids, export_id)
                    .await?;
                for issue in issues {
                    errors.record(issue.error.kind_name(), &issue.error.to_string(), issue.error.severity(), &issue.element_id, record_index);
                }
            }
            let bytes_after = writer.stats().bytes_written;
            stats.record_batch(rel_type, batch.relationships.len() as u64, bytes_after - bytes_before, batch.duration);
            self.flush_batch_errors(writer, errors, batch.relationships.len(), error_count, warning_count).await?;
            if !self.config.quiet {
                progress.maybe_report(Instant::now(), rel_type, stats.per_kind().get(rel_type).map(|k| k.records).unwrap_or(0));
            }
        }
        Ok(())
    }

    /// Flushes the error accumulator at a batch boundary (§4.3: "cleared at
    /// each batch boundary after flushing"), writing one `error`/`warning`
    /// record per unique kind and folding its counts into the running
    /// totals carried into the final header's `error_summary`.
    async fn flush_batch_errors(
        &self,
        writer: &mut RecordWriter<BufWriter<tokio::fs::File>>,
        errors: &mut ErrorAccumulator,
        batch_size: usize,
        error_count: &mut u64,
        warning_count: &mut u64,
    ) -> Result<(), ExportError> {
        if errors.is_empty() {
            return Ok(());
        }
        let flushed = errors.flush(batch_size);
        for issue in &flushed {
            match issue.severity {
                Severity::Error => *error_count += issue.count as u64,
                Severity::Warning => *warning_count += issue.count as u64,
            }
            let kind = match issue.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            let record = serde_json::json!({
                "type": kind,
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "message": issue.message,
                "count": issue.count,
                "percentage_of_batch": issue.percentage_of_batch,
                "first_occurrence_index": issue.first_occurrence_index,
                "sample_element_ids": issue.sample_element_ids,
                "line": writer.coordinator().current_line(),
            });
            writer.write_error_record(record).await?;
        }
        Ok(())
    }

    fn build_header(
        &self,
        export_id: &str,
        schema: &export_db::SchemaSnapshot,
        error_summary: ErrorSummary,
        pagination_performance: PaginationPerformance,
        export_manifest: ExportManifest,
    ) -> MetadataHeader {
        MetadataHeader {
            format_version: "1.0".into(),
            export_id: export_id.to_string(),
            export_timestamp: chrono::Utc::now().to_rfc3339(),
            producer: ProducerIdentity {
                name: "graph-export".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                binary_checksum: "unavailable".into(),
                runtime: "tokio-current-thread".into(),
            },
            source_system: SourceSystem {
                database_name: schema.database_name.clone(),
                database_version: schema.database_version.clone(),
                database_edition: schema.database_edition.clone(),
            },
            database_statistics: DatabaseStatistics {
                node_count: schema.node_count,
                relationship_count: schema.relationship_count,
                label_count: schema.labels.len() as u64,
                relationship_type_count: schema.relationship_types.len() as u64,
            },
            database_schema: if self.config.skip_schema_collection {
                DatabaseSchema { labels: Vec::new(), relationship_types: Vec::new() }
            } else {
                DatabaseSchema { labels: schema.labels.clone(), relationship_types: schema.relationship_types.clone() }
            },
            environment: Environment {
                host: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".into()),
                os: std::env::consts::OS.into(),
                user: std::env::var("USER").unwrap_or_else(|_| "unknown".into()),
                runtime: "tokio-current-thread".into(),
                cpu_count: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
                memory_bytes: 0,
            },
            security: SecurityFlags {
                encryption_enabled: !self.config.allow_insecure,
                auth_method: "basic".into(),
                validation_enabled: self.config.validate_json_output,
            },
            supported_record_types: SUPPORTED_RECORD_TYPES.to_vec(),
            compatibility: Compatibility {
                min_reader_version: "1.0".into(),
                breaking_change_version: "2.0".into(),
                deprecated_fields: Vec::new(),
            },
            compression: None,
            record_type_start_lines: Default::default(),
            error_summary,
            pagination_performance,
            export_manifest,
        }
    }
}
