//! Command-line surface (§4.12, C12). One subcommand, `export`, mirroring
//! the teacher's `dsl_cli` pattern (`#[command(name = ...)]`, a global
//! `--quiet`, versioned `--version`/`--help` from `clap`'s derived
//! metadata) — no REPL, no multiple subcommands, one export per run.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "graph-export")]
#[command(author = "ob-poc")]
#[command(version)]
#[command(about = "Streams a property-graph database snapshot into a single JSONL file")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress the per-batch progress lines; errors and the final
    /// summary still print.
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the export, writing a single JSONL file under `--output-dir`.
    Export(ExportArgs),
}

/// Every tuning knob is also settable via a `GRAPH_EXPORT_`-prefixed
/// environment variable (§4.11); an explicit CLI flag wins over the
/// environment, which wins over these defaults. `database_password` is
/// deliberately absent here — credentials only ever come from the
/// environment, never a flag, so they never show up in a process list.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Source database URI, e.g. bolt://localhost:7687.
    #[arg(long, env = "GRAPH_EXPORT_DATABASE_URI")]
    pub database_uri: String,

    /// Source database user.
    #[arg(long, env = "GRAPH_EXPORT_DATABASE_USER")]
    pub database_user: String,

    /// Directory the output file is written into.
    #[arg(long, env = "GRAPH_EXPORT_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Records fetched per pagination batch.
    #[arg(long, env = "GRAPH_EXPORT_BATCH_SIZE", default_value_t = 1000)]
    pub batch_size: usize,

    /// Maximum retry attempts per database call before giving up.
    #[arg(long, env = "GRAPH_EXPORT_MAX_RETRIES", default_value_t = 5)]
    pub max_retries: u32,

    /// Base retry delay in milliseconds (doubles per attempt).
    #[arg(long, env = "GRAPH_EXPORT_RETRY_DELAY_MS", default_value_t = 100)]
    pub retry_delay_ms: u64,

    /// Retry delay ceiling in milliseconds.
    #[arg(long, env = "GRAPH_EXPORT_MAX_RETRY_DELAY_MS", default_value_t = 5000)]
    pub max_retry_delay_ms: u64,

    /// Per-query timeout, in seconds.
    #[arg(long, env = "GRAPH_EXPORT_QUERY_TIMEOUT_SECONDS", default_value_t = 30)]
    pub query_timeout_seconds: u64,

    /// Omit `database_schema.labels`/`relationship_types` from the
    /// metadata header. Pagination still uses the collected schema
    /// internally; only the header's published copy is suppressed.
    #[arg(long, env = "GRAPH_EXPORT_SKIP_SCHEMA_COLLECTION", default_value_t = false)]
    pub skip_schema_collection: bool,

    /// Parse every written line back as JSON before moving on, as a
    /// belt-and-braces sanity check. Off by default — doubles CPU cost.
    #[arg(long, env = "GRAPH_EXPORT_VALIDATE_JSON_OUTPUT", default_value_t = false)]
    pub validate_json_output: bool,

    /// Allow an unencrypted connection to the source database.
    #[arg(long, env = "GRAPH_EXPORT_ALLOW_INSECURE", default_value_t = false)]
    pub allow_insecure: bool,

    /// Output-sink buffer size, in KiB.
    #[arg(long, env = "GRAPH_EXPORT_JSON_BUFFER_SIZE_KB", default_value_t = 64)]
    pub json_buffer_size_kb: usize,

    /// Emit a deterministic `stable_id` content hash alongside each node
    /// and relationship's database-native `element_id`.
    #[arg(long, env = "GRAPH_EXPORT_ENABLE_HASHED_IDS", default_value_t = true)]
    pub enable_hashed_ids: bool,

    /// Minimum milliseconds between progress log lines.
    #[arg(long, env = "GRAPH_EXPORT_PROGRESS_INTERVAL_MS", default_value_t = 2000)]
    pub progress_interval_ms: u64,

    #[arg(long, env = "GRAPH_EXPORT_NESTED_SHALLOW_DEPTH", default_value_t = 3)]
    pub nested_shallow_depth: usize,
    #[arg(long, env = "GRAPH_EXPORT_NESTED_REFERENCE_DEPTH", default_value_t = 6)]
    pub nested_reference_depth: usize,
    #[arg(long, env = "GRAPH_EXPORT_MAX_NESTED_DEPTH", default_value_t = 10)]
    pub max_nested_depth: usize,
    #[arg(long, env = "GRAPH_EXPORT_MAX_COLLECTION_ITEMS", default_value_t = 1000)]
    pub max_collection_items: usize,
    #[arg(long, env = "GRAPH_EXPORT_MAX_LABELS_PER_NODE", default_value_t = 100)]
    pub max_labels_per_node: usize,
    #[arg(long, env = "GRAPH_EXPORT_MAX_LABELS_IN_REFERENCE_MODE", default_value_t = 3)]
    pub max_labels_in_reference_mode: usize,
    #[arg(long, env = "GRAPH_EXPORT_MAX_LABELS_IN_PATH_COMPACT", default_value_t = 3)]
    pub max_labels_in_path_compact: usize,
    #[arg(long, env = "GRAPH_EXPORT_MAX_PATH_LENGTH", default_value_t = 1000)]
    pub max_path_length: usize,
    #[arg(long, env = "GRAPH_EXPORT_PATH_FULL_LIMIT", default_value_t = 10)]
    pub path_full_limit: usize,
    #[arg(long, env = "GRAPH_EXPORT_PATH_COMPACT_LIMIT", default_value_t = 50)]
    pub path_compact_limit: usize,
    #[arg(long, env = "GRAPH_EXPORT_PATH_PROPERTY_DEPTH", default_value_t = 5)]
    pub path_property_depth: usize,
}
