//! Resolved, typed configuration consumed by C8 (§4.11, C11).
//!
//! `ExportConfig::from_env_and_args` is the one place CLI parsing,
//! environment lookup, and the password-only-via-env rule are reconciled
//! into a single struct the orchestrator can hold by value.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use export_core::{ExportError, SerializerLimits};

use crate::cli::{Cli, Command, ExportArgs};

const PASSWORD_ENV_VAR: &str = "GRAPH_EXPORT_DATABASE_PASSWORD";

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub database_uri: String,
    pub database_user: String,
    pub database_password: String,
    pub output_dir: PathBuf,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub query_timeout_seconds: u64,
    pub skip_schema_collection: bool,
    pub validate_json_output: bool,
    pub allow_insecure: bool,
    pub json_buffer_size_kb: usize,
    pub limits: SerializerLimits,
    pub enable_hashed_ids: bool,
    pub progress_interval_ms: u64,
    pub quiet: bool,
}

impl ExportConfig {
    /// Parses `args` (normally `std::env::args_os()`) with `clap`,
    /// folding in environment variables via `clap`'s `env` feature for
    /// every field except the database password, which is read directly
    /// from `GRAPH_EXPORT_DATABASE_PASSWORD` so it can never be passed
    /// (and therefore leaked into a process listing) as a flag.
    pub fn from_env_and_args<I, T>(args: I) -> Result<Self, ExportError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args).map_err(|e| ExportError::Configuration(e.to_string()))?;
        let Command::Export(export_args) = cli.command;
        let database_password = std::env::var(PASSWORD_ENV_VAR)
            .map_err(|_| ExportError::Configuration(format!("{PASSWORD_ENV_VAR} must be set")))?;
        Ok(Self::from_args(export_args, database_password, cli.quiet))
    }

    fn from_args(args: ExportArgs, database_password: String, quiet: bool) -> Self {
        let limits = SerializerLimits {
            nested_shallow_depth: args.nested_shallow_depth,
            nested_reference_depth: args.nested_reference_depth,
            max_nested_depth: args.max_nested_depth,
            max_collection_items: args.max_collection_items,
            max_labels_per_node: args.max_labels_per_node,
            max_labels_in_reference_mode: args.max_labels_in_reference_mode,
            max_labels_in_path_compact: args.max_labels_in_path_compact,
            max_path_length: args.max_path_length,
            path_full_limit: args.path_full_limit,
            path_compact_limit: args.path_compact_limit,
            path_property_depth: args.path_property_depth,
        };
        Self {
            database_uri: args.database_uri,
            database_user: args.database_user,
            database_password,
            output_dir: args.output_dir,
            batch_size: args.batch_size,
            max_retries: args.max_retries,
            retry_delay_ms: args.retry_delay_ms,
            max_retry_delay_ms: args.max_retry_delay_ms,
            query_timeout_seconds: args.query_timeout_seconds,
            skip_schema_collection: args.skip_schema_collection,
            validate_json_output: args.validate_json_output,
            allow_insecure: args.allow_insecure,
            json_buffer_size_kb: args.json_buffer_size_kb,
            limits,
            enable_hashed_ids: args.enable_hashed_ids,
            progress_interval_ms: args.progress_interval_ms,
            quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_password<F: FnOnce() -> R, R>(value: &str, f: F) -> R {
        std::env::set_var(PASSWORD_ENV_VAR, value);
        let result = f();
        std::env::remove_var(PASSWORD_ENV_VAR);
        result
    }

    #[test]
    fn minimal_args_resolve_with_defaults() {
        let config = with_password("secret", || {
            ExportConfig::from_env_and_args([
                "graph-export",
                "export",
                "--database-uri",
                "bolt://localhost:7687",
                "--database-user",
                "neo4j",
                "--output-dir",
                "/tmp/out",
            ])
        })
        .unwrap();
        assert_eq!(config.database_uri, "bolt://localhost:7687");
        assert_eq!(config.database_password, "secret");
        assert_eq!(config.batch_size, 1000);
        assert!(config.enable_hashed_ids);
        assert_eq!(config.limits, SerializerLimits::default());
    }

    #[test]
    fn missing_password_is_a_configuration_error() {
        std::env::remove_var(PASSWORD_ENV_VAR);
        let result = ExportConfig::from_env_and_args([
            "graph-export",
            "export",
            "--database-uri",
            "bolt://localhost:7687",
            "--database-user",
            "neo4j",
            "--output-dir",
            "/tmp/out",
        ]);
        assert!(matches!(result, Err(ExportError::Configuration(_))));
    }

    #[test]
    fn explicit_flag_overrides_environment() {
        std::env::set_var("GRAPH_EXPORT_BATCH_SIZE", "50");
        let config = with_password("secret", || {
            ExportConfig::from_env_and_args([
                "graph-export",
                "export",
                "--database-uri",
                "bolt://localhost:7687",
                "--database-user",
                "neo4j",
                "--output-dir",
                "/tmp/out",
                "--batch-size",
                "250",
            ])
        })
        .unwrap();
        std::env::remove_var("GRAPH_EXPORT_BATCH_SIZE");
        assert_eq!(config.batch_size, 250);
    }

    #[test]
    fn malformed_numeric_value_is_a_configuration_error() {
        let result = with_password("secret", || {
            ExportConfig::from_env_and_args([
                "graph-export",
                "export",
                "--database-uri",
                "bolt://localhost:7687",
                "--database-user",
                "neo4j",
                "--output-dir",
                "/tmp/out",
                "--batch-size",
                "not-a-number",
            ])
        });
        assert!(matches!(result, Err(ExportError::Configuration(_))));
    }
}
