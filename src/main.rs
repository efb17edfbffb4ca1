//! Binary entry point (§4.11-§4.13, C11-C13): parse configuration, init
//! tracing, wire the `GraphSource` port, drive the orchestrator, and map
//! the result onto the §6 exit-code table.

use std::process::ExitCode;
use std::sync::Arc;

use export_core::ExportError;
use export_db::{FakeGraphSource, GraphSource};
use graph_export::{ExportConfig, Orchestrator};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();

    let config = match ExportConfig::from_env_and_args(std::env::args_os()) {
        Ok(config) => config,
        Err(err) => return report_failure(&err),
    };

    let source = build_graph_source();
    let cancellation = install_signal_handler();

    let orchestrator = Orchestrator::new(config, source);
    match orchestrator.run(cancellation).await {
        Ok(outcome) => {
            tracing::info!(
                output = %outcome.output_path.display(),
                nodes = outcome.nodes_exported,
                relationships = outcome.relationships_exported,
                errors = outcome.error_count,
                warnings = outcome.warning_count,
                duration_ms = outcome.duration.as_millis() as u64,
                "export complete"
            );
            eprintln!(
                "exported {} nodes, {} relationships to {} ({} errors, {} warnings) in {:.2}s",
                outcome.nodes_exported,
                outcome.relationships_exported,
                outcome.output_path.display(),
                outcome.error_count,
                outcome.warning_count,
                outcome.duration.as_secs_f64(),
            );
            if outcome.error_count > 0 {
                ExitCode::from(5)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => report_failure(&err),
    }
}

fn report_failure(err: &ExportError) -> ExitCode {
    tracing::error!(error = %err, exit_code = err.exit_code(), "export failed");
    eprintln!("graph-export: {err}");
    ExitCode::from(err.exit_code())
}

/// §4.13 (C13): `tracing-subscriber` with env-filter controlled
/// verbosity, mirroring the teacher's `EnvFilter::try_from_default_env`
/// fallback-to-`info` pattern.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// §5 "Cancellation": a process-wide token checked at every batch
/// boundary and between records. SIGINT/SIGTERM handling is itself an
/// out-of-scope external collaborator (§1, "OS signal handling") — this
/// just bridges ctrl_c into the token the core already understands.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("cancellation requested, finishing in-flight batch and rewriting header");
            child.cancel();
        }
    });
    token
}

/// The real Bolt-protocol driver is an out-of-scope external collaborator
/// (§1) referenced only through the `GraphSource` port trait. This seam
/// is where a concrete adapter plugs in; lacking one, every export runs
/// against an empty in-memory source, which still produces a valid
/// single-line (header-only) JSONL file per the "Empty DB" scenario
/// (§8).
fn build_graph_source() -> Arc<dyn GraphSource> {
    Arc::new(FakeGraphSource::empty())
}
