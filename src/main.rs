use anyhow::{bail, Context, Result};
use benchkeeper::cli::{Cli, Commands, OutputFormat};
use benchkeeper::comparison::{ChangeFilter, CommandComparator};
use benchkeeper::config::KeeperConfig;
use benchkeeper::measurement::CommandRunner;
use benchkeeper::notify::{Message, Notifier, OutboxNotifier};
use benchkeeper::pipeline::{PipelineOrchestrator, PipelineResult};
use benchkeeper::request::{is_safe_repository, validate_recipients, SecretVerifier};
use benchkeeper::server::{self, AppState, NO_CHANGES_BODY};
use benchkeeper::service::BenchmarkService;
use benchkeeper::storage::{FsBlobStore, SnapshotStore, Visibility};
use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` raises the default level to TRACE
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_orchestrator(config: &KeeperConfig) -> PipelineOrchestrator {
    let runner = CommandRunner::new(
        config.runner.program.clone(),
        config.runner.args.clone(),
        config.runner.workspace.clone(),
    );
    let snapshots = SnapshotStore::new(
        Arc::new(FsBlobStore::new(config.storage.root.clone())),
        config.storage.bucket.clone(),
    );
    let comparator = CommandComparator::new(
        config.comparator.program.clone(),
        config.comparator.args.clone(),
    );

    PipelineOrchestrator::new(
        Arc::new(runner),
        snapshots,
        ChangeFilter::new(Arc::new(comparator)),
    )
    .with_policy(config.policy)
}

/// Cancel `token` on Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
}

fn print_result(result: &PipelineResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => match result {
            PipelineResult::FirstRun { measurements, .. } => println!("{}", measurements.to_text()),
            PipelineResult::NoChange { .. } => println!("{NO_CHANGES_BODY}"),
            PipelineResult::Changed { report, .. } => print!("{}", report.text),
        },
        OutputFormat::Html => match result {
            PipelineResult::Changed { report, .. } => print!("{}", report.html),
            PipelineResult::FirstRun { measurements, .. } => {
                println!("<pre>{}</pre>", measurements.to_text())
            }
            PipelineResult::NoChange { .. } => println!("<p>{NO_CHANGES_BODY}</p>"),
        },
        OutputFormat::Json => {
            let value = match result {
                PipelineResult::NoChange { advanced } => {
                    json!({ "result": "no_change", "advanced": advanced })
                }
                PipelineResult::FirstRun { .. } => {
                    json!({ "result": "first_run", "payload": result.payload() })
                }
                PipelineResult::Changed { .. } => {
                    json!({ "result": "changed", "payload": result.payload() })
                }
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

async fn run_once(
    config: &KeeperConfig,
    repo: &str,
    public: bool,
    notify: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let repo = repo.trim();
    if !is_safe_repository(repo) {
        bail!("Invalid repository reference: {repo:?}");
    }
    let notify: Vec<String> = notify.iter().map(|e| e.trim().to_string()).collect();
    validate_recipients(&notify).context("Invalid --notify recipients")?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let orchestrator = build_orchestrator(config);
    let result = orchestrator
        .run(repo, Visibility::from(public), &cancel)
        .await
        .with_context(|| format!("Benchmark pipeline failed for {repo}"))?;

    print_result(&result, format)?;

    if let (false, Some(payload)) = (notify.is_empty(), result.payload()) {
        let message = Message::for_report(config.notify.from.clone(), notify, repo, &payload);
        OutboxNotifier::new(config.notify.outbox.clone())
            .send(&message)
            .await
            .context("Snapshots were written but the notification could not be queued")?;
    }
    Ok(())
}

async fn serve(config: &KeeperConfig, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.server.port);
    let service = BenchmarkService::new(
        Arc::new(build_orchestrator(config)),
        Arc::new(OutboxNotifier::new(config.notify.outbox.clone())),
        SecretVerifier::new(config.auth.secrets.clone(), config.auth.require_secret),
        config.notify.from.clone(),
    );

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    server::serve(
        listener,
        AppState {
            service: Arc::new(service),
            shutdown,
        },
    )
    .await
    .context("HTTP server failed")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = match &args.config {
        Some(path) => KeeperConfig::from_file(path)?,
        None => KeeperConfig::default(),
    };

    match args.command {
        Commands::Run {
            repo,
            public,
            notify,
            format,
        } => run_once(&config, &repo, public, notify, format).await,
        Commands::Serve { port } => serve(&config, port).await,
    }
}
