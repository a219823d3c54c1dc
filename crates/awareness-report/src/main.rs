//! CLI entry point for the awareness survey and report pipeline.
//!
//! Request commands read a JSON body from stdin and write a JSON envelope to
//! stdout (see [`awareness_report::envelope`]). Logs go to stderr.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use awareness_analysis::DifyClient;
use awareness_core::types::SessionId;
use awareness_core::{AwarenessConfig, QuestionCatalog};
use awareness_delivery::mailer_from_config;
use awareness_report::envelope;
use awareness_report::sweep::{run_sweep_daemon, run_sweep_once};
use awareness_report::{ReportError, SurveyService};
use awareness_store::{ReportRepository, SqliteStore};

#[derive(Parser)]
#[command(name = "awareness-report")]
#[command(about = "Investment awareness survey intake and report generation")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: awareness).
    #[arg(short, long, default_value = "awareness", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Create or resume a user and open a new session (reads JSON from stdin).
    CreateUser,
    /// Set MBTI and/or zodiac tags (reads JSON from stdin).
    UpdateTags,
    /// Record one answer (reads JSON from stdin).
    Answer,
    /// Submit a session for analysis and wait for generation to finish
    /// (reads JSON from stdin).
    Submit,
    /// Show the report for a session.
    Report {
        #[arg(long)]
        session_id: String,
    },
    /// Regenerate the report for a session and wait for it to finish.
    Regenerate {
        #[arg(long)]
        session_id: String,
    },
    /// Fail reports stuck in PENDING or GENERATING past the provider timeout.
    Sweep {
        /// Keep sweeping on the configured interval.
        #[arg(long)]
        daemon: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AwarenessConfig::load(&cli.config)?;
    let store = SqliteStore::open(&config.database)?;

    if let Command::Sweep { daemon } = cli.command {
        let reports: Arc<dyn ReportRepository> = Arc::new(store);
        let abandon_after = config.provider.abandon_after();
        if daemon {
            let every = Duration::from_secs(config.report.sweep_interval_secs.max(1));
            run_sweep_daemon(reports, abandon_after, every).await;
        } else {
            let failed = run_sweep_once(reports.as_ref(), abandon_after).await;
            print_outcome(failed.map(|n| serde_json::json!({ "failed": n })));
        }
        return Ok(());
    }

    let service = build_service(&config, store)?;

    match cli.command {
        Command::CreateUser => {
            let outcome = match read_request() {
                Ok(request) => service.create_or_resume(request).await,
                Err(e) => Err(e),
            };
            print_outcome(outcome);
        }
        Command::UpdateTags => {
            let outcome = match read_request() {
                Ok(request) => service.update_tags(request).await,
                Err(e) => Err(e),
            };
            print_outcome(outcome);
        }
        Command::Answer => {
            let outcome = match read_request() {
                Ok(request) => service.record_answer(request).await,
                Err(e) => Err(e),
            };
            print_outcome(outcome);
        }
        Command::Submit => {
            let outcome = match read_request() {
                Ok(request) => service.submit_survey(request).await,
                Err(e) => Err(e),
            };
            print_outcome(outcome);
            service.orchestrator().wait_idle().await;
        }
        Command::Report { ref session_id } => {
            let outcome = match parse_session_id(session_id) {
                Ok(id) => service.get_report(id).await,
                Err(e) => Err(e),
            };
            log_rejection(&outcome);
            println!("{}", envelope::report_envelope(&outcome));
        }
        Command::Regenerate { ref session_id } => {
            let outcome = match parse_session_id(session_id) {
                Ok(id) => service.regenerate_report(id).await,
                Err(e) => Err(e),
            };
            print_outcome(outcome);
            service.orchestrator().wait_idle().await;
        }
        Command::Sweep { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn build_service(config: &AwarenessConfig, store: SqliteStore) -> anyhow::Result<SurveyService> {
    let catalog = match &config.catalog_path {
        Some(path) => QuestionCatalog::from_json_file(path)?,
        None => QuestionCatalog::builtin(),
    };
    let provider = Arc::new(DifyClient::new(&config.provider)?);
    let mailer = mailer_from_config(&config.email)?;
    tracing::info!(mailer = mailer.name(), "Email transport selected");

    Ok(SurveyService::assemble(config, store, catalog, provider, mailer))
}

fn read_request<T: DeserializeOwned>() -> Result<T, ReportError> {
    let input = std::io::read_to_string(std::io::stdin())
        .map_err(|e| ReportError::Validation(format!("Could not read request: {e}")))?;
    serde_json::from_str(&input)
        .map_err(|e| ReportError::Validation(format!("Invalid request body: {e}")))
}

fn parse_session_id(raw: &str) -> Result<SessionId, ReportError> {
    Ok(raw.parse::<SessionId>()?)
}

fn log_rejection<T>(outcome: &Result<T, ReportError>) {
    match outcome {
        Err(e @ ReportError::Internal(_)) => tracing::error!(error = %e, "Request failed"),
        Err(e) => tracing::info!(code = e.code(), error = %e, "Request rejected"),
        Ok(_) => {}
    }
}

fn print_outcome<T: Serialize>(outcome: Result<T, ReportError>) {
    log_rejection(&outcome);
    println!("{}", envelope::envelope(&outcome));
}
