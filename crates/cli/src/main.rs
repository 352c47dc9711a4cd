use crate::{
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use commands::Commands;
use engine_config::loader;
use engine_core::state::{ResumeStateStore, YamlStateStore};
use engine_runtime::{TransferExecutor, TransferRunner};
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Parser, Debug)]
#[command(name = "haul", version = "0.1.0", about = "Transactional bulk data transfer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(
        long,
        global = true,
        help = "Log filter (error, warn, info, debug, trace or a RUST_LOG directive)"
    )]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    match execute(cli.command, &shutdown).await {
        Ok(()) => ExitCode::Success.into(),
        Err(err) => {
            report(&err);
            if shutdown.is_shutdown_requested() {
                ExitCode::ShutdownRequested.into()
            } else {
                ExitCode::GeneralError.into()
            }
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn report(err: &CliError) {
    error!(error = %err, "Command failed");
    if let CliError::Execution(exec) = err {
        if let Some(partial) = exec.partial() {
            for suppressed in &partial.suppressed {
                error!(error = %suppressed, "Suppressed error");
            }
        }
    }
}

async fn execute(command: Commands, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    match command {
        Commands::Run {
            config,
            resume_state,
            output,
        } => run(config, resume_state, output, shutdown).await,
        Commands::Cleanup {
            config,
            resume_state,
        } => cleanup(config, resume_state).await,
    }
}

fn runner(resume_state: Option<&PathBuf>, shutdown: &ShutdownCoordinator) -> TransferRunner {
    let executor = TransferExecutor::new(connectors::builtin_registry())
        .with_cancellation(shutdown.cancel_token());
    let store = resume_state
        .map(|path| Arc::new(YamlStateStore::new(path.clone())) as Arc<dyn ResumeStateStore>);
    TransferRunner::new(executor, store)
}

async fn run(
    config_path: PathBuf,
    resume_state: Option<PathBuf>,
    output: Option<PathBuf>,
    shutdown: &ShutdownCoordinator,
) -> Result<(), CliError> {
    let config = loader::load_file(&config_path).await?;
    output::check_writable(output.as_deref())?;
    output::check_writable(resume_state.as_deref())?;

    let runner = runner(resume_state.as_ref(), shutdown);
    let outcome = match runner.run(&config).await {
        Ok(outcome) => outcome,
        Err(err) => {
            if let (Some(path), Some(_)) = (&resume_state, err.partial()) {
                info!(
                    path = %path.display(),
                    "Resume state is written. Run the transfer again with -r to resume, or use the cleanup subcommand to delete intermediate data"
                );
            } else if err.partial().is_some() {
                info!("Use the -r option to make a failed transfer resumable");
            }
            if shutdown.is_shutdown_requested() {
                error!(error = %err, "Transfer stopped by a shutdown request");
                return Err(CliError::ShutdownRequested);
            }
            return Err(err.into());
        }
    };

    let metrics = &outcome.result.metrics;
    info!(
        records = metrics.records_processed,
        tasks = metrics.tasks_committed,
        diff = %outcome.result.config_diff,
        "Next config diff"
    );
    let rendered = output::write_next_config(output.as_deref(), &outcome.next_config).await?;
    if output.is_none() {
        println!("{rendered}");
    }
    Ok(())
}

async fn cleanup(config_path: PathBuf, resume_state: PathBuf) -> Result<(), CliError> {
    let config = loader::load_file(&config_path).await?;
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    runner(Some(&resume_state), &shutdown).cleanup(&config).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_takes_resume_and_output_paths() {
        let cli = Cli::try_parse_from([
            "haul", "run", "load.yml", "-r", "resume.yml", "-o", "next.yml", "--log-level", "debug",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        let Commands::Run {
            config,
            resume_state,
            output,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(config, PathBuf::from("load.yml"));
        assert_eq!(resume_state, Some(PathBuf::from("resume.yml")));
        assert_eq!(output, Some(PathBuf::from("next.yml")));
    }

    #[test]
    fn cleanup_requires_resume_path() {
        assert!(Cli::try_parse_from(["haul", "cleanup", "load.yml"]).is_err());
        assert!(Cli::try_parse_from(["haul", "cleanup", "load.yml", "-r", "resume.yml"]).is_ok());
    }
}
