//! Multi-camera stitching worker binary.

use std::path::PathBuf;

use anyhow::{bail, Context};
use tokio::sync::watch;
use tracing::{error, info, Instrument};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pcut_worker::{
    analyze, load_sequence, load_snapshot, run_render, save_snapshot, RenderOptions, RunLogger,
    WorkerConfig, WorkerResult,
};

const USAGE: &str = "usage: pcut-worker <analyze | render | auto> [--sequence FILE] [--plan-only]";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Analyze,
    Render { sequence: Option<PathBuf>, plan_only: bool },
    /// Analyze then render in one run
    Auto { sequence: Option<PathBuf>, plan_only: bool },
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let Some((name, rest)) = args.split_first() else {
        bail!("missing command");
    };

    let mut sequence = None;
    let mut plan_only = false;
    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--sequence" => {
                let file = iter.next().context("--sequence needs a file")?;
                sequence = Some(PathBuf::from(file));
            }
            "--plan-only" => plan_only = true,
            other => bail!("unknown argument {}", other),
        }
    }

    match name.as_str() {
        "analyze" if sequence.is_none() && !plan_only => Ok(Command::Analyze),
        "analyze" => bail!("analyze takes no options"),
        "render" => Ok(Command::Render { sequence, plan_only }),
        "auto" => Ok(Command::Auto { sequence, plan_only }),
        other => bail!("unknown command {}", other),
    }
}

async fn render(
    config: &WorkerConfig,
    logger: &RunLogger,
    sequence: Option<PathBuf>,
    plan_only: bool,
    cancel_rx: watch::Receiver<bool>,
) -> WorkerResult<()> {
    let snapshot = load_snapshot(&config.snapshot_path()).await?;
    let sequence = match sequence {
        Some(path) => Some(load_sequence(&path).await?),
        None => None,
    };
    let options = RenderOptions {
        sequence,
        plan_only,
        cancel_rx: Some(cancel_rx),
    };
    let output = run_render(config, &snapshot, options, logger).await?;
    info!(
        timeline = %output.timeline_path.display(),
        report = %output.report_path.display(),
        "Render finished"
    );
    Ok(())
}

async fn run(
    command: Command,
    config: &WorkerConfig,
    cancel_rx: watch::Receiver<bool>,
) -> WorkerResult<()> {
    let logger = RunLogger::new("analyze");

    if matches!(command, Command::Analyze | Command::Auto { .. }) {
        let snapshot = analyze(config, &logger)
            .instrument(logger.create_span())
            .await?;
        save_snapshot(&config.snapshot_path(), &snapshot).await?;
    }

    match command {
        Command::Analyze => Ok(()),
        Command::Render { sequence, plan_only } | Command::Auto { sequence, plan_only } => {
            let logger = logger.for_stage("render");
            render(config, &logger, sequence, plan_only, cancel_rx)
                .instrument(logger.create_span())
                .await
        }
    }
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "pcut=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);
    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal; cancelling");
            let _ = cancel_tx.send(true);
        }
    });

    if let Err(e) = run(command, &config, cancel_rx).await {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
