use crate::{
    app::{Engine, Processing},
    commands::Commands,
    config::AppConfig,
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
    source::CsvSource,
};
use clap::Parser;
use engine_runtime::{actor::scheduler::TickScheduler, queue::HealthcheckOutcome};
use model::{
    events::ProcessCompleted,
    session::{DuplicateMode, ImportSession},
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod commands;
mod config;
mod error;
mod output;
mod shutdown;
mod source;

#[derive(Parser)]
#[command(name = "intake", version = "0.1.0", about = "Bulk CSV record import")]
struct Cli {
    #[arg(long, global = true, help = "Path to the JSON configuration file")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory holding the import state and records")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

struct ImportArgs {
    file: PathBuf,
    mode: DuplicateMode,
    match_field: String,
    blank_overwrite: bool,
    background: bool,
    detach: bool,
    delimiter: char,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so reports on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let shutdown = ShutdownCoordinator::new(Default::default());
    shutdown.register_handlers();

    let code = match run(cli, &shutdown).await {
        Ok(()) if shutdown.is_shutdown_requested() => ExitCode::ShutdownRequested,
        Ok(()) => ExitCode::Success,
        Err(CliError::ShutdownRequested) => {
            warn!("Interrupted; queued rows resume on the next `work` or `healthcheck`");
            ExitCode::ShutdownRequested
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn run(cli: Cli, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    match cli.command {
        Commands::Import {
            file,
            mode,
            match_field,
            blank_overwrite,
            background,
            detach,
            delimiter,
        } => {
            let args = ImportArgs {
                file,
                mode,
                match_field,
                blank_overwrite,
                background,
                detach,
                delimiter,
            };
            import(&config, args, shutdown).await
        }
        Commands::Healthcheck => healthcheck(&config, shutdown).await,
        Commands::Work => work(&config, shutdown).await,
        Commands::Status { json } => status(&config, json, shutdown).await,
        Commands::Dismiss => {
            let engine = Engine::open(&config, Processing::Deferred, shutdown.cancel_token())?;
            engine.queue.dismiss().await?;
            println!("Import report dismissed.");
            engine.close().await
        }
    }
}

async fn import(
    config: &AppConfig,
    args: ImportArgs,
    shutdown: &ShutdownCoordinator,
) -> Result<(), CliError> {
    let queued = args.background || args.detach;
    let processing = if queued && !args.detach {
        Processing::Worker
    } else {
        Processing::Deferred
    };

    let mut source = CsvSource::open(&args.file, args.delimiter)?;
    let session = ImportSession::new(source.headers().to_vec(), args.mode, args.match_field)
        .with_blank_overwrite(args.blank_overwrite)
        .with_background(queued);

    let engine = Engine::open(config, processing, shutdown.cancel_token())?;
    let (_subscription, mut done) = engine.events.channel::<ProcessCompleted>(4).await;

    info!(
        file = %args.file.display(),
        mode = %args.mode,
        columns = source.headers().len(),
        background = queued,
        "Starting import"
    );
    engine.queue.start(&session).await?;

    let mut line = 0u64;
    for row in source.by_ref() {
        if shutdown.is_shutdown_requested() {
            engine.close().await?;
            return Err(CliError::ShutdownRequested);
        }

        line += 1;
        if let Some(outcome) = engine.queue.push(row?).await? {
            output::print_row_feedback(line, &outcome);
        }
    }

    let batches = if queued {
        engine.queue.save().await?
    } else {
        Vec::new()
    };

    if batches.is_empty() {
        engine.queue.complete().await?;
    } else {
        engine.queue.dispatch().await?;

        if args.detach {
            println!(
                "Queued {} batch(es) ({line} rows). Run `intake work` to process them.",
                batches.len()
            );
            return engine.close().await;
        }

        let interval = config.queue.healthcheck_interval();
        drive(&engine, &mut done, interval, shutdown).await?;
    }

    println!("{}", engine.queue.report().await?);
    engine.close().await
}

async fn healthcheck(config: &AppConfig, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    let engine = Engine::open(config, Processing::Worker, shutdown.cancel_token())?;
    let (_subscription, mut done) = engine.events.channel::<ProcessCompleted>(4).await;

    let outcome = engine.queue.healthcheck().await?;
    info!(?outcome, "Healthcheck finished");

    if outcome == HealthcheckOutcome::Resumed {
        wait_for_completion(&mut done, shutdown).await?;
    }

    println!("{}", engine.queue.report().await?);
    engine.close().await
}

async fn work(config: &AppConfig, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    let engine = Engine::open(config, Processing::Worker, shutdown.cancel_token())?;
    let (_subscription, mut done) = engine.events.channel::<ProcessCompleted>(4).await;

    drive(&engine, &mut done, Duration::ZERO, shutdown).await?;

    println!("{}", engine.queue.report().await?);
    engine.close().await
}

async fn status(
    config: &AppConfig,
    as_json: bool,
    shutdown: &ShutdownCoordinator,
) -> Result<(), CliError> {
    let engine = Engine::open(config, Processing::Deferred, shutdown.cancel_token())?;

    let status = engine.queue.status().await?;
    let report = engine.queue.report().await?;

    if as_json {
        output::print_status_json(&status, &report)?;
    } else {
        output::print_status_table(&status, &report);
    }

    engine.close().await
}

/// Runs healthcheck ticks next to the worker until the queue completes,
/// empties or the process is interrupted.
async fn drive(
    engine: &Engine,
    done: &mut mpsc::Receiver<Arc<ProcessCompleted>>,
    first_delay: Duration,
    shutdown: &ShutdownCoordinator,
) -> Result<(), CliError> {
    let mut scheduler = TickScheduler::new(engine.queue.clone(), shutdown.cancel_token())
        .with_first_delay(first_delay)
        .spawn();

    let result = tokio::select! {
        event = done.recv() => {
            log_completion(event.as_deref());
            Ok(())
        }
        ticked = &mut scheduler => match ticked?? {
            Some(outcome) => {
                info!(?outcome, "Healthchecks finished");
                Ok(())
            }
            None => Err(CliError::ShutdownRequested),
        },
    };

    scheduler.abort();
    result
}

async fn wait_for_completion(
    done: &mut mpsc::Receiver<Arc<ProcessCompleted>>,
    shutdown: &ShutdownCoordinator,
) -> Result<(), CliError> {
    let cancel = shutdown.cancel_token();
    tokio::select! {
        event = done.recv() => {
            log_completion(event.as_deref());
            Ok(())
        }
        _ = cancel.cancelled() => Err(CliError::ShutdownRequested),
    }
}

fn log_completion(event: Option<&ProcessCompleted>) {
    match event {
        Some(event) => info!(
            aborted = event.aborted,
            rows_imported = event.rows_imported,
            "Processing finished"
        ),
        None => warn!("Event bus closed before processing finished"),
    }
}
