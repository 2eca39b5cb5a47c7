//! guard-zeus - run and stop a shared Zeus preloader from the shell.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use guard_zeus::{
    DeferredResult, DryRunControl, NoPeers, ProcessControl, Runner, StopOutcome, SupervisorConfig,
    SystemProcessControl,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "guard-zeus")]
#[command(about = "Start, use and stop a shared Zeus preloader")]
struct Args {
    /// Project root (defaults to the current directory)
    #[arg(long)]
    root: Option<PathBuf>,

    /// JSON file with runner options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log process operations instead of performing them
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Boot Zeus (or reuse a running one) and keep it up until Ctrl-C
    Start,
    /// Run the given test files through `zeus test`
    Run {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Run the whole suite
    RunAll,
    /// Stop the Zeus instance that owns `.zeus.sock`
    Stop {
        /// Stop immediately instead of waiting for other consumers
        #[arg(long)]
        force: bool,
    },
}

fn load_config(args: &Args) -> Result<SupervisorConfig> {
    let mut config = match &args.config {
        Some(path) => SupervisorConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SupervisorConfig::default(),
    };
    if let Some(root) = &args.root {
        config.root = std::path::absolute(root)?;
    }
    Ok(config)
}

fn build_runner(args: &Args, config: SupervisorConfig) -> Result<Runner> {
    let control: Arc<dyn ProcessControl> = if args.dry_run {
        Arc::new(DryRunControl::new())
    } else {
        Arc::new(SystemProcessControl::new(&config.root))
    };
    Ok(Runner::with_control(config, control, Arc::new(NoPeers))?)
}

/// Run a blocking runner call off the async executor.
async fn blocking<T, F>(runner: &Arc<Runner>, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Runner) -> guard_zeus::Result<T> + Send + 'static,
{
    let runner = Arc::clone(runner);
    let value = tokio::task::spawn_blocking(move || call(&runner)).await??;
    Ok(value)
}

async fn report_stop(outcome: StopOutcome, runner: &Runner) -> Result<()> {
    match outcome {
        StopOutcome::NotRunning => info!("No Zeus process to stop"),
        StopOutcome::Stopped(termination) => info!("Stop finished: {:?}", termination),
        StopOutcome::AlreadyScheduled => info!("A stop is already pending"),
        StopOutcome::Deferred => {
            if let Some(pending) = runner.take_deferred_stop() {
                if !pending.is_finished() {
                    info!("Waiting for the other Zeus consumers to exit");
                }
                match tokio::task::spawn_blocking(move || pending.join()).await?? {
                    DeferredResult::Completed(termination) => {
                        info!("Deferred stop finished: {:?}", termination)
                    }
                    DeferredResult::Cancelled => warn!("Deferred stop was cancelled"),
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config = load_config(&args)?;
    info!("Project root: {}", config.root.display());
    let runner = Arc::new(build_runner(&args, config)?);

    match args.command {
        Command::Start => {
            let ready = blocking(&runner, |r| r.launch("Start")).await?;
            if !ready {
                warn!("Zeus is not fully booted yet, continuing anyway");
            }

            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received, stopping Zeus");
            let outcome = blocking(&runner, |r| r.stop(true)).await?;
            report_stop(outcome, &runner).await?;
        }
        Command::Run { paths } => {
            blocking(&runner, move |r| r.run(&paths)).await?;
        }
        Command::RunAll => {
            if !blocking(&runner, |r| r.run_all()).await? {
                info!("Nothing to run");
            }
        }
        Command::Stop { force } => {
            let attached = blocking(&runner, |r| r.attach()).await?;
            info!("Attach result: {:?}", attached);
            let outcome = blocking(&runner, move |r| r.stop(force)).await?;
            report_stop(outcome, &runner).await?;
        }
    }

    Ok(())
}
