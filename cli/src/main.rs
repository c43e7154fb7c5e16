//! `uci-analyze` - probe a UCI engine or run a bounded analysis session.
//!
//! `probe` launches the engine, waits for the `uci` handshake to finish and
//! prints the engine name and the options the driver understands.
//!
//! `analyze` additionally applies preferences, analyzes one target for a
//! fixed time, optionally swaps to further targets mid-search, then stops
//! and reports the engine's best move.
//!
//! The engine binary, its arguments, the probe timeout and the log
//! destination come from [`config`] and can be overridden on the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uci_driver::{
    current_analyzing_count, AnalysisTarget, DriverConfig, DriverEvent, EngineDriver,
    EnginePreferences, LaunchConfig, PreferenceOutcome,
};

mod config;
mod output;

use output::Printer;

#[derive(Parser)]
#[command(name = "uci-analyze", about = "Drive a UCI chess engine from the terminal")]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Which engine to run. Defaults come from the environment.
#[derive(Args)]
struct EngineArgs {
    /// Engine binary (default: `UCI_DRIVER_ENGINE_PATH` or `stockfish`).
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    /// Argument passed to the engine. Repeat for several.
    #[arg(long = "engine-arg", global = true, allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Seconds to wait for `uciok` (default: `UCI_DRIVER_PROBE_TIMEOUT_SECS` or 10).
    #[arg(long, global = true)]
    probe_timeout: Option<u64>,

    /// Print every protocol line sent and received.
    #[arg(long, global = true)]
    raw: bool,

    /// Print events as JSON, one object per line.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the engine name and its supported options.
    Probe,
    /// Analyze a target for a fixed time.
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Target as sent after `position`, e.g. `startpos moves e2e4`.
    target: String,

    /// Targets to switch to, one after another, while the search runs.
    #[arg(long)]
    next: Vec<String>,

    /// Seconds to spend on each target.
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    #[arg(long)]
    threads: Option<u32>,

    /// Hash size in MB.
    #[arg(long)]
    hash: Option<u32>,

    #[arg(long, allow_hyphen_values = true)]
    contempt: Option<i32>,

    #[arg(long)]
    skill_level: Option<u8>,

    #[arg(long)]
    syzygy_path: Option<String>,
}

impl AnalyzeArgs {
    fn preferences(&self) -> EnginePreferences {
        EnginePreferences {
            threads: self.threads,
            hash_mb: self.hash,
            contempt: self.contempt,
            skill_level: self.skill_level,
            tablebase_path: self.syzygy_path.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("engine did not finish the uci handshake within {0:?}")]
    ProbeTimeout(Duration),

    #[error("engine exited unexpectedly")]
    EngineExited,
}

const LOG_FILE_PREFIX: &str = "uci-analyze";

/// Daily rolling log file inside `log_dir`, creating the directory if needed.
fn open_log_appender(log_dir: &Path) -> std::io::Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)?;
    Ok(tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX))
}

/// Install the log subscriber. Logs go to a daily file when a log directory
/// is configured, otherwise to stderr so stdout stays clean for output.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let appender = config::get_log_dir().and_then(|log_dir| match open_log_appender(&log_dir) {
        Ok(appender) => Some(appender),
        Err(e) => {
            eprintln!("Cannot log to {}: {}", log_dir.display(), e);
            None
        }
    });

    match appender {
        Some(file_appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_line_number(true),
                )
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

struct Session {
    driver: EngineDriver,
    events: mpsc::Receiver<DriverEvent>,
    printer: Printer<std::io::Stdout>,
}

impl Session {
    async fn start(args: &EngineArgs) -> anyhow::Result<Self> {
        let path = args.engine.clone().unwrap_or_else(config::get_engine_path);
        let engine_args = if args.engine_args.is_empty() {
            config::get_engine_args()
        } else {
            args.engine_args.clone()
        };
        let launch = LaunchConfig::new(path).with_args(engine_args);
        let driver_config = DriverConfig::default().with_echo_raw(args.raw);

        let mut driver = EngineDriver::launch(&launch, driver_config)
            .await
            .with_context(|| format!("failed to start {}", launch.path.display()))?;
        let events = driver
            .take_events()
            .context("driver events already taken")?;

        Ok(Self {
            driver,
            events,
            printer: Printer::new(std::io::stdout(), args.json),
        })
    }

    /// Print events until one matches `done`.
    async fn print_until(&mut self, done: impl Fn(&DriverEvent) -> bool) -> anyhow::Result<()> {
        while let Some(event) = self.events.recv().await {
            self.printer.print(&event)?;
            if done(&event) {
                return Ok(());
            }
            if event == DriverEvent::EngineExited {
                break;
            }
        }
        Err(CliError::EngineExited.into())
    }

    /// Print events until the `uci` handshake completes.
    async fn wait_until_ready(&mut self, timeout: Duration) -> anyhow::Result<()> {
        let ready = |event: &DriverEvent| matches!(event, DriverEvent::OptionsReady { .. });
        tokio::time::timeout(timeout, self.print_until(ready))
            .await
            .map_err(|_| CliError::ProbeTimeout(timeout))?
    }

    /// Print events for `duration`.
    async fn follow(&mut self, duration: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => return Ok(()),
                event = self.events.recv() => match event {
                    Some(DriverEvent::EngineExited) | None => {
                        return Err(CliError::EngineExited.into());
                    }
                    Some(event) => self.printer.print(&event)?,
                },
            }
        }
    }

    /// Print events until the engine answers a `stop`.
    async fn wait_for_bestmove(&mut self, timeout: Duration) -> anyhow::Result<()> {
        let complete = |event: &DriverEvent| matches!(event, DriverEvent::CycleComplete { .. });
        match tokio::time::timeout(timeout, self.print_until(complete)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("No bestmove within {:?}", timeout);
                Ok(())
            }
        }
    }
}

async fn probe(args: &EngineArgs, timeout: Duration) -> anyhow::Result<()> {
    let mut session = Session::start(args).await?;
    session.wait_until_ready(timeout).await?;
    session.driver.shutdown().await?;
    Ok(())
}

async fn analyze(args: &EngineArgs, opts: &AnalyzeArgs, timeout: Duration) -> anyhow::Result<()> {
    let targets = std::iter::once(&opts.target)
        .chain(&opts.next)
        .map(|text| {
            AnalysisTarget::new(text.as_str()).with_context(|| format!("invalid target {:?}", text))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut session = Session::start(args).await?;
    session.wait_until_ready(timeout).await?;

    let preferences = opts.preferences();
    if !preferences.is_empty() {
        match session.driver.apply_preferences(preferences).await? {
            PreferenceOutcome::Applied(count) => tracing::info!("Applied {} engine options", count),
            PreferenceOutcome::Refused => tracing::warn!("Engine options were not applied"),
        }
    }

    let per_target = Duration::from_secs(opts.seconds);
    for (i, target) in targets.into_iter().enumerate() {
        tracing::info!("Analyzing {}", target);
        session.driver.set_target(target).await?;
        if i == 0 {
            session.driver.set_analyzing(true).await?;
        }
        session.follow(per_target).await?;
    }

    session.driver.set_analyzing(false).await?;
    session.wait_for_bestmove(timeout).await?;
    tracing::debug!("Analyses still running: {}", current_analyzing_count());

    session.driver.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_tracing();
    let cli = Cli::parse();

    let timeout = cli
        .engine
        .probe_timeout
        .map(Duration::from_secs)
        .unwrap_or_else(config::get_probe_timeout);

    match &cli.command {
        Commands::Probe => probe(&cli.engine, timeout).await,
        Commands::Analyze(args) => analyze(&cli.engine, args, timeout).await,
    }
}
