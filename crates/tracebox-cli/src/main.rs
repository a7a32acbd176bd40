//! tracebox - sandboxed, line-by-line execution tracing
//!
//! ## Commands
//!
//! - `run`: trace a program file and print the result as JSON
//! - `handle`: answer one JSON `RunRequest` read from stdin
//! - `worker` (hidden): the isolated process a host spawns per execution

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, Level};

use tracebox_core::metrics::METRICS;
use tracebox_core::telemetry::level_for_verbosity;
use tracebox_core::{handle_request, IsolationHost, RunRequest, TraceboxConfig};

#[derive(Parser)]
#[command(name = "tracebox")]
#[command(author = "Stevedores Org")]
#[command(version = tracebox_core::VERSION)]
#[command(about = "Run a program in a sandbox and trace it line by line", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "TRACEBOX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace a program and print the steps as JSON
    Run(RunArgs),

    /// Read one `{"code": ..., "step": ...}` request from stdin and answer it
    Handle(HandleArgs),

    /// Serve a single execution request (spawned by the host)
    #[command(hide = true)]
    Worker,
}

#[derive(Args)]
struct RunArgs {
    /// Program to trace; `-` reads stdin
    path: PathBuf,

    /// Return only this step (0-based)
    #[arg(long, allow_hyphen_values = true)]
    step: Option<i64>,

    /// Wall-clock budget in milliseconds
    #[arg(long, env = "TRACEBOX_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Worker address-space ceiling in bytes; 0 disables it
    #[arg(long, env = "TRACEBOX_MEMORY_LIMIT_BYTES")]
    memory_limit_bytes: Option<u64>,

    /// Characters kept of each variable's representation
    #[arg(long, env = "TRACEBOX_MAX_REPR_CHARS")]
    max_repr_chars: Option<usize>,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct HandleArgs {
    /// Pretty-print the JSON response
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Workers start no runtime and keep stdout for their single result.
    if matches!(cli.command, Commands::Worker) {
        return cmd_worker();
    }

    let level = level_for_verbosity(cli.verbose);
    tracebox_core::telemetry::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(dispatch(cli.command, config))
}

async fn dispatch(command: Commands, config: TraceboxConfig) -> Result<()> {
    match command {
        Commands::Run(args) => cmd_run(args, &config).await,
        Commands::Handle(args) => cmd_handle(args, &config).await,
        Commands::Worker => cmd_worker(),
    }
}

fn load_config(path: Option<&Path>) -> Result<TraceboxConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            TraceboxConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
        None => Ok(TraceboxConfig::default()),
    }
}

fn cmd_worker() -> Result<()> {
    tracebox_core::telemetry::init_tracing(false, Level::WARN);
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    tracebox_core::sandbox::serve(stdin.lock(), stdout.lock()).context("Worker failed")?;
    Ok(())
}

async fn cmd_run(args: RunArgs, config: &TraceboxConfig) -> Result<()> {
    let source = if args.path == Path::new("-") {
        read_stdin()?
    } else {
        std::fs::read_to_string(&args.path)
            .with_context(|| format!("Failed to read {}", args.path.display()))?
    };

    let mut options = config.execution_options().with_step(args.step);
    if let Some(timeout_ms) = args.timeout_ms {
        ensure!(timeout_ms > 0, "--timeout-ms must be positive");
        options.timeout_ms = timeout_ms;
    }
    if let Some(bytes) = args.memory_limit_bytes {
        options.memory_limit_bytes = (bytes > 0).then_some(bytes);
    }
    if let Some(chars) = args.max_repr_chars {
        ensure!(chars > 0, "--max-repr-chars must be positive");
        options.trace.max_repr_chars = chars;
    }

    let host = IsolationHost::current_exe().context("Failed to locate the tracebox binary")?;
    let result = host.execute(&source, &options).await;
    print_json(&result, args.pretty)?;
    METRICS.flush();
    Ok(())
}

async fn cmd_handle(args: HandleArgs, config: &TraceboxConfig) -> Result<()> {
    let request: RunRequest =
        serde_json::from_str(&read_stdin()?).context("Failed to parse request")?;
    let host = IsolationHost::current_exe().context("Failed to locate the tracebox binary")?;
    let response = handle_request(&host, request, &config.execution_options()).await;
    print_json(&response, args.pretty)?;
    METRICS.flush();
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read stdin")?;
    Ok(text)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}")?;
    stdout.flush()?;
    Ok(())
}
