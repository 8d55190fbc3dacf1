//! Agent Slots CLI - register a worker slot or inspect the registration directory.
//!
//! `agent-slots register` claims a worker id and slot and holds it until the
//! process is interrupted (or `--hold-secs` elapses). The identity is printed
//! to stdout as `WORKER_ID=...` / `SLOT=...` lines for wrapper scripts.

mod commands;

use agent_slots::{Registration, RegistrationDir};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "agent-slots")]
#[command(about = "Worker identity and slot registration for agent processes")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Registration directory (defaults to the host mount or the temp dir)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Treat --dir as an orchestrated mount shared across hosts' containers
    #[arg(long, global = true)]
    orchestrated: bool,

    /// Delay between lock checks, in milliseconds
    #[arg(long, global = true, default_value = "1000")]
    poll_interval_ms: u64,

    /// Seconds before a held lock is considered stale
    #[arg(long, global = true, default_value = "10")]
    lock_timeout_secs: u64,

    /// Agent API server used to confirm workers on orchestrated mounts
    #[arg(long, global = true)]
    api_server: Option<String>,

    /// Bearer token for the agent API server
    #[arg(long, global = true)]
    api_token: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Claim a worker id and slot, then hold it
    Register {
        /// Explicit unique worker id; refused if a live worker holds it
        #[arg(long)]
        worker_id: Option<String>,

        /// Worker name; the published id becomes `<name>:<slot>`
        #[arg(long)]
        worker_name: Option<String>,

        /// Release after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        hold_secs: Option<u64>,

        /// Print the identity as JSON
        #[arg(long)]
        json: bool,
    },
    /// List live registration records (dead ones are reclaimed)
    List {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    let registration = build_registration(&cli.global);
    debug!(
        "Registration directory: {} (orchestrated: {})",
        registration.directory().path.display(),
        registration.directory().orchestrated
    );

    let registry = commands::build_registry(&cli.global)?;

    let code = match cli.command {
        Command::Register {
            worker_id,
            worker_name,
            hold_secs,
            json,
        } => commands::register(
            registration,
            registry.as_deref(),
            worker_id.as_deref(),
            worker_name.as_deref(),
            hold_secs.map(Duration::from_secs),
            json,
        )?,
        Command::List { json } => commands::list(&registration, registry.as_deref(), json)?,
    };

    std::process::exit(code);
}

fn init_logging(args: &GlobalArgs) {
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    if args.log_json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn build_registration(args: &GlobalArgs) -> Registration {
    let mut builder = Registration::builder()
        .poll_interval(Duration::from_millis(args.poll_interval_ms))
        .lock_timeout(Duration::from_secs(args.lock_timeout_secs));

    if let Some(dir) = &args.dir {
        builder = builder.registration_dir(RegistrationDir {
            path: dir.clone(),
            orchestrated: args.orchestrated,
        });
    }

    builder.build()
}
