//! Subcommand handlers. Each returns the process exit code.

use crate::GlobalArgs;
use agent_slots::{
    ApiWorkerRegistry, Registration, RegistrationOutcome, WorkerRegistry,
};
use anyhow::{Context, Result};
use serde_json::json;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{info, warn};

/// Exit code when the requested worker id is held by a live worker.
pub const EXIT_ALREADY_RUNNING: i32 = 2;

pub fn build_registry(args: &GlobalArgs) -> Result<Option<Box<dyn WorkerRegistry>>> {
    let Some(server) = &args.api_server else {
        return Ok(None);
    };
    let mut registry = ApiWorkerRegistry::new(server)
        .with_context(|| format!("invalid API server {server}"))?;
    if let Some(token) = &args.api_token {
        registry = registry.with_token(token.clone());
    }
    Ok(Some(Box::new(registry)))
}

pub fn register(
    mut registration: Registration,
    registry: Option<&dyn WorkerRegistry>,
    worker_id: Option<&str>,
    worker_name: Option<&str>,
    hold: Option<Duration>,
    json: bool,
) -> Result<i32> {
    let identity = match registration.try_register(worker_id, worker_name, registry)? {
        RegistrationOutcome::Registered(identity) => identity,
        RegistrationOutcome::AlreadyRunning { worker_id, pid } => {
            warn!(
                "Worker id {} is already in use by pid {:?}, not registering",
                worker_id, pid
            );
            return Ok(EXIT_ALREADY_RUNNING);
        }
    };

    // Installed before the identity is printed so a supervisor that signals
    // right after reading it still gets a clean release.
    let shutdown = match hold {
        Some(_) => None,
        None => Some(shutdown_channel()?),
    };

    if json {
        println!("{}", serde_json::to_string(&identity)?);
    } else {
        println!("WORKER_ID={}", identity.worker_id);
        println!("SLOT={}", identity.slot);
    }

    match (hold, shutdown) {
        (Some(hold), _) => std::thread::sleep(hold),
        (None, Some(rx)) => {
            info!("Holding registration until SIGINT or SIGTERM");
            let _ = rx.recv();
            info!("Shutdown signal received, releasing registration");
        }
        (None, None) => {}
    }

    registration.unregister()?;
    Ok(0)
}

pub fn list(
    registration: &Registration,
    registry: Option<&dyn WorkerRegistry>,
    json: bool,
) -> Result<i32> {
    let records = registration.live_records(registry)?;

    if json {
        let payload = json!({
            "directory": registration.directory().path,
            "records": records,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(0);
    }

    for record in &records {
        println!(
            "{}\t{}\t{}",
            record
                .body
                .slot
                .map_or_else(|| "-".to_string(), |slot| slot.to_string()),
            record.body.worker_id.as_deref().unwrap_or("-"),
            record.pid.map_or_else(|| "-".to_string(), |pid| pid.to_string()),
        );
    }
    Ok(0)
}

/// Receiver that fires on Ctrl-C or SIGTERM.
fn shutdown_channel() -> Result<mpsc::Receiver<()>> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("failed to install shutdown signal handler")?;
    Ok(rx)
}
