//! Engine binary for botengine.
//!
//! Wires the action queue, the scripted agents and the tick scheduler
//! together and runs until Ctrl-C or the configured tick bound.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `botengine-config.yaml` (optional)
//! 2. Initialize structured logging (tracing)
//! 3. Load the agent script (configured path or the built-in walker)
//! 4. Create the action queue and notice channel
//! 5. Spawn agents into the registry
//! 6. Run the scheduler, printing the trace to stdout (or the JSON log)
//! 7. Stop every agent and log the result

mod error;
mod spawner;

use std::path::Path;
use std::sync::Arc;

use botengine_agents::action_queue;
use botengine_core::{
    EngineConfig, SchedulerControl, StdoutSink, TickScheduler, TraceSink, TracingSink,
    log_run_end, run_scheduler,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::spawner::SpawnPlan;

/// Config file looked up in the working directory.
const CONFIG_PATH: &str = "botengine-config.yaml";

/// Script run by every agent when none is configured.
const WALK_FORWARD: &str = include_str!("../scripts/walk_forward.rhai");

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the scheduler fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging.level, config.logging.json);

    info!("botengine-engine starting");
    info!(
        from_file,
        tick_interval_ms = config.scheduler.tick_interval_ms,
        queue_capacity = config.scheduler.action_queue_capacity,
        overflow_policy = ?config.scheduler.overflow_policy,
        max_ticks = config.scheduler.max_ticks,
        agents = config.agents.count,
        "configuration loaded"
    );

    // 3. Load the agent script.
    let script = load_script(config.agents.script_path.as_deref())?;

    // 4. Channels shared by every agent.
    let (actions, receiver) = action_queue(
        config.scheduler.action_queue_capacity,
        config.scheduler.overflow_policy,
    );
    let (notices, notice_rx) = mpsc::unbounded_channel();
    let root = CancellationToken::new();

    // 5. Spawn agents.
    let plan = SpawnPlan::from_config(&config.agents, script);
    let registry = spawner::spawn_agents(&plan, &actions, &notices, &root)?;
    // The scheduler detects a closed queue only once every agent is gone.
    drop(actions);
    drop(notices);

    // 6. Run the scheduler.
    let control = Arc::new(SchedulerControl::new(
        config.scheduler.tick_interval_ms,
        config.scheduler.max_ticks,
        root.clone(),
    ));
    spawn_ctrl_c_handler(Arc::clone(&control));

    let mut scheduler = TickScheduler::new(
        config.scheduler,
        receiver,
        notice_rx,
        registry,
        trace_sink(config.logging.json),
    );
    let result = run_scheduler(&mut scheduler, &control)
        .await
        .map_err(EngineError::from);

    // 7. Stop every agent, even if the run failed.
    root.cancel();
    let exits = scheduler.into_registry().shutdown_all().await;
    let faulted = exits.iter().filter(|exit| exit.script.is_err()).count();

    let result = result?;
    log_run_end(&result);
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        agents = exits.len(),
        faulted,
        elapsed_seconds = control.elapsed_seconds(),
        "botengine-engine shutdown complete"
    );

    Ok(())
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level.
fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Plain trace lines on stdout, or trace events in the JSON log stream.
fn trace_sink(json: bool) -> Box<dyn TraceSink> {
    if json {
        Box::new(TracingSink)
    } else {
        Box::new(StdoutSink)
    }
}

/// Request a stop on the first Ctrl-C.
fn spawn_ctrl_c_handler(control: Arc<SchedulerControl>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("ctrl-c received, stopping");
                control.request_stop();
            }
            Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
        }
    });
}

/// Load `botengine-config.yaml` from the working directory, or defaults.
///
/// Returns the config and whether it came from the file.
fn load_config() -> Result<(EngineConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok((EngineConfig::from_file(config_path)?, true))
    } else {
        let mut config = EngineConfig::default();
        config.agents.apply_env_overrides()?;
        config.validate()?;
        Ok((config, false))
    }
}

/// Read the configured script, or fall back to the built-in walker.
fn load_script(path: Option<&Path>) -> Result<Arc<str>, EngineError> {
    match path {
        Some(path) => {
            let source = std::fs::read_to_string(path).map_err(|source| EngineError::Script {
                path: path.to_path_buf(),
                source,
            })?;
            info!(path = %path.display(), "agent script loaded");
            Ok(Arc::from(source))
        }
        None => {
            info!("no script configured, agents walk forward");
            Ok(Arc::from(WALK_FORWARD))
        }
    }
}
