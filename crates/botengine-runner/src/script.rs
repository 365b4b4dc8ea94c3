//! Script interpreter binding.
//!
//! Agent programs are Rhai scripts. This module builds an [`Engine`] with
//! the host primitives registered and runs a program to completion on the
//! calling thread.
//!
//! | Script function   | Host primitive                   |
//! |-------------------|----------------------------------|
//! | `motor_wait()`    | [`HostContext::motor_wait`]      |
//! | `motor_step_fw()` | [`HostContext::motor_step_fw`]   |
//! | `register(key)`   | [`HostContext::register`]        |
//! | `say(message)`    | [`HostContext::say`]             |
//! | `agent_id()`      | [`HostContext::agent_id`]        |

use rhai::{Engine, EvalAltResult, ImmutableString};
use tracing::debug;

use crate::error::{AgentError, PrimitiveError};
use crate::primitives::HostContext;

/// How a script run ended without a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// The program returned normally.
    Completed,
    /// The program was stopped by the shutdown signal.
    Cancelled,
}

/// Limits applied to one script engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptLimits {
    /// Maximum interpreter operations per run (0 = unlimited).
    pub max_operations: u64,
}

fn to_script_error(err: PrimitiveError) -> Box<EvalAltResult> {
    err.to_string().into()
}

/// Build an interpreter with every host primitive bound to `ctx`.
pub fn build_engine(ctx: &HostContext, limits: ScriptLimits) -> Engine {
    let mut engine = Engine::new();

    if limits.max_operations > 0 {
        engine.set_max_operations(limits.max_operations);
    }

    // Scripts that never call a blocking primitive still stop on shutdown.
    let token = ctx.shutdown().clone();
    engine.on_progress(move |_ops| {
        if token.is_cancelled() {
            Some("shutdown".into())
        } else {
            None
        }
    });

    let host = ctx.clone();
    engine.register_fn("motor_wait", move || -> Result<(), Box<EvalAltResult>> {
        host.motor_wait().map_err(to_script_error)
    });

    let host = ctx.clone();
    engine.register_fn("motor_step_fw", move || -> Result<bool, Box<EvalAltResult>> {
        host.motor_step_fw().map_err(to_script_error)
    });

    let host = ctx.clone();
    engine.register_fn("register", move |key: ImmutableString| -> i64 {
        host.register(key.as_str())
    });

    let host = ctx.clone();
    engine.register_fn("say", move |message: ImmutableString| {
        host.say(message.as_str());
    });

    let id = i64::from(ctx.agent_id().into_inner());
    engine.register_fn("agent_id", move || -> i64 { id });

    engine
}

/// Run `source` to completion on the current thread.
///
/// Must be called from a blocking-capable thread (for example inside
/// [`tokio::task::spawn_blocking`]): blocking primitives park the caller.
///
/// # Errors
///
/// Returns [`AgentError::ScriptFault`] for parse errors, runtime errors and
/// exceeded limits. A stop caused by the shutdown signal is not a fault.
pub fn run_script(
    ctx: &HostContext,
    source: &str,
    limits: ScriptLimits,
) -> Result<ScriptOutcome, AgentError> {
    let engine = build_engine(ctx, limits);
    debug!(agent_id = %ctx.agent_id(), "script starting");

    match engine.run(source) {
        Ok(()) => Ok(ScriptOutcome::Completed),
        Err(_) if ctx.shutdown().is_cancelled() => Ok(ScriptOutcome::Cancelled),
        Err(err) => Err(AgentError::ScriptFault {
            agent_id: ctx.agent_id(),
            message: err.to_string(),
        }),
    }
}
