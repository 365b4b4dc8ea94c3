//! Scripted agent runtime for botengine.
//!
//! Each agent runs a Rhai program on its own blocking thread. Host
//! primitives let the program read its registers, request actions through
//! the shared queue, and block until the scheduler resolves them.
//!
//! ```text
//! script --> HostContext --> RegisterStore (own agent only)
//!                        \-> ActionSender --> tick scheduler
//! ```
//!
//! # Modules
//!
//! - [`primitives`] -- [`HostContext`] and the host primitive contracts
//! - [`script`] -- Interpreter setup and [`run_script`]
//! - [`runtime`] -- [`spawn_agent`] and the owning [`AgentHandle`]
//! - [`error`] -- [`PrimitiveError`] and [`AgentError`]

pub mod error;
pub mod primitives;
pub mod runtime;
pub mod script;

pub use error::{AgentError, PrimitiveError};
pub use primitives::HostContext;
pub use runtime::{AgentExit, AgentHandle, AgentSpec, spawn_agent};
pub use script::{ScriptLimits, ScriptOutcome, build_engine, run_script};
