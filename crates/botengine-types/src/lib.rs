//! Shared type definitions for the botengine workspace.
//!
//! # Modules
//!
//! - [`ids`] -- Agent identifiers
//! - [`actions`] -- Commands and the action requests agents submit
//! - [`notice`] -- Lifecycle and output notices from agent runtimes
//! - [`registers`] -- Register names and inbound state-change messages
//! - [`trace`] -- Observable trace notifications

pub mod actions;
pub mod ids;
pub mod notice;
pub mod registers;
pub mod trace;

pub use actions::{ActionRequest, Command};
pub use ids::AgentId;
pub use notice::AgentNotice;
pub use registers::{MOTOR_READY, RegisterChange};
pub use trace::TraceEvent;
