//! Agent-side state and message paths for the botengine scheduler.
//!
//! This crate holds everything an agent owns or shares with the scheduler
//! without knowing how scripts are executed or how ticks are driven.
//!
//! # Modules
//!
//! - [`registers`] -- The per-agent [`RegisterStore`] with change notification
//! - [`listener`] -- The register-update listener task ([`run_listener`])
//! - [`queue`] -- The bounded, shared action queue ([`action_queue`])
//! - [`error`] -- Error types ([`RegisterError`], [`QueueError`])

pub mod error;
pub mod listener;
pub mod queue;
pub mod registers;

pub use error::{QueueError, RegisterError};
pub use listener::{ListenerExit, ListenerReport, inbound_channel, run_listener};
pub use queue::{ActionReceiver, ActionSender, OverflowPolicy, action_queue};
pub use registers::{RegisterStore, Registers};
