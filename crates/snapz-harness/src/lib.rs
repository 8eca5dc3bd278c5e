//! Test harness for the session layer.
//!
//! - [`ScriptedEngine`]: in-memory protocol engine that records outbound
//!   calls and replays scripted inbound events
//! - [`RecordingHandler`]: event handler that records every outward event and
//!   decision
//! - [`fixtures`]: builders for common inbound events and forms
//!
//! Synchronization is explicit (condition variables and barriers); nothing
//! in the harness sleeps.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod fixtures;
pub mod handler;

pub use engine::{EngineCall, ScriptedEngine};
pub use handler::RecordingHandler;
