//! The price-watching decision loop and the pieces it runs on.
//!
//! This module provides:
//! - Configuration model and persistence
//! - Capability traits for capture, recognition, clicking and time
//! - The tick state machine and its runner
//! - Stop triggers and the capability watchdog

pub mod cancel;
pub mod capability;
pub mod config;
pub mod hotkey;
pub mod input;
pub mod runner;
pub mod state;
pub mod watchdog;

pub use cancel::CancellationSignal;
pub use config::{ConfigDocument, ConfigStore, Configuration};
pub use hotkey::install_stop_triggers;
pub use runner::start_watching;
pub use state::StopReason;
