//! Calibration workflow: interactive capture of the screen positions, price
//! region and threshold, plus the saved-configuration reuse prompt.

pub mod coords;
pub mod preview;
pub mod state;
pub mod wizard;

pub use preview::check_region;
pub use wizard::{
    ConsoleOperator, Operator, StartupChoice, ask_startup_choice, configure, prepare_run,
};
