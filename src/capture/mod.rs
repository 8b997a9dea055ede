//! Screen capture for the price region.

pub mod region;

pub use region::ScreenSensor;
