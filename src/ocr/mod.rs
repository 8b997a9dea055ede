//! Text recognition for the price region.

pub mod engine;
pub mod preprocess;
pub mod reading;
pub mod setup;

pub use engine::TesseractExtractor;
pub use preprocess::Preprocessing;
pub use reading::parse_reading;
