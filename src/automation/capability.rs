//! External operations the decision loop depends on.
//!
//! Production implementations live in `capture`, `ocr` and `automation::input`;
//! tests substitute scripted ones.

use std::time::{Duration, Instant};

use anyhow::Result;
use image::RgbaImage;

use crate::automation::config::{Coordinate, Region};
use crate::ocr::Preprocessing;

/// Returns the pixels of a screen region.
pub trait RegionSensor {
    fn capture_region(&mut self, region: &Region) -> Result<RgbaImage>;
}

/// Recognizes text in an image after applying the given preprocessing.
///
/// Fragments are returned in reading order.
pub trait TextExtractor {
    fn recognize_text(&mut self, image: &RgbaImage, preprocessing: &Preprocessing)
    -> Result<Vec<String>>;
}

/// Performs a synthetic left click.
pub trait InputActuator {
    fn click(&mut self, at: Coordinate) -> Result<()>;
}

/// Wall-clock access for the loop.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&mut self, duration: Duration);
}

/// The real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
