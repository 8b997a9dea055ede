//! Post-calibration check of the price region.
//!
//! Captures the region once, saves what the sensor saw and what the OCR
//! engine will see, and logs the reading.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};

use crate::automation::capability::{RegionSensor, TextExtractor};
use crate::automation::config::Configuration;
use crate::error::ReadingError;
use crate::ocr::{Preprocessing, parse_reading};

/// Result of a single region check.
#[derive(Debug)]
pub struct RegionCheck {
    pub raw_path: PathBuf,
    pub processed_path: PathBuf,
    pub fragments: Vec<String>,
    pub reading: Result<u64, ReadingError>,
}

/// Captures and reads the configured region once.
pub fn check_region(
    config: &Configuration,
    sensor: &mut impl RegionSensor,
    extractor: &mut impl TextExtractor,
    out_dir: &Path,
) -> Result<RegionCheck> {
    let preprocessing = Preprocessing::default();
    let image = sensor
        .capture_region(&config.region)
        .context("Failed to capture price region")?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let raw_path = out_dir.join(format!("region_{}.png", timestamp));
    let processed_path = out_dir.join(format!("region_{}_ocr.png", timestamp));
    image
        .save(&raw_path)
        .with_context(|| format!("Failed to save {}", raw_path.display()))?;
    preprocessing
        .apply(&image)
        .save(&processed_path)
        .with_context(|| format!("Failed to save {}", processed_path.display()))?;

    let fragments = extractor.recognize_text(&image, &preprocessing)?;
    let reading = parse_reading(&fragments);

    tracing::info!("Region capture saved to {}", raw_path.display());
    tracing::info!("OCR input saved to {}", processed_path.display());
    match &reading {
        Ok(value) => tracing::info!(
            "Region check: read {} (threshold {})",
            value,
            config.threshold
        ),
        Err(e) => tracing::warn!(
            "Region check: {} (fragments: {:?}). Consider recalibrating the region.",
            e,
            fragments
        ),
    }

    Ok(RegionCheck {
        raw_path,
        processed_path,
        fragments,
        reading,
    })
}
