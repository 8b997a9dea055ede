//! Configuration types for the watcher.
//!
//! The persisted document is a flat JSON object (`REGION`, `CLICK_X`, ...).
//! It is validated once into a [`Configuration`], which the decision loop
//! treats as immutable for the lifetime of a run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Threshold used when the document carries no `THRESHOLD_VALUE`.
pub const DEFAULT_THRESHOLD: u64 = 19000;

/// A screen point in pixels, origin at the top-left of the primary display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    #[cfg_attr(not(windows), allow(dead_code))]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Pixel rectangle holding the price text. Width and height are always positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub top: i32,
    pub left: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(top: i32, left: i32, width: i32, height: i32) -> Result<Self, ConfigError> {
        if width <= 0 || height <= 0 {
            return Err(ConfigError::InvalidRegion { width, height });
        }
        Ok(Self {
            top,
            left,
            width,
            height,
        })
    }

    /// Derives the region from a top-left and a bottom-right pointer capture.
    pub fn from_corners(top_left: Coordinate, bottom_right: Coordinate) -> Result<Self, ConfigError> {
        Self::new(
            top_left.y,
            top_left.x,
            bottom_right.x - top_left.x,
            bottom_right.y - top_left.y,
        )
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "top={} left={} width={} height={}",
            self.top, self.left, self.width, self.height
        )
    }
}

/// The UI affordances the watcher clicks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickTarget {
    Follow,
    Item,
    Return,
    Purchase,
}

impl ClickTarget {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Follow => "FOLLOW button",
            Self::Item => "ITEM slot",
            Self::Return => "RETURN button",
            Self::Purchase => "PURCHASE button",
        }
    }

    /// Document keys for the x and y components.
    pub fn keys(&self) -> (&'static str, &'static str) {
        match self {
            Self::Follow => ("FOLLOW_X", "FOLLOW_Y"),
            Self::Item => ("ITEM_X", "ITEM_Y"),
            Self::Return => ("RETURN_X", "RETURN_Y"),
            Self::Purchase => ("CLICK_X", "CLICK_Y"),
        }
    }
}

/// How a reading is compared against the threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMode {
    /// Purchase when `reading <= threshold`.
    #[default]
    Inclusive,
    /// Purchase when `reading < threshold`.
    Exclusive,
}

impl ThresholdMode {
    pub fn qualifies(&self, reading: u64, threshold: u64) -> bool {
        match self {
            Self::Inclusive => reading <= threshold,
            Self::Exclusive => reading < threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Inclusive => "<=",
            Self::Exclusive => "<",
        }
    }
}

/// Which parts of the interaction sequence are active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSet {
    /// Click FOLLOW before opening the item.
    pub follow_step: bool,
    /// Open ITEM every tick and click RETURN when the item doesn't qualify.
    pub item_cycle: bool,
    /// Purchase at most once per qualifying streak.
    pub debounce: bool,
    pub threshold_mode: ThresholdMode,
}

impl FeatureSet {
    /// Follow, open item, then purchase or return, every tick.
    pub fn market_cycle() -> Self {
        Self {
            follow_step: true,
            item_cycle: true,
            debounce: false,
            threshold_mode: ThresholdMode::Inclusive,
        }
    }

    /// Watch a single region and click purchase once per dip below the threshold.
    #[cfg(test)]
    pub fn watch() -> Self {
        Self {
            follow_step: false,
            item_cycle: false,
            debounce: true,
            threshold_mode: ThresholdMode::Exclusive,
        }
    }

    /// Click targets that must be configured, in calibration order.
    pub fn required_targets(&self) -> Vec<ClickTarget> {
        let mut targets = Vec::new();
        if self.follow_step {
            targets.push(ClickTarget::Follow);
        }
        if self.item_cycle {
            targets.push(ClickTarget::Item);
            targets.push(ClickTarget::Return);
        }
        targets.push(ClickTarget::Purchase);
        targets
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self::market_cycle()
    }
}

/// Delays and timeouts, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Pause between ticks.
    pub scan_interval_ms: u64,
    /// Settle delay after clicking FOLLOW.
    pub follow_settle_ms: u64,
    /// Settle delay after opening the item.
    pub item_settle_ms: u64,
    /// Settle delay after a purchase or return click.
    pub action_settle_ms: u64,
    /// Upper bound for a single capture, recognition or click.
    pub capability_timeout_ms: u64,
}

impl Timing {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn follow_settle(&self) -> Duration {
        Duration::from_millis(self.follow_settle_ms)
    }

    pub fn item_settle(&self) -> Duration {
        Duration::from_millis(self.item_settle_ms)
    }

    pub fn action_settle(&self) -> Duration {
        Duration::from_millis(self.action_settle_ms)
    }

    pub fn capability_timeout(&self) -> Duration {
        Duration::from_millis(self.capability_timeout_ms)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            scan_interval_ms: 750,
            follow_settle_ms: 200,
            item_settle_ms: 300,
            action_settle_ms: 10,
            capability_timeout_ms: 10_000,
        }
    }
}

/// `REGION` as stored on disk. Every field is optional so that a partial
/// region is reported field by field instead of as a parse error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
}

impl From<Region> for RegionDocument {
    fn from(region: Region) -> Self {
        Self {
            top: Some(region.top),
            left: Some(region.left),
            width: Some(region.width),
            height: Some(region.height),
        }
    }
}

/// The persisted key/value document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(rename = "FOLLOW_X", skip_serializing_if = "Option::is_none")]
    pub follow_x: Option<i32>,
    #[serde(rename = "FOLLOW_Y", skip_serializing_if = "Option::is_none")]
    pub follow_y: Option<i32>,
    #[serde(rename = "ITEM_X", skip_serializing_if = "Option::is_none")]
    pub item_x: Option<i32>,
    #[serde(rename = "ITEM_Y", skip_serializing_if = "Option::is_none")]
    pub item_y: Option<i32>,
    #[serde(rename = "RETURN_X", skip_serializing_if = "Option::is_none")]
    pub return_x: Option<i32>,
    #[serde(rename = "RETURN_Y", skip_serializing_if = "Option::is_none")]
    pub return_y: Option<i32>,
    #[serde(rename = "CLICK_X", skip_serializing_if = "Option::is_none")]
    pub click_x: Option<i32>,
    #[serde(rename = "CLICK_Y", skip_serializing_if = "Option::is_none")]
    pub click_y: Option<i32>,
    #[serde(rename = "REGION", skip_serializing_if = "Option::is_none")]
    pub region: Option<RegionDocument>,
    #[serde(rename = "THRESHOLD_VALUE", skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u64>,
    #[serde(rename = "FEATURES", skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureSet>,
    #[serde(rename = "TIMING", skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
}

impl ConfigDocument {
    /// Feature set stored in the document, or the default.
    pub fn feature_set(&self) -> FeatureSet {
        self.features.unwrap_or_default()
    }

    fn coordinate_fields(&self, target: ClickTarget) -> (Option<i32>, Option<i32>) {
        match target {
            ClickTarget::Follow => (self.follow_x, self.follow_y),
            ClickTarget::Item => (self.item_x, self.item_y),
            ClickTarget::Return => (self.return_x, self.return_y),
            ClickTarget::Purchase => (self.click_x, self.click_y),
        }
    }

    pub fn coordinate(&self, target: ClickTarget) -> Option<Coordinate> {
        match self.coordinate_fields(target) {
            (Some(x), Some(y)) => Some(Coordinate { x, y }),
            _ => None,
        }
    }

    pub fn set_coordinate(&mut self, target: ClickTarget, at: Coordinate) {
        let (x, y) = match target {
            ClickTarget::Follow => (&mut self.follow_x, &mut self.follow_y),
            ClickTarget::Item => (&mut self.item_x, &mut self.item_y),
            ClickTarget::Return => (&mut self.return_x, &mut self.return_y),
            ClickTarget::Purchase => (&mut self.click_x, &mut self.click_y),
        };
        *x = Some(at.x);
        *y = Some(at.y);
    }

    /// Lists every key the feature set needs but the document lacks.
    pub fn missing_fields(&self, features: &FeatureSet) -> Vec<&'static str> {
        let mut missing = Vec::new();

        match &self.region {
            None => missing.push("REGION"),
            Some(region) => {
                if region.top.is_none() {
                    missing.push("REGION.top");
                }
                if region.left.is_none() {
                    missing.push("REGION.left");
                }
                if region.width.is_none() {
                    missing.push("REGION.width");
                }
                if region.height.is_none() {
                    missing.push("REGION.height");
                }
            }
        }

        for target in features.required_targets() {
            let (x, y) = self.coordinate_fields(target);
            let (key_x, key_y) = target.keys();
            if x.is_none() {
                missing.push(key_x);
            }
            if y.is_none() {
                missing.push(key_y);
            }
        }

        missing
    }
}

/// Validated configuration consumed by the decision loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Configuration {
    pub region: Region,
    pub purchase: Coordinate,
    pub follow: Option<Coordinate>,
    pub item: Option<Coordinate>,
    pub return_button: Option<Coordinate>,
    pub threshold: u64,
    pub features: FeatureSet,
    pub timing: Timing,
}

impl Configuration {
    /// Validates a document. Nothing required is defaulted.
    pub fn from_document(doc: &ConfigDocument) -> Result<Self, ConfigError> {
        let features = doc.feature_set();
        // An item opened by the cycle has to be returned on every tick.
        if features.debounce && features.item_cycle {
            return Err(ConfigError::DebounceWithItemCycle);
        }
        let missing = doc.missing_fields(&features);
        if !missing.is_empty() {
            return Err(ConfigError::MissingConfiguration { missing });
        }

        let region = match &doc.region {
            Some(RegionDocument {
                top: Some(top),
                left: Some(left),
                width: Some(width),
                height: Some(height),
            }) => Region::new(*top, *left, *width, *height)?,
            _ => {
                return Err(ConfigError::MissingConfiguration {
                    missing: vec!["REGION"],
                });
            }
        };

        let purchase = doc
            .coordinate(ClickTarget::Purchase)
            .ok_or(ConfigError::MissingConfiguration {
                missing: vec!["CLICK_X", "CLICK_Y"],
            })?;

        Ok(Self {
            region,
            purchase,
            follow: doc.coordinate(ClickTarget::Follow),
            item: doc.coordinate(ClickTarget::Item),
            return_button: doc.coordinate(ClickTarget::Return),
            threshold: doc.threshold.unwrap_or(DEFAULT_THRESHOLD),
            features,
            timing: doc.timing.unwrap_or_default(),
        })
    }

    /// Writes this configuration over `base`, keeping whatever else `base` carries.
    pub fn to_document(&self, base: &ConfigDocument) -> ConfigDocument {
        let mut doc = base.clone();
        doc.region = Some(self.region.into());
        doc.set_coordinate(ClickTarget::Purchase, self.purchase);
        if let Some(at) = self.follow {
            doc.set_coordinate(ClickTarget::Follow, at);
        }
        if let Some(at) = self.item {
            doc.set_coordinate(ClickTarget::Item, at);
        }
        if let Some(at) = self.return_button {
            doc.set_coordinate(ClickTarget::Return, at);
        }
        doc.threshold = Some(self.threshold);
        doc.features = Some(self.features);
        doc.timing = Some(self.timing);
        doc
    }

    /// Clicks issued before each capture, with the settle delay after each.
    pub fn precursors(&self) -> Vec<(ClickTarget, Coordinate, Duration)> {
        let mut steps = Vec::new();
        if self.features.follow_step {
            if let Some(at) = self.follow {
                steps.push((ClickTarget::Follow, at, self.timing.follow_settle()));
            }
        }
        if self.features.item_cycle {
            if let Some(at) = self.item {
                steps.push((ClickTarget::Item, at, self.timing.item_settle()));
            }
        }
        steps
    }

    /// The skip action, present only when the item cycle is active.
    pub fn return_action(&self) -> Option<Coordinate> {
        if self.features.item_cycle {
            self.return_button
        } else {
            None
        }
    }

    /// Logs the configuration the loop is about to use.
    pub fn log_summary(&self) {
        tracing::info!("Using configuration:");
        if let Some(at) = self.follow {
            tracing::info!("  Follow coordinates: {}", at);
        }
        if let Some(at) = self.item {
            tracing::info!("  Item coordinates:   {}", at);
        }
        if let Some(at) = self.return_button {
            tracing::info!("  Return coordinates: {}", at);
        }
        tracing::info!("  Purchase button:    {}", self.purchase);
        tracing::info!("  Region:             {}", self.region);
        tracing::info!(
            "  Threshold:          {} (purchase when price {} threshold)",
            self.threshold,
            self.features.threshold_mode.symbol()
        );
    }
}

/// File-backed store for the configuration document.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Reads the raw document. `Ok(None)` when no file exists yet.
    pub fn read(&self) -> Result<Option<ConfigDocument>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let doc = serde_json::from_str(&contents)?;
        Ok(Some(doc))
    }

    /// Loads and validates. A missing file is `NotFound`, an incomplete one is
    /// `MissingConfiguration`.
    pub fn load(&self) -> Result<Configuration, ConfigError> {
        let doc = self
            .read()?
            .ok_or_else(|| ConfigError::NotFound(self.path.clone()))?;
        let config = Configuration::from_document(&doc)?;
        tracing::info!("Loaded configuration from {}", self.path.display());
        Ok(config)
    }

    pub fn write(&self, doc: &ConfigDocument) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(doc)?;
        fs::write(&self.path, json)?;
        tracing::info!("Configuration saved to {}", self.path.display());
        Ok(())
    }
}
