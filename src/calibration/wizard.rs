//! Calibration wizard implementation.
//!
//! Walks the operator through each required screen position, derives the
//! price region from two corners, reads a threshold, and persists the result.
//! On the run path it reloads the saved configuration and asks whether to
//! reuse it.

use anyhow::{anyhow, Context, Result};
use std::io::{self, BufRead, Write};

use crate::automation::config::{
    ConfigDocument, ConfigStore, Configuration, Coordinate, DEFAULT_THRESHOLD, Region,
};
use crate::calibration::coords::get_cursor_position;
use crate::calibration::state::CalibrationStep;
use crate::error::ConfigError;

/// The person at the keyboard.
pub trait Operator {
    /// Shows `prompt`, blocks until the operator is ready, and returns the
    /// pointer position at that moment.
    fn capture_point(&mut self, prompt: &str) -> Result<Coordinate>;

    /// Asks a question and returns the trimmed answer.
    fn ask(&mut self, question: &str) -> Result<String>;
}

/// Operator on the terminal, reading the system cursor.
#[derive(Debug, Default)]
pub struct ConsoleOperator;

impl ConsoleOperator {
    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        if read == 0 {
            return Err(anyhow!("stdin closed"));
        }
        Ok(line.trim().to_string())
    }
}

impl Operator for ConsoleOperator {
    fn capture_point(&mut self, prompt: &str) -> Result<Coordinate> {
        println!("{}", prompt);
        print!("Press Enter when ready...");
        io::stdout().flush()?;
        self.read_line()?;
        let pos = get_cursor_position()?;
        println!("Captured: {}\n", pos);
        Ok(pos)
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        print!("{}", question);
        io::stdout().flush()?;
        self.read_line()
    }
}

/// Top-level mode picked at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupChoice {
    Configure,
    Run,
}

impl StartupChoice {
    pub fn parse(answer: &str) -> Option<Self> {
        match answer.trim().to_ascii_lowercase().as_str() {
            "c" | "configure" => Some(Self::Configure),
            "r" | "run" => Some(Self::Run),
            _ => None,
        }
    }
}

/// Asks "configure or run" until the answer is recognized.
pub fn ask_startup_choice(operator: &mut impl Operator) -> Result<StartupChoice> {
    loop {
        let answer = operator.ask("Would you like to configure (c) or run (r)? ")?;
        match StartupChoice::parse(&answer) {
            Some(choice) => return Ok(choice),
            None => tracing::warn!("Please answer 'c' or 'r' (got '{}')", answer),
        }
    }
}

/// Parses a threshold answer. Thousands separators are accepted.
pub fn parse_threshold(raw: &str) -> Result<u64, ConfigError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::InvalidThreshold(raw.to_string()));
    }
    cleaned
        .parse()
        .map_err(|_| ConfigError::InvalidThreshold(raw.to_string()))
}

fn ask_threshold(operator: &mut impl Operator, default: u64) -> Result<u64> {
    loop {
        let answer = operator.ask(&format!(
            "Enter threshold value (press Enter for {}): ",
            default
        ))?;
        if answer.is_empty() {
            return Ok(default);
        }
        match parse_threshold(&answer) {
            Ok(value) => return Ok(value),
            Err(e) => tracing::warn!("{}", e),
        }
    }
}

/// Captures every position the document's feature set needs, plus region
/// and threshold. Features and timing come from `base`.
pub fn calibrate(operator: &mut impl Operator, base: &ConfigDocument) -> Result<Configuration> {
    let features = base.feature_set();
    let steps = CalibrationStep::sequence(&features);
    let default_threshold = base.threshold.unwrap_or(DEFAULT_THRESHOLD);

    let mut doc = ConfigDocument {
        features: Some(features),
        timing: base.timing,
        ..ConfigDocument::default()
    };
    let mut top_left: Option<Coordinate> = None;
    let mut region: Option<Region> = None;
    let mut threshold = default_threshold;

    let mut index = 0;
    while index < steps.len() {
        let step = steps[index];
        let prompt = format!(
            "--- Step {}/{}: {} ---\n{}",
            index + 1,
            steps.len(),
            step.description(),
            step.instructions()
        );

        match step {
            CalibrationStep::RegionTopLeft => {
                top_left = Some(operator.capture_point(&prompt)?);
            }
            CalibrationStep::RegionBottomRight => {
                let bottom_right = operator.capture_point(&prompt)?;
                let corner = top_left.ok_or_else(|| anyhow!("top-left corner not captured"))?;
                match Region::from_corners(corner, bottom_right) {
                    Ok(r) => {
                        tracing::info!("Region set to: {}", r);
                        region = Some(r);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "{}. The bottom-right corner must be below and right of the top-left corner; capture both again.",
                            e
                        );
                        let restart = step.rewind_to_step_start();
                        index = steps.iter().position(|s| *s == restart).unwrap_or(0);
                        continue;
                    }
                }
            }
            CalibrationStep::Threshold => {
                threshold = ask_threshold(operator, default_threshold)?;
                tracing::info!("Threshold set to: {}", threshold);
            }
            button => {
                if let Some(target) = button.target() {
                    let at = operator.capture_point(&prompt)?;
                    tracing::info!("{} set to: {}", target.label(), at);
                    doc.set_coordinate(target, at);
                }
            }
        }
        index += 1;
    }

    doc.region = region.map(Into::into);
    doc.threshold = Some(threshold);
    Ok(Configuration::from_document(&doc)?)
}

/// Runs the capture path and saves the result over `base`.
pub fn configure(
    store: &ConfigStore,
    operator: &mut impl Operator,
    base: &ConfigDocument,
) -> Result<Configuration> {
    tracing::info!("Starting calibration. Follow the prompts below.");
    let config = calibrate(operator, base)?;
    store.write(&config.to_document(base))?;
    Ok(config)
}

/// Run-path configuration: load, summarize, confirm reuse.
///
/// A missing or incomplete document is fatal. Declining reuse falls through
/// to the capture path, which saves before returning.
pub fn prepare_run(store: &ConfigStore, operator: &mut impl Operator) -> Result<Configuration> {
    let config = store.load()?;
    config.log_summary();

    let answer = operator.ask("Use saved configuration? (y/n): ")?;
    if matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes") {
        return Ok(config);
    }

    tracing::info!("Saved configuration declined, recalibrating");
    let base = store.read()?.unwrap_or_default();
    let config = configure(store, operator, &base)?;
    config.log_summary();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::config::{FeatureSet, Timing};
    use std::collections::VecDeque;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Default)]
    struct ScriptedOperator {
        points: VecDeque<Coordinate>,
        answers: VecDeque<String>,
        prompts: Vec<String>,
    }

    impl ScriptedOperator {
        fn new(points: &[(i32, i32)], answers: &[&str]) -> Self {
            Self {
                points: points.iter().map(|&(x, y)| Coordinate::new(x, y)).collect(),
                answers: answers.iter().map(|a| a.to_string()).collect(),
                prompts: Vec::new(),
            }
        }
    }

    impl Operator for ScriptedOperator {
        fn capture_point(&mut self, prompt: &str) -> Result<Coordinate> {
            self.prompts.push(prompt.to_string());
            self.points
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted point for '{}'", prompt))
        }

        fn ask(&mut self, question: &str) -> Result<String> {
            self.prompts.push(question.to_string());
            self.answers
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted answer for '{}'", question))
        }
    }

    const MARKET_POINTS: [(i32, i32); 6] = [
        (10, 20),   // follow
        (30, 40),   // item
        (50, 60),   // return
        (2419, 1334), // purchase
        (100, 200), // top-left
        (300, 250), // bottom-right
    ];

    fn saved_store(dir: &tempfile::TempDir) -> ConfigStore {
        let store = ConfigStore::new(dir.path().join("config.json"));
        let mut operator = ScriptedOperator::new(&MARKET_POINTS, &["18000"]);
        configure(&store, &mut operator, &ConfigDocument::default()).unwrap();
        store
    }

    #[test]
    fn test_calibrate_market_cycle() {
        let mut operator = ScriptedOperator::new(&MARKET_POINTS, &[""]);
        let config = calibrate(&mut operator, &ConfigDocument::default()).unwrap();

        assert_eq!(config.follow, Some(Coordinate::new(10, 20)));
        assert_eq!(config.item, Some(Coordinate::new(30, 40)));
        assert_eq!(config.return_button, Some(Coordinate::new(50, 60)));
        assert_eq!(config.purchase, Coordinate::new(2419, 1334));
        assert_eq!(config.region, Region::new(200, 100, 200, 50).unwrap());
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
        assert!(operator.prompts[0].contains("Step 1/7"));
        assert!(operator.prompts[0].contains("FOLLOW"));
    }

    #[test]
    fn test_inverted_corners_are_recaptured() {
        let mut points = MARKET_POINTS[..4].to_vec();
        points.extend([(300, 250), (100, 200), (100, 200), (300, 250)]);
        let mut operator = ScriptedOperator::new(&points, &["19000"]);

        let config = calibrate(&mut operator, &ConfigDocument::default()).unwrap();

        assert_eq!(config.region, Region::new(200, 100, 200, 50).unwrap());
        assert!(operator.points.is_empty());
    }

    #[test]
    fn test_threshold_reasked_until_numeric() {
        let mut operator = ScriptedOperator::new(&MARKET_POINTS, &["cheap", "-5", "18,500"]);
        let config = calibrate(&mut operator, &ConfigDocument::default()).unwrap();
        assert_eq!(config.threshold, 18500);
    }

    #[test]
    fn test_empty_threshold_keeps_stored_value() {
        let base = ConfigDocument {
            threshold: Some(15000),
            ..ConfigDocument::default()
        };
        let mut operator = ScriptedOperator::new(&MARKET_POINTS, &[""]);
        let config = calibrate(&mut operator, &base).unwrap();
        assert_eq!(config.threshold, 15000);
    }

    #[test]
    fn test_watch_features_capture_only_purchase_and_region() {
        let base = ConfigDocument {
            features: Some(FeatureSet::watch()),
            ..ConfigDocument::default()
        };
        let mut operator =
            ScriptedOperator::new(&[(2419, 1334), (100, 200), (300, 250)], &[""]);

        let config = calibrate(&mut operator, &base).unwrap();

        assert_eq!(config.features, FeatureSet::watch());
        assert_eq!(config.follow, None);
        assert_eq!(config.purchase, Coordinate::new(2419, 1334));
    }

    #[test]
    fn test_configure_persists_and_keeps_timing() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        let base = ConfigDocument {
            timing: Some(Timing {
                scan_interval_ms: 500,
                ..Timing::default()
            }),
            ..ConfigDocument::default()
        };
        let mut operator = ScriptedOperator::new(&MARKET_POINTS, &["18000"]);

        let config = configure(&store, &mut operator, &base).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.timing.scan_interval_ms, 500);
        assert_eq!(loaded.threshold, 18000);
    }

    #[test]
    fn test_prepare_run_without_file_is_fatal() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        let mut operator = ScriptedOperator::default();

        let err = prepare_run(&store, &mut operator).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::NotFound(_))
        ));
        assert!(operator.prompts.is_empty());
    }

    #[test]
    fn test_prepare_run_missing_region_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"FOLLOW_X": 1, "FOLLOW_Y": 2, "ITEM_X": 3, "ITEM_Y": 4,
                "RETURN_X": 5, "RETURN_Y": 6, "CLICK_X": 7, "CLICK_Y": 8}"#,
        )
        .unwrap();
        let store = ConfigStore::new(&path);
        let mut operator = ScriptedOperator::new(&[], &["y"]);

        let err = prepare_run(&store, &mut operator).unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::MissingConfiguration { missing }) => {
                assert_eq!(missing, &vec!["REGION"]);
            }
            other => panic!("expected MissingConfiguration, got {:?}", other),
        }
        assert!(operator.prompts.is_empty());
    }

    #[test]
    fn test_prepare_run_reuse_does_not_write() {
        let dir = tempdir().unwrap();
        let store = saved_store(&dir);
        let before = fs::read_to_string(store.path()).unwrap();

        let first = prepare_run(&store, &mut ScriptedOperator::new(&[], &["y"])).unwrap();
        let second = prepare_run(&store, &mut ScriptedOperator::new(&[], &["Y"])).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.threshold, 18000);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_prepare_run_decline_recalibrates_and_saves() {
        let dir = tempdir().unwrap();
        let store = saved_store(&dir);
        let points = [
            (11, 21),
            (31, 41),
            (51, 61),
            (900, 800),
            (0, 0),
            (40, 20),
        ];
        let mut operator = ScriptedOperator::new(&points, &["n", "17000"]);

        let config = prepare_run(&store, &mut operator).unwrap();

        assert_eq!(config.purchase, Coordinate::new(900, 800));
        assert_eq!(config.region, Region::new(0, 0, 40, 20).unwrap());
        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn test_startup_choice() {
        assert_eq!(StartupChoice::parse("c"), Some(StartupChoice::Configure));
        assert_eq!(StartupChoice::parse(" R "), Some(StartupChoice::Run));
        assert_eq!(StartupChoice::parse("x"), None);

        let mut operator = ScriptedOperator::new(&[], &["maybe", "", "r"]);
        assert_eq!(
            ask_startup_choice(&mut operator).unwrap(),
            StartupChoice::Run
        );
        assert_eq!(operator.prompts.len(), 3);
    }

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold("19000").unwrap(), 19000);
        assert_eq!(parse_threshold(" 19,000 ").unwrap(), 19000);
        assert!(matches!(
            parse_threshold("19k"),
            Err(ConfigError::InvalidThreshold(_))
        ));
    }
}
