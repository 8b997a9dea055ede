//! Decision loop state machine.
//!
//! Each tick runs the configured precursor clicks, captures the price region,
//! reads a number from it and then purchases, returns, or holds. Stop
//! requests are only observed between ticks, so a tick always completes.

use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::automation::cancel::CancellationSignal;
use crate::automation::capability::{Clock, InputActuator, RegionSensor, TextExtractor};
use crate::automation::config::{ClickTarget, Configuration, Coordinate};
use crate::error::{CapabilityFailure, CapabilityKind, ReadingError};
use crate::ocr::{Preprocessing, parse_reading};

/// Loop-owned memory carried from tick to tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopState {
    /// Last successfully parsed price; cleared by a failed parse.
    pub last_reading: Option<u64>,
    /// A purchase was already made for the current qualifying streak.
    pub has_purchased: bool,
    pub ticks: u64,
    pub purchases: u64,
    pub returns: u64,
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The cancellation signal was observed at a tick boundary.
    Cancelled,
    /// A capture, recognition or click failed unexpectedly.
    CapabilityFailure(CapabilityFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    Ticking,
    Stopped(StopReason),
}

impl std::fmt::Display for WatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchState::Ticking => write!(f, "Ticking"),
            WatchState::Stopped(StopReason::Cancelled) => write!(f, "Stopped: cancelled"),
            WatchState::Stopped(StopReason::CapabilityFailure(failure)) => {
                write!(f, "Stopped: {}", failure)
            }
        }
    }
}

/// What a single tick decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Purchased(u64),
    Returned(u64),
    /// A valid reading that triggered no click.
    Held(u64),
    /// No usable reading. The return click, if any, was issued.
    Skipped(ReadingError),
}

/// Loop context holding state, configuration and capabilities.
pub struct WatchContext<S, E, A, C> {
    pub state: WatchState,
    pub config: Configuration,
    pub loop_state: LoopState,
    pub sensor: S,
    pub extractor: E,
    pub actuator: A,
    pub clock: C,
    pub preprocessing: Preprocessing,
    pub start_time: Instant,
}

impl<S, E, A, C> WatchContext<S, E, A, C>
where
    S: RegionSensor,
    E: TextExtractor,
    A: InputActuator,
    C: Clock,
{
    pub fn new(config: Configuration, sensor: S, extractor: E, actuator: A, clock: C) -> Self {
        let start_time = clock.now();
        Self {
            state: WatchState::Ticking,
            config,
            loop_state: LoopState::default(),
            sensor,
            extractor,
            actuator,
            clock,
            preprocessing: Preprocessing::default(),
            start_time,
        }
    }

    /// Advances the loop by one tick.
    ///
    /// Returns `true` while the loop should keep going.
    pub fn step(&mut self, signal: &CancellationSignal) -> bool {
        if self.state != WatchState::Ticking {
            return false;
        }

        if signal.is_cancelled() {
            info!("Stop requested, finishing");
            self.state = WatchState::Stopped(StopReason::Cancelled);
            return false;
        }

        if let Err(failure) = self.tick() {
            error!("Stopping: {}", failure);
            self.state = WatchState::Stopped(StopReason::CapabilityFailure(failure));
            return false;
        }

        self.clock.sleep(self.config.timing.scan_interval());
        true
    }

    /// Runs one full tick without the trailing scan-interval sleep.
    pub fn tick(&mut self) -> Result<TickOutcome, CapabilityFailure> {
        self.loop_state.ticks += 1;

        for (target, at, settle) in self.config.precursors() {
            self.click(target, at)?;
            self.clock.sleep(settle);
        }

        let image = self
            .sensor
            .capture_region(&self.config.region)
            .map_err(|e| CapabilityFailure::from_error(CapabilityKind::Capture, &e))?;
        let fragments = self
            .extractor
            .recognize_text(&image, &self.preprocessing)
            .map_err(|e| CapabilityFailure::from_error(CapabilityKind::Recognize, &e))?;

        match parse_reading(&fragments) {
            Ok(value) => self.decide(value),
            Err(err) => self.skip(err),
        }
    }

    fn decide(&mut self, value: u64) -> Result<TickOutcome, CapabilityFailure> {
        if self.loop_state.last_reading != Some(value) {
            info!("Detected number: {}", value);
        }
        self.loop_state.last_reading = Some(value);

        let threshold = self.config.threshold;
        let features = self.config.features;

        if features.threshold_mode.qualifies(value, threshold) {
            if features.debounce && self.loop_state.has_purchased {
                debug!("Already purchased at {}, waiting for the price to rise", value);
                return Ok(TickOutcome::Held(value));
            }
            self.act(ClickTarget::Purchase, self.config.purchase)?;
            self.loop_state.has_purchased = true;
            self.loop_state.purchases += 1;
            info!(
                "Purchased item because {} {} {}",
                value,
                features.threshold_mode.symbol(),
                threshold
            );
            return Ok(TickOutcome::Purchased(value));
        }

        self.loop_state.has_purchased = false;
        match self.config.return_action() {
            Some(at) => {
                self.act(ClickTarget::Return, at)?;
                self.loop_state.returns += 1;
                let cmp = if value == threshold { "=" } else { ">" };
                info!("Returned (price {} {} {})", value, cmp, threshold);
                Ok(TickOutcome::Returned(value))
            }
            None => Ok(TickOutcome::Held(value)),
        }
    }

    fn skip(&mut self, err: ReadingError) -> Result<TickOutcome, CapabilityFailure> {
        self.loop_state.last_reading = None;

        let return_at = self.config.return_action();
        let suffix = if return_at.is_some() { ", returning" } else { "" };
        match &err {
            ReadingError::NoTextDetected => warn!("No number detected{}", suffix),
            ReadingError::NotNumeric(raw) => warn!("OCR not numeric: '{}'{}", raw, suffix),
        }

        if let Some(at) = return_at {
            self.act(ClickTarget::Return, at)?;
            self.loop_state.returns += 1;
        }
        Ok(TickOutcome::Skipped(err))
    }

    /// Purchase or return click followed by the action settle delay.
    fn act(&mut self, target: ClickTarget, at: Coordinate) -> Result<(), CapabilityFailure> {
        self.click(target, at)?;
        self.clock.sleep(self.config.timing.action_settle());
        Ok(())
    }

    fn click(&mut self, target: ClickTarget, at: Coordinate) -> Result<(), CapabilityFailure> {
        debug!("Clicking {} at {}", target.label(), at);
        self.actuator
            .click(at)
            .map_err(|e| CapabilityFailure::from_error(CapabilityKind::Click, &e))
    }
}
