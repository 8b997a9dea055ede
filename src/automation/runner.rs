//! Runs the decision loop until it stops.

use anyhow::Result;

use crate::automation::cancel::CancellationSignal;
use crate::automation::capability::{Clock, InputActuator, RegionSensor, SystemClock, TextExtractor};
use crate::automation::config::Configuration;
use crate::automation::input::ScreenClicker;
use crate::automation::state::{StopReason, WatchContext, WatchState};
use crate::automation::watchdog::Watchdog;
use crate::capture::ScreenSensor;
use crate::ocr::TesseractExtractor;

/// Steps the context until it reaches `Stopped`, then logs a summary.
pub fn run_until_stopped<S, E, A, C>(
    ctx: &mut WatchContext<S, E, A, C>,
    signal: &CancellationSignal,
) -> StopReason
where
    S: RegionSensor,
    E: TextExtractor,
    A: InputActuator,
    C: Clock,
{
    tracing::info!(
        "Bot started. Watching region {} (threshold {})",
        ctx.config.region,
        ctx.config.threshold
    );

    while ctx.step(signal) {}

    let elapsed = ctx.clock.now().saturating_duration_since(ctx.start_time);
    let stats = &ctx.loop_state;
    tracing::info!(
        "Loop finished: {} ticks, {} purchases, {} returns in {:.1}s ({})",
        stats.ticks,
        stats.purchases,
        stats.returns,
        elapsed.as_secs_f32(),
        ctx.state
    );

    match &ctx.state {
        WatchState::Stopped(reason) => reason.clone(),
        WatchState::Ticking => StopReason::Cancelled,
    }
}

/// Runs the loop against the real screen, with every capability call bounded
/// by the configured timeout.
pub fn start_watching(
    config: Configuration,
    extractor: TesseractExtractor,
    signal: &CancellationSignal,
) -> Result<StopReason> {
    let timeout = config.timing.capability_timeout();
    let sensor = Watchdog::spawn("capture", ScreenSensor, timeout)?;
    let extractor = Watchdog::spawn("recognize", extractor, timeout)?;
    let actuator = Watchdog::spawn("click", ScreenClicker, timeout)?;

    let mut ctx = WatchContext::new(config, sensor, extractor, actuator, SystemClock);
    Ok(run_until_stopped(&mut ctx, signal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::config::{Coordinate, FeatureSet, Region, Timing};
    use crate::error::CapabilityKind;
    use crate::ocr::Preprocessing;
    use anyhow::anyhow;
    use image::RgbaImage;
    use std::time::{Duration, Instant};

    struct BlankSensor;

    impl RegionSensor for BlankSensor {
        fn capture_region(&mut self, _region: &Region) -> Result<RgbaImage> {
            Ok(RgbaImage::new(4, 4))
        }
    }

    struct ConstantExtractor(Option<&'static str>);

    impl TextExtractor for ConstantExtractor {
        fn recognize_text(&mut self, _: &RgbaImage, _: &Preprocessing) -> Result<Vec<String>> {
            match self.0 {
                Some(text) => Ok(vec![text.to_string()]),
                None => Err(anyhow!("tesseract exited with code 1")),
            }
        }
    }

    #[derive(Default)]
    struct CountingActuator(u32);

    impl InputActuator for CountingActuator {
        fn click(&mut self, _at: Coordinate) -> Result<()> {
            self.0 += 1;
            Ok(())
        }
    }

    /// Cancels after a number of scan-interval sleeps.
    struct StoppingClock {
        base: Instant,
        elapsed: Duration,
        scan_interval: Duration,
        scans_left: u32,
        signal: CancellationSignal,
    }

    impl Clock for StoppingClock {
        fn now(&self) -> Instant {
            self.base + self.elapsed
        }

        fn sleep(&mut self, duration: Duration) {
            self.elapsed += duration;
            if duration == self.scan_interval {
                self.scans_left = self.scans_left.saturating_sub(1);
                if self.scans_left == 0 {
                    self.signal.cancel();
                }
            }
        }
    }

    fn config() -> Configuration {
        Configuration {
            region: Region::new(0, 0, 4, 4).unwrap(),
            purchase: Coordinate::new(1, 1),
            follow: None,
            item: None,
            return_button: None,
            threshold: 19000,
            features: FeatureSet::watch(),
            timing: Timing::default(),
        }
    }

    fn clock(signal: &CancellationSignal, scans: u32) -> StoppingClock {
        StoppingClock {
            base: Instant::now(),
            elapsed: Duration::ZERO,
            scan_interval: Timing::default().scan_interval(),
            scans_left: scans,
            signal: signal.clone(),
        }
    }

    #[test]
    fn test_runs_until_cancelled() {
        let signal = CancellationSignal::new();
        let mut ctx = WatchContext::new(
            config(),
            BlankSensor,
            ConstantExtractor(Some("18,000")),
            CountingActuator::default(),
            clock(&signal, 3),
        );

        let reason = run_until_stopped(&mut ctx, &signal);

        assert_eq!(reason, StopReason::Cancelled);
        assert_eq!(ctx.loop_state.ticks, 3);
        // debounced: one purchase for the whole streak
        assert_eq!(ctx.actuator.0, 1);
    }

    #[test]
    fn test_recognition_failure_ends_run() {
        let signal = CancellationSignal::new();
        let mut ctx = WatchContext::new(
            config(),
            BlankSensor,
            ConstantExtractor(None),
            CountingActuator::default(),
            clock(&signal, 100),
        );

        match run_until_stopped(&mut ctx, &signal) {
            StopReason::CapabilityFailure(failure) => {
                assert_eq!(failure.capability, CapabilityKind::Recognize);
                assert_eq!(failure.message, "tesseract exited with code 1");
            }
            other => panic!("unexpected stop reason {:?}", other),
        }
        assert_eq!(ctx.loop_state.ticks, 1);
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_already_cancelled_runs_no_tick() {
        let signal = CancellationSignal::new();
        signal.cancel();
        let mut ctx = WatchContext::new(
            config(),
            BlankSensor,
            ConstantExtractor(Some("1")),
            CountingActuator::default(),
            clock(&signal, 100),
        );

        assert_eq!(run_until_stopped(&mut ctx, &signal), StopReason::Cancelled);
        assert_eq!(ctx.loop_state.ticks, 0);
        assert_eq!(ctx.actuator.0, 0);
    }
}
