//! Price Watcher Bot
//!
//! Watches a price on screen with OCR and clicks purchase or return in the
//! game marketplace. Positions are calibrated interactively and saved to
//! `config.json` next to the executable.

mod automation;
mod calibration;
mod capture;
mod error;
mod logging;
mod ocr;
mod paths;

use anyhow::Result;
use std::process::ExitCode;

use automation::{
    CancellationSignal, ConfigDocument, ConfigStore, Configuration, StopReason,
    install_stop_triggers, start_watching,
};
use calibration::{ConsoleOperator, Operator, StartupChoice, ask_startup_choice};
use capture::ScreenSensor;
use error::ConfigError;
use ocr::TesseractExtractor;

fn main() -> ExitCode {
    if let Err(e) = paths::ensure_directories() {
        eprintln!("Failed to create logs directory: {}", e);
    }
    if let Err(e) = logging::init() {
        eprintln!("Failed to initialize logging: {:#}", e);
    }
    logging::install_panic_hook();

    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    };

    tracing::info!("Bot stopped.");
    code
}

fn run() -> Result<ExitCode> {
    tracing::info!("=== Price Watcher Bot ===");

    let store = ConfigStore::new(paths::get_config_path());
    let mut operator = ConsoleOperator;

    match ask_startup_choice(&mut operator)? {
        StartupChoice::Configure => {
            let base = match store.read() {
                Ok(doc) => doc.unwrap_or_default(),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable configuration: {}", e);
                    ConfigDocument::default()
                }
            };
            let config = calibration::configure(&store, &mut operator, &base)?;
            offer_region_check(&config, &mut operator)?;
            tracing::info!(
                "Configuration complete. You can now run again and choose 'r' to start."
            );
            Ok(ExitCode::SUCCESS)
        }
        StartupChoice::Run => {
            let config = match calibration::prepare_run(&store, &mut operator) {
                Ok(config) => config,
                Err(e) => match e.downcast_ref::<ConfigError>() {
                    Some(config_err) => {
                        tracing::error!(
                            "{}. Please run again and choose configure (c).",
                            config_err
                        );
                        return Ok(ExitCode::FAILURE);
                    }
                    None => return Err(e),
                },
            };

            let extractor = TesseractExtractor::locate()?;
            let signal = CancellationSignal::new();
            let _triggers = install_stop_triggers(&signal);

            match start_watching(config, extractor, &signal)? {
                StopReason::Cancelled => Ok(ExitCode::SUCCESS),
                StopReason::CapabilityFailure(_) => Ok(ExitCode::FAILURE),
            }
        }
    }
}

/// Optionally reads the freshly calibrated region once so the operator can
/// confirm OCR sees the price.
fn offer_region_check(config: &Configuration, operator: &mut impl Operator) -> Result<()> {
    let answer = operator.ask("Check the price region now? (y/n): ")?;
    if !answer.eq_ignore_ascii_case("y") {
        return Ok(());
    }

    let mut extractor = match TesseractExtractor::locate() {
        Ok(extractor) => extractor,
        Err(e) => {
            tracing::warn!("Skipping region check: {:#}", e);
            return Ok(());
        }
    };

    if let Err(e) = calibration::check_region(
        config,
        &mut ScreenSensor,
        &mut extractor,
        &paths::get_logs_dir(),
    ) {
        tracing::warn!("Region check failed: {:#}", e);
    }
    Ok(())
}
