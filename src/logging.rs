//! Log setup: console plus an append-only log file under `logs/`.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::paths;

const LOG_FILE_NAME: &str = "price_watcher.log";
const TIMESTAMP_FORMAT: &str = "%H:%M:%S%.3f";

/// Installs the global tracing subscriber.
///
/// Level defaults to `info` and can be overridden with `RUST_LOG`. Console
/// output is always installed; the log file only when it can be opened.
pub fn init() -> Result<()> {
    init_in(&paths::get_logs_dir())
}

fn init_in(logs_dir: &Path) -> Result<()> {
    let log_path = logs_dir.join(LOG_FILE_NAME);
    let (file, file_error) = match open_log_file(&log_path) {
        Ok(file) => (Some(file), None),
        Err(e) => (None, Some(e)),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt::layer()
        .with_target(false)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()));

    let file_layer = file.map(|f| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
            .with_writer(Mutex::new(f))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(e) = file_error {
        tracing::warn!("Logging to console only: {:#}", e);
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Routes panics through tracing so they reach the log file.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        tracing::error!("[PANIC]{} {}", location, msg);
        // Worker panics surface as capability failures and main logs the stop.
        if ends_run(std::thread::current().name()) {
            tracing::info!("Bot stopped.");
        }
    }));
}

/// Only a panic on the main thread takes the bot down.
fn ends_run(thread_name: Option<&str>) -> bool {
    thread_name == Some("main")
}
