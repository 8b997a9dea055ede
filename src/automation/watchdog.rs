//! Timeout guard for blocking capability calls.
//!
//! The wrapped capability lives on its own worker thread. Each call is sent
//! over a channel and the caller waits at most `timeout` for the reply. A call
//! that overruns is reported as an error; the worker keeps running it in the
//! background and is abandoned when the watchdog is dropped.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use image::RgbaImage;

use crate::automation::capability::{InputActuator, RegionSensor, TextExtractor};
use crate::automation::config::{Coordinate, Region};
use crate::ocr::Preprocessing;

type Job<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Runs calls against `T` on a dedicated thread with a per-call timeout.
pub struct Watchdog<T> {
    name: &'static str,
    timeout: Duration,
    jobs: Sender<Job<T>>,
}

impl<T: Send + 'static> Watchdog<T> {
    pub fn spawn(name: &'static str, inner: T, timeout: Duration) -> Result<Self> {
        let (jobs, receiver) = mpsc::channel::<Job<T>>();

        thread::Builder::new()
            .name(format!("{}-worker", name))
            .spawn(move || {
                let mut inner = inner;
                // Exits once the watchdog drops its sender.
                while let Ok(job) = receiver.recv() {
                    job(&mut inner);
                }
                tracing::debug!("{} worker finished", name);
            })
            .with_context(|| format!("Failed to spawn {} worker", name))?;

        Ok(Self {
            name,
            timeout,
            jobs,
        })
    }

    /// Runs `job` on the worker and waits for its result.
    pub fn call<R, F>(&self, job: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> Result<R> + Send + 'static,
    {
        let (reply, response) = mpsc::sync_channel(1);
        self.jobs
            .send(Box::new(move |inner: &mut T| {
                let _ = reply.send(job(inner));
            }))
            .map_err(|_| anyhow!("{} worker is gone", self.name))?;

        match response.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(anyhow!(
                "{} timed out after {}ms",
                self.name,
                self.timeout.as_millis()
            )),
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("{} worker stopped unexpectedly", self.name))
            }
        }
    }
}

impl<T: RegionSensor + Send + 'static> RegionSensor for Watchdog<T> {
    fn capture_region(&mut self, region: &Region) -> Result<RgbaImage> {
        let region = *region;
        self.call(move |sensor| sensor.capture_region(&region))
    }
}

impl<T: TextExtractor + Send + 'static> TextExtractor for Watchdog<T> {
    fn recognize_text(
        &mut self,
        image: &RgbaImage,
        preprocessing: &Preprocessing,
    ) -> Result<Vec<String>> {
        let image = image.clone();
        let preprocessing = *preprocessing;
        self.call(move |extractor| extractor.recognize_text(&image, &preprocessing))
    }
}

impl<T: InputActuator + Send + 'static> InputActuator for Watchdog<T> {
    fn click(&mut self, at: Coordinate) -> Result<()> {
        self.call(move |actuator| actuator.click(at))
    }
}
