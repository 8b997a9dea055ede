use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop flag. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    stopped: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop. Returns `true` only for the call that flipped the flag.
    pub fn cancel(&self) -> bool {
        !self.stopped.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_idempotent() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_cancelled());
        assert!(signal.cancel());
        assert!(!signal.cancel());
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_clones_share_the_flag() {
        let signal = CancellationSignal::new();
        let listener = signal.clone();
        std::thread::spawn(move || {
            listener.cancel();
        })
        .join()
        .unwrap();
        assert!(signal.is_cancelled());
    }
}
