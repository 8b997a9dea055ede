//! Out-of-band stop triggers: the global F8 hotkey and the console interrupt.
//!
//! Both only set the cancellation signal. The loop notices it at the next
//! tick boundary.

use anyhow::Result;

use crate::automation::cancel::CancellationSignal;

#[cfg_attr(not(windows), allow(dead_code))]
const HOTKEY_STOP: i32 = 1;
#[cfg_attr(not(windows), allow(dead_code))]
const VK_F8: u32 = 0x77;

/// Sets the signal on behalf of `trigger`. Returns `true` for the first request.
pub fn request_stop(signal: &CancellationSignal, trigger: &str) -> bool {
    let first = signal.cancel();
    if first {
        tracing::info!("Stop signal received ({}). Stopping bot safely...", trigger);
    } else {
        tracing::debug!("Repeated stop signal ({}) ignored", trigger);
    }
    first
}

/// Keeps the installed stop triggers alive.
pub struct StopTriggers {
    _hotkey: Option<HotkeyListener>,
}

/// Installs every stop trigger available on this platform.
///
/// A trigger that cannot be installed is logged and skipped.
pub fn install_stop_triggers(signal: &CancellationSignal) -> StopTriggers {
    if let Err(e) = install_interrupt_handler(signal) {
        tracing::warn!("Console interrupt handler not installed: {:#}", e);
    }

    let hotkey = match HotkeyListener::spawn(signal.clone()) {
        Ok(listener) => {
            tracing::info!("Press F8 or Ctrl+C to stop the bot");
            Some(listener)
        }
        Err(e) => {
            tracing::warn!("F8 hotkey unavailable: {:#}", e);
            None
        }
    };

    StopTriggers { _hotkey: hotkey }
}

#[cfg(windows)]
pub use platform::{HotkeyListener, install_interrupt_handler};

#[cfg(not(windows))]
pub use fallback::{HotkeyListener, install_interrupt_handler};

#[cfg(windows)]
mod platform {
    use super::*;
    use anyhow::{anyhow, Context};
    use std::sync::OnceLock;
    use std::sync::mpsc;
    use std::thread::{self, JoinHandle};

    use windows::Win32::Foundation::{BOOL, FALSE, HWND, LPARAM, TRUE, WPARAM};
    use windows::Win32::System::Console::{CTRL_BREAK_EVENT, CTRL_C_EVENT, SetConsoleCtrlHandler};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::Input::KeyboardAndMouse::{MOD_NOREPEAT, RegisterHotKey, UnregisterHotKey};
    use windows::Win32::UI::WindowsAndMessaging::{
        GetMessageW, MSG, PostThreadMessageW, WM_HOTKEY, WM_QUIT,
    };

    static CONSOLE_SIGNAL: OnceLock<CancellationSignal> = OnceLock::new();

    unsafe extern "system" fn console_handler(ctrl_type: u32) -> BOOL {
        if ctrl_type == CTRL_C_EVENT || ctrl_type == CTRL_BREAK_EVENT {
            if let Some(signal) = CONSOLE_SIGNAL.get() {
                request_stop(signal, "Ctrl+C");
                // handled: keep the process alive so the tick can finish
                return TRUE;
            }
        }
        FALSE
    }

    pub fn install_interrupt_handler(signal: &CancellationSignal) -> Result<()> {
        if CONSOLE_SIGNAL.set(signal.clone()).is_err() {
            return Err(anyhow!("interrupt handler already installed"));
        }
        unsafe { SetConsoleCtrlHandler(Some(console_handler), TRUE) }
            .context("SetConsoleCtrlHandler failed")
    }

    /// Background thread owning the F8 registration.
    pub struct HotkeyListener {
        thread_id: u32,
        handle: Option<JoinHandle<()>>,
    }

    impl HotkeyListener {
        pub fn spawn(signal: CancellationSignal) -> Result<Self> {
            let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();

            let handle = thread::Builder::new()
                .name("hotkey-listener".to_string())
                .spawn(move || unsafe {
                    // Hotkeys are delivered to the thread that registered them.
                    if let Err(e) =
                        RegisterHotKey(HWND::default(), HOTKEY_STOP, MOD_NOREPEAT, VK_F8)
                    {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                    let _ = ready_tx.send(Ok(GetCurrentThreadId()));

                    let mut msg = MSG::default();
                    loop {
                        let ret = GetMessageW(&mut msg, HWND::default(), 0, 0);
                        if ret.0 <= 0 {
                            break;
                        }
                        if msg.message == WM_HOTKEY && msg.wParam.0 as i32 == HOTKEY_STOP {
                            request_stop(&signal, "F8");
                        }
                    }

                    let _ = UnregisterHotKey(HWND::default(), HOTKEY_STOP);
                })
                .context("Failed to spawn hotkey listener")?;

            match ready_rx.recv() {
                Ok(Ok(thread_id)) => Ok(Self {
                    thread_id,
                    handle: Some(handle),
                }),
                Ok(Err(e)) => {
                    let _ = handle.join();
                    Err(anyhow!("RegisterHotKey(F8) failed: {}", e))
                }
                Err(_) => Err(anyhow!("hotkey listener exited during startup")),
            }
        }
    }

    impl Drop for HotkeyListener {
        fn drop(&mut self) {
            unsafe {
                let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(not(windows))]
mod fallback {
    use super::*;
    use anyhow::anyhow;

    /// Placeholder; global hotkeys need the Windows message loop.
    pub struct HotkeyListener;

    impl HotkeyListener {
        pub fn spawn(_signal: CancellationSignal) -> Result<Self> {
            Err(anyhow!("global hotkeys are only supported on Windows"))
        }
    }

    /// The default SIGINT behavior is kept on this platform.
    pub fn install_interrupt_handler(_signal: &CancellationSignal) -> Result<()> {
        Err(anyhow!("console interrupt handling is only supported on Windows"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_stop_only_first_counts() {
        let signal = CancellationSignal::new();
        assert!(request_stop(&signal, "F8"));
        assert!(!request_stop(&signal, "Ctrl+C"));
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_stop_triggers_never_set_the_signal() {
        let signal = CancellationSignal::new();
        let triggers = install_stop_triggers(&signal);
        assert!(!signal.is_cancelled());
        drop(triggers);
        assert!(!signal.is_cancelled());
    }
}
