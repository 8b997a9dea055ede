//! Mouse input simulation.
//!
//! Clicks are sent with SendInput using absolute coordinates on the primary
//! display, which moves the real cursor.

use anyhow::Result;

use crate::automation::capability::InputActuator;
use crate::automation::config::Coordinate;

/// Click actuator that drives the system cursor.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreenClicker;

impl InputActuator for ScreenClicker {
    fn click(&mut self, at: Coordinate) -> Result<()> {
        send_click(at)
    }
}

/// Maps a pixel position to the 0-65535 range MOUSEEVENTF_ABSOLUTE expects.
pub fn normalize_absolute(pos: i32, extent: i32) -> i32 {
    if extent <= 0 {
        return 0;
    }
    ((pos as i64 * 65535) / extent as i64) as i32
}

#[cfg(windows)]
fn send_click(at: Coordinate) -> Result<()> {
    use anyhow::anyhow;
    use std::time::Duration;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        INPUT, INPUT_0, INPUT_MOUSE, MOUSE_EVENT_FLAGS, MOUSEEVENTF_ABSOLUTE,
        MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEINPUT, SendInput,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

    let screen_width = unsafe { GetSystemMetrics(SM_CXSCREEN) };
    let screen_height = unsafe { GetSystemMetrics(SM_CYSCREEN) };
    if screen_width <= 0 || screen_height <= 0 {
        return Err(anyhow!("Could not read screen size"));
    }

    let norm_x = normalize_absolute(at.x, screen_width);
    let norm_y = normalize_absolute(at.y, screen_height);

    let send = |flags: MOUSE_EVENT_FLAGS| -> Result<()> {
        let input = INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx: norm_x,
                    dy: norm_y,
                    dwFlags: flags | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE,
                    ..Default::default()
                },
            },
        };
        let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
        if sent != 1 {
            return Err(anyhow!("SendInput was blocked at ({}, {})", at.x, at.y));
        }
        Ok(())
    };

    send(MOUSE_EVENT_FLAGS(0))?;
    std::thread::sleep(Duration::from_millis(20));
    send(MOUSEEVENTF_LEFTDOWN)?;
    std::thread::sleep(Duration::from_millis(50));
    send(MOUSEEVENTF_LEFTUP)?;

    tracing::debug!("Clicked at {}", at);
    Ok(())
}

#[cfg(not(windows))]
fn send_click(at: Coordinate) -> Result<()> {
    Err(anyhow::anyhow!(
        "synthetic clicks are only supported on Windows (requested {})",
        at
    ))
}
