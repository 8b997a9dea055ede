//! Pointer position queries for calibration.

use anyhow::Result;

use crate::automation::config::Coordinate;

/// Gets the current cursor position in screen coordinates.
#[cfg(windows)]
pub fn get_cursor_position() -> Result<Coordinate> {
    use windows::Win32::Foundation::POINT;
    use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

    let mut pt = POINT::default();
    unsafe {
        GetCursorPos(&mut pt)?;
    }
    Ok(Coordinate::new(pt.x, pt.y))
}

#[cfg(not(windows))]
pub fn get_cursor_position() -> Result<Coordinate> {
    Err(anyhow::anyhow!(
        "reading the cursor position is only supported on Windows"
    ))
}
