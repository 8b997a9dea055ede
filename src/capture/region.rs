//! Screen region capture using a GDI screen-DC copy.

use anyhow::{anyhow, Result};
use image::{Rgba, RgbaImage};

use crate::automation::capability::RegionSensor;
use crate::automation::config::Region;

/// Region sensor for the primary display.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreenSensor;

impl RegionSensor for ScreenSensor {
    fn capture_region(&mut self, region: &Region) -> Result<RgbaImage> {
        capture_screen_rect(region)
    }
}

/// Converts a top-down BGRA buffer into an RGBA image.
pub fn bgra_to_rgba(width: u32, height: u32, data: &[u8]) -> Result<RgbaImage> {
    let expected = width as usize * height as usize * 4;
    if data.len() < expected {
        return Err(anyhow!(
            "Pixel buffer too small: {} bytes for {}x{}",
            data.len(),
            width,
            height
        ));
    }

    Ok(RgbaImage::from_fn(width, height, |x, y| {
        let offset = (y as usize * width as usize + x as usize) * 4;
        let b = data[offset];
        let g = data[offset + 1];
        let r = data[offset + 2];
        // GDI leaves alpha undefined for screen copies
        Rgba([r, g, b, 255])
    }))
}

#[cfg(windows)]
fn capture_screen_rect(region: &Region) -> Result<RgbaImage> {
    use anyhow::Context;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{
        BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BitBlt, CreateCompatibleBitmap,
        CreateCompatibleDC, DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, GetDIBits, ReleaseDC,
        SRCCOPY, SelectObject,
    };

    let (width, height) = (region.width, region.height);
    let mut buffer = vec![0u8; width as usize * height as usize * 4];

    let (blit, lines) = unsafe {
        let screen_dc = GetDC(HWND::default());
        if screen_dc.is_invalid() {
            return Err(anyhow!("GetDC failed for the screen"));
        }
        let mem_dc = CreateCompatibleDC(screen_dc);
        let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
        let previous = SelectObject(mem_dc, bitmap);

        let blit = BitBlt(
            mem_dc,
            0,
            0,
            width,
            height,
            screen_dc,
            region.left,
            region.top,
            SRCCOPY,
        );

        let mut info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                // negative height = top-down rows
                biHeight: -height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let lines = if blit.is_ok() {
            GetDIBits(
                mem_dc,
                bitmap,
                0,
                height as u32,
                Some(buffer.as_mut_ptr() as *mut _),
                &mut info,
                DIB_RGB_COLORS,
            )
        } else {
            0
        };

        SelectObject(mem_dc, previous);
        let _ = DeleteObject(bitmap);
        let _ = DeleteDC(mem_dc);
        ReleaseDC(HWND::default(), screen_dc);

        (blit, lines)
    };

    blit.with_context(|| format!("BitBlt failed for region {}", region))?;
    if lines == 0 {
        return Err(anyhow!("GetDIBits returned no rows for region {}", region));
    }

    bgra_to_rgba(width as u32, height as u32, &buffer)
}

#[cfg(not(windows))]
fn capture_screen_rect(region: &Region) -> Result<RgbaImage> {
    Err(anyhow!(
        "screen capture is only supported on Windows (requested {})",
        region
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_to_rgba_swaps_channels() {
        let data = [
            10, 20, 30, 0, // pixel (0,0)
            40, 50, 60, 0, // pixel (1,0)
        ];
        let img = bgra_to_rgba(2, 1, &data).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([30, 20, 10, 255]));
        assert_eq!(img.get_pixel(1, 0), &Rgba([60, 50, 40, 255]));
    }

    #[test]
    fn test_bgra_to_rgba_rejects_short_buffer() {
        assert!(bgra_to_rgba(2, 2, &[0u8; 8]).is_err());
    }
}
