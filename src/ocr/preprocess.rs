use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbaImage};

/// Fixed pipeline applied before recognition: grayscale, bicubic upscale,
/// inverted binary threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessing {
    /// Integer scale factor for the upscale step.
    pub upscale: u32,
    /// Gray values strictly above this become black, the rest white.
    pub cutoff: u8,
}

impl Default for Preprocessing {
    fn default() -> Self {
        Self {
            upscale: 2,
            cutoff: 150,
        }
    }
}

impl Preprocessing {
    pub fn apply(&self, img: &RgbaImage) -> GrayImage {
        let gray = to_grayscale(img);
        let (width, height) = gray.dimensions();
        let scaled = if self.upscale > 1 {
            imageops::resize(
                &gray,
                width * self.upscale,
                height * self.upscale,
                FilterType::CatmullRom,
            )
        } else {
            gray
        };
        binarize_inverted(&scaled, self.cutoff)
    }
}

/// ITU-R BT.601 luma.
pub fn to_grayscale(img: &RgbaImage) -> GrayImage {
    let (width, height) = img.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let p = img.get_pixel(x, y);
        let luma = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Light text on a dark background becomes black on white.
pub fn binarize_inverted(img: &GrayImage, cutoff: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let value = if img.get_pixel(x, y)[0] > cutoff { 0 } else { 255 };
        Luma([value])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_grayscale_weights() {
        let mut img = RgbaImage::new(4, 1);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        img.put_pixel(2, 0, Rgba([0, 0, 255, 255]));
        img.put_pixel(3, 0, Rgba([255, 255, 255, 255]));

        let gray = to_grayscale(&img);
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
        assert_eq!(gray.get_pixel(1, 0)[0], 150);
        assert_eq!(gray.get_pixel(2, 0)[0], 29);
        assert_eq!(gray.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn test_binarize_cutoff_is_exclusive() {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([150]));
        img.put_pixel(1, 0, Luma([151]));
        img.put_pixel(2, 0, Luma([10]));

        let out = binarize_inverted(&img, 150);
        assert_eq!(out.get_pixel(0, 0)[0], 255);
        assert_eq!(out.get_pixel(1, 0)[0], 0);
        assert_eq!(out.get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn test_apply_doubles_size_and_inverts() {
        let bright = RgbaImage::from_pixel(5, 3, Rgba([240, 240, 240, 255]));
        let out = Preprocessing::default().apply(&bright);
        assert_eq!(out.dimensions(), (10, 6));
        assert!(out.pixels().all(|p| p[0] == 0));

        let dark = RgbaImage::from_pixel(5, 3, Rgba([30, 30, 30, 255]));
        let out = Preprocessing::default().apply(&dark);
        assert!(out.pixels().all(|p| p[0] == 255));
    }
}
