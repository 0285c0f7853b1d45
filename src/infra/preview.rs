// ============================================================
// Layer 6 — Preview Images
// ============================================================
// Writes a single image plane as an 8-bit grayscale PNG.
// Values are min-max stretched to 0..=255; a constant plane
// is written as all zeros.

use anyhow::{anyhow, Context, Result};
use image::{GrayImage, Luma};
use std::path::Path;

use crate::domain::batch::ImagePlane;

/// Map an image plane onto 8-bit gray levels.
pub fn to_gray_image(plane: &ImagePlane) -> Result<GrayImage> {
    let (lo, hi) = plane
        .value_range()
        .ok_or_else(|| anyhow!("Cannot render an empty {}x{} plane", plane.width, plane.height))?;
    let span = hi - lo;

    let mut img = GrayImage::new(plane.width as u32, plane.height as u32);
    for (i, &v) in plane.pixels.iter().enumerate() {
        let level = if span > 0.0 { ((v - lo) / span * 255.0).round() } else { 0.0 };
        let x = (i % plane.width) as u32;
        let y = (i / plane.width) as u32;
        img.put_pixel(x, y, Luma([level.clamp(0.0, 255.0) as u8]));
    }
    Ok(img)
}

pub fn save_png(plane: &ImagePlane, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    to_gray_image(plane)?
        .save(path)
        .with_context(|| format!("Cannot write preview '{}'", path.display()))?;
    tracing::debug!("Wrote preview '{}'", path.display());
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_stretch() {
        let plane = ImagePlane::new(2, 2, vec![-1.0, 0.0, 0.5, 1.0]);
        let img = to_gray_image(&plane).unwrap();
        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(1, 1)[0], 255);
        assert_eq!(img.get_pixel(1, 0)[0], 128);
    }

    #[test]
    fn test_constant_plane_is_black() {
        let plane = ImagePlane::new(3, 1, vec![4.0; 3]);
        let img = to_gray_image(&plane).unwrap();
        assert!(img.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_png_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("it00000.png");
        save_png(&ImagePlane::new(4, 3, (0..12).map(|v| v as f32).collect()), &path).unwrap();

        let back = image::open(&path).unwrap().to_luma8();
        assert_eq!(back.dimensions(), (4, 3));
    }
}
