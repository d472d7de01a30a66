//! Region-of-interest extraction and normalization.
//!
//! Turns a canvas snapshot into a square, single-channel image containing just the drawing, with
//! dark ink on a light background:
//!
//! 1. grayscale, inverted when the canvas background is dark
//! 2. binarized
//! 3. cropped to the bounding box of the ink plus padding
//! 4. centered on a square background so that resizing to the classifier input does not distort
//!    the drawing's aspect ratio

use std::fmt;

use image::{imageops, GenericImage, GrayImage, Luma, Pixel, RgbImage};

use crate::canvas::BACKGROUND;
use crate::config::Config;
use crate::resolution::Resolution;

/// Pixel value of the background after normalization.
pub const LIGHT: u8 = 255;
/// Pixel value of ink after normalization.
pub const DARK: u8 = 0;

/// Why no region could be extracted. These are expected outcomes, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The image contains no ink.
    NoDrawingDetected,
    /// The padded bounding box has no area.
    InvalidRoi,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rejection::NoDrawingDetected => "no drawing detected",
            Rejection::InvalidRoi => "invalid region of interest",
        })
    }
}

/// An axis-aligned pixel rectangle, `x..x + width` by `y..y + height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub fn longer_side(&self) -> u32 {
        self.width.max(self.height)
    }
}

/// The extracted drawing, centered on a square background.
#[derive(Clone)]
pub struct Roi {
    bounds: PixelRect,
    square: GrayImage,
}

impl Roi {
    /// Returns the padded bounding box of the drawing in snapshot coordinates.
    #[inline]
    pub fn bounds(&self) -> PixelRect {
        self.bounds
    }

    /// Returns the square image with the drawing centered on it.
    #[inline]
    pub fn square(&self) -> &GrayImage {
        &self.square
    }

    /// Returns where the cropped region was placed inside [`Roi::square`].
    pub fn placement(&self) -> PixelRect {
        let side = self.square.width();
        PixelRect {
            x: (side - self.bounds.width) / 2,
            y: (side - self.bounds.height) / 2,
            width: self.bounds.width,
            height: self.bounds.height,
        }
    }

    /// Resizes the square to `size x size`.
    pub fn normalize(&self, size: u32) -> GrayImage {
        resize(&self.square, size)
    }
}

impl fmt::Debug for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Roi")
            .field("bounds", &self.bounds)
            .field("square", &Resolution::of(&self.square))
            .finish()
    }
}

/// Extracts the drawn region from canvas snapshots.
#[derive(Debug, Clone)]
pub struct RoiExtractor {
    threshold: u8,
    padding: u32,
}

impl RoiExtractor {
    /// Creates an extractor binarizing at `threshold` and adding `padding` pixels around the ink.
    pub fn new(threshold: u8, padding: u32) -> Self {
        Self { threshold, padding }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.canvas_threshold, config.roi_padding)
    }

    /// Runs the extraction pipeline on the canvas raster `image`.
    ///
    /// `image` is expected to use the canvas colors: ink on [`BACKGROUND`].
    pub fn extract(&self, image: &RgbImage) -> Result<Roi, Rejection> {
        let mut gray = canvas_to_gray(image);
        binarize(&mut gray, self.threshold);

        let ink = ink_bounds(&gray).ok_or(Rejection::NoDrawingDetected)?;
        let bounds = pad(ink, self.padding, Resolution::of(&gray));
        if bounds.width == 0 || bounds.height == 0 {
            return Err(Rejection::InvalidRoi);
        }

        let crop = imageops::crop_imm(&gray, bounds.x, bounds.y, bounds.width, bounds.height)
            .to_image();
        let side = bounds.longer_side();
        let mut square = GrayImage::from_pixel(side, side, Luma([LIGHT]));
        square
            .copy_from(
                &crop,
                (side - bounds.width) / 2,
                (side - bounds.height) / 2,
            )
            .map_err(|_| Rejection::InvalidRoi)?;

        log::trace!("ink at {:?}, padded to {:?}", ink, bounds);
        Ok(Roi { bounds, square })
    }
}

/// Converts a canvas raster to grayscale with a light background.
///
/// The polarity follows from [`BACKGROUND`], never from pixel counts.
fn canvas_to_gray(image: &RgbImage) -> GrayImage {
    let mut gray = imageops::grayscale(image);
    if BACKGROUND.to_luma().0[0] < 128 {
        imageops::invert(&mut gray);
    }
    gray
}

/// Maps every pixel above `threshold` to [`LIGHT`] and every other pixel to [`DARK`].
pub(crate) fn binarize(image: &mut GrayImage, threshold: u8) {
    for pix in image.pixels_mut() {
        pix.0[0] = if pix.0[0] > threshold { LIGHT } else { DARK };
    }
}

pub(crate) fn resize(image: &GrayImage, size: u32) -> GrayImage {
    imageops::resize(image, size, size, imageops::FilterType::Triangle)
}

fn ink_bounds(image: &GrayImage) -> Option<PixelRect> {
    let mut min = [u32::MAX; 2];
    let mut max = [0; 2];
    let mut found = false;
    for (x, y, pix) in image.enumerate_pixels() {
        if pix.0[0] == DARK {
            found = true;
            min = [min[0].min(x), min[1].min(y)];
            max = [max[0].max(x), max[1].max(y)];
        }
    }

    found.then(|| PixelRect {
        x: min[0],
        y: min[1],
        width: max[0] - min[0] + 1,
        height: max[1] - min[1] + 1,
    })
}

fn pad(rect: PixelRect, padding: u32, within: Resolution) -> PixelRect {
    let x = rect.x.saturating_sub(padding);
    let y = rect.y.saturating_sub(padding);
    let right = (rect.x + rect.width).saturating_add(padding).min(within.width());
    let bottom = (rect.y + rect.height).saturating_add(padding).min(within.height());
    PixelRect {
        x,
        y,
        width: right.saturating_sub(x),
        height: bottom.saturating_sub(y),
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;
    use nalgebra::Point2;

    use super::*;
    use crate::canvas::{StrokeCanvas, INK};

    fn canvas_with(rects: &[PixelRect]) -> RgbImage {
        let mut image = RgbImage::from_pixel(200, 100, BACKGROUND);
        for r in rects {
            for y in r.y..r.y + r.height {
                for x in r.x..r.x + r.width {
                    image.put_pixel(x, y, INK);
                }
            }
        }
        image
    }

    fn rect(x: u32, y: u32, width: u32, height: u32) -> PixelRect {
        PixelRect {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn blank_canvas_has_no_drawing() {
        let extractor = RoiExtractor::new(100, 30);
        let blank = RgbImage::from_pixel(50, 50, BACKGROUND);
        assert_eq!(
            extractor.extract(&blank).unwrap_err(),
            Rejection::NoDrawingDetected
        );
    }

    #[test]
    fn padding_is_clipped() {
        let extractor = RoiExtractor::new(100, 30);
        let roi = extractor
            .extract(&canvas_with(&[rect(10, 40, 20, 10)]))
            .unwrap();
        assert_eq!(roi.bounds(), rect(0, 10, 60, 70));

        let roi = extractor
            .extract(&canvas_with(&[rect(180, 90, 20, 10)]))
            .unwrap();
        assert_eq!(roi.bounds(), rect(150, 60, 50, 40));
    }

    #[test]
    fn square_is_centered_and_preserves_aspect() {
        let extractor = RoiExtractor::new(100, 5);
        let roi = extractor
            .extract(&canvas_with(&[rect(50, 40, 60, 10)]))
            .unwrap();
        let bounds = roi.bounds();
        assert_eq!(bounds, rect(45, 35, 70, 20));

        let square = roi.square();
        assert_eq!(square.width(), square.height());
        assert_eq!(square.width(), bounds.longer_side());

        let placement = roi.placement();
        assert_eq!(placement, rect(0, 25, 70, 20));
        // Ink sits in the middle, background above and below the pasted crop.
        assert_eq!(square.get_pixel(35, 35).0[0], DARK);
        assert_eq!(square.get_pixel(35, 10).0[0], LIGHT);
        assert_eq!(square.get_pixel(35, 60).0[0], LIGHT);
        assert_eq!(square.get_pixel(2, 35).0[0], LIGHT);
    }

    #[test]
    fn centering_within_one_pixel() {
        let extractor = RoiExtractor::new(100, 3);
        for (w, h) in [(7, 20), (20, 7), (8, 21), (13, 13), (1, 30)] {
            let roi = extractor
                .extract(&canvas_with(&[rect(60, 20, w, h)]))
                .unwrap();
            let bounds = roi.bounds();
            let placement = roi.placement();
            let side = roi.square().width();
            assert_eq!(side, bounds.longer_side());
            let left = placement.x;
            let right = side - placement.x - placement.width;
            let top = placement.y;
            let bottom = side - placement.y - placement.height;
            assert!(left.abs_diff(right) <= 1, "{w}x{h}: {left} vs {right}");
            assert!(top.abs_diff(bottom) <= 1, "{w}x{h}: {top} vs {bottom}");
        }
    }

    #[test]
    fn mostly_inked_canvas_keeps_polarity() {
        // Ink covers 75% of the canvas; only the bottom-right quadrant is background.
        let image = canvas_with(&[rect(0, 0, 200, 50), rect(0, 50, 100, 50)]);
        let roi = RoiExtractor::new(100, 0).extract(&image).unwrap();
        assert_eq!(roi.bounds(), rect(0, 0, 200, 100));

        let square = roi.square();
        let placement = roi.placement();
        let dark = square.pixels().filter(|p| p.0[0] == DARK).count();
        assert_eq!(dark, 200 * 50 + 100 * 50);
        assert_eq!(square.get_pixel(10, placement.y + 10).0[0], DARK);
        assert_eq!(square.get_pixel(150, placement.y + 75).0[0], LIGHT);
    }

    #[test]
    fn dense_scribble_is_cropped_to_ink() {
        let mut canvas = StrokeCanvas::new(Resolution::new(100, 100), 40);
        let res = canvas.resolution();
        for (x, y) in [(20.0, 20.0), (80.0, 20.0), (80.0, 80.0), (20.0, 80.0), (20.0, 20.0)] {
            canvas.append(Point2::new(x, y), res, true);
        }
        canvas.render();
        let raster = canvas.snapshot().image().clone();
        let inked = raster.pixels().filter(|p| **p == INK).count();
        assert!(inked * 2 > 100 * 100, "only {inked} ink pixels");

        let roi = RoiExtractor::new(100, 0).extract(&raster).unwrap();
        let dark = roi.square().pixels().filter(|p| p.0[0] == DARK).count();
        assert_eq!(dark, inked);
    }

    #[test]
    fn threshold_controls_faint_strokes() {
        let mut image = RgbImage::from_pixel(100, 100, BACKGROUND);
        // Gray stroke: 120 on a black canvas becomes 135 after inversion.
        for x in 20..40 {
            image.put_pixel(x, 50, Rgb([120, 120, 120]));
        }
        assert!(RoiExtractor::new(140, 0).extract(&image).is_ok());
        assert_eq!(
            RoiExtractor::new(100, 0).extract(&image).unwrap_err(),
            Rejection::NoDrawingDetected
        );
    }

    #[test]
    fn normalize_to_classifier_size() {
        let roi = RoiExtractor::new(100, 10)
            .extract(&canvas_with(&[rect(50, 20, 30, 60)]))
            .unwrap();
        let normalized = roi.normalize(28);
        assert_eq!(Resolution::of(&normalized), Resolution::new(28, 28));
        assert!(normalized.pixels().any(|p| p.0[0] < 128));
        assert!(normalized.pixels().any(|p| p.0[0] > 128));
    }
}
