//! Stroke accumulation and rasterization.

use std::{convert::Infallible, path::Path};

use embedded_graphics::{
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
};
use image::{Rgb, RgbImage};
use nalgebra::Point2;

use crate::config::Config;
use crate::resolution::Resolution;

/// Canvas background color.
pub const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
/// Stroke color.
pub const INK: Rgb<u8> = Rgb([255, 255, 255]);

/// A stroke point in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasPoint {
    pub x: i32,
    pub y: i32,
}

impl CanvasPoint {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// The drawing surface fingertip strokes are rendered onto.
///
/// Points are appended while the pen is down and connected to their predecessor by a line of
/// fixed thickness. Rendering is incremental: [`StrokeCanvas::render`] only draws the segments
/// ending in points appended since the previous call.
pub struct StrokeCanvas {
    raster: RgbImage,
    points: Vec<CanvasPoint>,
    /// Number of points whose incoming segment is already on the raster.
    rendered: usize,
    thickness: u32,
}

impl StrokeCanvas {
    /// Creates a blank canvas.
    pub fn new(resolution: Resolution, thickness: u32) -> Self {
        Self {
            raster: RgbImage::from_pixel(resolution.width(), resolution.height(), BACKGROUND),
            points: Vec::new(),
            rendered: 0,
            thickness,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.canvas_resolution, config.stroke_thickness)
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::of(&self.raster)
    }

    /// Returns the stroke points recorded so far, oldest first.
    #[inline]
    pub fn points(&self) -> &[CanvasPoint] {
        &self.points
    }

    /// Returns the live raster.
    #[inline]
    pub fn raster(&self) -> &RgbImage {
        &self.raster
    }

    /// Records the fingertip at `tip` (in pixels of a frame of size `frame`) if `drawing` is set.
    ///
    /// The position is scaled per axis into canvas space. Returns the recorded point, or `None`
    /// if nothing was recorded.
    pub fn append(
        &mut self,
        tip: Point2<f32>,
        frame: Resolution,
        drawing: bool,
    ) -> Option<CanvasPoint> {
        if !drawing {
            return None;
        }
        let [sx, sy] = frame.scale_to(self.resolution())?;
        let point = CanvasPoint::new((tip.x * sx) as i32, (tip.y * sy) as i32);
        self.points.push(point);
        Some(point)
    }

    /// Draws the segments leading to every point appended since the last call.
    pub fn render(&mut self) {
        let start = self.rendered.max(1);
        let style = PrimitiveStyle::with_stroke(Rgb888::WHITE, self.thickness);
        let mut target = Target(&mut self.raster);
        for pair in self.points[start - 1..].windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let line = Line::new(Point::new(a.x, a.y), Point::new(b.x, b.y)).into_styled(style);
            match line.draw(&mut target) {
                Ok(()) => {}
                Err(infallible) => match infallible {},
            }
        }
        self.rendered = self.points.len();
    }

    /// Resets the raster to the background and forgets all stroke points.
    pub fn clear(&mut self) {
        self.raster.pixels_mut().for_each(|pix| *pix = BACKGROUND);
        self.points.clear();
        self.rendered = 0;
    }

    /// Returns whether no ink has been rendered.
    pub fn is_blank(&self) -> bool {
        self.raster.pixels().all(|pix| *pix == BACKGROUND)
    }

    /// Copies the current raster and stroke points.
    ///
    /// Segments appended but not yet [`render`][Self::render]ed are not part of the snapshot's
    /// raster.
    pub fn snapshot(&self) -> CanvasSnapshot {
        CanvasSnapshot {
            raster: self.raster.clone(),
            points: self.points[..self.rendered].to_vec(),
        }
    }
}

/// An owned, point-in-time copy of a [`StrokeCanvas`].
#[derive(Clone)]
pub struct CanvasSnapshot {
    raster: RgbImage,
    points: Vec<CanvasPoint>,
}

impl CanvasSnapshot {
    /// Wraps an existing image, e.g. one loaded from disk.
    pub fn from_image(raster: RgbImage) -> Self {
        Self {
            raster,
            points: Vec::new(),
        }
    }

    #[inline]
    pub fn image(&self) -> &RgbImage {
        &self.raster
    }

    #[inline]
    pub fn points(&self) -> &[CanvasPoint] {
        &self.points
    }

    /// Saves the raster to the file system. The format is chosen by the path's extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        Ok(self.raster.save(path.as_ref())?)
    }
}

impl std::fmt::Debug for CanvasSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} CanvasSnapshot ({} points)",
            Resolution::of(&self.raster),
            self.points.len()
        )
    }
}

struct Target<'a>(&'a mut RgbImage);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        let (width, height) = self.0.dimensions();

        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size { width, height },
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Rgb888;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = self.0.dimensions();
        for Pixel(pos, color) in pixels {
            if pos.x >= 0 && (pos.x as u32) < width && pos.y >= 0 && (pos.y as u32) < height {
                self.0.put_pixel(
                    pos.x as u32,
                    pos.y as u32,
                    Rgb([color.r(), color.g(), color.b()]),
                );
            }
        }

        Ok(())
    }
}
