//! Image and canvas sizes.

use std::fmt;

use image::GenericImageView;

/// Resolution (`width x height`) of a camera frame, canvas, or network input.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// 720p resolution: `1280x720`
    pub const RES_720P: Self = Self {
        width: 1280,
        height: 720,
    };

    /// 480p resolution: `640x480`
    pub const RES_480P: Self = Self {
        width: 640,
        height: 480,
    };

    /// Creates a new [`Resolution`] of `width x height`.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the resolution of an image.
    pub fn of<I: GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Returns whether either dimension is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the per-axis factors that map coordinates in `self` to coordinates in `target`.
    ///
    /// Returns `None` if `self` is empty.
    pub fn scale_to(&self, target: Resolution) -> Option<[f32; 2]> {
        if self.is_empty() {
            return None;
        }
        Some([
            target.width as f32 / self.width as f32,
            target.height as f32 / self.height as f32,
        ])
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
