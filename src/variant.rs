//! Deterministic variants of an extracted drawing.
//!
//! Hand-drawn air strokes are often rotated, or thinner or thicker than the glyphs the classifier
//! was trained on. Classifying a few transformed copies and keeping the most confident answer
//! makes recognition more forgiving. This is a heuristic; none of the variants is guaranteed to
//! help for any particular drawing.

use std::fmt;

use image::{imageops, GrayImage, Luma};

use crate::classifier::INPUT_SIZE;
use crate::config::Config;
use crate::roi::{self, Roi, DARK, LIGHT};

/// The transform a [`Variant`] was produced with.
///
/// The declaration order is the tie-breaking priority of the ensemble: earlier kinds win ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VariantKind {
    Identity,
    /// Rotated by 90° clockwise.
    Rotated90,
    /// 3x3 morphological dilation (maximum filter).
    Dilated,
    /// 3x3 morphological erosion (minimum filter).
    Eroded,
}

impl VariantKind {
    /// All kinds, in priority order.
    pub const ALL: [VariantKind; 4] = [
        VariantKind::Identity,
        VariantKind::Rotated90,
        VariantKind::Dilated,
        VariantKind::Eroded,
    ];

    fn apply(self, square: &GrayImage) -> GrayImage {
        match self {
            VariantKind::Identity => square.clone(),
            VariantKind::Rotated90 => imageops::rotate90(square),
            VariantKind::Dilated => morph3x3(square, u8::max),
            VariantKind::Eroded => morph3x3(square, u8::min),
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VariantKind::Identity => "identity",
            VariantKind::Rotated90 => "rotated 90°",
            VariantKind::Dilated => "dilated",
            VariantKind::Eroded => "eroded",
        })
    }
}

/// A classifier-sized, binarized image with dark ink on a light background.
#[derive(Clone)]
pub struct Variant {
    kind: VariantKind,
    image: GrayImage,
}

impl Variant {
    #[inline]
    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    #[inline]
    pub fn image(&self) -> &GrayImage {
        &self.image
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Variant ({}x{})",
            self.kind,
            self.image.width(),
            self.image.height()
        )
    }
}

/// Produces the [`VariantKind::ALL`] variants of an extracted region.
#[derive(Debug, Clone)]
pub struct VariantGenerator {
    threshold: u8,
    size: u32,
}

impl VariantGenerator {
    /// Creates a generator that binarizes its outputs at `threshold`.
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            size: INPUT_SIZE,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.variant_threshold)
    }

    /// Returns one variant per [`VariantKind`], in priority order.
    ///
    /// The transforms operate on the full-resolution square of `roi`; each result is then resized
    /// to the classifier input size, binarized, and flipped back to a light background if the
    /// transform left it predominantly dark.
    pub fn generate(&self, roi: &Roi) -> [Variant; 4] {
        VariantKind::ALL.map(|kind| self.variant(roi.square(), kind))
    }

    fn variant(&self, square: &GrayImage, kind: VariantKind) -> Variant {
        let mut image = roi::resize(&kind.apply(square), self.size);
        roi::binarize(&mut image, self.threshold);
        correct_polarity(&mut image);
        Variant { kind, image }
    }
}

/// Inverts a binary image unless it has more background than ink pixels.
fn correct_polarity(image: &mut GrayImage) {
    let (mut light, mut dark) = (0usize, 0usize);
    for pix in image.pixels() {
        match pix.0[0] {
            LIGHT => light += 1,
            DARK => dark += 1,
            _ => {}
        }
    }
    if dark >= light {
        imageops::invert(image);
    }
}

/// Applies a 3x3 rank filter. Pixels outside the image do not participate.
fn morph3x3(image: &GrayImage, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (w, h) = image.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut acc = image.get_pixel(x, y).0[0];
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                acc = pick(acc, image.get_pixel(nx, ny).0[0]);
            }
        }
        Luma([acc])
    })
}
