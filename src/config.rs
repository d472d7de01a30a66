//! Tunable parameters of the capture and recognition pipelines.

use std::{env, str::FromStr};

use anyhow::Context;

use crate::resolution::Resolution;

/// Capture and recognition settings.
///
/// Constructed with [`Config::default`] and adjusted with the builder-style setters, or read from
/// the environment with [`Config::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) pinch_threshold: f32,
    pub(crate) cooldown_frames: u32,
    pub(crate) canvas_resolution: Resolution,
    pub(crate) stroke_thickness: u32,
    pub(crate) canvas_threshold: u8,
    pub(crate) variant_threshold: u8,
    pub(crate) roi_padding: u32,
    pub(crate) acceptance_threshold: f32,
    pub(crate) presence_threshold: f32,
    pub(crate) mirror: bool,
    pub(crate) parallel_variants: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pinch_threshold: 50.0,
            cooldown_frames: 5,
            canvas_resolution: Resolution::new(400, 400),
            stroke_thickness: 5,
            canvas_threshold: 100,
            variant_threshold: 180,
            roi_padding: 30,
            acceptance_threshold: 0.5,
            presence_threshold: 0.7,
            mirror: true,
            parallel_variants: false,
        }
    }
}

const ENV_PREFIX: &str = "AIRGLYPH_";

impl Config {
    /// Starts from [`Config::default`] and applies any `AIRGLYPH_*` environment variables.
    ///
    /// Recognized variables (suffixes after `AIRGLYPH_`):
    ///
    /// * `PINCH_THRESHOLD` (pixels), `COOLDOWN_FRAMES`
    /// * `CANVAS_WIDTH`, `CANVAS_HEIGHT`, `STROKE_THICKNESS`
    /// * `CANVAS_THRESHOLD`, `VARIANT_THRESHOLD` (0-255), `ROI_PADDING` (pixels)
    /// * `ACCEPTANCE_THRESHOLD`, `PRESENCE_THRESHOLD` (0.0-1.0)
    /// * `MIRROR`, `PARALLEL_VARIANTS` (`true`/`false`)
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        let mut width = config.canvas_resolution.width();
        let mut height = config.canvas_resolution.height();

        read_var("PINCH_THRESHOLD", &mut config.pinch_threshold)?;
        read_var("COOLDOWN_FRAMES", &mut config.cooldown_frames)?;
        read_var("CANVAS_WIDTH", &mut width)?;
        read_var("CANVAS_HEIGHT", &mut height)?;
        read_var("STROKE_THICKNESS", &mut config.stroke_thickness)?;
        read_var("CANVAS_THRESHOLD", &mut config.canvas_threshold)?;
        read_var("VARIANT_THRESHOLD", &mut config.variant_threshold)?;
        read_var("ROI_PADDING", &mut config.roi_padding)?;
        read_var("ACCEPTANCE_THRESHOLD", &mut config.acceptance_threshold)?;
        read_var("PRESENCE_THRESHOLD", &mut config.presence_threshold)?;
        read_var("MIRROR", &mut config.mirror)?;
        read_var("PARALLEL_VARIANTS", &mut config.parallel_variants)?;

        config.canvas_resolution = Resolution::new(width, height);
        config.validate()?;
        Ok(config)
    }

    /// Checks that the settings describe a usable pipeline.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.pinch_threshold > 0.0) {
            anyhow::bail!("pinch threshold must be positive, got {}", self.pinch_threshold);
        }
        if self.canvas_resolution.is_empty() {
            anyhow::bail!("canvas resolution {} is empty", self.canvas_resolution);
        }
        if self.stroke_thickness == 0 {
            anyhow::bail!("stroke thickness must be at least 1 pixel");
        }
        for (name, value) in [
            ("acceptance", self.acceptance_threshold),
            ("presence", self.presence_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{name} threshold {value} is outside of 0.0..=1.0");
            }
        }
        Ok(())
    }

    /// Sets the fingertip distance (in frame pixels) below which thumb and index finger count as
    /// pinched.
    pub fn pinch_threshold(mut self, pixels: f32) -> Self {
        self.pinch_threshold = pixels;
        self
    }

    /// Sets the number of frames after a pen state change during which no further change is
    /// accepted.
    pub fn cooldown_frames(mut self, frames: u32) -> Self {
        self.cooldown_frames = frames;
        self
    }

    pub fn canvas_resolution(mut self, resolution: Resolution) -> Self {
        self.canvas_resolution = resolution;
        self
    }

    pub fn stroke_thickness(mut self, pixels: u32) -> Self {
        self.stroke_thickness = pixels;
        self
    }

    /// Sets the binarization threshold applied to the canvas before region extraction.
    ///
    /// Lower values keep more of thin or faint strokes.
    pub fn canvas_threshold(mut self, threshold: u8) -> Self {
        self.canvas_threshold = threshold;
        self
    }

    /// Sets the binarization threshold applied to each variant before classification.
    pub fn variant_threshold(mut self, threshold: u8) -> Self {
        self.variant_threshold = threshold;
        self
    }

    /// Sets the margin added on every side of the drawing's bounding box.
    pub fn roi_padding(mut self, pixels: u32) -> Self {
        self.roi_padding = pixels;
        self
    }

    /// Sets the minimum confidence a recognition result needs to be accepted as a guess.
    pub fn acceptance_threshold(mut self, confidence: f32) -> Self {
        self.acceptance_threshold = confidence;
        self
    }

    /// Sets the minimum hand presence score for ONNX landmark detections.
    pub fn presence_threshold(mut self, presence: f32) -> Self {
        self.presence_threshold = presence;
        self
    }

    /// Sets whether camera frames are flipped horizontally before processing.
    ///
    /// Mirroring makes the drawing follow the hand the way a mirror image would.
    pub fn mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    /// Sets whether the four variants are classified in parallel.
    pub fn parallel_variants(mut self, parallel: bool) -> Self {
        self.parallel_variants = parallel;
        self
    }

    #[inline]
    pub fn acceptance(&self) -> f32 {
        self.acceptance_threshold
    }
}

fn read_var<T>(suffix: &str, dest: &mut T) -> anyhow::Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let name = format!("{ENV_PREFIX}{suffix}");
    match env::var(&name) {
        Ok(value) => {
            *dest = value
                .trim()
                .parse()
                .with_context(|| format!("invalid value '{value}' for `{name}`"))?;
            log::debug!("config override: `{name}` = '{value}'");
            Ok(())
        }
        Err(env::VarError::NotPresent) => Ok(()),
        Err(e) => Err(e).with_context(|| format!("cannot read `{name}`")),
    }
}
