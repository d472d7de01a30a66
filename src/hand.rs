//! Hand landmark estimation with a MediaPipe-style ONNX network.
//!
//! The network takes a `[1, 3, 224, 224]` RGB image with channels in `0.0..=1.0` and outputs
//! 21 `(x, y, z)` keypoints in input pixels (`[1, 63]`) plus a hand presence score (`[1, 1]`).
//! Further outputs (handedness, world landmarks) are ignored.
//!
//! The whole frame is letterboxed into the network input, so this works best when the hand covers
//! a good part of the frame.

use std::path::Path;

use image::{imageops, Rgb, RgbImage};
use tract_onnx::prelude::{tract_ndarray, Tensor};

use crate::config::Config;
use crate::landmark::{HandLandmarks, Landmark, LandmarkDetector, NUM_LANDMARKS};
use crate::nn::NeuralNetwork;
use crate::resolution::Resolution;
use crate::timer::Timer;

const INPUT_SIZE: u32 = 224;

/// Where a frame ended up inside the square network input.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
    scale: f32,
    offset: [f32; 2],
    frame: Resolution,
}

impl Letterbox {
    fn new(frame: Resolution) -> Self {
        let scale = INPUT_SIZE as f32 / frame.width().max(frame.height()) as f32;
        let [w, h] = Self::scaled_size(frame, scale);
        Self {
            scale,
            offset: [
                (INPUT_SIZE - w) as f32 / 2.0,
                (INPUT_SIZE - h) as f32 / 2.0,
            ],
            frame,
        }
    }

    fn scaled_size(frame: Resolution, scale: f32) -> [u32; 2] {
        [
            ((frame.width() as f32 * scale).round() as u32).clamp(1, INPUT_SIZE),
            ((frame.height() as f32 * scale).round() as u32).clamp(1, INPUT_SIZE),
        ]
    }

    fn apply(&self, frame: &RgbImage) -> RgbImage {
        let [w, h] = Self::scaled_size(self.frame, self.scale);
        let scaled = imageops::resize(frame, w, h, imageops::FilterType::Triangle);
        let mut input = RgbImage::from_pixel(INPUT_SIZE, INPUT_SIZE, Rgb([0, 0, 0]));
        imageops::overlay(
            &mut input,
            &scaled,
            self.offset[0] as i64,
            self.offset[1] as i64,
        );
        input
    }

    /// Maps a point in network input pixels to normalized frame coordinates.
    fn to_frame(&self, x: f32, y: f32) -> Landmark {
        Landmark::new(
            (x - self.offset[0]) / self.scale / self.frame.width() as f32,
            (y - self.offset[1]) / self.scale / self.frame.height() as f32,
        )
    }
}

/// A [`LandmarkDetector`] reporting at most one hand.
pub struct OnnxHandLandmarker {
    nn: NeuralNetwork,
    presence_threshold: f32,
    t_infer: Timer,
}

impl OnnxHandLandmarker {
    /// Loads the network at `path`. Hands with a presence score below the configured presence
    /// threshold are not reported.
    pub fn load<P: AsRef<Path>>(path: P, config: &Config) -> anyhow::Result<Self> {
        let size = INPUT_SIZE as usize;
        Ok(Self {
            nn: NeuralNetwork::load(path, &[1, 3, size, size])?,
            presence_threshold: config.presence_threshold,
            t_infer: Timer::new("hand"),
        })
    }

}

impl LandmarkDetector for OnnxHandLandmarker {
    fn detect(&mut self, frame: &RgbImage) -> anyhow::Result<Vec<HandLandmarks>> {
        let resolution = Resolution::of(frame);
        if resolution.is_empty() {
            anyhow::bail!("cannot detect hands in empty frame");
        }
        let letterbox = Letterbox::new(resolution);
        let input = letterbox.apply(frame);

        let size = INPUT_SIZE as usize;
        let tensor: Tensor =
            tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
                f32::from(input.get_pixel(x as u32, y as u32).0[c]) / 255.0
            })
            .into();
        let nn = &self.nn;
        let outputs = self.t_infer.time(|| nn.estimate(tensor))?;

        let [coords, presence, ..] = &outputs[..] else {
            anyhow::bail!("hand network has {} outputs, expected at least 2", outputs.len());
        };
        let coords = coords.as_slice::<f32>()?;
        if coords.len() != NUM_LANDMARKS * 3 {
            anyhow::bail!("hand network produced {} coordinates", coords.len());
        }
        let presence = presence.as_slice::<f32>()?.first().copied().unwrap_or(0.0);

        if presence < self.presence_threshold {
            log::trace!("no hand (presence {presence:.2})");
            return Ok(Vec::new());
        }

        let mut positions = [Landmark::default(); NUM_LANDMARKS];
        for (pos, xyz) in positions.iter_mut().zip(coords.chunks_exact(3)) {
            *pos = letterbox.to_frame(xyz[0], xyz[1]);
        }
        Ok(vec![HandLandmarks::new(positions, presence)])
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_infer]
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn letterbox_landscape() {
        let lb = Letterbox::new(Resolution::new(640, 480));
        assert_relative_eq!(lb.scale, 0.35);
        assert_eq!(lb.offset, [0.0, 28.0]);

        let center = lb.to_frame(112.0, 112.0);
        assert_relative_eq!(center.x, 0.5, epsilon = 1e-6);
        assert_relative_eq!(center.y, 0.5, epsilon = 1e-6);
        let top_left = lb.to_frame(0.0, 28.0);
        assert_relative_eq!(top_left.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(top_left.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn letterbox_image() {
        let frame = RgbImage::from_pixel(100, 200, Rgb([255, 0, 0]));
        let lb = Letterbox::new(Resolution::of(&frame));
        let input = lb.apply(&frame);
        assert_eq!(input.dimensions(), (224, 224));
        assert_eq!(*input.get_pixel(112, 112), Rgb([255, 0, 0]));
        assert_eq!(*input.get_pixel(5, 112), Rgb([0, 0, 0]));
        assert_eq!(*input.get_pixel(218, 112), Rgb([0, 0, 0]));
    }

    #[test]
    fn missing_model() {
        assert!(OnnxHandLandmarker::load("does/not/exist.onnx", &Config::default()).is_err());
    }
}
