//! Hand landmarks and the detector interface that produces them.

use image::RgbImage;
use nalgebra::Point2;

use crate::resolution::Resolution;
use crate::timer::Timer;

/// Number of keypoints in a [`HandLandmarks`] set.
pub const NUM_LANDMARKS: usize = 21;

/// Names for the hand pose landmarks, in the order hand landmark networks report them.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the knuckles near the palm of the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// A keypoint position, normalized to the frame: `(0, 0)` is the top left corner, `(1, 1)` the
/// bottom right one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Converts the normalized position to pixel coordinates in a frame of size `frame`.
    #[inline]
    pub fn to_pixels(&self, frame: Resolution) -> Point2<f32> {
        Point2::new(
            self.x * frame.width() as f32,
            self.y * frame.height() as f32,
        )
    }
}

/// The keypoints of one detected hand.
#[derive(Debug, Clone)]
pub struct HandLandmarks {
    positions: [Landmark; NUM_LANDMARKS],
    presence: f32,
}

impl HandLandmarks {
    pub fn new(positions: [Landmark; NUM_LANDMARKS], presence: f32) -> Self {
        Self {
            positions,
            presence,
        }
    }

    /// Creates a landmark set where only the thumb and index fingertips are meaningful.
    ///
    /// All other keypoints are placed at the midpoint of the two tips. Useful for detectors that
    /// only track fingertips, and for tests.
    pub fn from_tips(index_tip: Landmark, thumb_tip: Landmark) -> Self {
        let mid = Landmark::new(
            (index_tip.x + thumb_tip.x) / 2.0,
            (index_tip.y + thumb_tip.y) / 2.0,
        );
        let mut positions = [mid; NUM_LANDMARKS];
        positions[LandmarkIdx::IndexFingerTip as usize] = index_tip;
        positions[LandmarkIdx::ThumbTip as usize] = thumb_tip;
        Self::new(positions, 1.0)
    }

    #[inline]
    pub fn get(&self, idx: LandmarkIdx) -> Landmark {
        self.positions[idx as usize]
    }

    /// Returns the detector's confidence that this is actually a hand.
    #[inline]
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Returns the index fingertip and thumb tip positions in frame pixels.
    pub fn pinch_points(&self, frame: Resolution) -> PinchPoints {
        PinchPoints {
            index_tip: self.get(LandmarkIdx::IndexFingerTip).to_pixels(frame),
            thumb_tip: self.get(LandmarkIdx::ThumbTip).to_pixels(frame),
        }
    }
}

/// The two keypoints the pinch gesture is derived from, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchPoints {
    pub index_tip: Point2<f32>,
    pub thumb_tip: Point2<f32>,
}

impl PinchPoints {
    /// Euclidean distance between the two fingertips.
    pub fn distance(&self) -> f32 {
        nalgebra::distance(&self.index_tip, &self.thumb_tip)
    }
}

/// Finds hands in camera frames.
///
/// Implementations should be configured to track at most one hand. If more than one is returned,
/// the capture loop only looks at the first.
pub trait LandmarkDetector: Send {
    /// Returns the hands found in `frame`, most confident first.
    fn detect(&mut self, frame: &RgbImage) -> anyhow::Result<Vec<HandLandmarks>>;

    /// Returns the profiling timers the capture loop logs along with its frame rate.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn detect(&mut self, frame: &RgbImage) -> anyhow::Result<Vec<HandLandmarks>> {
        (**self).detect(frame)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn pinch_points_in_pixels() {
        let hand = HandLandmarks::from_tips(Landmark::new(0.5, 0.25), Landmark::new(0.5, 0.5));
        let points = hand.pinch_points(Resolution::new(640, 480));
        assert_relative_eq!(points.index_tip.x, 320.0);
        assert_relative_eq!(points.index_tip.y, 120.0);
        assert_relative_eq!(points.thumb_tip.y, 240.0);
        assert_relative_eq!(points.distance(), 120.0);
        assert_eq!(hand.presence(), 1.0);
    }

    #[test]
    fn landmark_order() {
        assert_eq!(LandmarkIdx::ThumbTip as usize, 4);
        assert_eq!(LandmarkIdx::IndexFingerTip as usize, 8);
        assert_eq!(LandmarkIdx::PinkyTip as usize, NUM_LANDMARKS - 1);
    }
}
