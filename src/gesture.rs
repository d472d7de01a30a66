//! Pinch gesture debouncing.
//!
//! Thumb and index fingertip closer than a threshold means "pen down". Landmark positions jitter
//! from frame to frame, so a fingertip distance hovering around the threshold would toggle the pen
//! on every frame. [`PinchDetector`] suppresses that with a frame-counted cooldown: after every
//! pen state change, the state is frozen until the cooldown has run out.

use crate::config::Config;
use crate::landmark::PinchPoints;

/// Pen state carried from frame to frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GestureState {
    /// Whether the pen is down.
    pub drawing: bool,
    /// Remaining frames during which `drawing` may not change.
    pub cooldown: u32,
}

/// Turns per-frame fingertip distances into a debounced pen state.
#[derive(Debug, Clone)]
pub struct PinchDetector {
    threshold: f32,
    cooldown_frames: u32,
    state: GestureState,
}

impl PinchDetector {
    /// Creates a detector with the pen up.
    ///
    /// `threshold` is the fingertip distance in pixels below which the fingers count as pinched.
    /// `cooldown_frames` is how many frames every state change blocks further changes for.
    pub fn new(threshold: f32, cooldown_frames: u32) -> Self {
        Self {
            threshold,
            cooldown_frames,
            state: GestureState::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.pinch_threshold, config.cooldown_frames)
    }

    #[inline]
    pub fn state(&self) -> GestureState {
        self.state
    }

    #[inline]
    pub fn is_drawing(&self) -> bool {
        self.state.drawing
    }

    /// Lifts the pen and clears the cooldown.
    pub fn reset(&mut self) {
        self.state = GestureState::default();
    }

    /// Advances the state machine by one frame, given the fingertips of the tracked hand (or
    /// `None` when no hand was found in the frame).
    ///
    /// Returns whether the pen is down after this frame.
    pub fn update(&mut self, tips: Option<PinchPoints>) -> bool {
        self.update_distance(tips.map(|tips| tips.distance()))
    }

    /// Advances the state machine by one frame, given the fingertip distance in pixels.
    ///
    /// A frame without a hand (`None`) still counts down the cooldown, but keeps the pen state, so
    /// that a brief tracking dropout does not interrupt a stroke.
    pub fn update_distance(&mut self, distance: Option<f32>) -> bool {
        let state = &mut self.state;
        if state.cooldown > 0 {
            state.cooldown -= 1;
        }

        let Some(distance) = distance else {
            return state.drawing;
        };

        let pinched = distance < self.threshold;
        if state.cooldown == 0 && pinched != state.drawing {
            state.drawing = pinched;
            state.cooldown = self.cooldown_frames;
            log::trace!(
                "pen {} (distance {distance:.1}px)",
                if pinched { "down" } else { "up" }
            );
        }

        state.drawing
    }
}
