//! Air-drawn character recognition.
//!
//! A [`CaptureSession`] runs a capture worker that reads frames from a [`FrameSource`], finds the
//! user's hand with a [`LandmarkDetector`], turns thumb/index pinches into a debounced pen state,
//! and rasterizes the index fingertip's path onto a canvas. On demand, a [`Recognizer`] takes a
//! snapshot of that canvas, extracts and normalizes the drawn region, classifies several variants
//! of it, and keeps the most confident answer.
//!
//! # Coordinates
//!
//! Landmarks are normalized to the frame (`0.0..=1.0` on both axes, Y pointing down). Gesture
//! distances are measured in frame pixels, stroke points in canvas pixels.
//!
//! # Environment Variables
//!
//! * `AIRGLYPH_WEBCAM_NAME`: forces the device to use for [`Webcam`]s opened without an explicit
//!   device name.
//! * `AIRGLYPH_*` tunables read by [`Config::from_env`], see there for the full list.
//!
//! [`CaptureSession`]: session::CaptureSession
//! [`FrameSource`]: video::FrameSource
//! [`LandmarkDetector`]: landmark::LandmarkDetector
//! [`Recognizer`]: recognize::Recognizer
//! [`Webcam`]: video::webcam::Webcam
//! [`Config::from_env`]: config::Config::from_env

use log::LevelFilter;

pub mod canvas;
pub mod classifier;
pub mod config;
pub mod drop;
pub mod ensemble;
pub mod gesture;
pub mod hand;
pub mod landmark;
pub mod nn;
pub mod recognize;
pub mod resolution;
pub mod roi;
pub mod session;
pub mod timer;
pub mod variant;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("tract_core"), LevelFilter::Warn)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and airglyph will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// tract's crates always log at *warn* level. `RUST_LOG` is applied on top of these defaults.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
