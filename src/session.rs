//! The capture worker and its control handle.
//!
//! [`CaptureSession::start`] spawns a thread that owns the frame source, the landmark detector,
//! the gesture state and the canvas. It is the only code that ever mutates them. Everything else
//! talks to it through a command channel that the worker drains between frames, so snapshots are
//! always taken between two complete frame updates.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use image::{imageops, RgbImage};
use pawawwewism::{promise, Promise};

use crate::canvas::{CanvasSnapshot, StrokeCanvas};
use crate::classifier::Classifier;
use crate::config::Config;
use crate::drop::defer;
use crate::gesture::PinchDetector;
use crate::landmark::LandmarkDetector;
use crate::recognize::{Outcome, RecognizeError, Recognizer};
use crate::resolution::Resolution;
use crate::timer::{FpsCounter, Timer};
use crate::video::FrameSource;

/// Errors that end (or prevent) a capture session.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("invalid configuration: {0:#}")]
    Config(anyhow::Error),
    #[error("frame source unavailable: {0:#}")]
    SourceUnavailable(anyhow::Error),
    #[error("failed to read frame: {0:#}")]
    FrameReadFailure(anyhow::Error),
    #[error("failed to spawn capture worker")]
    Spawn(#[from] std::io::Error),
    #[error("capture worker panicked")]
    Panicked,
}

/// The capture worker is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("capture worker has stopped")]
pub struct SessionStopped;

/// What the session is doing, as far as the user is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Pen up.
    Idle,
    /// Pen down, strokes are being recorded.
    Drawing,
    /// A recognition is in progress.
    Recognizing,
}

enum Command {
    Snapshot(Promise<CanvasSnapshot>),
    Reset(Promise<()>),
}

#[derive(Default)]
struct Status {
    frames: AtomicU64,
    drawing: AtomicBool,
    recognizing: AtomicBool,
}

/// Handle to a running capture worker.
///
/// Dropping the handle stops the worker.
pub struct CaptureSession {
    commands: Option<Sender<Command>>,
    worker: Option<JoinHandle<Result<(), CaptureError>>>,
    status: Arc<Status>,
}

impl CaptureSession {
    /// Starts capturing.
    ///
    /// `open` is invoked on the capture thread to create the frame source. If it fails, this
    /// returns [`CaptureError::SourceUnavailable`] and no frame is ever processed.
    pub fn start<S, O, D>(open: O, detector: D, config: &Config) -> Result<Self, CaptureError>
    where
        S: FrameSource,
        O: FnOnce() -> anyhow::Result<S> + Send + 'static,
        D: LandmarkDetector + 'static,
    {
        config.validate().map_err(CaptureError::Config)?;

        let (sender, receiver) = crossbeam_channel::unbounded();
        let status = Arc::new(Status::default());
        let capture = CaptureLoop {
            commands: receiver,
            status: status.clone(),
            detector,
            gesture: PinchDetector::from_config(config),
            canvas: StrokeCanvas::from_config(config),
            mirror: config.mirror,
            fps: FpsCounter::new("capture"),
            t_detect: Timer::new("detect"),
            t_render: Timer::new("render"),
        };

        let (opened, opened_handle) = promise();
        let worker = thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                let source = match open() {
                    Ok(source) => {
                        opened.fulfill(Ok(()));
                        source
                    }
                    Err(e) => {
                        opened.fulfill(Err(e));
                        return Ok(());
                    }
                };
                capture.run(source)
            })?;

        match opened_handle.block() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                worker.join().ok();
                log::error!("failed to open frame source: {e:#}");
                return Err(CaptureError::SourceUnavailable(e));
            }
            Err(_) => {
                return Err(match worker.join() {
                    Ok(Err(e)) => e,
                    _ => CaptureError::Panicked,
                });
            }
        }

        Ok(Self {
            commands: Some(sender),
            worker: Some(worker),
            status,
        })
    }

    fn send(&self, command: Command) -> Result<(), SessionStopped> {
        self.commands
            .as_ref()
            .ok_or(SessionStopped)?
            .send(command)
            .map_err(|_| SessionStopped)
    }

    /// Returns a copy of the canvas as of the last fully processed frame.
    pub fn snapshot(&self) -> Result<CanvasSnapshot, SessionStopped> {
        let (promise, handle) = promise();
        self.send(Command::Snapshot(promise))?;
        handle.block().map_err(|_| SessionStopped)
    }

    /// Clears the canvas and lifts the pen.
    ///
    /// Returns once the worker has performed the reset.
    pub fn reset(&self) -> Result<(), SessionStopped> {
        let (promise, handle) = promise();
        self.send(Command::Reset(promise))?;
        handle.block().map_err(|_| SessionStopped)
    }

    /// Snapshots the canvas and runs `recognizer` on it.
    ///
    /// Capture continues while the recognizer runs; strokes drawn in the meantime are not part of
    /// the result.
    pub fn recognize<C: Classifier>(
        &self,
        recognizer: &mut Recognizer<C>,
    ) -> Result<Outcome, RecognizeError> {
        self.status.recognizing.store(true, Ordering::Release);
        let _guard = defer(|| self.status.recognizing.store(false, Ordering::Release));
        let snapshot = self.snapshot()?;
        recognizer.recognize(&snapshot)
    }

    pub fn state(&self) -> SessionState {
        if self.status.recognizing.load(Ordering::Acquire) {
            SessionState::Recognizing
        } else if self.status.drawing.load(Ordering::Acquire) {
            SessionState::Drawing
        } else {
            SessionState::Idle
        }
    }

    /// Returns the number of frames the worker has fully processed.
    pub fn frames_processed(&self) -> u64 {
        self.status.frames.load(Ordering::Acquire)
    }

    /// Returns whether the capture worker is still running.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map_or(false, |w| !w.is_finished())
    }

    /// Stops the worker and waits for it to exit, releasing the frame source.
    ///
    /// Returns the error that ended the worker, if any. Calling this again returns `Ok(())`.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        self.commands = None;
        match self.worker.take() {
            Some(worker) => worker.join().unwrap_or(Err(CaptureError::Panicked)),
            None => Ok(()),
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("capture session ended with error: {e}");
        }
    }
}

struct CaptureLoop<D> {
    commands: Receiver<Command>,
    status: Arc<Status>,
    detector: D,
    gesture: PinchDetector,
    canvas: StrokeCanvas,
    mirror: bool,
    fps: FpsCounter,
    t_detect: Timer,
    t_render: Timer,
}

impl<D: LandmarkDetector> CaptureLoop<D> {
    fn run<S: FrameSource>(mut self, mut source: S) -> Result<(), CaptureError> {
        loop {
            loop {
                match self.commands.try_recv() {
                    Ok(command) => self.handle(command),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        log::debug!("capture stopped");
                        return Ok(());
                    }
                }
            }

            let mut frame = match source.read() {
                Ok(frame) => frame,
                Err(e) => {
                    log::error!("frame read failed, stopping capture: {e:#}");
                    return Err(CaptureError::FrameReadFailure(e));
                }
            };
            self.process(&mut frame);
            self.status.frames.fetch_add(1, Ordering::AcqRel);
            self.fps.tick_with(
                source
                    .timers()
                    .into_iter()
                    .chain(self.detector.timers())
                    .chain([&self.t_detect, &self.t_render]),
            );
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Snapshot(promise) => promise.fulfill(self.canvas.snapshot()),
            Command::Reset(promise) => {
                self.canvas.clear();
                self.gesture.reset();
                self.status.drawing.store(false, Ordering::Release);
                log::debug!("canvas cleared");
                promise.fulfill(());
            }
        }
    }

    fn process(&mut self, frame: &mut RgbImage) {
        if self.mirror {
            imageops::flip_horizontal_in_place(frame);
        }
        let resolution = Resolution::of(&*frame);

        let detector = &mut self.detector;
        let hands = match self.t_detect.time(|| detector.detect(frame)) {
            Ok(hands) => hands,
            Err(e) => {
                log::warn!("landmark detection failed: {e:#}");
                Vec::new()
            }
        };

        let pinch = hands.first().map(|hand| {
            let pinch = hand.pinch_points(resolution);
            log::trace!(
                "pinch distance {:.1}px (presence {:.2})",
                pinch.distance(),
                hand.presence()
            );
            pinch
        });
        let drawing = self.gesture.update(pinch);
        self.status.drawing.store(drawing, Ordering::Release);

        if let Some(pinch) = pinch {
            if self
                .canvas
                .append(pinch.index_tip, resolution, drawing)
                .is_some()
            {
                let canvas = &mut self.canvas;
                self.t_render.time(|| canvas.render());
            }
        }
    }
}
