//! Frame sources.

pub mod webcam;

use image::RgbImage;

use crate::timer::Timer;

/// A sequential source of color frames, such as a camera.
///
/// [`FrameSource::read`] blocks until the next frame is available. An error means no further
/// frames can be read; the capture worker stops when it sees one.
pub trait FrameSource {
    fn read(&mut self) -> anyhow::Result<RgbImage>;

    /// Returns the profiling timers the capture loop logs along with its frame rate.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read(&mut self) -> anyhow::Result<RgbImage> {
        (**self).read()
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

/// Adapts a closure into a [`FrameSource`].
pub struct FromFn<F>(F);

/// Creates a [`FrameSource`] that calls `f` for every frame.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut() -> anyhow::Result<RgbImage>,
{
    FromFn(f)
}

impl<F> FrameSource for FromFn<F>
where
    F: FnMut() -> anyhow::Result<RgbImage>,
{
    fn read(&mut self) -> anyhow::Result<RgbImage> {
        (self.0)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_source() {
        let mut n = 0;
        let mut source = from_fn(|| {
            n += 1;
            if n > 2 {
                anyhow::bail!("end of stream");
            }
            Ok(RgbImage::new(4, 3))
        });
        assert_eq!(source.read().unwrap().dimensions(), (4, 3));
        assert!(source.read().is_ok());
        assert!(source.read().is_err());
        assert!(source.timers().is_empty());
    }

    #[test]
    fn boxed_source_forwards_timers() {
        struct Timed(Timer);
        impl FrameSource for Timed {
            fn read(&mut self) -> anyhow::Result<RgbImage> {
                let _guard = self.0.start();
                Ok(RgbImage::new(1, 1))
            }

            fn timers(&self) -> Vec<&Timer> {
                vec![&self.0]
            }
        }

        let mut source: Box<dyn FrameSource> = Box::new(Timed(Timer::new("grab")));
        source.read().unwrap();
        let timers = source.timers();
        assert_eq!(timers.len(), 1);
        assert!(timers[0].to_string().starts_with("grab: 1x"));
    }
}
