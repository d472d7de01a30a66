//! V4L2 webcam access.
//!
//! Only `VIDEO_CAPTURE` devices that can deliver JFIF JPEG or Motion JPEG frames are supported.

use std::{cmp::Reverse, env};

use anyhow::{bail, Context};
use image::{ImageFormat, RgbImage};
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::resolution::Resolution;
use crate::timer::Timer;
use crate::video::FrameSource;

/// Environment variable that selects the webcam by name when [`WebcamOptions::name`] is not used.
pub const ENV_VAR_WEBCAM_NAME: &str = "AIRGLYPH_WEBCAM_NAME";

/// Which parameter to keep when the camera cannot deliver both the desired resolution and frame
/// rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamPreference {
    #[default]
    Resolution,
    Framerate,
}

/// Device selection and format negotiation options.
#[derive(Debug, Clone, Default)]
pub struct WebcamOptions {
    name: Option<String>,
    resolution: Option<Resolution>,
    fps: Option<u32>,
    prefer: ParamPreference,
}

impl WebcamOptions {
    /// Only opens the device whose card name is `name`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the minimum desired resolution.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Sets the minimum desired frame rate.
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }

    /// Selects what to give up last when the desired format is not available, and what to maximize
    /// when it is.
    pub fn prefer(mut self, prefer: ParamPreference) -> Self {
        self.prefer = prefer;
        self
    }

    fn device_name(&self) -> Option<String> {
        self.name.clone().or_else(|| env::var(ENV_VAR_WEBCAM_NAME).ok())
    }
}

#[derive(Debug, Clone, Copy)]
struct FrameMode {
    resolution: Resolution,
    interval: Fract,
}

impl FrameMode {
    fn fps(&self) -> f32 {
        (1.0 / self.interval.as_f32()).round()
    }
}

/// Lists the frame modes the device offers for `pixel_format`.
fn frame_modes(device: &Device, pixel_format: Pixelformat) -> anyhow::Result<Vec<FrameMode>> {
    let FrameSizes::Discrete(sizes) = device.frame_sizes(pixel_format)? else {
        bail!("device reports non-discrete frame sizes");
    };

    let mut modes = Vec::new();
    for size in sizes {
        let FrameIntervals::Discrete(intervals) =
            device.frame_intervals(pixel_format, size.width(), size.height())?
        else {
            bail!("device reports non-discrete frame intervals");
        };
        modes.extend(intervals.into_iter().map(|interval| FrameMode {
            resolution: Resolution::new(size.width(), size.height()),
            interval: *interval.fract(),
        }));
    }
    Ok(modes)
}

/// Picks the best mode meeting the optional `resolution` and `fps` minimums.
fn pick_mode(
    modes: &[FrameMode],
    resolution: Option<Resolution>,
    fps: Option<u32>,
    prefer: ParamPreference,
) -> Option<FrameMode> {
    let eligible = modes.iter().copied().filter(|mode| {
        let res_ok = resolution.map_or(true, |res| {
            mode.resolution.width() >= res.width() && mode.resolution.height() >= res.height()
        });
        let fps_ok = fps.map_or(true, |fps| mode.fps() >= fps as f32);
        res_ok && fps_ok
    });
    match prefer {
        ParamPreference::Resolution => {
            eligible.max_by_key(|mode| (mode.resolution.num_pixels(), Reverse(mode.interval)))
        }
        ParamPreference::Framerate => {
            eligible.max_by_key(|mode| (Reverse(mode.interval), mode.resolution.num_pixels()))
        }
    }
}

/// Negotiates a JPEG capture format, dropping the less preferred requirement first if the device
/// cannot meet both.
fn negotiate(device: &Device, options: &WebcamOptions) -> anyhow::Result<(PixFormat, Fract)> {
    let pixel_format = device
        .formats(BufType::VIDEO_CAPTURE)
        .filter_map(Result::ok)
        .map(|format| format.pixelformat())
        .find(|&pf| pf == Pixelformat::JPEG || pf == Pixelformat::MJPG)
        .context("device does not support JPEG or MJPG")?;

    let modes = frame_modes(device, pixel_format)?;
    let (res, fps) = (options.resolution, options.fps);
    let attempts = match options.prefer {
        ParamPreference::Resolution => [(res, fps), (res, None), (None, None)],
        ParamPreference::Framerate => [(res, fps), (None, fps), (None, None)],
    };
    for (resolution, fps) in attempts {
        if let Some(mode) = pick_mode(&modes, resolution, fps, options.prefer) {
            log::debug!(
                "negotiated {} @ {}Hz (wanted {:?} @ {:?}Hz)",
                mode.resolution,
                mode.fps(),
                options.resolution,
                options.fps,
            );
            let format = PixFormat::new(
                mode.resolution.width(),
                mode.resolution.height(),
                pixel_format,
            );
            return Ok((format, mode.interval));
        }
    }

    bail!("device offers no usable frame modes")
}

/// A V4L2 webcam delivering [`RgbImage`] frames.
pub struct Webcam {
    stream: ReadStream,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first webcam matching `options`.
    ///
    /// This can block for a few hundred milliseconds while the camera initializes.
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        let name = options.device_name();
        if let Some(name) = &name {
            log::debug!("looking for webcam '{name}'");
        }

        for dev in linuxvideo::list()? {
            let dev = match dev {
                Ok(dev) => dev,
                Err(e) => {
                    log::warn!("cannot access video device: {e}");
                    continue;
                }
            };
            match Self::try_open(dev, name.as_deref(), &options) {
                Ok(Some(webcam)) => return Ok(webcam),
                Ok(None) => {}
                Err(e) => log::debug!("skipping device: {e:#}"),
            }
        }

        match name {
            Some(name) => bail!("no supported webcam named '{name}' found"),
            None => bail!("no supported webcam found"),
        }
    }

    fn try_open(
        dev: Device,
        name: Option<&str>,
        options: &WebcamOptions,
    ) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if name.map_or(false, |name| caps.card() != name) {
            return Ok(None);
        }
        if !caps
            .device_capabilities()
            .contains(CapabilityFlags::VIDEO_CAPTURE)
        {
            return Ok(None);
        }

        let path = dev.path()?;
        let (format, interval) = negotiate(&dev, options)
            .with_context(|| format!("{} ({})", caps.card(), path.display()))?;
        let capture = dev.video_capture(format)?;
        let actual = capture.format();
        let resolution = Resolution::new(actual.width(), actual.height());
        let interval = capture.set_frame_interval(interval)?;

        log::info!(
            "opened {} ({}), {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            1.0 / interval.as_f32(),
        );

        Ok(Some(Self {
            stream: capture.into_stream(2)?,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

}

impl FrameSource for Webcam {
    /// Waits for the next frame and decodes it.
    ///
    /// A frame that fails to decode is an error.
    fn read(&mut self) -> anyhow::Result<RgbImage> {
        let dequeue = self.t_dequeue.start();
        let t_decode = &mut self.t_decode;
        let decoded = self.stream.dequeue(|buf| {
            drop(dequeue);
            Ok(t_decode.time(|| image::load_from_memory_with_format(&buf, ImageFormat::Jpeg)))
        })?;
        let image = decoded.context("failed to decode webcam frame")?.into_rgb8();
        Ok(image)
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }
}
