//! Performance measurement tools.

use std::{
    cell::Cell,
    fmt,
    time::{Duration, Instant},
};

use itertools::Itertools;

/// Measures how long an operation takes, on average and at worst.
///
/// Displaying the timer with `{}` ([`std::fmt::Display`]) prints the statistics collected since
/// the last time it was displayed, and starts a new measurement period.
pub struct Timer {
    name: &'static str,
    count: Cell<u32>,
    total: Cell<Duration>,
    worst: Cell<Duration>,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            count: Cell::new(0),
            total: Cell::new(Duration::ZERO),
            worst: Cell::new(Duration::ZERO),
        }
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&mut self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation. The measurement ends when the returned guard is dropped.
    pub fn start(&mut self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn record(&mut self, duration: Duration) {
        *self.count.get_mut() += 1;
        *self.total.get_mut() += duration;
        let worst = self.worst.get_mut();
        *worst = (*worst).max(duration);
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.count.take();
        let total = self.total.take();
        let worst = self.worst.take();
        if count == 0 {
            return write!(f, "{}: -", self.name);
        }
        let avg_ms = total.as_secs_f32() * 1000.0 / count as f32;
        let worst_ms = worst.as_secs_f32() * 1000.0;
        write!(
            f,
            "{}: {count}x{avg_ms:.01}ms (max {worst_ms:.01}ms)",
            self.name
        )
    }
}

/// Guard returned by [`Timer::start`].
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a mut Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

/// Counts frames and logs the frame rate about once per second.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Counts one frame. When the rate is logged, `extra` is appended to the message.
    ///
    /// `extra` is only formatted when a message is logged, so passing [`Timer`]s here resets them
    /// once per second.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        self.frames += 1;
        let elapsed = self.start.elapsed();
        if elapsed < Duration::from_secs(1) {
            return;
        }

        let fps = self.frames as f32 / elapsed.as_secs_f32();
        let extra = extra.into_iter().join(", ");
        if extra.is_empty() {
            log::debug!("{}: {fps:.1} FPS", self.name);
        } else {
            log::debug!("{}: {fps:.1} FPS ({extra})", self.name);
        }
        self.frames = 0;
        self.start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_resets() {
        let mut timer = Timer::new("work");
        assert_eq!(timer.to_string(), "work: -");
        timer.time(|| std::thread::sleep(Duration::from_millis(2)));
        timer.time(|| {});
        let stats = timer.to_string();
        assert!(stats.starts_with("work: 2x"), "{stats}");
        assert_eq!(timer.to_string(), "work: -");
    }

    #[test]
    fn guard_records_on_drop() {
        let mut timer = Timer::new("guarded");
        {
            let _guard = timer.start();
        }
        assert!(timer.to_string().starts_with("guarded: 1x"));
    }
}
