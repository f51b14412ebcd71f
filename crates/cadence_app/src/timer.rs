//! Fixed-rate frame pacing
//!
//! Converts real elapsed time into a whole number of logical frames.

use std::time::{Duration, Instant};

use crate::config::TimingConfig;

/// Accumulates elapsed time and reports how many fixed-length frames are due
#[derive(Clone, Debug)]
pub struct FixedRateTimer {
    frame_duration: Duration,
    min_frames: u32,
    max_frames: u32,
    accumulated: Duration,
    last_tick: Option<Instant>,
    frame_count: u64,
}

impl FixedRateTimer {
    pub fn new(fps: u32, min_frames: u32, max_frames: u32) -> Self {
        let mut timer = Self {
            frame_duration: Duration::ZERO,
            min_frames: 0,
            max_frames: 0,
            accumulated: Duration::ZERO,
            last_tick: None,
            frame_count: 0,
        };
        timer.set_fps(fps, min_frames, max_frames, true);
        timer
    }

    pub fn from_config(timing: &TimingConfig) -> Self {
        Self::new(timing.fps, timing.min_frames, timing.max_frames)
    }

    /// Change the frame rate and clamping bounds
    pub fn set_fps(&mut self, fps: u32, min_frames: u32, max_frames: u32, reset: bool) {
        self.frame_duration = Duration::from_nanos(1_000_000_000 / u64::from(fps.max(1)));
        self.max_frames = max_frames.max(1);
        self.min_frames = min_frames.min(self.max_frames);
        if reset {
            self.reset();
        }
    }

    /// Forget accumulated time; the next `frames_due` starts a fresh interval
    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.last_tick = None;
    }

    /// Frames due since the previous call, measured on the wall clock
    pub fn frames_due(&mut self) -> u32 {
        let now = Instant::now();
        let elapsed = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::ZERO);
        self.last_tick = Some(now);
        self.advance(elapsed)
    }

    /// Frames due after `elapsed` more time has passed
    ///
    /// When any frame is due the count is clamped to `[min_frames, max_frames]`.
    /// A backlog beyond `max_frames` is dropped rather than carried over.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.accumulated += elapsed;
        let due = self.accumulated.as_nanos() / self.frame_duration.as_nanos().max(1);
        if due == 0 {
            return 0;
        }

        let max = self.max_frames;
        let frames = if due > u128::from(max) {
            tracing::debug!(due = due as u64, max, "dropping frame backlog");
            self.accumulated = Duration::ZERO;
            max
        } else {
            let frames = (due as u32).max(self.min_frames);
            self.accumulated = self
                .accumulated
                .saturating_sub(self.frame_duration * frames);
            frames
        };

        self.frame_count += u64::from(frames);
        frames
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// Total frames reported since creation
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for FixedRateTimer {
    fn default() -> Self {
        Self::from_config(&TimingConfig::default())
    }
}
