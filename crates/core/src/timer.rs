//! Frame timing and fixed-rate simulation ticks.

use std::time::{Duration, Instant};

use tracing::info;

/// High-resolution timer for measuring elapsed time.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Get the total elapsed time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get the elapsed time in seconds since the timer was created.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Get the time elapsed since the last call to `tick()`.
    /// This is useful for calculating delta time in a game loop.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }

    /// Get the delta time in seconds since the last tick.
    pub fn delta_secs(&mut self) -> f32 {
        self.tick().as_secs_f32()
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-cadence tick source driving the simulation step rate.
///
/// Call [`TickTimer::new_frame`] once per rendered frame with the frame
/// delta; [`TickTimer::ticked`] reports whether a simulation step is due
/// this frame. Also keeps a once-per-second FPS log.
#[derive(Debug)]
pub struct TickTimer {
    tick_period: f32,
    tick_accum: f32,
    ticked: bool,
    fps_accum: f32,
    fps_frames: u32,
}

impl TickTimer {
    /// Create a tick timer firing `ticks_per_sec` times per second.
    pub fn new(ticks_per_sec: f32) -> Self {
        Self {
            tick_period: 1.0 / ticks_per_sec,
            tick_accum: 0.0,
            ticked: false,
            fps_accum: 0.0,
            fps_frames: 0,
        }
    }

    /// Advance by one frame's delta time.
    pub fn new_frame(&mut self, delta_secs: f32) {
        self.tick_accum += delta_secs;
        self.ticked = self.tick_accum > self.tick_period;
        if self.ticked {
            self.tick_accum = 0.0;
        }

        self.fps_accum += delta_secs;
        self.fps_frames += 1;
        if self.fps_accum >= 1.0 {
            info!("FPS: {}", self.fps_frames);
            self.fps_accum = 0.0;
            self.fps_frames = 0;
        }
    }

    /// Whether a simulation tick is due on the current frame.
    pub fn ticked(&self) -> bool {
        self.ticked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_fires_after_period() {
        let mut timer = TickTimer::new(10.0);
        timer.new_frame(0.05);
        assert!(!timer.ticked());
        timer.new_frame(0.06);
        assert!(timer.ticked());
    }

    #[test]
    fn test_tick_accumulator_resets() {
        let mut timer = TickTimer::new(10.0);
        timer.new_frame(0.2);
        assert!(timer.ticked());
        timer.new_frame(0.05);
        assert!(!timer.ticked());
    }
}
