use std::time::Instant;

/// Rolling frame rate, recomputed once per window of ticks from wall-clock time.
#[derive(Debug, Clone)]
pub struct FrameRateEstimator {
    window: u32,
    ticks: u32,
    window_start: Option<Instant>,
    fps: f32,
}

impl Default for FrameRateEstimator {
    fn default() -> Self {
        Self::new(30)
    }
}

impl FrameRateEstimator {
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            ticks: 0,
            window_start: None,
            fps: 0.0,
        }
    }

    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// Count a tick at `now`; the estimate only changes when a window closes.
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return self.fps;
        };
        self.ticks += 1;
        if self.ticks >= self.window {
            let secs = now.saturating_duration_since(start).as_secs_f32();
            if secs > 0.0 {
                self.fps = self.ticks as f32 / secs;
            }
            self.ticks = 0;
            self.window_start = Some(now);
        }
        self.fps
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.window);
    }
}
