//! Event-rate profiling for the producer/consumer pipeline.

use std::time::Instant;

use log::debug;

/// Counts ticks and reports the average rate since the first one.
#[derive(Debug)]
pub struct FpsProfiler {
    title: &'static str,
    log_ticks: bool,
    start: Option<Instant>,
    last: Option<Instant>,
    ticks: u64,
    fps: f64,
}

impl FpsProfiler {
    pub fn new(title: &'static str, log_ticks: bool) -> Self {
        Self {
            title,
            log_ticks,
            start: None,
            last: None,
            ticks: 0,
            fps: 0.0,
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn tick_at(&mut self, now: Instant) {
        match (self.start, self.last) {
            (Some(start), Some(last)) => {
                self.ticks += 1;
                let since_start = now.duration_since(start).as_secs_f64();
                let since_last = now.duration_since(last).as_secs_f64();
                if since_start > 0.0 {
                    self.fps = self.ticks as f64 / since_start;
                }
                if self.log_ticks {
                    debug!(
                        "[{}] {} events / {:.3} s, fps: {:.2}, since last: {:.4} s",
                        self.title, self.ticks, since_start, self.fps, since_last
                    );
                }
            }
            _ => self.start = Some(now),
        }
        self.last = Some(now);
    }

    /// Average rate since the first tick, in events per second.
    pub fn fps(&self) -> f64 {
        self.fps
    }
}
