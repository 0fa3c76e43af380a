use std::time::{Duration, Instant};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputReport {
    pub frames_per_second: f64,
    pub samples_per_frame: u32,
    pub samples_per_second: f64,
    pub sample_index: u32,
}

/// Frame and sample rates averaged over windows of at least one second.
#[derive(Debug, Clone, Default)]
pub struct ThroughputMeter {
    window_start: Option<Instant>,
    frames: u32,
    samples: u64,
}

impl ThroughputMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(
        &mut self,
        now: Instant,
        samples_this_frame: u32,
        samples_per_frame: u32,
        sample_index: u32,
    ) -> Option<ThroughputReport> {
        let window_start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        self.samples += u64::from(samples_this_frame);

        let elapsed = now.saturating_duration_since(window_start);
        if elapsed < REPORT_INTERVAL {
            return None;
        }

        let seconds = elapsed.as_secs_f64();
        let report = ThroughputReport {
            frames_per_second: f64::from(self.frames) / seconds,
            samples_per_frame,
            samples_per_second: self.samples as f64 / seconds,
            sample_index,
        };
        self.window_start = Some(now);
        self.frames = 0;
        self.samples = 0;
        Some(report)
    }
}
