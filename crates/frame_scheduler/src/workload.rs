use std::cmp::Ordering;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub target_compute: Duration,
    pub max_samples_per_frame: u32,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            target_compute: Duration::from_millis(14),
            max_samples_per_frame: 4096,
        }
    }
}

/// Compute time of one finished dispatch and the number of samples it traced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasuredDispatch {
    pub sample_count: u32,
    pub elapsed: Duration,
}

/// Chooses how many samples the next frame dispatches. Timings arrive at least one frame
/// late, so `measured` describes an earlier dispatch than the one using `current`, and it
/// may be missing.
pub trait WorkloadEstimator {
    fn next_samples_per_frame(&mut self, current: u32, measured: Option<MeasuredDispatch>) -> u32;

    fn is_adaptive(&self) -> bool;
}

/// Proportional controller assuming compute time scales linearly with the sample count.
#[derive(Debug, Clone)]
pub struct ProportionalWorkload {
    config: WorkloadConfig,
}

impl ProportionalWorkload {
    pub fn new(config: WorkloadConfig) -> Self {
        if config.target_compute.is_zero() {
            panic!("invalid workload config: target_compute must be positive");
        }
        if config.max_samples_per_frame == 0 {
            panic!("invalid workload config: max_samples_per_frame must be positive");
        }
        Self { config }
    }

    pub fn config(&self) -> WorkloadConfig {
        self.config
    }
}

impl WorkloadEstimator for ProportionalWorkload {
    /// Scales the sample count of the measured dispatch. `current` is returned unchanged
    /// when there is nothing to measure.
    fn next_samples_per_frame(
        &mut self,
        current: u32,
        measured: Option<MeasuredDispatch>,
    ) -> u32 {
        let Some(measured) = measured.filter(|measured| !measured.elapsed.is_zero()) else {
            return current;
        };
        let measured_count = measured.sample_count.max(1);
        let elapsed = measured.elapsed;
        let ratio = self.config.target_compute.as_secs_f64() / elapsed.as_secs_f64();
        if !ratio.is_finite() {
            return current;
        }

        let proposed = (f64::from(measured_count) * ratio).round();
        let proposed = if proposed >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            (proposed as u32).max(1)
        };
        let next = match elapsed.cmp(&self.config.target_compute) {
            Ordering::Less => proposed.max(measured_count.saturating_add(1)),
            Ordering::Greater => proposed.min(measured_count - 1).max(1),
            Ordering::Equal => measured_count,
        };
        let next = next.min(self.config.max_samples_per_frame);

        if next != current {
            log::debug!(
                "[workload] {current} -> {next} samples per frame ({} samples took {:.3} ms)",
                measured_count,
                elapsed.as_secs_f64() * 1000.0
            );
        }
        next
    }

    fn is_adaptive(&self) -> bool {
        true
    }
}

/// Fallback when compute timings cannot be trusted; pacing is left to vsync.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedWorkload {
    samples_per_frame: Option<u32>,
}

impl FixedWorkload {
    pub fn new(samples_per_frame: u32) -> Self {
        Self {
            samples_per_frame: Some(samples_per_frame.max(1)),
        }
    }

    /// Keeps whatever sample count is current.
    pub fn keep_current() -> Self {
        Self::default()
    }
}

impl WorkloadEstimator for FixedWorkload {
    fn next_samples_per_frame(
        &mut self,
        current: u32,
        _measured: Option<MeasuredDispatch>,
    ) -> u32 {
        self.samples_per_frame.unwrap_or(current.max(1))
    }

    fn is_adaptive(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSupport {
    Reliable,
    Unreliable,
}

impl TimestampSupport {
    /// Mesa's Intel drivers report compute timestamps that do not track the dispatch.
    pub fn for_renderer(renderer_name: &str) -> Self {
        if renderer_name.contains("Mesa") && renderer_name.contains("Intel") {
            Self::Unreliable
        } else {
            Self::Reliable
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadMode {
    #[default]
    Auto,
    Adaptive,
    Fixed,
}

pub fn estimator_for(
    mode: WorkloadMode,
    renderer_name: &str,
    config: WorkloadConfig,
) -> Box<dyn WorkloadEstimator> {
    let adaptive = match mode {
        WorkloadMode::Adaptive => true,
        WorkloadMode::Fixed => false,
        WorkloadMode::Auto => {
            TimestampSupport::for_renderer(renderer_name) == TimestampSupport::Reliable
        }
    };
    if adaptive {
        log::info!(
            "[workload] adaptive sample count targeting {:.1} ms per frame on '{renderer_name}'",
            config.target_compute.as_secs_f64() * 1000.0
        );
        Box::new(ProportionalWorkload::new(config))
    } else {
        log::info!("[workload] fixed sample count on '{renderer_name}' ({mode:?})");
        Box::new(FixedWorkload::keep_current())
    }
}
