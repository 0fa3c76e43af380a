#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AccumulationConfig {
    pub max_samples: u32,
    pub initial_samples_per_frame: u32,
}

impl Default for AccumulationConfig {
    fn default() -> Self {
        Self {
            max_samples: 200_000,
            initial_samples_per_frame: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulationState {
    Accumulating,
    Converged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    Pan,
    Zoom,
    ResetKey,
    SceneEdit,
    SceneLoad,
}

/// Samples to dispatch this frame and the weight the batch mean is blended with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleBatch {
    pub first_sample_index: u32,
    pub sample_count: u32,
    pub blend_alpha: f32,
}

/// Tracks how many samples the accumulation buffer currently averages.
///
/// `sample_index` only grows through [`AccumulationController::commit`] and only returns to
/// zero through [`AccumulationController::reset`].
#[derive(Debug, Clone)]
pub struct AccumulationController {
    config: AccumulationConfig,
    sample_index: u32,
    samples_per_frame: u32,
    last_reset: Option<ResetReason>,
}

impl AccumulationController {
    pub fn new(config: AccumulationConfig) -> Self {
        if config.max_samples == 0 {
            panic!("invalid accumulation config: max_samples must be positive");
        }
        if config.initial_samples_per_frame == 0 {
            panic!("invalid accumulation config: initial_samples_per_frame must be positive");
        }
        Self {
            config,
            sample_index: 0,
            samples_per_frame: config.initial_samples_per_frame,
            last_reset: None,
        }
    }

    pub fn config(&self) -> AccumulationConfig {
        self.config
    }

    pub fn sample_index(&self) -> u32 {
        self.sample_index
    }

    pub fn samples_per_frame(&self) -> u32 {
        self.samples_per_frame
    }

    pub fn last_reset(&self) -> Option<ResetReason> {
        self.last_reset
    }

    pub fn set_samples_per_frame(&mut self, samples_per_frame: u32) {
        self.samples_per_frame = samples_per_frame.max(1);
    }

    pub fn state(&self) -> AccumulationState {
        if self.sample_index >= self.config.max_samples {
            AccumulationState::Converged
        } else {
            AccumulationState::Accumulating
        }
    }

    pub fn is_converged(&self) -> bool {
        self.state() == AccumulationState::Converged
    }

    /// Abandons the current accumulation. The next batch overwrites the buffer.
    pub fn reset(&mut self, reason: ResetReason) {
        log::debug!(
            "[accumulation] reset after {} samples: {:?}",
            self.sample_index,
            reason
        );
        self.sample_index = 0;
        self.last_reset = Some(reason);
    }

    pub fn plan_frame(&self) -> Option<SampleBatch> {
        let remaining = self.config.max_samples.checked_sub(self.sample_index)?;
        if remaining == 0 {
            return None;
        }
        let sample_count = self.samples_per_frame.min(remaining);
        let total = u64::from(self.sample_index) + u64::from(sample_count);
        Some(SampleBatch {
            first_sample_index: self.sample_index,
            sample_count,
            blend_alpha: (f64::from(sample_count) / total as f64) as f32,
        })
    }

    pub fn commit(&mut self, batch: SampleBatch) {
        if batch.first_sample_index != self.sample_index {
            panic!(
                "sample batch planned at index {} committed at index {}",
                batch.first_sample_index, self.sample_index
            );
        }
        let remaining = self.config.max_samples - self.sample_index;
        if batch.sample_count == 0 || batch.sample_count > remaining {
            panic!(
                "sample batch of {} samples does not fit the {} remaining samples",
                batch.sample_count, remaining
            );
        }
        self.sample_index += batch.sample_count;
        if self.is_converged() {
            log::info!(
                "[accumulation] converged at {} samples",
                self.sample_index
            );
        }
    }
}

impl Default for AccumulationController {
    fn default() -> Self {
        Self::new(AccumulationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(max_samples: u32, samples_per_frame: u32) -> AccumulationController {
        AccumulationController::new(AccumulationConfig {
            max_samples,
            initial_samples_per_frame: samples_per_frame,
        })
    }

    fn run_frame(controller: &mut AccumulationController) -> Option<SampleBatch> {
        let batch = controller.plan_frame()?;
        controller.commit(batch);
        Some(batch)
    }

    #[test]
    fn plans_full_batches_until_final_clamped_batch() {
        let mut controller = controller(10, 4);

        let first = run_frame(&mut controller).expect("first batch");
        assert_eq!(first.first_sample_index, 0);
        assert_eq!(first.sample_count, 4);
        assert_eq!(first.blend_alpha, 1.0);

        let second = run_frame(&mut controller).expect("second batch");
        assert_eq!(second.first_sample_index, 4);
        assert_eq!(second.blend_alpha, 0.5);

        let last = run_frame(&mut controller).expect("final batch");
        assert_eq!(last.sample_count, 2);
        assert_eq!(controller.sample_index(), 10);
        assert!(controller.is_converged());
        assert_eq!(controller.plan_frame(), None);
    }

    #[test]
    fn incremental_blend_matches_arithmetic_mean() {
        let mut controller = controller(23, 5);
        let mut accumulated = 0.0_f64;
        let mut all_samples = Vec::new();

        while let Some(batch) = controller.plan_frame() {
            let samples: Vec<f64> = (batch.first_sample_index
                ..batch.first_sample_index + batch.sample_count)
                .map(|index| f64::from(index * 7 % 11) * 0.25)
                .collect();
            let batch_mean = samples.iter().sum::<f64>() / samples.len() as f64;
            let alpha = f64::from(batch.blend_alpha);
            accumulated = alpha * batch_mean + (1.0 - alpha) * accumulated;
            all_samples.extend(samples);
            controller.commit(batch);
        }

        let exact = all_samples.iter().sum::<f64>() / all_samples.len() as f64;
        assert_eq!(all_samples.len(), 23);
        assert!((accumulated - exact).abs() < 1e-5);
    }

    #[test]
    fn equal_batches_use_reciprocal_batch_count() {
        let mut controller = controller(100, 4);
        for batch_number in 1..=5 {
            let batch = run_frame(&mut controller).expect("batch");
            let expected = 1.0 / batch_number as f32;
            assert!((batch.blend_alpha - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn sample_index_is_monotonic_between_resets_and_zero_after() {
        let mut controller = controller(50, 3);
        let reasons = [
            ResetReason::Pan,
            ResetReason::Zoom,
            ResetReason::ResetKey,
            ResetReason::SceneEdit,
            ResetReason::SceneLoad,
        ];

        for (round, reason) in reasons.into_iter().enumerate() {
            let mut previous = controller.sample_index();
            for _ in 0..(round * 7 + 2) {
                run_frame(&mut controller);
                assert!(controller.sample_index() >= previous);
                assert!(controller.sample_index() <= 50);
                previous = controller.sample_index();
            }
            controller.reset(reason);
            assert_eq!(controller.sample_index(), 0);
            assert_eq!(controller.state(), AccumulationState::Accumulating);
            assert_eq!(controller.last_reset(), Some(reason));
        }
    }

    #[test]
    fn reset_leaves_converged_state() {
        let mut controller = controller(2, 8);
        run_frame(&mut controller).expect("single batch");
        assert!(controller.is_converged());

        controller.reset(ResetReason::ResetKey);
        let batch = controller.plan_frame().expect("accumulating again");
        assert_eq!(batch.first_sample_index, 0);
        assert_eq!(batch.sample_count, 2);
    }

    #[test]
    fn samples_per_frame_never_drops_below_one() {
        let mut controller = AccumulationController::default();
        controller.set_samples_per_frame(0);
        assert_eq!(controller.samples_per_frame(), 1);
    }

    #[test]
    #[should_panic(expected = "committed at index")]
    fn commit_rejects_stale_batch() {
        let mut controller = controller(10, 2);
        let batch = controller.plan_frame().expect("batch");
        controller.commit(batch);
        controller.commit(batch);
    }
}
