//! Per-frame scheduling of progressive sample accumulation.

mod accumulation;
mod throughput;
mod workload;

pub use accumulation::{
    AccumulationConfig, AccumulationController, AccumulationState, ResetReason, SampleBatch,
};
pub use throughput::{ThroughputMeter, ThroughputReport};
pub use workload::{
    FixedWorkload, MeasuredDispatch, ProportionalWorkload, TimestampSupport, WorkloadConfig,
    WorkloadEstimator, WorkloadMode, estimator_for,
};
