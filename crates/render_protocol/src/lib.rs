//! Contract between the frame loop and the backend that traces, accumulates and presents.

mod backend;
mod diagnostics;
mod layout;
mod resource;

pub use backend::{
    BackendInitError, ComputeTiming, DisplayImage, OverlayDraw, RenderBackend, RenderRequest,
};
pub use diagnostics::{
    BackendDiagnostic, DiagnosticKind, DiagnosticSeverity, log_backend_diagnostic,
};
pub use layout::{
    ArcGpu, CapacityError, CircleGpu, LineGpu, MaterialGpu, SceneCapacity, ScenePayload,
    UniformLimits,
};
pub use resource::{ResourceGuard, acquire};
