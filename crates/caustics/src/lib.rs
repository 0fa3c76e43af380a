//! Interactive progressive renderer for 2D caustics.
//!
//! A [`Session`] turns per-frame input into view changes and scene actions, schedules sample
//! accumulation, and drives any [`render_protocol::RenderBackend`]. The crate ships a CPU
//! reference backend used by the command line driver and the tests.

pub mod config;
pub mod cpu_backend;
pub mod input;
pub mod interaction;
pub mod screenshot;
pub mod session;

pub use config::{ConfigError, SessionConfig};
pub use cpu_backend::{CpuBackend, CpuDevice};
pub use input::{ActionKeys, InputFrame};
pub use interaction::{DragState, Interaction, InteractionController};
pub use screenshot::{ScreenshotError, write_png};
pub use session::{
    FrameReport, SceneEdit, SceneLoadOutcome, Session, SessionError, SessionInitError,
};
