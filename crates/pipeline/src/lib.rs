//! Job execution layer for the DataGen analysis backend.
//!
//! - [`JobRegistry`]: in-memory source of truth for job records; every
//!   mutation is serialized per job and published through the
//!   [`NotificationHub`](datagen_events::NotificationHub).
//! - [`AnalysisEngine`]: the seam to the analysis collaborator, which reports
//!   through a [`ProgressReporter`].
//! - A per-run supervisor owns the engine task and turns its result (or
//!   failure) into exactly one terminal update.
//! - [`SimulatedEngine`]: canned stand-in engine used by the server binary.

pub mod engine;
pub mod registry;
pub mod simulated;
mod supervisor;

pub use engine::{AnalysisEngine, AnalysisRequest, ProgressReporter};
pub use registry::{CancelOutcome, JobRegistry};
pub use simulated::SimulatedEngine;
pub use supervisor::RunOutcome;
