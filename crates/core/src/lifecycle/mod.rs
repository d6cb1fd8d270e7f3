//! Harvest lifecycle: start, pause, resume and progress subscription.
//!
//! The presentation layer maps view visibility onto these calls: leaving the
//! catalog view pauses the run, coming back resumes it.

mod controller;
mod types;

pub use controller::DoramaController;
pub use types::{ControllerStatus, LifecycleError, LifecycleState, RunOutcome, RunSummary};
