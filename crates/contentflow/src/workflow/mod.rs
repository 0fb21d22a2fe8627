//! The generation pipeline: executor, controller, regeneration and the
//! engine facade on top of them.

pub mod context;
pub mod controller;
pub mod engine;
pub mod executor;
pub mod progress;
pub mod prompt;
pub mod regeneration;
pub mod result;

pub use context::{StepOutputs, WorkflowContext, WorkflowOptions};
pub use controller::JobController;
pub use engine::ContentEngine;
pub use executor::{StepExecutor, StepRequest};
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use regeneration::RegenerationCoordinator;
pub use result::{StepResult, WorkflowResult};
