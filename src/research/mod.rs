//! Research orchestration: plan, execute, report.

pub mod events;
mod pipeline;
pub mod prompts;

pub use events::{CHECKPOINTS, ProgressEvent};
pub use pipeline::{PipelineError, ResearchOutcome, ResearchPipeline};
