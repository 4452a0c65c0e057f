//! Events emitted by a streaming research run.
//!
//! Each event serializes to one JSON object tagged by `type`; the HTTP layer sends one event per
//! server-sent-event frame.

use crate::agent::AgentRole;
use serde::Serialize;

/// Fixed progress checkpoints: percentage and label, indexed by `step_index`.
pub const CHECKPOINTS: [(u8, &str); 5] = [
    (10, "Analyzing uploaded document..."),
    (30, "Creating execution plan..."),
    (50, "Searching document content..."),
    (70, "Gathering web information..."),
    (85, "Synthesizing comprehensive report..."),
];

/// One event of the streaming protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Coarse progress notification.
    Progress {
        /// Completion percentage.
        progress: u8,
        /// Human-readable label.
        step: String,
        /// Position of the checkpoint in [`CHECKPOINTS`].
        step_index: usize,
    },
    /// Text fragment produced by the planner or executor.
    AgentContent {
        /// Fragment text.
        content: String,
        /// Stage that produced the fragment.
        agent: AgentRole,
    },
    /// Text fragment of the final report.
    ReportDelta {
        /// Fragment text.
        content: String,
    },
    /// Successful end of the run.
    Complete {
        /// Always 100.
        progress: u8,
        /// Full report text.
        report: String,
    },
    /// Failed end of the run.
    Error {
        /// Description of the failure.
        message: String,
    },
}

impl ProgressEvent {
    /// Progress event for checkpoint `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index` is outside [`CHECKPOINTS`].
    pub fn checkpoint(index: usize) -> Self {
        let (progress, step) = CHECKPOINTS[index];
        Self::Progress {
            progress,
            step: step.to_string(),
            step_index: index,
        }
    }

    /// Successful terminal event.
    pub fn complete(report: String) -> Self {
        Self::Complete {
            progress: 100,
            report,
        }
    }

    /// Whether the event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}
