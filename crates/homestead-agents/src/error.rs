//! Error types for the homestead-agents crate.
//!
//! Worker transitions never fail; only job board bookkeeping does. The
//! scheduler actor treats every variant here as a value to log or return,
//! never as a reason to stop.

use homestead_types::JobId;

/// Errors that can occur during job board operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// No active job with this ID is assigned to the reporting worker.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// Idle workers were offered but the queue is empty.
    #[error("no jobs available")]
    NoJobsAvailable,

    /// An arithmetic overflow occurred while updating counters.
    #[error("arithmetic overflow: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: &'static str,
    },
}
