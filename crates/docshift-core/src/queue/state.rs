//! Job state machine for the queue.

use serde::{Deserialize, Serialize};

/// Job state.
///
/// State transitions:
/// - Pending -> Running -> Succeeded
/// - Pending -> Running -> Failed
/// - Pending -> Revoked (queue closed before any worker picked the job up)
///
/// There is no retry edge: a failed job stays failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Waiting for a worker.
    Pending,

    /// Currently being executed by a worker.
    Running,

    /// Converted and published.
    Succeeded,

    /// Failed permanently.
    Failed,

    /// Dropped without ever running.
    Revoked,
}

impl JobState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::Revoked)
    }

    /// Is this job eligible for lease?
    pub fn is_runnable(self) -> bool {
        matches!(self, JobState::Pending)
    }

    /// Name used in persisted result records.
    pub fn as_wire_str(self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Running => "STARTED",
            JobState::Succeeded => "SUCCESS",
            JobState::Failed => "FAILURE",
            JobState::Revoked => "REVOKED",
        }
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Pending, JobState::Revoked)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(JobState::Pending, false)]
    #[case(JobState::Running, false)]
    #[case(JobState::Succeeded, true)]
    #[case(JobState::Failed, true)]
    #[case(JobState::Revoked, true)]
    fn terminal_states(#[case] state: JobState, #[case] terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let all = [
            JobState::Pending,
            JobState::Running,
            JobState::Succeeded,
            JobState::Failed,
            JobState::Revoked,
        ];
        for from in all.iter().copied().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn running_cannot_go_back_to_pending() {
        assert!(!JobState::Running.can_transition_to(JobState::Pending));
        assert!(!JobState::Running.can_transition_to(JobState::Revoked));
    }
}
