//! Phases of a write transaction.

use serde::Serialize;
use strum::Display;

/// Where a write transaction currently stands.
///
/// Transactions start in [`MutationState::Idle`] and always finish in
/// [`MutationState::Committed`] or [`MutationState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MutationState {
    /// Lock not yet taken.
    #[default]
    Idle,
    /// Reading the file and planning the new content.
    Validating,
    /// Capturing the snapshot that rollback restores.
    BackingUp,
    /// Replacing the file.
    Writing,
    /// The new content is in place, or nothing needed to change.
    Committed,
    /// Undoing a failed backup or write.
    RollingBack,
    /// The transaction ended without committing.
    Failed,
}

/// Result of the work done in one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The phase completed.
    Succeeded,
    /// Validation found the file already holds the requested content.
    Unchanged,
    /// The phase failed.
    Failed,
}

impl MutationState {
    /// State entered after `step` completes in this state.
    #[must_use]
    pub const fn next(self, step: Step) -> Self {
        match (self, step) {
            (Self::Idle | Self::Validating, Step::Failed) => Self::Failed,
            (Self::Idle, _) => Self::Validating,
            (Self::Validating, Step::Succeeded) => Self::BackingUp,
            (Self::Validating, Step::Unchanged) | (Self::Writing, Step::Succeeded | Step::Unchanged) => {
                Self::Committed
            }
            (Self::BackingUp, Step::Succeeded | Step::Unchanged) => Self::Writing,
            (Self::BackingUp | Self::Writing, Step::Failed) => Self::RollingBack,
            (Self::RollingBack, _) => Self::Failed,
            (Self::Committed, _) => Self::Committed,
            (Self::Failed, _) => Self::Failed,
        }
    }

    /// True for [`MutationState::Committed`] and [`MutationState::Failed`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(MutationState::Idle, Step::Succeeded, MutationState::Validating)]
    #[case(MutationState::Validating, Step::Succeeded, MutationState::BackingUp)]
    #[case(MutationState::Validating, Step::Unchanged, MutationState::Committed)]
    #[case(MutationState::Validating, Step::Failed, MutationState::Failed)]
    #[case(MutationState::BackingUp, Step::Succeeded, MutationState::Writing)]
    #[case(MutationState::BackingUp, Step::Failed, MutationState::RollingBack)]
    #[case(MutationState::Writing, Step::Succeeded, MutationState::Committed)]
    #[case(MutationState::Writing, Step::Failed, MutationState::RollingBack)]
    #[case(MutationState::RollingBack, Step::Succeeded, MutationState::Failed)]
    #[case(MutationState::RollingBack, Step::Failed, MutationState::Failed)]
    fn transitions(#[case] from: MutationState, #[case] step: Step, #[case] to: MutationState) {
        assert_eq!(from.next(step), to);
    }

    #[rstest]
    #[case(MutationState::Committed)]
    #[case(MutationState::Failed)]
    fn terminal_states_absorb_every_step(#[case] state: MutationState) {
        assert!(state.is_terminal());
        for step in [Step::Succeeded, Step::Unchanged, Step::Failed] {
            assert_eq!(state.next(step), state);
        }
    }

    #[test]
    fn displays_in_snake_case() {
        assert_eq!(MutationState::RollingBack.to_string(), "rolling_back");
    }
}
