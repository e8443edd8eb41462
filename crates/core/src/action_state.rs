use bevy::reflect::Reflect;

#[cfg(any(feature = "actionset_loader"))]
use serde::{Deserialize, Serialize};

use crate::action_runtime::PlanStatus;

/// Where an agent's current action is in its lifecycle.
///
/// This is a state machine, more or less, with three layers:
/// 1) Initial (Idle)
/// 2) Progressed (Compiling, Running)
/// 3) Terminal (Succeeded, Failed, Interrupted)
///
/// Terminal states are reported once, as the outcome of the action that just ended;
/// the selector itself goes back to Idle right after.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Reflect)]
#[cfg_attr(any(feature = "actionset_loader"), derive(Serialize, Deserialize))]
pub enum ActionState {
    /// Initial state. Nothing selected; waiting for the next decision.
    Idle,

    /// Progressed state. Selected, the plan is being compiled.
    Compiling,
    /// Progressed state. The plan is being advanced every tick.
    Running,

    /// Terminal state. Every Operator in the plan succeeded.
    Succeeded,
    /// Terminal state. Some Operator failed (or the plan was empty); the rest was dropped.
    Failed,
    /// Terminal state.
    /// Cancelled from the outside (a better action, a shutdown), NOT because anything went wrong.
    Interrupted,
}

impl Default for ActionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl ActionState {
    pub fn is_initial(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_progressed(&self) -> bool {
        matches!(self, Self::Compiling | Self::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Interrupted)
    }

    /// If false, there is no plan to advance this tick.
    pub fn should_process(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl From<PlanStatus> for ActionState {
    fn from(value: PlanStatus) -> Self {
        match value {
            PlanStatus::Running => Self::Running,
            PlanStatus::Succeeded => Self::Succeeded,
            PlanStatus::Failed => Self::Failed,
            PlanStatus::Cancelled => Self::Interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layers_do_not_overlap() {
        let all = [
            ActionState::Idle,
            ActionState::Compiling,
            ActionState::Running,
            ActionState::Succeeded,
            ActionState::Failed,
            ActionState::Interrupted,
        ];

        for state in all {
            let layers = [state.is_initial(), state.is_progressed(), state.is_terminal()];
            assert_eq!(layers.iter().filter(|hit| **hit).count(), 1, "{:?}", state);
        }

        assert_eq!(ActionState::from(PlanStatus::Cancelled), ActionState::Interrupted);
    }
}
