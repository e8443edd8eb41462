//! What happened during a selector tick, for whoever embeds the engine to react to.
//!
//! The core does not know about any event bus; it hands these records back from
//! `ActionSelector::tick()`. The Bevy plugin turns them into proper `EntityEvent`s.
use bevy::reflect::Reflect;

use crate::action_runtime::PlanStatus;
use crate::action_state::ActionState;
use crate::types::{ActionKey, ActionScore};

#[derive(Debug, Clone, PartialEq, Reflect)]
pub enum ActionTransition {
    /// An action won a decision and its plan was compiled.
    Picked {
        action_key: ActionKey,
        action_score: ActionScore,
    },

    /// A running action was cancelled before it finished.
    /// `replaced_by` is None if nothing replaced it (e.g. a shutdown).
    Interrupted {
        action_key: ActionKey,
        replaced_by: Option<ActionKey>,
    },

    /// A plan ran to completion; the outcome is either Succeeded or Failed.
    Finished {
        action_key: ActionKey,
        outcome: ActionState,
    },

    /// A decision found nothing worth doing while nothing was running.
    BecameIdle,
}

#[derive(Debug, Clone, Default, PartialEq, Reflect)]
pub struct TickReport {
    /// Whether this tick ran a decision cycle.
    pub decided: bool,

    /// Status of the running plan after this tick's advance, if there was one.
    pub plan_status: Option<PlanStatus>,

    /// In the order they happened.
    pub transitions: Vec<ActionTransition>,
}

impl TickReport {
    pub fn is_quiet(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn picked(&self) -> Option<&ActionKey> {
        self.transitions.iter().find_map(|transition| match transition {
            ActionTransition::Picked { action_key, .. } => Some(action_key),
            _ => None,
        })
    }

    pub fn finished(&self) -> Option<(&ActionKey, ActionState)> {
        self.transitions.iter().find_map(|transition| match transition {
            ActionTransition::Finished { action_key, outcome } => Some((action_key, *outcome)),
            _ => None,
        })
    }

    pub fn interrupted(&self) -> Option<&ActionKey> {
        self.transitions.iter().find_map(|transition| match transition {
            ActionTransition::Interrupted { action_key, .. } => Some(action_key),
            _ => None,
        })
    }
}
