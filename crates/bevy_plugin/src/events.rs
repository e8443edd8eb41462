use bevy::prelude::*;

use ganglion_core::action_state::ActionState;
use ganglion_core::events::ActionTransition;
use ganglion_core::types::{ActionKey, ActionScore};

/// An AI picked a new Action and compiled its plan.
///
/// Listen to this to drive animations, barks and such; the plan itself is already running.
#[derive(EntityEvent, Debug, Clone)]
pub struct AiActionPicked {
    /// The AI that picked this Action.
    pub entity: Entity,
    pub action_key: ActionKey,

    /// The Utility score it won with.
    pub action_score: ActionScore,
}

/// An AI's Action plan ran to completion.
#[derive(EntityEvent, Debug, Clone)]
pub struct AiActionFinished {
    pub entity: Entity,
    pub action_key: ActionKey,

    /// Either `Succeeded` or `Failed`.
    pub outcome: ActionState,
}

/// An AI's Action was cancelled before it finished.
#[derive(EntityEvent, Debug, Clone)]
pub struct AiActionInterrupted {
    pub entity: Entity,
    pub action_key: ActionKey,

    /// None if the AI was shut down rather than switching Actions.
    pub replaced_by: Option<ActionKey>,
}

/// An AI found nothing worth doing. Raised once per idle stretch.
#[derive(EntityEvent, Debug, Clone)]
pub struct AiBecameIdle {
    pub entity: Entity,
}

/// Raises the Bevy counterpart of a core transition.
pub(crate) fn trigger_transition(world: &mut World, entity: Entity, transition: ActionTransition) {
    match transition {
        ActionTransition::Picked { action_key, action_score } => {
            world.trigger(AiActionPicked { entity, action_key, action_score })
        },
        ActionTransition::Finished { action_key, outcome } => {
            world.trigger(AiActionFinished { entity, action_key, outcome })
        },
        ActionTransition::Interrupted { action_key, replaced_by } => {
            world.trigger(AiActionInterrupted { entity, action_key, replaced_by })
        },
        ActionTransition::BecameIdle => world.trigger(AiBecameIdle { entity }),
    }
}
