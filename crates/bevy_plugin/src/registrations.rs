/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/

//! Extension traits for feeding registrations and agents into an App or a World.
//!
//! Everything lands in the `AiLibrary` and `AgentBrains` Resources, which get initialized on demand,
//! so these work before the plugin is added too.

use bevy::prelude::*;

use ganglion_core::blackboard::{AgentMemory, Blackboard, ScalarMeasure, StateKey, StateValue};
use ganglion_core::curves::{SupportedUtilityCurve, UtilityCurve};
use ganglion_core::errors::{CatalogueError, OperatorBuildError, StateError};
use ganglion_core::events::ActionTransition;
use ganglion_core::operators::{Operator, OperatorParams};
use ganglion_core::selector::ActionSelector;
use ganglion_core::types::{CurveIdentifier, OperatorKey};
use ganglion_core::world::AgentView;

use crate::events::trigger_transition;
use crate::resources::{AIController, ActionSetStore, AgentBrains, AiLibrary, GanglionSettings};

pub trait AcceptsCurveRegistrations {
    /// Registers a named curve preset authored ActionSets can refer to.
    ///
    /// Built-in curve names are reserved.
    fn register_utility_curve<U: UtilityCurve + 'static, IS: Into<CurveIdentifier>>(
        &mut self,
        curve: U,
        key: IS,
    ) -> Result<&mut Self, CatalogueError>;
}

impl AcceptsCurveRegistrations for World {
    fn register_utility_curve<U: UtilityCurve + 'static, IS: Into<CurveIdentifier>>(
        &mut self,
        curve: U,
        key: IS,
    ) -> Result<&mut Self, CatalogueError> {
        {
            let mut library = self.get_resource_or_init::<AiLibrary>();
            library.0.curves_mut().register_curve(key, SupportedUtilityCurve::custom(curve))?;
        }

        Ok(self)
    }
}

impl AcceptsCurveRegistrations for App {
    fn register_utility_curve<U: UtilityCurve + 'static, IS: Into<CurveIdentifier>>(
        &mut self,
        curve: U,
        key: IS,
    ) -> Result<&mut Self, CatalogueError> {
        self.world_mut().register_utility_curve(curve, key)?;
        Ok(self)
    }
}

pub trait AcceptsStateRegistrations {
    /// Registers a world-state computation Blackboards can evaluate.
    fn register_world_state<T, F>(&mut self, key: &StateKey<T>, computation: F) -> &mut Self
    where
        T: StateValue + Default,
        F: Fn(AgentView<'_, World>, &AgentMemory) -> Result<T, StateError> + Send + Sync + 'static;

    /// Same as `register_world_state()`, but the value can also drive authored Considerations.
    fn register_measurement<T, F>(&mut self, key: &StateKey<T>, computation: F) -> &mut Self
    where
        T: StateValue + Default + ScalarMeasure,
        F: Fn(AgentView<'_, World>, &AgentMemory) -> Result<T, StateError> + Send + Sync + 'static;
}

impl AcceptsStateRegistrations for World {
    fn register_world_state<T, F>(&mut self, key: &StateKey<T>, computation: F) -> &mut Self
    where
        T: StateValue + Default,
        F: Fn(AgentView<'_, World>, &AgentMemory) -> Result<T, StateError> + Send + Sync + 'static,
    {
        self.get_resource_or_init::<AiLibrary>().0.states_mut().register(key, computation);
        self
    }

    fn register_measurement<T, F>(&mut self, key: &StateKey<T>, computation: F) -> &mut Self
    where
        T: StateValue + Default + ScalarMeasure,
        F: Fn(AgentView<'_, World>, &AgentMemory) -> Result<T, StateError> + Send + Sync + 'static,
    {
        self.get_resource_or_init::<AiLibrary>().0.states_mut().register_measurement(key, computation);
        self
    }
}

impl AcceptsStateRegistrations for App {
    fn register_world_state<T, F>(&mut self, key: &StateKey<T>, computation: F) -> &mut Self
    where
        T: StateValue + Default,
        F: Fn(AgentView<'_, World>, &AgentMemory) -> Result<T, StateError> + Send + Sync + 'static,
    {
        self.world_mut().register_world_state(key, computation);
        self
    }

    fn register_measurement<T, F>(&mut self, key: &StateKey<T>, computation: F) -> &mut Self
    where
        T: StateValue + Default + ScalarMeasure,
        F: Fn(AgentView<'_, World>, &AgentMemory) -> Result<T, StateError> + Send + Sync + 'static,
    {
        self.world_mut().register_measurement(key, computation);
        self
    }
}

pub trait AcceptsOperatorRegistrations {
    /// Registers a factory authored plan steps can name.
    fn register_operator<IS, F>(&mut self, key: IS, required_params: &[&str], factory: F) -> &mut Self
    where
        IS: Into<OperatorKey>,
        F: Fn(&OperatorParams, &mut Blackboard<World>, AgentView<'_, World>) -> Result<Box<dyn Operator<World>>, OperatorBuildError>
            + Send
            + Sync
            + 'static;
}

impl AcceptsOperatorRegistrations for World {
    fn register_operator<IS, F>(&mut self, key: IS, required_params: &[&str], factory: F) -> &mut Self
    where
        IS: Into<OperatorKey>,
        F: Fn(&OperatorParams, &mut Blackboard<World>, AgentView<'_, World>) -> Result<Box<dyn Operator<World>>, OperatorBuildError>
            + Send
            + Sync
            + 'static,
    {
        self.get_resource_or_init::<AiLibrary>().0.operators_mut().register(key, required_params, factory);
        self
    }
}

impl AcceptsOperatorRegistrations for App {
    fn register_operator<IS, F>(&mut self, key: IS, required_params: &[&str], factory: F) -> &mut Self
    where
        IS: Into<OperatorKey>,
        F: Fn(&OperatorParams, &mut Blackboard<World>, AgentView<'_, World>) -> Result<Box<dyn Operator<World>>, OperatorBuildError>
            + Send
            + Sync
            + 'static,
    {
        self.world_mut().register_operator(key, required_params, factory);
        self
    }
}

pub trait SpawnsAgents {
    /// Gives an existing entity a brain. A brain it already had is shut down first.
    fn insert_agent(&mut self, entity: Entity, selector: ActionSelector<World>) -> &mut Self;

    /// Builds a brain from a stored ActionSet and gives it to an existing entity.
    fn insert_agent_from_set(&mut self, entity: Entity, set_name: &str) -> Result<&mut Self, CatalogueError>;

    /// Spawns a fresh agent running a stored ActionSet.
    fn spawn_agent_from_set(&mut self, set_name: &str) -> Result<Entity, CatalogueError>;

    /// Shuts the agent's brain down, then despawns the entity.
    fn despawn_agent(&mut self, entity: Entity) -> bool;
}

fn retire_brain(world: &mut World, entity: Entity, mut selector: ActionSelector<World>) {
    let running = selector.current_action_key().cloned();

    if selector.shutdown(entity, world) {
        if let Some(action_key) = running {
            trigger_transition(
                world,
                entity,
                ActionTransition::Interrupted { action_key, replaced_by: None },
            );
        }
    }
}

impl SpawnsAgents for World {
    fn insert_agent(&mut self, entity: Entity, selector: ActionSelector<World>) -> &mut Self {
        if let Ok(mut entity_mut) = self.get_entity_mut(entity) {
            entity_mut.insert(AIController);
        }

        let old = self.get_resource_or_init::<AgentBrains>().insert(entity, selector);

        if let Some(old) = old {
            #[cfg(feature = "logging")]
            bevy::log::debug!("Agent {:?} got a new brain; retiring the old one", entity);

            retire_brain(self, entity, old);
        }

        self
    }

    fn insert_agent_from_set(&mut self, entity: Entity, set_name: &str) -> Result<&mut Self, CatalogueError> {
        let set = self
            .get_resource::<ActionSetStore>()
            .and_then(|store| store.get(set_name))
            .cloned()
            .ok_or_else(|| CatalogueError::UnknownActionSet(set_name.to_string()))?;

        let settings = self.get_resource_or_init::<GanglionSettings>().clone();
        let nth = self.get_resource_or_init::<AgentBrains>().next_spawn_index();
        let config = settings.config_for(nth);

        let built = self.get_resource_or_init::<AiLibrary>().0.build_selector(&set, config);
        let selector = match built {
            Ok(selector) => selector,
            Err(err) => {
                #[cfg(feature = "logging")]
                bevy::log::error!("Could not build a brain from ActionSet {:?}: {}", set_name, err);
                return Err(err);
            },
        };

        Ok(self.insert_agent(entity, selector))
    }

    fn spawn_agent_from_set(&mut self, set_name: &str) -> Result<Entity, CatalogueError> {
        let known = self
            .get_resource::<ActionSetStore>()
            .is_some_and(|store| store.contains(set_name));

        if !known {
            return Err(CatalogueError::UnknownActionSet(set_name.to_string()));
        }

        let entity = self.spawn(AIController).id();

        match self.insert_agent_from_set(entity, set_name) {
            Ok(_) => Ok(entity),
            Err(err) => {
                self.despawn(entity);
                Err(err)
            },
        }
    }

    fn despawn_agent(&mut self, entity: Entity) -> bool {
        let brain = self.get_resource_mut::<AgentBrains>().and_then(|mut brains| brains.remove(entity));

        if let Some(selector) = brain {
            retire_brain(self, entity, selector);
        }

        self.despawn(entity)
    }
}
