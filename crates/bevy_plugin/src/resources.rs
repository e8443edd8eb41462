/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/

use bevy::prelude::*;

use ganglion_core::actionset::ActionSet;
use ganglion_core::library::ActionLibrary;
use ganglion_core::selector::{ActionSelector, SelectorConfig};
use ganglion_core::types::GanglionKvMap;

/// Marks entities driven by a Ganglion brain.
#[derive(Component, Debug, Default, Clone, Copy, Reflect)]
pub struct AIController;

/// Every agent's selector, keyed by entity.
#[derive(Resource, Default)]
pub struct AgentBrains {
    brains: GanglionKvMap<Entity, ActionSelector<World>>,
    cursor: usize,
    spawned: usize,
}

impl AgentBrains {
    pub fn insert(&mut self, entity: Entity, selector: ActionSelector<World>) -> Option<ActionSelector<World>> {
        self.brains.insert(entity, selector)
    }

    pub fn remove(&mut self, entity: Entity) -> Option<ActionSelector<World>> {
        self.brains.remove(&entity)
    }

    pub fn get(&self, entity: Entity) -> Option<&ActionSelector<World>> {
        self.brains.get(&entity)
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut ActionSelector<World>> {
        self.brains.get_mut(&entity)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.brains.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.brains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brains.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.brains.keys().copied()
    }

    /// Counts agents built from ActionSets, for staggering.
    pub(crate) fn next_spawn_index(&mut self) -> usize {
        let index = self.spawned;
        self.spawned = self.spawned.wrapping_add(1);
        index
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &ActionSelector<World>)> {
        self.brains.iter().map(|(entity, selector)| (*entity, selector))
    }

    /// Picks the agents to tick this frame, in a stable order.
    ///
    /// With a budget, agents are served round-robin, so everyone gets a turn eventually.
    pub fn schedule(&mut self, budget: Option<usize>) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.brains.keys().copied().collect();
        entities.sort();

        let total = entities.len();
        let batch = match budget {
            Some(budget) if budget < total => budget,
            _ => return entities,
        };

        let start = self.cursor % total;
        self.cursor = (start + batch) % total;

        entities
            .into_iter()
            .cycle()
            .skip(start)
            .take(batch)
            .collect()
    }
}

/// The registries authored ActionSets are built against.
#[derive(Resource, Default, Clone)]
pub struct AiLibrary(pub ActionLibrary<World>);

/// Named ActionSets agents can be spawned from.
#[derive(Resource, Default, Debug, Clone)]
pub struct ActionSetStore {
    sets: GanglionKvMap<String, ActionSet>,
}

impl ActionSetStore {
    /// Stores a set under its own name, replacing any earlier version.
    pub fn insert(&mut self, set: ActionSet) -> Option<ActionSet> {
        let _old = self.sets.insert(set.name.clone(), set);

        #[cfg(feature = "logging")]
        {
            if let Some(old) = &_old {
                bevy::log::warn!("ActionSet {:?} was replaced by a newer version", old.name);
            }
        }

        _old
    }

    pub fn get(&self, name: &str) -> Option<&ActionSet> {
        self.sets.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ActionSet> {
        self.sets.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[derive(Resource, Debug, Clone)]
pub struct GanglionSettings {
    /// At most this many agents are ticked per frame. None means everyone, every frame.
    pub agent_budget: Option<usize>,

    /// Config for selectors spawned from ActionSets.
    pub default_config: SelectorConfig,

    /// Spread the first decision of agents spawned from ActionSets over one decision interval.
    pub stagger_agents: bool,
}

impl Default for GanglionSettings {
    fn default() -> Self {
        Self {
            agent_budget: None,
            default_config: SelectorConfig::default(),
            stagger_agents: true,
        }
    }
}

/// How many distinct first-decision slots staggered agents are spread over.
pub(crate) const STAGGER_SLOTS: usize = 8;

impl GanglionSettings {
    /// The config for the `nth` agent spawned.
    pub fn config_for(&self, nth: usize) -> SelectorConfig {
        match self.stagger_agents {
            false => self.default_config,
            true => {
                let slot = (nth % STAGGER_SLOTS) as f32 / STAGGER_SLOTS as f32;
                self.default_config.with_stagger(slot * self.default_config.decision_interval())
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budgets_round_robin() {
        let mut world = World::new();
        let mut brains = AgentBrains::default();
        let mut entities: Vec<Entity> = (0..3).map(|_| world.spawn_empty().id()).collect();
        entities.sort();

        for entity in &entities {
            brains.insert(*entity, ActionSelector::default());
        }

        assert_eq!(brains.schedule(None), entities);
        assert_eq!(brains.schedule(Some(2)), vec![entities[0], entities[1]]);
        assert_eq!(brains.schedule(Some(2)), vec![entities[2], entities[0]]);
        assert_eq!(brains.schedule(Some(5)).len(), 3);
    }

    #[test]
    fn staggering_spreads_first_decisions() {
        let settings = GanglionSettings::default();
        assert_eq!(settings.config_for(0).stagger(), 0.);
        assert_eq!(settings.config_for(4).stagger(), 0.25);
        assert_eq!(settings.config_for(8).stagger(), 0.);

        let flat = GanglionSettings { stagger_agents: false, ..Default::default() };
        assert_eq!(flat.config_for(4).stagger(), 0.);
    }
}
