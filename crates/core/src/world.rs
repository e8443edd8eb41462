/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! The boundary between the engine and whatever world model it is embedded in.
//! 
//! The engine never stores or owns world data. During a decision cycle it hands 
//! a shared reference to the world to Blackboard computations; while executing plans 
//! it hands a mutable one to Operators. Everything in between is generic over `W: AgentWorld`.

use core::fmt::Debug;
use core::hash::Hash;

/// A world model agents can live in.
pub trait AgentWorld: 'static {
    /// How the world identifies an agent (an Entity, an index, a handle...).
    type Agent: Copy + Eq + Hash + Debug + Send + Sync + 'static;
}

impl AgentWorld for bevy::ecs::world::World {
    type Agent = bevy::ecs::entity::Entity;
}

/// A read-only, agent-scoped view of the world, used during scoring and compilation.
pub struct AgentView<'w, W: AgentWorld> {
    pub agent: W::Agent,
    pub world: &'w W,
}

impl<'w, W: AgentWorld> AgentView<'w, W> {
    pub fn new(agent: W::Agent, world: &'w W) -> Self {
        Self { agent, world }
    }
}

impl<'w, W: AgentWorld> Clone for AgentView<'w, W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'w, W: AgentWorld> Copy for AgentView<'w, W> {}
