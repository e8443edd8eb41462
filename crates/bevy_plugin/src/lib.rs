/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/

//! This crate extends the Ganglion utility-AI engine with a plugin that streamlines the integration
//! of Ganglion into an existing Bevy application (the "native AI" integration style).
//!
//! Agents are plain entities. Each one gets an `ActionSelector<World>` stored in the `AgentBrains`
//! Resource, and a single exclusive system ticks all of them every fixed update, handing the
//! selectors the whole `World` so Operators can do whatever they need to.
//!
//! What's left for you to do after adding the plugin is registering your world-state computations,
//! Operator factories and Curve presets (see the `Accepts*Registrations` traits) and spawning agents
//! (see `SpawnsAgents`).

mod events;
mod plugin;
mod registrations;
mod resources;
mod systems;

pub use events::{AiActionFinished, AiActionInterrupted, AiActionPicked, AiBecameIdle};
pub use plugin::GanglionPlugin;
pub use registrations::{
    AcceptsCurveRegistrations,
    AcceptsOperatorRegistrations,
    AcceptsStateRegistrations,
    SpawnsAgents,
};
pub use resources::{AIController, ActionSetStore, AgentBrains, AiLibrary, GanglionSettings};
pub use systems::{cleanup_orphaned_brains, tick_agents, tick_all_agents};
