/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Core of the Ganglion utility-AI engine.
//! 
//! Leaves first:
//! - [`curves`]: response curves mapping a normalized measurement onto [0, 1].
//! - [`considerations`]: a Blackboard accessor paired with one curve.
//! - [`blackboard`]: the per-agent, per-decision-cycle memoized world-state cache.
//! - [`actions`]: candidate behaviors that score themselves and compile into plans.
//! - [`operators`] and [`action_runtime`]: primitive multi-tick steps and the plan queue driving them.
//! - [`selector`]: the per-agent scheduler tying all of the above together.
//! 
//! The engine is generic over the world type (see [`world::AgentWorld`]); the Bevy `World` 
//! is supported out of the box, but any synchronous world model will do.

extern crate alloc;

pub mod actions;
pub mod actionset;
pub mod action_runtime;
pub mod action_state;
pub mod blackboard;
pub mod considerations;
pub mod curves;
pub mod decision_loop;
pub mod errors;
pub mod events;
pub mod identifiers;
pub mod library;
pub mod operators;
pub mod selector;
mod thread_safe_wrapper;
pub mod types;
pub mod world;
