/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/

//! This crate extends the Ganglion utility-AI engine with a solution for loading authored `ActionSets`
//! from any available Bevy [`AssetSource`](https://docs.rs/bevy/latest/bevy/asset/io/struct.AssetSource.html).
//!
//! Each supported file format lives behind its own feature flag (`json_support`, `ron_support`, ...)
//! and plugs into the generic `ActionSetAssetPlugin<B>` as a backend `B`.
//!
//! Loaded sets still have to be turned into actions by an `ActionLibrary`, which is where
//! unknown curves, world-states and Operators get caught.

mod backends;
mod loader;

pub use backends::*;
pub use loader::*;
