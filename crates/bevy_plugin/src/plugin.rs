/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/

use bevy::prelude::*;

use crate::resources::{ActionSetStore, AgentBrains, AiLibrary, GanglionSettings};
use crate::systems::{cleanup_orphaned_brains, tick_agents};

#[cfg(feature = "include_actionset_loader")]
use ganglion_actionset_loader::{ActionSetAsset, ActionSetLoaded};

/// Sets up the Resources and systems that run Ganglion agents as entities.
///
/// Agents are ticked in `FixedUpdate`; brains of despawned agents are cleaned up in `FixedPostUpdate`.
///
/// With the `include_actionset_loader` feature, loaded ActionSets are copied into the `ActionSetStore`
/// automatically; add an `ActionSetAssetPlugin` for the file format(s) you use yourself.
pub struct GanglionPlugin;

impl Plugin for GanglionPlugin {
    fn build(&self, app: &mut App) {
        app
        .init_resource::<AgentBrains>()
        .init_resource::<AiLibrary>()
        .init_resource::<ActionSetStore>()
        .init_resource::<GanglionSettings>()
        .add_systems(FixedUpdate, tick_agents)
        .add_systems(FixedPostUpdate, cleanup_orphaned_brains)
        ;

        #[cfg(feature = "include_actionset_loader")]
        app.add_observer(store_loaded_action_set);
    }
}

#[cfg(feature = "include_actionset_loader")]
fn store_loaded_action_set(
    event: On<ActionSetLoaded>,
    assets: Option<Res<Assets<ActionSetAsset>>>,
    mut store: ResMut<ActionSetStore>,
) {
    let loaded = event.event();
    let asset = assets.as_ref().and_then(|assets| assets.get(loaded.asset_handle.id()));

    match asset {
        Some(asset) => {
            #[cfg(feature = "logging")]
            bevy::log::debug!("Storing ActionSet {:?} loaded from {:?}", asset.0.name, loaded.path);
            store.insert(asset.0.clone());
        },
        None => {
            #[cfg(feature = "logging")]
            bevy::log::warn!("ActionSet {:?} was reported loaded but is gone already", loaded.name);
        },
    }
}
