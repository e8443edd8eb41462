/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/

use core::marker::PhantomData;
use core::time::Duration;

use bevy::asset::{AssetLoader, LoadContext, LoadState, io::Reader};
use bevy::prelude::*;

use ganglion_core::actionset::ActionSet;
use ganglion_core::types::GanglionKvMap;

use crate::backends::ActionSetLoaderBackend;

/// An authored ActionSet, as a Bevy asset.
#[derive(Asset, TypePath, Debug, Clone, PartialEq)]
pub struct ActionSetAsset(pub ActionSet);

#[derive(Debug, thiserror::Error)]
pub enum ActionSetLoadError {
    #[error("could not read ActionSet data: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse ActionSet data: {0}")]
    Parse(Box<dyn core::error::Error + Send + Sync + 'static>),
}

#[derive(TypePath)]
pub struct ActionSetLoader<B: ActionSetLoaderBackend>(PhantomData<B>);

impl<B: ActionSetLoaderBackend> Default for ActionSetLoader<B> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<B: ActionSetLoaderBackend> AssetLoader for ActionSetLoader<B> {
    type Asset = ActionSetAsset;
    type Settings = ();
    type Error = ActionSetLoadError;

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        _ctx: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;

        let parsed = B::from_slice(&bytes).map_err(|err| {
            #[cfg(feature = "logging")]
            bevy::log::error!("ActionSetLoader could not parse {:?}: {}", _ctx.path(), err);
            ActionSetLoadError::Parse(Box::new(err))
        })?;

        #[cfg(feature = "logging")]
        bevy::log::debug!("Parsed ActionSet {:?} ({} action(s))", parsed.name, parsed.actions.len());

        Ok(ActionSetAsset(parsed))
    }

    fn extensions(&self) -> &[&str] {
        B::extensions()
    }
}

/// How long a requested ActionSet may take to load before we give up on it.
#[derive(Resource, Debug, Clone, Copy)]
pub struct ActionSetLoadTimeout(pub Duration);

impl Default for ActionSetLoadTimeout {
    fn default() -> Self {
        Self(Duration::from_secs(2))
    }
}

#[derive(Resource, Default)]
struct PendingActionSets(GanglionKvMap<String, (Handle<ActionSetAsset>, Timer)>);

/// Ask for an ActionSet file to be loaded; you will hear back with
/// an `ActionSetLoaded`, `ActionSetLoadFailed` or `ActionSetLoadingTimeout`.
#[derive(Event, Debug, Clone)]
pub struct LoadActionSetRequest {
    pub path: String,
}

impl LoadActionSetRequest {
    pub fn new<IS: Into<String>>(path: IS) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Event, Debug, Clone)]
pub struct ActionSetLoaded {
    pub path: String,

    /// Name of the loaded ActionSet; this is what agents get spawned from.
    pub name: String,
    pub asset_handle: Handle<ActionSetAsset>,
}

#[derive(Event, Debug, Clone)]
pub struct ActionSetLoadFailed {
    pub path: String,
    pub reason: String,
}

#[derive(Event, Debug, Clone)]
pub struct ActionSetLoadingTimeout {
    pub path: String,
    pub timeout_secs: f32,
}

fn request_load(
    event: On<LoadActionSetRequest>,
    asset_server: Res<AssetServer>,
    timeout: Res<ActionSetLoadTimeout>,
    mut pending: ResMut<PendingActionSets>,
) {
    let path = event.event().path.clone();

    #[cfg(feature = "logging")]
    bevy::log::info!("Reading ActionSet from {}...", path);

    let handle: Handle<ActionSetAsset> = asset_server.load(path.clone());
    pending.0.insert(path, (handle, Timer::new(timeout.0, TimerMode::Once)));
}

/// Checks on every pending load and reports the ones that resolved one way or another.
fn watch_pending_loads(
    time: Res<Time>,
    asset_server: Res<AssetServer>,
    assets: Res<Assets<ActionSetAsset>>,
    mut pending: ResMut<PendingActionSets>,
    mut commands: Commands,
) {
    pending.0.retain(|path, (handle, timer)| {
        if let Some(asset) = assets.get(handle.id()) {
            #[cfg(feature = "logging")]
            bevy::log::info!("Loaded ActionSet {:?} from {:?}", asset.0.name, path);

            commands.trigger(ActionSetLoaded {
                path: path.clone(),
                name: asset.0.name.clone(),
                asset_handle: handle.clone(),
            });
            return false;
        }

        if let Some(LoadState::Failed(err)) = asset_server.get_load_state(handle.id()) {
            #[cfg(feature = "logging")]
            bevy::log::error!("Loading ActionSet from {:?} failed: {}", path, err);

            commands.trigger(ActionSetLoadFailed { path: path.clone(), reason: err.to_string() });
            return false;
        }

        timer.tick(time.delta());
        if timer.is_finished() {
            let timeout_secs = timer.elapsed_secs();

            #[cfg(feature = "logging")]
            bevy::log::warn!("Loading ActionSet from {:?} timed out after {:?}s!", path, timeout_secs);

            commands.trigger(ActionSetLoadingTimeout { path: path.clone(), timeout_secs });
            return false;
        }

        true
    });
}

/// Registers the `ActionSetAsset` type and a loader for backend `B`.
///
/// Adds Bevy's `AssetPlugin` too, unless something else already did.
pub struct ActionSetAssetPlugin<B: ActionSetLoaderBackend>(PhantomData<B>);

impl<B: ActionSetLoaderBackend> Default for ActionSetAssetPlugin<B> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<B: ActionSetLoaderBackend> Plugin for ActionSetAssetPlugin<B> {
    fn build(&self, app: &mut App) {
        if !app.is_plugin_added::<AssetPlugin>() {
            app.add_plugins(AssetPlugin::default());
        }

        app
        .init_asset::<ActionSetAsset>()
        .init_asset_loader::<ActionSetLoader<B>>()
        .init_resource::<ActionSetLoadTimeout>()
        .init_resource::<PendingActionSets>()
        .add_observer(request_load)
        .add_systems(First, watch_pending_loads)
        ;
    }
}
