use core::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;

use ganglion_bevy_plugin::GanglionPlugin;

use crate::helpers::*;

/// A headless app shell: `MinimalPlugins` on a fixed loop, the `GanglionPlugin`,
/// AI event recording and the exit conditions from `helpers`.
pub struct GanglionTestPlugin {
    pub frame_interval: Duration,
}

impl Default for GanglionTestPlugin {
    fn default() -> Self {
        Self { frame_interval: Duration::from_millis(20) }
    }
}

impl Plugin for GanglionTestPlugin {
    fn build(&self, app: &mut App) {
        app
        .add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(self.frame_interval)),
            #[cfg(feature = "logging")]
            bevy::log::LogPlugin {
                level: bevy::log::Level::DEBUG,
                custom_layer: |_| None,
                filter: "wgpu=error,bevy_render=info,bevy_ecs=info".to_string(),
                fmt_layer: |_| None,
            },
        ));

        if !app.is_plugin_added::<GanglionPlugin>() {
            app.add_plugins(GanglionPlugin);
        }

        app
        .init_resource::<AiEventLog>()
        .init_resource::<FrameCap>()
        .add_observer(record_picked)
        .add_observer(record_finished)
        .add_observer(record_interrupted)
        .add_observer(record_idle)
        .add_systems(
            Last,
            (
                exit_when_all_agents_idle,
                exit_on_frame_cap,
            ).chain()
        )
        ;
    }
}
