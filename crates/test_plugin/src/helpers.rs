use bevy::prelude::*;

use ganglion_bevy_plugin::{AgentBrains, AiActionFinished, AiActionInterrupted, AiActionPicked, AiBecameIdle};
use ganglion_core::action_state::ActionState;

/// Every AI event seen so far, as `"<entity> <what happened>"` lines.
#[derive(Resource, Debug, Default, Clone)]
pub struct AiEventLog(pub Vec<String>);

impl AiEventLog {
    pub fn lines_for(&self, entity: Entity) -> impl Iterator<Item = &str> {
        let prefix = format!("{entity} ");
        self.0
            .iter()
            .filter_map(move |line| line.strip_prefix(prefix.as_str()))
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.0.iter().filter(|line| line.contains(needle)).count()
    }
}

/// Stop the app after this many frames, whatever the agents are doing.
#[derive(Resource, Debug, Clone, Copy)]
pub struct FrameCap {
    pub max_frames: u32,
    pub frames: u32,
}

impl FrameCap {
    pub fn new(max_frames: u32) -> Self {
        Self { max_frames, frames: 0 }
    }
}

impl Default for FrameCap {
    fn default() -> Self {
        Self::new(600)
    }
}

pub fn record_picked(event: On<AiActionPicked>, mut log: ResMut<AiEventLog>) {
    let evt = event.event();
    log.0.push(format!("{} picked {} ({:.3})", evt.entity, evt.action_key, evt.action_score));
}

pub fn record_finished(event: On<AiActionFinished>, mut log: ResMut<AiEventLog>) {
    let evt = event.event();
    log.0.push(format!("{} finished {} ({:?})", evt.entity, evt.action_key, evt.outcome));
}

pub fn record_interrupted(event: On<AiActionInterrupted>, mut log: ResMut<AiEventLog>) {
    let evt = event.event();
    match &evt.replaced_by {
        Some(replacement) => log.0.push(format!("{} interrupted {} for {}", evt.entity, evt.action_key, replacement)),
        None => log.0.push(format!("{} interrupted {}", evt.entity, evt.action_key)),
    }
}

pub fn record_idle(event: On<AiBecameIdle>, mut log: ResMut<AiEventLog>) {
    log.0.push(format!("{} idle", event.event().entity));
}

/// Exits once every agent is idle and its latest decision found nothing worth doing.
pub fn exit_when_all_agents_idle(
    brains: Res<AgentBrains>,
    mut exit: MessageWriter<AppExit>,
) {
    if brains.is_empty() {
        return;
    }

    let all_idle = brains.iter().all(|(_, brain)| {
        brain.decisions_made() > 0
        && brain.current_state() == ActionState::Idle
        && brain.last_scores().iter().all(|candidate| candidate.score <= 0.)
    });

    if all_idle {
        #[cfg(feature = "logging")]
        bevy::log::info!("All {} agent(s) are idle, exiting", brains.len());

        exit.write(AppExit::Success);
    }
}

pub fn exit_on_frame_cap(
    mut cap: ResMut<FrameCap>,
    mut exit: MessageWriter<AppExit>,
) {
    cap.frames += 1;

    if cap.frames >= cap.max_frames {
        #[cfg(feature = "logging")]
        bevy::log::warn!("Hit the frame cap ({}), exiting", cap.max_frames);

        exit.write(AppExit::Success);
    }
}
