/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/

use bevy::prelude::*;

use ganglion_core::events::{ActionTransition, TickReport};
use ganglion_core::types::DeltaTime;

use crate::events::trigger_transition;
use crate::resources::{AIController, AgentBrains, GanglionSettings};

/// Ticks every scheduled agent's selector once, then raises events for whatever happened.
///
/// Selectors get the whole World while they tick; only `AgentBrains` itself is taken out of it
/// for the duration. Events are raised after every agent has ticked, so observers see a World
/// where this frame's AI work is done.
///
/// Returns how many agents were ticked.
pub fn tick_all_agents(world: &mut World, delta: DeltaTime) -> usize {
    let budget = world.get_resource::<GanglionSettings>().and_then(|settings| settings.agent_budget);

    let ticked = world.try_resource_scope(|world, mut brains: Mut<AgentBrains>| {
        let mut reports: Vec<(Entity, TickReport)> = Vec::new();
        let mut ticked = 0;

        for entity in brains.schedule(budget) {
            if world.get_entity(entity).is_err() {
                // Despawned; cleanup_orphaned_brains() deals with it.
                continue;
            }

            let Some(selector) = brains.get_mut(entity) else {
                continue;
            };

            let report = selector.tick(entity, world, delta);
            ticked += 1;

            if !report.is_quiet() {
                reports.push((entity, report));
            }
        }

        (ticked, reports)
    });

    let Some((ticked, reports)) = ticked else {
        #[cfg(feature = "logging")]
        bevy::log::warn!("No AgentBrains Resource found; is the GanglionPlugin added?");
        return 0;
    };

    for (entity, report) in reports {
        for transition in report.transitions {
            trigger_transition(world, entity, transition);
        }
    }

    ticked
}

/// Exclusive system driving all agents with the current `Time` delta.
pub fn tick_agents(world: &mut World) {
    let delta = world
        .get_resource::<Time>()
        .map(|time| time.delta_secs())
        .unwrap_or(0.);

    let _ticked = tick_all_agents(world, delta);

    #[cfg(feature = "logging")]
    bevy::log::trace!("Ticked {} agent(s) (dt = {:.3}s)", _ticked, delta);
}

/// Shuts down brains whose entity was despawned or lost its `AIController`.
pub fn cleanup_orphaned_brains(world: &mut World) {
    let orphans: Vec<Entity> = match world.get_resource::<AgentBrains>() {
        None => return,
        Some(brains) => brains
            .entities()
            .filter(|entity| {
                world
                    .get_entity(*entity)
                    .map_or(true, |entity_ref| !entity_ref.contains::<AIController>())
            })
            .collect(),
    };

    for entity in orphans {
        let brain = world.get_resource_mut::<AgentBrains>().and_then(|mut brains| brains.remove(entity));

        let Some(mut selector) = brain else {
            continue;
        };

        #[cfg(feature = "logging")]
        bevy::log::debug!("Cleaning up the orphaned brain of {:?}", entity);

        let running = selector.current_action_key().cloned();

        // Observers watching a despawned entity are gone; global ones still hear about it.
        if selector.shutdown(entity, world) {
            if let Some(action_key) = running {
                trigger_transition(world, entity, ActionTransition::Interrupted { action_key, replaced_by: None });
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use bevy::platform::sync::{Arc, Mutex};

    use ganglion_core::action_runtime::PlanQueue;
    use ganglion_core::action_state::ActionState;
    use ganglion_core::actions::ActionDefinition;
    use ganglion_core::actionset::{ActionSet, ActionTemplate, ConsiderationTemplate, CurveTemplate, OperatorTemplate};
    use ganglion_core::blackboard::{AgentMemory, Blackboard, StateKey};
    use ganglion_core::operators::{FnOperator, Operator, OperatorContext, OperatorParams, OperatorStatus};
    use ganglion_core::world::AgentView;
    use ganglion_core::selector::{ActionSelector, SelectorConfig};

    use crate::events::{AiActionFinished, AiActionInterrupted, AiActionPicked, AiBecameIdle};
    use crate::plugin::GanglionPlugin;
    use crate::registrations::{AcceptsOperatorRegistrations, AcceptsStateRegistrations, SpawnsAgents};
    use crate::resources::ActionSetStore;

    #[derive(Component, Default)]
    struct Hunger(f32);

    #[derive(Component, Default)]
    struct MealsEaten(u32);

    #[derive(Default, Clone)]
    struct Heard(Arc<Mutex<Vec<String>>>);

    impl Heard {
        fn push(&self, line: String) {
            if let Ok(mut lines) = self.0.lock() {
                lines.push(line);
            }
        }

        fn lines(&self) -> Vec<String> {
            self.0.lock().map(|lines| lines.clone()).unwrap_or_default()
        }
    }

    fn test_app() -> (App, Heard) {
        let mut app = App::new();
        let heard = Heard::default();

        app.add_plugins(GanglionPlugin);

        let picked = heard.clone();
        app.add_observer(move |event: On<AiActionPicked>| {
            picked.push(format!("picked {}", event.action_key));
        });

        let finished = heard.clone();
        app.add_observer(move |event: On<AiActionFinished>| {
            finished.push(format!("finished {} {:?}", event.action_key, event.outcome));
        });

        let interrupted = heard.clone();
        app.add_observer(move |event: On<AiActionInterrupted>| {
            interrupted.push(format!("interrupted {}", event.action_key));
        });

        let idle = heard.clone();
        app.add_observer(move |_event: On<AiBecameIdle>| {
            idle.push("idle".to_string());
        });

        let hunger = StateKey::<f32>::new("Hunger");
        app.register_measurement(&hunger, |view: AgentView<'_, World>, _memory: &AgentMemory| {
            Ok(view.world.get::<Hunger>(view.agent).map(|hunger| hunger.0).unwrap_or(0.))
        });

        app.register_operator("Eat", &[], |_params: &OperatorParams, _bb: &mut Blackboard<World>, _view: AgentView<'_, World>| {
            let operator = FnOperator::new("Eat", |ctx: &mut OperatorContext<'_, World>, _delta: DeltaTime| {
                let agent = ctx.agent;
                if let Some(mut hunger) = ctx.world.get_mut::<Hunger>(agent) {
                    hunger.0 = 0.;
                }
                if let Some(mut meals) = ctx.world.get_mut::<MealsEaten>(agent) {
                    meals.0 += 1;
                }
                OperatorStatus::Succeeded
            });
            Ok(Box::new(operator) as Box<dyn Operator<World>>)
        });

        let set = ActionSet::new("Glutton").with_action(
            ActionTemplate::new("Eat")
                .with_consideration(ConsiderationTemplate::new("Hunger", CurveTemplate::Linear))
                .with_step(OperatorTemplate::new("Eat")),
        );
        app.world_mut().resource_mut::<ActionSetStore>().insert(set);

        (app, heard)
    }

    fn immediate() -> GanglionSettings {
        GanglionSettings {
            default_config: SelectorConfig::default().with_decision_interval(0.),
            stagger_agents: false,
            ..Default::default()
        }
    }

    #[test]
    fn agents_act_on_the_world() {
        let (mut app, heard) = test_app();
        app.insert_resource(immediate());

        let world = app.world_mut();
        let agent = world.spawn((Hunger(0.8), MealsEaten(0))).id();
        world.insert_agent_from_set(agent, "Glutton").unwrap();

        assert_eq!(tick_all_agents(world, 0.1), 1);
        assert_eq!(world.get::<MealsEaten>(agent).unwrap().0, 1);
        assert_eq!(world.get::<Hunger>(agent).unwrap().0, 0.);
        assert_eq!(heard.lines(), vec!["picked Eat".to_string(), "finished Eat Succeeded".to_string()]);

        // Not hungry anymore, so nothing is worth doing.
        tick_all_agents(world, 0.1);
        tick_all_agents(world, 0.1);
        assert_eq!(world.get::<MealsEaten>(agent).unwrap().0, 1);
        assert_eq!(heard.lines().iter().filter(|line| *line == "idle").count(), 1);
    }

    #[test]
    fn unknown_sets_are_errors() {
        let (mut app, _heard) = test_app();
        let world = app.world_mut();

        assert!(world.spawn_agent_from_set("Nope").is_err());
        assert_eq!(world.resource::<AgentBrains>().len(), 0);
        assert!(world.spawn_agent_from_set("Glutton").is_ok());
        assert_eq!(world.resource::<AgentBrains>().len(), 1);
    }

    #[test]
    fn budget_limits_agents_per_tick() {
        let (mut app, _heard) = test_app();
        app.insert_resource(GanglionSettings { agent_budget: Some(2), ..immediate() });

        let world = app.world_mut();
        for _ in 0..3 {
            world.spawn_agent_from_set("Glutton").unwrap();
        }

        assert_eq!(tick_all_agents(world, 0.1), 2);
        assert_eq!(tick_all_agents(world, 0.1), 2);
    }

    fn endless_selector() -> ActionSelector<World> {
        let mut selector = ActionSelector::new(SelectorConfig::default().with_decision_interval(0.));
        selector
            .register(ActionDefinition::<World>::new("Loiter").with_plan(
                |_bb: &mut Blackboard<World>, _view: AgentView<'_, World>| {
                    PlanQueue::empty().then(FnOperator::new(
                        "Loiter",
                        |_ctx: &mut OperatorContext<'_, World>, _delta: DeltaTime| OperatorStatus::Running,
                    ))
                },
            ))
            .unwrap();
        selector
    }

    #[test]
    fn despawned_agents_are_shut_down() {
        let (mut app, heard) = test_app();
        let world = app.world_mut();

        let agent = world.spawn_empty().id();
        world.insert_agent(agent, endless_selector());
        tick_all_agents(world, 0.1);
        assert_eq!(
            world.resource::<AgentBrains>().get(agent).map(|brain| brain.current_state()),
            Some(ActionState::Running)
        );

        world.despawn(agent);
        assert_eq!(tick_all_agents(world, 0.1), 0);

        cleanup_orphaned_brains(world);
        assert!(!world.resource::<AgentBrains>().contains(agent));
        assert!(heard.lines().contains(&"interrupted Loiter".to_string()));
    }

    #[test]
    fn despawn_agent_interrupts_once() {
        let (mut app, heard) = test_app();
        let world = app.world_mut();

        let agent = world.spawn_empty().id();
        world.insert_agent(agent, endless_selector());
        tick_all_agents(world, 0.1);

        assert!(world.despawn_agent(agent));
        cleanup_orphaned_brains(world);

        let interrupts = heard.lines().iter().filter(|line| line.starts_with("interrupted")).count();
        assert_eq!(interrupts, 1);
    }
}
