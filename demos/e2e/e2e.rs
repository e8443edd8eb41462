//! End-to-end demo: two villagers with a hunger and a fatigue meter pick between eating,
//! napping and doing nothing, with authored ActionSets built against registered world-states
//! and Operators. The app exits once everyone is content.
//!
//! Run with `cargo run --example e2e --features testing`.

use bevy::prelude::*;

use ganglion::prelude::*;

#[derive(Component, Debug)]
struct Hunger(f32);

#[derive(Component, Debug)]
struct Fatigue(f32);

const HUNGER: &str = "Hunger";
const FATIGUE: &str = "Fatigue";

fn register_world_states(app: &mut App) {
    app.register_measurement(&StateKey::<f32>::new(HUNGER), |view: AgentView<'_, World>, _memory: &AgentMemory| {
        view.world
            .get::<Hunger>(view.agent)
            .map(|hunger| hunger.0)
            .ok_or_else(|| StateError::unavailable("no Hunger component"))
    });

    app.register_measurement(&StateKey::<f32>::new(FATIGUE), |view: AgentView<'_, World>, _memory: &AgentMemory| {
        view.world
            .get::<Fatigue>(view.agent)
            .map(|fatigue| fatigue.0)
            .ok_or_else(|| StateError::unavailable("no Fatigue component"))
    });
}

/// Lowers a meter component by `rate` per second until it bottoms out.
fn drain_operator<C: Component<Mutability = bevy::ecs::component::Mutable>>(
    name: &'static str,
    rate: f32,
    meter: fn(&mut C) -> &mut f32,
) -> Box<dyn Operator<World>> {
    let operator = FnOperator::new(name, move |ctx: &mut OperatorContext<'_, World>, delta: DeltaTime| {
        let agent = ctx.agent;
        let Some(mut component) = ctx.world.get_mut::<C>(agent) else {
            return OperatorStatus::Failed;
        };

        let value = meter(&mut *component);
        *value = (*value - rate * delta).max(0.);

        match *value <= 0. {
            true => OperatorStatus::Succeeded,
            false => OperatorStatus::Running,
        }
    });

    Box::new(operator)
}

fn register_operators(app: &mut App) {
    app.register_operator(
        "Eat",
        &["rate"],
        |params: &OperatorParams, _bb: &mut Blackboard<World>, _view: AgentView<'_, World>| {
            let rate = params.number("rate")? as f32;
            Ok(drain_operator::<Hunger>("Eat", rate, |hunger| &mut hunger.0))
        },
    );

    app.register_operator(
        "Nap",
        &["rate"],
        |params: &OperatorParams, _bb: &mut Blackboard<World>, _view: AgentView<'_, World>| {
            let rate = params.number("rate")? as f32;
            Ok(drain_operator::<Fatigue>("Nap", rate, |fatigue| &mut fatigue.0))
        },
    );
}

fn villager_actions() -> ActionSet {
    let eat = ActionTemplate::new("Eat")
        .with_consideration(
            ConsiderationTemplate::new(HUNGER, CurveTemplate::Square).normalized(0., 100.)
        )
        .with_step(OperatorTemplate::new("Wait").with_params(OperatorParams::new().with("seconds", 0.2)))
        .with_step(OperatorTemplate::new("Eat").with_params(OperatorParams::new().with("rate", 120.)));

    let nap = ActionTemplate::new("Nap")
        .with_can_override(false)
        .with_consideration(
            ConsiderationTemplate::new(FATIGUE, CurveTemplate::preset("Drowsy")).normalized(0., 100.)
        )
        .with_step(OperatorTemplate::new("Nap").with_params(OperatorParams::new().with("rate", 80.)));

    ActionSet::new("Villager").with_action(eat).with_action(nap)
}

fn spawn_villagers(world: &mut World) {
    world.resource_mut::<ActionSetStore>().insert(villager_actions());

    for (hunger, fatigue) in [(90., 20.), (10., 95.)] {
        let villager = world.spawn((Hunger(hunger), Fatigue(fatigue))).id();

        if let Err(err) = world.insert_agent_from_set(villager, "Villager") {
            bevy::log::error!("Could not set up villager {:?}: {}", villager, err);
        }
    }
}

fn print_new_events(log: Res<AiEventLog>, mut printed: Local<usize>) {
    for line in log.0.iter().skip(*printed) {
        bevy::log::info!("{}", line);
    }
    *printed = log.0.len();
}

fn main() {
    let mut app = App::new();

    app.add_plugins(GanglionTestPlugin::default())
        .insert_resource(GanglionSettings {
            default_config: SelectorConfig::default().with_decision_interval(0.25),
            ..Default::default()
        })
        .insert_resource(FrameCap::new(1_000));

    // Nothing below 30% fatigue, then a steep ramp.
    match SupportedUtilityCurve::power(2.0, 1.5, 0.3, 0.) {
        Ok(drowsy) => {
            if let Err(err) = app.register_utility_curve(drowsy, "Drowsy") {
                bevy::log::error!("Could not register the Drowsy curve: {}", err);
            }
        },
        Err(err) => bevy::log::error!("Bad Drowsy curve: {}", err),
    }

    register_world_states(&mut app);
    register_operators(&mut app);

    app.add_systems(Startup, spawn_villagers)
        .add_systems(PostUpdate, print_new_events);

    app.run();
}
