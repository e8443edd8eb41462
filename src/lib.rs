#![doc = include_str!("../README.md")]

pub use ganglion_core::*;

#[cfg(feature = "bevy_plugin")]
pub use ganglion_bevy_plugin as bevy_plugin;

#[cfg(feature = "actionset_loader")]
pub use ganglion_actionset_loader as actionset_loader;

pub mod prelude {
    pub use ganglion_core::types::*;
    pub use ganglion_core::action_runtime::{PlanQueue, PlanStatus};
    pub use ganglion_core::action_state::ActionState;
    pub use ganglion_core::actions::{ActionDefinition, UtilityAction};
    pub use ganglion_core::actionset::{ActionSet, ActionTemplate, ConsiderationTemplate, CurveTemplate, OperatorTemplate};
    pub use ganglion_core::blackboard::{AgentMemory, Blackboard, StateKey, StateRegistry};
    pub use ganglion_core::considerations::{Consideration, Normalization};
    pub use ganglion_core::curves::{SupportedUtilityCurve, UtilityCurve, UtilityCurveExt, UtilityCurveRegistry};
    pub use ganglion_core::decision_loop::ScoreAggregation;
    pub use ganglion_core::errors::*;
    pub use ganglion_core::events::{ActionTransition, TickReport};
    pub use ganglion_core::library::ActionLibrary;
    pub use ganglion_core::operators::{
        FnOperator,
        Operator,
        OperatorContext,
        OperatorParams,
        OperatorRegistry,
        OperatorStatus,
        ParamValue,
        RememberOperator,
        TimeoutOperator,
        WaitOperator,
    };
    pub use ganglion_core::selector::{ActionSelector, SelectorConfig};
    pub use ganglion_core::world::{AgentView, AgentWorld};

    #[cfg(any(feature = "bevy_plugin", feature = "testing"))]
    pub use ganglion_bevy_plugin::*;

    #[cfg(feature = "testing")]
    pub use ganglion_test_plugin::*;

    #[cfg(feature = "actionset_loader")]
    pub use ganglion_actionset_loader::{ActionSetAsset, ActionSetAssetPlugin, ActionSetLoaded, LoadActionSetRequest};
}
