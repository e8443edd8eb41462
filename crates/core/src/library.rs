/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! The ActionLibrary - everything needed to turn authored ActionSets into live selectors.
//!
//! It bundles the three registries authored data refers to by name (curves, world-state
//! measurements, Operator factories) and validates templates against them. Malformed data
//! is rejected here, at build time; nothing that makes it through can fail to score later.
//!
//! Registries are shared with the selectors built from them through `ThreadSafeRef`s.
//! Registering more entries later is copy-on-write: existing selectors keep what they saw.

use crate::action_runtime::PlanQueue;
use crate::actions::ActionDefinition;
use crate::actionset::{ActionSet, ActionTemplate, ConsiderationTemplate, OperatorTemplate};
use crate::blackboard::{Blackboard, StateRegistry};
use crate::considerations::Consideration;
use crate::curves::{SupportedUtilityCurve, UtilityCurveRegistry};
use crate::errors::{CatalogueError, NoCurveMatchStrategy};
use crate::operators::OperatorRegistry;
use crate::selector::{ActionSelector, SelectorConfig};
use crate::types::{ActionKey, ThreadSafeRef};
use crate::world::{AgentView, AgentWorld};

/// What to do with one authored Consideration.
enum CurveResolution {
    Use(SupportedUtilityCurve),
    SkipConsideration,
    SkipAction,
}

pub struct ActionLibrary<W: AgentWorld> {
    curves: UtilityCurveRegistry,
    states: ThreadSafeRef<StateRegistry<W>>,
    operators: ThreadSafeRef<OperatorRegistry<W>>,
    no_curve_match: NoCurveMatchStrategy,
}

impl<W: AgentWorld> Default for ActionLibrary<W> {
    fn default() -> Self {
        Self {
            curves: UtilityCurveRegistry::default(),
            states: ThreadSafeRef::new(StateRegistry::default()),
            operators: ThreadSafeRef::new(OperatorRegistry::with_builtins()),
            no_curve_match: NoCurveMatchStrategy::default(),
        }
    }
}

impl<W: AgentWorld> Clone for ActionLibrary<W> {
    fn clone(&self) -> Self {
        Self {
            curves: self.curves.clone(),
            states: self.states.clone(),
            operators: self.operators.clone(),
            no_curve_match: self.no_curve_match.clone(),
        }
    }
}

impl<W: AgentWorld> ActionLibrary<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_no_curve_match(mut self, strategy: NoCurveMatchStrategy) -> Self {
        self.no_curve_match = strategy;
        self
    }

    pub fn set_no_curve_match(&mut self, strategy: NoCurveMatchStrategy) -> &mut Self {
        self.no_curve_match = strategy;
        self
    }

    pub fn curves(&self) -> &UtilityCurveRegistry {
        &self.curves
    }

    pub fn curves_mut(&mut self) -> &mut UtilityCurveRegistry {
        &mut self.curves
    }

    pub fn states(&self) -> &ThreadSafeRef<StateRegistry<W>> {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut StateRegistry<W> {
        self.states.make_mut()
    }

    pub fn operators(&self) -> &OperatorRegistry<W> {
        &self.operators
    }

    pub fn operators_mut(&mut self) -> &mut OperatorRegistry<W> {
        self.operators.make_mut()
    }

    /// A fresh Blackboard wired to this library's world-state computations.
    pub fn new_blackboard(&self) -> Blackboard<W> {
        Blackboard::new(self.states.clone())
    }

    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    fn resolve_curve(&self, action: &ActionKey, template: &ConsiderationTemplate) -> Result<CurveResolution, CatalogueError> {
        let err = match template.curve.resolve(&self.curves) {
            Ok(curve) => return Ok(CurveResolution::Use(curve)),
            Err(err @ CatalogueError::UnknownCurve(_)) => err,
            Err(err) => return Err(err),
        };

        match &self.no_curve_match {
            NoCurveMatchStrategy::Reject => {
                #[cfg(feature = "logging")]
                bevy::log::error!("Action {:?}: {}", action, err);
                Err(err)
            },
            NoCurveMatchStrategy::SkipConsiderationWithLog => {
                #[cfg(feature = "logging")]
                bevy::log::warn!("Action {:?}: {} - skipping the Consideration on {:?}", action, err, template.state);
                Ok(CurveResolution::SkipConsideration)
            },
            NoCurveMatchStrategy::SkipActionWithLog => {
                #[cfg(feature = "logging")]
                bevy::log::warn!("Action {:?}: {} - skipping the whole action", action, err);
                Ok(CurveResolution::SkipAction)
            },
            NoCurveMatchStrategy::DefaultCurveWithLog(curve) => {
                #[cfg(feature = "logging")]
                bevy::log::warn!("Action {:?}: {} - substituting {:?}", action, err, curve);
                Ok(CurveResolution::Use(curve.clone()))
            },
            NoCurveMatchStrategy::DefaultCurveWithoutLog(curve) => Ok(CurveResolution::Use(curve.clone())),
        }
    }

    /// Builds one action. `Ok(None)` means the curve-matching strategy chose to leave it out.
    pub fn build_action(&self, template: &ActionTemplate) -> Result<Option<ActionDefinition<W>>, CatalogueError> {
        let mut considerations = Vec::with_capacity(template.considerations.len());

        for consideration in &template.considerations {
            self.states.validate_measurement(&consideration.state)?;

            let curve = match self.resolve_curve(&template.key, consideration)? {
                CurveResolution::Use(curve) => curve,
                CurveResolution::SkipConsideration => continue,
                CurveResolution::SkipAction => return Ok(None),
            };

            let mut built = Consideration::from_measurement(consideration.state.clone(), curve);
            if let Some(normalization) = consideration.normalization {
                normalization.validate()?;
                built = built.with_normalization(normalization);
            }
            considerations.push(built);
        }

        for step in &template.plan {
            self.operators.validate(&step.operator, &step.params)?;
        }

        let steps = template.plan.clone();
        let operators = self.operators.clone();
        let action_key = template.key.clone();

        let action = ActionDefinition::new(template.key.clone())
            .with_considerations(considerations)
            .with_bonus(template.bonus)
            .with_can_override(template.can_override)
            .with_plan(move |blackboard: &mut Blackboard<W>, view: AgentView<'_, W>| {
                compile_steps(&operators, &steps, &action_key, blackboard, view)
            });

        // Bonus checks live with the action itself.
        crate::actions::UtilityAction::validate(&action)?;
        Ok(Some(action))
    }

    /// Builds every action of a set, in order. Any error rejects the whole set.
    pub fn build_actions(&self, set: &ActionSet) -> Result<Vec<ActionDefinition<W>>, CatalogueError> {
        let mut built: Vec<ActionDefinition<W>> = Vec::with_capacity(set.actions.len());

        for template in &set.actions {
            if set.actions.iter().filter(|other| other.key == template.key).count() > 1 {
                return Err(CatalogueError::DuplicateActionKey(template.key.clone()));
            }

            if let Some(action) = self.build_action(template)? {
                built.push(action);
            }
        }

        Ok(built)
    }

    /// A ready-to-tick selector running the given set.
    pub fn build_selector(&self, set: &ActionSet, config: SelectorConfig) -> Result<ActionSelector<W>, CatalogueError> {
        let mut selector = ActionSelector::with_registry(config, self.states.clone());

        for action in self.build_actions(set)? {
            selector.register(action)?;
        }

        #[cfg(feature = "logging")]
        bevy::log::debug!("Built a selector for ActionSet {:?} with {} action(s)", set.name, selector.len());

        Ok(selector)
    }
}

fn compile_steps<W: AgentWorld>(
    operators: &OperatorRegistry<W>,
    steps: &[OperatorTemplate],
    _action_key: &ActionKey,
    blackboard: &mut Blackboard<W>,
    view: AgentView<'_, W>,
) -> PlanQueue<W> {
    let mut built = Vec::with_capacity(steps.len());

    for step in steps {
        match operators.build(&step.operator, &step.params, blackboard, view) {
            Ok(operator) => built.push(operator),
            Err(_err) => {
                #[cfg(feature = "logging")]
                bevy::log::debug!(
                    "Action {:?}: could not build Operator {:?} ({}); the plan fails",
                    _action_key,
                    step.operator,
                    _err
                );
                return PlanQueue::failed();
            },
        }
    }

    PlanQueue::new(built)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::UtilityAction;
    use crate::actionset::CurveTemplate;
    use crate::blackboard::StateKey;
    use crate::errors::OperatorBuildError;
    use crate::action_runtime::PlanStatus;
    use crate::action_state::ActionState;
    use crate::decision_loop::ScoreAggregation;
    use crate::operators::{Operator, OperatorContext, OperatorParams};
    use crate::world::testing::{AGENT, TestWorld};

    fn library() -> ActionLibrary<TestWorld> {
        let mut library = ActionLibrary::<TestWorld>::new();

        library.states_mut()
            .register_measurement(&StateKey::<bool>::new("HasWeapon"), |view, _memory| {
                Ok(view.world.flags.get("weapon").copied().unwrap_or_default())
            })
            .register_measurement(&StateKey::<f32>::new("Distance"), |view, _memory| {
                Ok(view.world.numbers.get("distance").copied().unwrap_or_default())
            });

        library.operators_mut().register("Shout", &["line"], |params: &OperatorParams, _blackboard: &mut Blackboard<TestWorld>, _view: AgentView<'_, TestWorld>| {
            let line = params.text("line")?.to_string();
            if line.is_empty() {
                return Err(OperatorBuildError::Unavailable("nothing to shout".into()));
            }
            let shout = crate::operators::FnOperator::new("Shout", move |ctx: &mut OperatorContext<'_, TestWorld>, _delta: f32| {
                ctx.world.log.push(line.clone());
                crate::operators::OperatorStatus::Succeeded
            });
            Ok(Box::new(shout) as Box<dyn Operator<TestWorld>>)
        });

        library
    }

    fn guard_set() -> ActionSet {
        ActionSet::new("Guard")
            .with_action(
                ActionTemplate::new("Attack")
                    .with_consideration(ConsiderationTemplate::new("HasWeapon", CurveTemplate::Bool))
            )
            .with_action(
                ActionTemplate::new("Flee")
                    .with_bonus(0.5)
                    .with_consideration(ConsiderationTemplate::new("Distance", CurveTemplate::AntiLinear).normalized(0., 20.))
                    .with_step(OperatorTemplate::new("Shout").with_params(OperatorParams::new().with("line", "Run!")))
                    .with_step(OperatorTemplate::new("Wait").with_params(OperatorParams::new().with("seconds", 1.0)))
            )
    }

    #[test]
    fn builds_a_working_selector() {
        let library = library();
        let mut selector = library.build_selector(&guard_set(), SelectorConfig::default()).unwrap();
        let mut world = TestWorld::default().with_flag("weapon", false).with_number("distance", 10.);

        let report = selector.tick(AGENT, &mut world, 0.1);

        assert_eq!(selector.last_score_of("Attack"), Some(0.0));
        assert_eq!(selector.last_score_of("Flee"), Some(0.25));
        assert_eq!(report.picked().map(|key| key.as_str()), Some("Flee"));
        assert_eq!(world.log, vec!["Run!"]);
    }

    #[test]
    fn unknown_names_are_rejected_up_front() {
        let library = library();

        let unknown_state = ActionTemplate::new("Sniff")
            .with_consideration(ConsiderationTemplate::new("Smell", CurveTemplate::Linear));
        assert_eq!(
            library.build_action(&unknown_state).map(|built| built.is_some()),
            Err(CatalogueError::UnknownStateKey("Smell".into()))
        );

        let unknown_operator = ActionTemplate::new("Fly").with_step(OperatorTemplate::new("Flap"));
        assert!(matches!(library.build_action(&unknown_operator), Err(CatalogueError::UnknownOperator(_))));

        let missing_param = ActionTemplate::new("Nap").with_step(OperatorTemplate::new("Wait"));
        assert!(matches!(library.build_action(&missing_param), Err(CatalogueError::MissingOperatorParam { .. })));

        let bad_normalization = ActionTemplate::new("Flee")
            .with_consideration(ConsiderationTemplate::new("Distance", CurveTemplate::Linear).normalized(3., 3.));
        assert!(matches!(library.build_action(&bad_normalization), Err(CatalogueError::InvalidNormalization { .. })));

        let bad_bonus = ActionTemplate::new("Greedy").with_bonus(-2.);
        assert!(matches!(library.build_action(&bad_bonus), Err(CatalogueError::InvalidBonus { .. })));

        let twice = ActionSet::new("Twice")
            .with_action(ActionTemplate::new("Same"))
            .with_action(ActionTemplate::new("Same"));
        assert!(matches!(library.build_actions(&twice), Err(CatalogueError::DuplicateActionKey(_))));
    }

    #[test]
    fn curve_matching_strategies() {
        let template = ActionTemplate::new("Odd")
            .with_consideration(ConsiderationTemplate::new("HasWeapon", CurveTemplate::preset("Wobbly")))
            .with_consideration(ConsiderationTemplate::new("Distance", CurveTemplate::Linear).normalized(0., 10.));

        let world = TestWorld::default().with_flag("weapon", true).with_number("distance", 5.);
        let view = AgentView::new(AGENT, &world);

        let strict = library();
        assert!(matches!(strict.build_action(&template), Err(CatalogueError::UnknownCurve(_))));

        let skip_consideration = library().with_no_curve_match(NoCurveMatchStrategy::skip_consideration());
        let action = skip_consideration.build_action(&template).unwrap().unwrap();
        assert_eq!(action.considerations().len(), 1);

        let skip_action = library().with_no_curve_match(NoCurveMatchStrategy::skip_action());
        assert!(skip_action.build_action(&template).unwrap().is_none());

        let substitute = library().with_no_curve_match(NoCurveMatchStrategy::default_curve(
            SupportedUtilityCurve::constant(0.5).unwrap(),
            false,
        ));
        let action = substitute.build_action(&template).unwrap().unwrap();
        let mut blackboard = substitute.new_blackboard();
        assert_eq!(action.compute_score(&mut blackboard, view, &ScoreAggregation::Product), 0.25);
    }

    #[test]
    fn operator_factory_errors_fail_the_plan() {
        let library = library();
        let template = ActionTemplate::new("Mumble")
            .with_step(OperatorTemplate::new("Shout").with_params(OperatorParams::new().with("line", "")));

        let action = library.build_action(&template).unwrap().unwrap();
        let mut world = TestWorld::default();
        let mut blackboard = library.new_blackboard();

        let mut plan = action.compile(&mut blackboard, AgentView::new(AGENT, &world));
        assert_eq!(plan.status(), PlanStatus::Failed);

        let mut ctx = OperatorContext::new(AGENT, &mut world, &mut blackboard);
        assert_eq!(ActionState::from(plan.advance(&mut ctx, 0.1)), ActionState::Failed);
    }
}
