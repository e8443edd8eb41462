//! Actions - the candidate behaviors an agent chooses between.
//!
//! An action is a key, a list of Considerations, a bonus multiplier, an interruption policy
//! and a way to compile itself into a plan. Implement `UtilityAction` yourself for actions
//! with non-trivial logic, or describe simple ones with `ActionDefinition`.
use bevy::platform::sync::Arc;

use crate::action_runtime::PlanQueue;
use crate::blackboard::Blackboard;
use crate::considerations::Consideration;
use crate::decision_loop::{ScoreAggregation, aggregate_considerations, sanitize_score};
use crate::errors::CatalogueError;
use crate::types::{ActionKey, ActionScore, MAX_CONSIDERATION_SCORE, MIN_CONSIDERATION_SCORE};
use crate::world::{AgentView, AgentWorld};

pub trait UtilityAction<W: AgentWorld>: Send + Sync {
    /// Unique within a selector.
    fn key(&self) -> &ActionKey;

    fn considerations(&self) -> &[Consideration<W>];

    /// Multiplier applied after aggregation; makes some actions intrinsically more urgent.
    fn bonus(&self) -> ActionScore {
        MAX_CONSIDERATION_SCORE
    }

    /// Upper bound on what `compute_score()` can return. Pruning skips candidates whose
    /// ceiling cannot beat the best score so far; override it alongside `compute_score()`.
    fn max_score(&self) -> ActionScore {
        self.bonus()
    }

    /// Whether a strictly better-scoring action may interrupt this one while it runs.
    fn can_override(&self) -> bool {
        true
    }

    /// Cheap gate evaluated before scoring. Actions that cannot run score 0.
    fn can_run(&self, _blackboard: &mut Blackboard<W>, _view: AgentView<'_, W>) -> bool {
        true
    }

    /// Product of the Consideration scores (zero vetoes), aggregated, times the bonus.
    ///
    /// Must not mutate the world; reads go through the Blackboard.
    fn compute_score(
        &self,
        blackboard: &mut Blackboard<W>,
        view: AgentView<'_, W>,
        aggregation: &ScoreAggregation,
    ) -> ActionScore {
        let aggregated = aggregate_considerations(self.considerations(), blackboard, view, aggregation);

        match aggregated <= MIN_CONSIDERATION_SCORE {
            true => MIN_CONSIDERATION_SCORE,
            false => sanitize_score(aggregated * self.bonus()),
        }
    }

    /// Runs once when the action wins a decision, right before `compile()`.
    ///
    /// The place to stash derived values (a chosen target, say) in agent memory.
    fn on_selected(&self, _blackboard: &mut Blackboard<W>, _view: AgentView<'_, W>) {}

    /// Builds the plan that carries the action out. Called every time the action is selected.
    fn compile(&self, blackboard: &mut Blackboard<W>, view: AgentView<'_, W>) -> PlanQueue<W>;

    /// Checked on registration.
    fn validate(&self) -> Result<(), CatalogueError> {
        let bonus = self.bonus();
        match bonus.is_finite() && bonus >= 0. {
            true => Ok(()),
            false => Err(CatalogueError::InvalidBonus { action: self.key().clone(), bonus }),
        }
    }
}

type Precondition<W> = Arc<dyn Fn(&mut Blackboard<W>, AgentView<'_, W>) -> bool + Send + Sync>;
type Planner<W> = Arc<dyn Fn(&mut Blackboard<W>, AgentView<'_, W>) -> PlanQueue<W> + Send + Sync>;
type SelectedHook<W> = Arc<dyn Fn(&mut Blackboard<W>, AgentView<'_, W>) + Send + Sync>;

fn precondition<W, F>(func: F) -> Precondition<W>
where
    W: AgentWorld,
    F: Fn(&mut Blackboard<W>, AgentView<'_, W>) -> bool + Send + Sync + 'static,
{
    Arc::new(func)
}

fn planner<W, F>(func: F) -> Planner<W>
where
    W: AgentWorld,
    F: Fn(&mut Blackboard<W>, AgentView<'_, W>) -> PlanQueue<W> + Send + Sync + 'static,
{
    Arc::new(func)
}

fn selected_hook<W, F>(func: F) -> SelectedHook<W>
where
    W: AgentWorld,
    F: Fn(&mut Blackboard<W>, AgentView<'_, W>) + Send + Sync + 'static,
{
    Arc::new(func)
}

/// A `UtilityAction` assembled from parts.
///
/// Without a plan builder, the action compiles to an empty plan (which fails straight away).
pub struct ActionDefinition<W: AgentWorld> {
    key: ActionKey,
    considerations: Vec<Consideration<W>>,
    bonus: ActionScore,
    can_override: bool,
    precondition: Option<Precondition<W>>,
    planner: Option<Planner<W>>,
    on_selected: Option<SelectedHook<W>>,
}

impl<W: AgentWorld> Clone for ActionDefinition<W> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            considerations: self.considerations.clone(),
            bonus: self.bonus,
            can_override: self.can_override,
            precondition: self.precondition.clone(),
            planner: self.planner.clone(),
            on_selected: self.on_selected.clone(),
        }
    }
}

impl<W: AgentWorld> core::fmt::Debug for ActionDefinition<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("key", &self.key)
            .field("considerations", &self.considerations)
            .field("bonus", &self.bonus)
            .field("can_override", &self.can_override)
            .field("has_precondition", &self.precondition.is_some())
            .field("has_planner", &self.planner.is_some())
            .finish()
    }
}

impl<W: AgentWorld> ActionDefinition<W> {
    pub fn new<IS: Into<ActionKey>>(key: IS) -> Self {
        Self {
            key: key.into(),
            considerations: Vec::new(),
            bonus: MAX_CONSIDERATION_SCORE,
            can_override: true,
            precondition: None,
            planner: None,
            on_selected: None,
        }
    }

    pub fn with_consideration(mut self, consideration: Consideration<W>) -> Self {
        self.considerations.push(consideration);
        self
    }

    pub fn with_considerations<I: IntoIterator<Item = Consideration<W>>>(mut self, considerations: I) -> Self {
        self.considerations.extend(considerations);
        self
    }

    pub fn with_bonus(mut self, bonus: ActionScore) -> Self {
        self.bonus = bonus;
        self
    }

    pub fn with_can_override(mut self, can_override: bool) -> Self {
        self.can_override = can_override;
        self
    }

    pub fn with_precondition<F>(mut self, func: F) -> Self
    where
        F: Fn(&mut Blackboard<W>, AgentView<'_, W>) -> bool + Send + Sync + 'static,
    {
        self.precondition = Some(precondition(func));
        self
    }

    pub fn with_plan<F>(mut self, func: F) -> Self
    where
        F: Fn(&mut Blackboard<W>, AgentView<'_, W>) -> PlanQueue<W> + Send + Sync + 'static,
    {
        self.planner = Some(planner(func));
        self
    }

    pub fn with_on_selected<F>(mut self, func: F) -> Self
    where
        F: Fn(&mut Blackboard<W>, AgentView<'_, W>) + Send + Sync + 'static,
    {
        self.on_selected = Some(selected_hook(func));
        self
    }
}

impl<W: AgentWorld> UtilityAction<W> for ActionDefinition<W> {
    fn key(&self) -> &ActionKey {
        &self.key
    }

    fn considerations(&self) -> &[Consideration<W>] {
        &self.considerations
    }

    fn bonus(&self) -> ActionScore {
        self.bonus
    }

    fn can_override(&self) -> bool {
        self.can_override
    }

    fn can_run(&self, blackboard: &mut Blackboard<W>, view: AgentView<'_, W>) -> bool {
        match &self.precondition {
            Some(check) => check(blackboard, view),
            None => true,
        }
    }

    fn on_selected(&self, blackboard: &mut Blackboard<W>, view: AgentView<'_, W>) {
        if let Some(hook) = &self.on_selected {
            hook(blackboard, view)
        }
    }

    fn compile(&self, blackboard: &mut Blackboard<W>, view: AgentView<'_, W>) -> PlanQueue<W> {
        match &self.planner {
            Some(build) => build(blackboard, view),
            None => PlanQueue::empty(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::{StateKey, StateRegistry};
    use crate::curves::{Inverted, LinearCurve, SupportedUtilityCurve};
    use crate::operators::WaitOperator;
    use crate::types::ThreadSafeRef;
    use crate::world::testing::{AGENT, TestWorld};

    fn health() -> StateKey<f32> {
        StateKey::new("Health")
    }

    fn blackboard() -> Blackboard<TestWorld> {
        let mut registry = StateRegistry::<TestWorld>::default();
        registry.register_measurement(&health(), |view, _memory| {
            Ok(view.world.numbers.get("health").copied().unwrap_or_default())
        });
        Blackboard::new(ThreadSafeRef::new(registry))
    }

    fn heal() -> ActionDefinition<TestWorld> {
        ActionDefinition::new("Heal")
            .with_consideration(Consideration::from_state(&health(), SupportedUtilityCurve::AntiLinear(Inverted::new(LinearCurve))))
            .with_bonus(1.5)
            .with_plan(|_blackboard: &mut Blackboard<TestWorld>, _view: AgentView<'_, TestWorld>| {
                PlanQueue::empty().then(WaitOperator::new(1.0))
            })
    }

    #[test]
    fn score_is_product_times_bonus() {
        let world = TestWorld::default().with_number("health", 0.25);
        let view = AgentView::new(AGENT, &world);
        let mut blackboard = blackboard();

        let score = heal().compute_score(&mut blackboard, view, &ScoreAggregation::Product);
        assert!((score - 1.125).abs() < 1e-6);
    }

    #[test]
    fn zero_consideration_ignores_bonus() {
        let world = TestWorld::default().with_number("health", 1.0);
        let view = AgentView::new(AGENT, &world);
        let mut blackboard = blackboard();

        let action = heal().with_bonus(100.);
        assert_eq!(action.compute_score(&mut blackboard, view, &ScoreAggregation::Product), 0.0);
    }

    #[test]
    fn compute_score_is_stable_within_a_cycle() {
        let mut blackboard = blackboard();
        let action = heal();

        let before = TestWorld::default().with_number("health", 0.25);
        let first = action.compute_score(&mut blackboard, AgentView::new(AGENT, &before), &ScoreAggregation::Product);

        let after = TestWorld::default().with_number("health", 0.75);
        let second = action.compute_score(&mut blackboard, AgentView::new(AGENT, &after), &ScoreAggregation::Product);
        assert_eq!(first, second);
        assert!((first - 1.125).abs() < 1e-6);

        blackboard.reset();
        let refreshed = action.compute_score(&mut blackboard, AgentView::new(AGENT, &after), &ScoreAggregation::Product);
        assert!((refreshed - 0.375).abs() < 1e-6);
    }

    #[test]
    fn bad_bonus_is_rejected() {
        assert!(heal().validate().is_ok());
        assert!(matches!(heal().with_bonus(-1.).validate(), Err(CatalogueError::InvalidBonus { .. })));
        assert!(heal().with_bonus(f32::NAN).validate().is_err());
    }

    #[test]
    fn compile_and_selection_hooks() {
        let world = TestWorld::default();
        let view = AgentView::new(AGENT, &world);
        let mut blackboard = blackboard();
        let target = StateKey::<u32>::new("Target");

        let hooked_target = target.clone();
        let action = heal().with_on_selected(move |blackboard: &mut Blackboard<TestWorld>, _view: AgentView<'_, TestWorld>| {
            blackboard.remember(&hooked_target, 3)
        });

        action.on_selected(&mut blackboard, view);
        assert_eq!(blackboard.recall(&target), Some(3));
        assert_eq!(action.compile(&mut blackboard, view).remaining(), 1);

        let bare = ActionDefinition::<TestWorld>::new("Bare");
        assert_eq!(bare.compile(&mut blackboard, view).remaining(), 0);
    }
}
