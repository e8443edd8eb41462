/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! The ActionSelector - one agent's scheduler.
//!
//! Every tick the selector first checks whether a decision is due. Decisions run on a
//! per-agent timer that is coarser than the simulation tick; stagger the first one with
//! `SelectorConfig::with_stagger()` so that a crowd of agents does not decide in lockstep.
//!
//! A decision resets the Blackboard, scores the whole catalogue and compares the winner
//! with whatever is running. Then, decision or not, the running plan (if any) is advanced
//! by one tick.
//!
//! Switching rules:
//! - Nothing running: the winner starts. No winner means the agent idles.
//! - Winner is the running action: nothing changes.
//! - Winner strictly outscores the running action and the running action can be overridden:
//!   the running plan is cancelled and the winner starts.
//! - Otherwise the running action keeps going.

use crate::action_runtime::{PlanQueue, PlanStatus};
use crate::action_state::ActionState;
use crate::actions::UtilityAction;
use crate::blackboard::{Blackboard, StateRegistry};
use crate::decision_loop::{CandidateScore, CandidateStatus, ScoreAggregation, ScoringOptions, score_candidates};
use crate::errors::CatalogueError;
use crate::events::{ActionTransition, TickReport};
use crate::operators::OperatorContext;
use crate::types::{ActionKey, ActionScore, DeltaTime, ThreadSafeRef};
use crate::world::{AgentView, AgentWorld};

pub const DEFAULT_DECISION_INTERVAL: DeltaTime = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectorConfig {
    decision_interval: DeltaTime,
    stagger: DeltaTime,
    aggregation: ScoreAggregation,
    prune_dominated: bool,
    decide_when_idle: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            decision_interval: DEFAULT_DECISION_INTERVAL,
            stagger: 0.,
            aggregation: ScoreAggregation::default(),
            prune_dominated: false,
            decide_when_idle: false,
        }
    }
}

impl SelectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decision_interval(&self) -> DeltaTime {
        self.decision_interval
    }

    pub fn stagger(&self) -> DeltaTime {
        self.stagger
    }

    pub fn aggregation(&self) -> ScoreAggregation {
        self.aggregation
    }

    pub fn prune_dominated(&self) -> bool {
        self.prune_dominated
    }

    pub fn decide_when_idle(&self) -> bool {
        self.decide_when_idle
    }

    /// Seconds between decisions. Non-positive values mean "decide every tick".
    pub fn set_decision_interval(&mut self, seconds: DeltaTime) -> &mut Self {
        self.decision_interval = match seconds.is_finite() {
            true => seconds.max(0.),
            false => DEFAULT_DECISION_INTERVAL,
        };
        self
    }

    /// Delay before the very first decision.
    pub fn set_stagger(&mut self, seconds: DeltaTime) -> &mut Self {
        self.stagger = match seconds.is_finite() {
            true => seconds.max(0.),
            false => 0.,
        };
        self
    }

    pub fn set_aggregation(&mut self, aggregation: ScoreAggregation) -> &mut Self {
        self.aggregation = aggregation;
        self
    }

    /// Skip scoring candidates whose bonus cannot beat the best score found so far.
    pub fn set_prune_dominated(&mut self, prune: bool) -> &mut Self {
        self.prune_dominated = prune;
        self
    }

    /// Decide on every tick while nothing is running, instead of waiting for the timer.
    pub fn set_decide_when_idle(&mut self, decide: bool) -> &mut Self {
        self.decide_when_idle = decide;
        self
    }

    pub fn with_decision_interval(mut self, seconds: DeltaTime) -> Self {
        self.set_decision_interval(seconds);
        self
    }

    pub fn with_stagger(mut self, seconds: DeltaTime) -> Self {
        self.set_stagger(seconds);
        self
    }

    pub fn with_aggregation(mut self, aggregation: ScoreAggregation) -> Self {
        self.set_aggregation(aggregation);
        self
    }

    pub fn with_prune_dominated(mut self, prune: bool) -> Self {
        self.set_prune_dominated(prune);
        self
    }

    pub fn with_decide_when_idle(mut self, decide: bool) -> Self {
        self.set_decide_when_idle(decide);
        self
    }
}

/// Counts down to the next decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionTimer {
    interval: DeltaTime,
    remaining: DeltaTime,
}

impl DecisionTimer {
    pub fn new(interval: DeltaTime, initial_delay: DeltaTime) -> Self {
        Self { interval, remaining: initial_delay }
    }

    /// Returns true if a decision is due this tick.
    ///
    /// Long frames never trigger more than one decision; the backlog is dropped.
    pub fn tick(&mut self, delta: DeltaTime) -> bool {
        self.remaining -= delta.max(0.);

        if self.remaining > 0. {
            return false;
        }

        self.remaining += self.interval;
        if self.remaining <= 0. {
            self.remaining = self.interval;
        }
        true
    }

    /// Makes the next `tick()` fire regardless of time.
    pub fn force(&mut self) {
        self.remaining = 0.;
    }

    pub fn remaining(&self) -> DeltaTime {
        self.remaining.max(0.)
    }
}

pub struct ActionSelector<W: AgentWorld> {
    actions: Vec<Box<dyn UtilityAction<W>>>,
    blackboard: Blackboard<W>,
    config: SelectorConfig,
    timer: DecisionTimer,
    current: Option<usize>,
    plan: Option<PlanQueue<W>>,
    state: ActionState,
    last_scores: Vec<CandidateScore>,
    last_outcome: Option<(ActionKey, ActionState)>,
    idle_announced: bool,
    asleep: bool,
    decisions: u64,
}

impl<W: AgentWorld> Default for ActionSelector<W> {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}

impl<W: AgentWorld> core::fmt::Debug for ActionSelector<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActionSelector")
            .field("actions", &self.actions.iter().map(|action| action.key()).collect::<Vec<_>>())
            .field("config", &self.config)
            .field("current", &self.current_action_key())
            .field("state", &self.state)
            .field("plan", &self.plan)
            .field("asleep", &self.asleep)
            .finish()
    }
}

impl<W: AgentWorld> ActionSelector<W> {
    pub fn new(config: SelectorConfig) -> Self {
        Self::with_blackboard(config, Blackboard::default())
    }

    /// A selector whose Blackboard knows the given world-state computations.
    pub fn with_registry(config: SelectorConfig, registry: ThreadSafeRef<StateRegistry<W>>) -> Self {
        Self::with_blackboard(config, Blackboard::new(registry))
    }

    pub fn with_blackboard(config: SelectorConfig, blackboard: Blackboard<W>) -> Self {
        Self {
            actions: Vec::new(),
            blackboard,
            config,
            timer: DecisionTimer::new(config.decision_interval, config.stagger),
            current: None,
            plan: None,
            state: ActionState::Idle,
            last_scores: Vec::new(),
            last_outcome: None,
            idle_announced: false,
            asleep: false,
            decisions: 0,
        }
    }

    /// Adds a candidate. Registration order breaks ties, first registered wins.
    pub fn register<A: UtilityAction<W> + 'static>(&mut self, action: A) -> Result<&mut Self, CatalogueError> {
        self.register_boxed(Box::new(action))
    }

    pub fn register_boxed(&mut self, action: Box<dyn UtilityAction<W>>) -> Result<&mut Self, CatalogueError> {
        let outcome = self.check_registration(action.as_ref());

        #[cfg(feature = "logging")]
        {
            if let Err(err) = &outcome {
                bevy::log::error!("Rejected action registration: {}", err);
            }
        }

        outcome?;
        self.actions.push(action);
        Ok(self)
    }

    fn check_registration(&self, action: &dyn UtilityAction<W>) -> Result<(), CatalogueError> {
        if self.actions.iter().any(|known| known.key() == action.key()) {
            return Err(CatalogueError::DuplicateActionKey(action.key().clone()));
        }

        action.validate()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn action_keys(&self) -> impl Iterator<Item = &ActionKey> {
        self.actions.iter().map(|action| action.key())
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn blackboard(&self) -> &Blackboard<W> {
        &self.blackboard
    }

    /// For seeding agent memory; not meant for use mid-decision.
    pub fn blackboard_mut(&mut self) -> &mut Blackboard<W> {
        &mut self.blackboard
    }

    /// Runs one simulation tick for `agent`.
    pub fn tick(&mut self, agent: W::Agent, world: &mut W, delta: DeltaTime) -> TickReport {
        let mut report = TickReport::default();

        if self.asleep {
            return report;
        }

        let timer_fired = self.timer.tick(delta);
        let idle_trigger = self.config.decide_when_idle && self.current.is_none();

        if timer_fired || idle_trigger {
            self.decide(agent, world, &mut report);
        }

        self.advance_plan(agent, world, delta, &mut report);
        report
    }

    /// The next tick will run a decision, whatever the timer says.
    pub fn force_decision(&mut self) {
        self.timer.force();
    }

    /// A sleeping selector ignores ticks entirely. Whatever was running stays frozen.
    pub fn sleep(&mut self) {
        self.asleep = true;
    }

    pub fn wake(&mut self) {
        self.asleep = false;
    }

    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    /// Cancels the running plan, if any, and goes idle. Use when the agent goes away.
    ///
    /// Returns true if something was actually cancelled. Calling it again is a no-op.
    pub fn shutdown(&mut self, agent: W::Agent, world: &mut W) -> bool {
        let mut report = TickReport::default();
        self.interrupt(agent, world, None, &mut report)
    }

    fn decide(&mut self, agent: W::Agent, world: &mut W, report: &mut TickReport) {
        self.blackboard.reset();
        self.decisions += 1;
        report.decided = true;

        let options = ScoringOptions {
            aggregation: self.config.aggregation,
            prune_dominated: self.config.prune_dominated,
            always_score: self.current,
        };

        let view = AgentView::new(agent, &*world);
        let best = score_candidates(&self.actions, &mut self.blackboard, view, &options, &mut self.last_scores);

        #[cfg(feature = "logging")]
        bevy::log::debug!(
            "Agent {:?}: decision #{} picked {:?}",
            agent,
            self.decisions,
            best.map(|(idx, score)| (self.actions[idx].key(), score)),
        );

        let Some((winner, winner_score)) = best else {
            if self.current.is_none() && !self.idle_announced {
                #[cfg(feature = "logging")]
                bevy::log::info!("Agent {:?}: nothing worth doing, idling", agent);

                self.idle_announced = true;
                report.transitions.push(ActionTransition::BecameIdle);
            }
            return;
        };

        let Some(current) = self.current else {
            self.start(winner, winner_score, agent, world, report);
            return;
        };

        if current == winner {
            return;
        }

        let current_score = self.score_of(current);
        if winner_score <= current_score {
            return;
        }

        if !self.actions[current].can_override() {
            #[cfg(feature = "logging")]
            bevy::log::debug!(
                "Agent {:?}: {:?} outscored {:?}, but it cannot be overridden",
                agent,
                self.actions[winner].key(),
                self.actions[current].key(),
            );
            return;
        }

        let replacement = self.actions[winner].key().clone();
        self.interrupt(agent, world, Some(replacement), report);
        self.start(winner, winner_score, agent, world, report);
    }

    fn score_of(&self, idx: usize) -> ActionScore {
        self.last_scores.get(idx).map(|candidate| candidate.score).unwrap_or_default()
    }

    fn start(&mut self, idx: usize, score: ActionScore, agent: W::Agent, world: &W, report: &mut TickReport) {
        let view = AgentView::new(agent, world);
        let action = &self.actions[idx];

        self.state = ActionState::Compiling;
        action.on_selected(&mut self.blackboard, view);
        let plan = action.compile(&mut self.blackboard, view);
        let action_key = action.key().clone();

        #[cfg(feature = "logging")]
        bevy::log::info!(
            "Agent {:?}: starting {:?} (score {}, {} Operator(s))",
            agent,
            action_key,
            score,
            plan.remaining(),
        );

        self.current = Some(idx);
        self.plan = Some(plan);
        self.state = ActionState::Running;
        self.idle_announced = false;

        report.transitions.push(ActionTransition::Picked { action_key, action_score: score });
    }

    fn interrupt(&mut self, agent: W::Agent, world: &mut W, replaced_by: Option<ActionKey>, report: &mut TickReport) -> bool {
        let Some(current) = self.current.take() else {
            return false;
        };

        if let Some(mut plan) = self.plan.take() {
            let mut ctx = OperatorContext::new(agent, world, &mut self.blackboard);
            plan.cancel(&mut ctx);
        }

        let action_key = self.actions[current].key().clone();

        #[cfg(feature = "logging")]
        bevy::log::info!("Agent {:?}: interrupted {:?} (replaced by {:?})", agent, action_key, replaced_by);

        self.state = ActionState::Idle;
        self.last_outcome = Some((action_key.clone(), ActionState::Interrupted));
        report.transitions.push(ActionTransition::Interrupted { action_key, replaced_by });
        true
    }

    fn advance_plan(&mut self, agent: W::Agent, world: &mut W, delta: DeltaTime, report: &mut TickReport) {
        let Some(plan) = self.plan.as_mut() else {
            return;
        };

        let mut ctx = OperatorContext::new(agent, world, &mut self.blackboard);
        let status = plan.advance(&mut ctx, delta);
        report.plan_status = Some(status);

        if status == PlanStatus::Running {
            return;
        }

        let outcome = ActionState::from(status);
        self.plan = None;
        self.state = ActionState::Idle;

        if let Some(current) = self.current.take() {
            let action_key = self.actions[current].key().clone();

            #[cfg(feature = "logging")]
            bevy::log::info!("Agent {:?}: {:?} finished as {:?}", agent, action_key, outcome);

            self.last_outcome = Some((action_key.clone(), outcome));
            report.transitions.push(ActionTransition::Finished { action_key, outcome });
        }
    }

    /// The running action, if any.
    pub fn current_action_key(&self) -> Option<&ActionKey> {
        self.current.map(|idx| self.actions[idx].key())
    }

    pub fn current_state(&self) -> ActionState {
        self.state
    }

    /// Scores from the most recent decision, in registration order.
    pub fn last_scores(&self) -> &[CandidateScore] {
        &self.last_scores
    }

    /// The action's score in the most recent decision. `None` if it was not fully scored
    /// (pruned or ineligible); see `last_scores()` for the reason.
    pub fn last_score_of(&self, key: &str) -> Option<ActionScore> {
        self.last_scores
            .iter()
            .find(|candidate| candidate.key.as_str() == key)
            .filter(|candidate| candidate.status == CandidateStatus::Scored)
            .map(|candidate| candidate.score)
    }

    /// How the most recently ended action ended.
    pub fn last_outcome(&self) -> Option<(&ActionKey, ActionState)> {
        self.last_outcome.as_ref().map(|(key, state)| (key, *state))
    }

    pub fn plan(&self) -> Option<&PlanQueue<W>> {
        self.plan.as_ref()
    }

    pub fn decisions_made(&self) -> u64 {
        self.decisions
    }

    /// A one-line summary for debug overlays.
    pub fn describe(&self) -> String {
        let current = match (self.current_action_key(), &self.plan) {
            (Some(key), Some(plan)) => alloc::format!(
                "{} [{:?}, {} done, {} left, at {}]",
                key,
                self.state,
                plan.completed(),
                plan.remaining(),
                plan.current_operator_name().unwrap_or("-"),
            ),
            (Some(key), None) => alloc::format!("{} [{:?}]", key, self.state),
            (None, _) => String::from("<idle>"),
        };

        let scores = self.last_scores
            .iter()
            .map(|candidate| alloc::format!("{}={:.3}", candidate.key, candidate.score))
            .collect::<Vec<_>>()
            .join(", ");

        alloc::format!(
            "{}{} | decisions: {} | scores: {}",
            current,
            match self.asleep { true => " (asleep)", false => "" },
            self.decisions,
            scores,
        )
    }
}
