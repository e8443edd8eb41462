/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! The PlanQueue - an ordered sequence of Operators executed one at a time.
//!
//! Only the head Operator ever runs. It is started lazily on its first tick, advanced once
//! per tick and dequeued when it succeeds; the next one gets its first tick on the next
//! `advance()`. If the head fails, whatever is left of the plan is dropped unexecuted.
//!
//! Cancelling a plan notifies the head Operator (and only the head) exactly once,
//! whether or not it has been advanced yet. Operators further down the queue never
//! learn they existed.

use alloc::collections::VecDeque;

use bevy::reflect::Reflect;

use crate::operators::{Operator, OperatorContext, OperatorStatus};
use crate::types::DeltaTime;
use crate::world::AgentWorld;

/// Where a whole plan is at.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Reflect)]
pub enum PlanStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl PlanStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

pub struct PlanQueue<W: AgentWorld> {
    operators: VecDeque<Box<dyn Operator<W>>>,
    head_started: bool,
    completed: usize,
    status: PlanStatus,
}

impl<W: AgentWorld> Default for PlanQueue<W> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<W: AgentWorld> core::fmt::Debug for PlanQueue<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PlanQueue")
            .field("operators", &self.operators.iter().map(|op| op.name()).collect::<Vec<_>>())
            .field("head_started", &self.head_started)
            .field("completed", &self.completed)
            .field("status", &self.status)
            .finish()
    }
}

impl<W: AgentWorld> FromIterator<Box<dyn Operator<W>>> for PlanQueue<W> {
    fn from_iter<I: IntoIterator<Item = Box<dyn Operator<W>>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<W: AgentWorld> PlanQueue<W> {
    pub fn new(operators: Vec<Box<dyn Operator<W>>>) -> Self {
        Self {
            operators: operators.into(),
            head_started: false,
            completed: 0,
            status: PlanStatus::Running,
        }
    }

    /// A plan with nothing to do. It fails on its first tick.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// A plan that is already over; e.g. because it could not be compiled.
    pub fn failed() -> Self {
        let mut plan = Self::empty();
        plan.status = PlanStatus::Failed;
        plan
    }

    /// Builder-style append.
    pub fn then<O: Operator<W> + 'static>(mut self, operator: O) -> Self {
        self.push(Box::new(operator));
        self
    }

    pub fn push(&mut self, operator: Box<dyn Operator<W>>) {
        self.operators.push_back(operator);
    }

    pub fn status(&self) -> PlanStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// Operators still queued, including the head.
    pub fn remaining(&self) -> usize {
        self.operators.len()
    }

    /// Operators that already succeeded.
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn current_operator_name(&self) -> Option<&str> {
        self.operators.front().map(|op| op.name())
    }

    /// Advances the head Operator by one tick. A no-op once the plan is finished.
    pub fn advance(&mut self, ctx: &mut OperatorContext<'_, W>, delta: DeltaTime) -> PlanStatus {
        if self.status.is_finished() {
            return self.status;
        }

        let Some(head) = self.operators.front_mut() else {
            // Nothing was ever queued; an empty plan accomplishes nothing.
            self.status = match self.completed {
                0 => PlanStatus::Failed,
                _ => PlanStatus::Succeeded,
            };
            return self.status;
        };

        if !self.head_started {
            head.startup(ctx);
            self.head_started = true;
        }

        match head.advance(ctx, delta) {
            OperatorStatus::Running => {},

            OperatorStatus::Succeeded => {
                self.operators.pop_front();
                self.head_started = false;
                self.completed += 1;

                if self.operators.is_empty() {
                    self.status = PlanStatus::Succeeded;
                }
            },

            OperatorStatus::Failed => {
                #[cfg(feature = "logging")]
                bevy::log::debug!(
                    "Operator {:?} failed for {:?}; dropping {} queued Operator(s)",
                    self.current_operator_name(),
                    ctx.agent,
                    self.operators.len().saturating_sub(1),
                );

                self.operators.clear();
                self.head_started = false;
                self.status = PlanStatus::Failed;
            },
        }

        self.status
    }

    /// Cancels the plan. Returns false if it had already finished, in which case nothing happens.
    pub fn cancel(&mut self, ctx: &mut OperatorContext<'_, W>) -> bool {
        if self.status.is_finished() {
            return false;
        }

        if let Some(head) = self.operators.front_mut() {
            head.cancel(ctx);
        }

        self.operators.clear();
        self.head_started = false;
        self.status = PlanStatus::Cancelled;
        true
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::Blackboard;
    use crate::operators::FnOperator;
    use crate::world::testing::{AGENT, TestWorld};

    /// Logs every lifecycle call into the world and reports a scripted sequence of statuses.
    fn scripted(name: &'static str, mut script: Vec<OperatorStatus>) -> impl Operator<TestWorld> + 'static {
        script.reverse();
        let mut started = false;

        FnOperator::new(name, move |ctx: &mut OperatorContext<'_, TestWorld>, _delta: DeltaTime| {
            if !started {
                started = true;
                ctx.world.log.push(format!("{} start", name));
            }
            ctx.world.log.push(format!("{} advance", name));
            script.pop().unwrap_or(OperatorStatus::Succeeded)
        })
        .with_cancel(move |ctx: &mut OperatorContext<'_, TestWorld>| ctx.world.log.push(format!("{} cancel", name)))
    }

    fn tick(plan: &mut PlanQueue<TestWorld>, world: &mut TestWorld, blackboard: &mut Blackboard<TestWorld>) -> PlanStatus {
        let mut ctx = OperatorContext::new(AGENT, world, blackboard);
        plan.advance(&mut ctx, 0.1)
    }

    #[test]
    fn runs_operators_in_order_one_per_tick() {
        let mut world = TestWorld::default();
        let mut blackboard = Blackboard::default();

        let mut plan = PlanQueue::empty()
            .then(scripted("op1", vec![OperatorStatus::Running, OperatorStatus::Succeeded]))
            .then(scripted("op2", vec![OperatorStatus::Succeeded]));

        assert_eq!(tick(&mut plan, &mut world, &mut blackboard), PlanStatus::Running);
        assert_eq!(tick(&mut plan, &mut world, &mut blackboard), PlanStatus::Running);
        assert_eq!(plan.current_operator_name(), Some("op2"));
        assert_eq!(tick(&mut plan, &mut world, &mut blackboard), PlanStatus::Succeeded);
        assert_eq!(plan.completed(), 2);

        assert_eq!(
            world.log,
            vec!["op1 start", "op1 advance", "op1 advance", "op2 start", "op2 advance"]
        );

        // Finished plans stay finished.
        assert_eq!(tick(&mut plan, &mut world, &mut blackboard), PlanStatus::Succeeded);
        assert_eq!(world.log.len(), 5);
    }

    #[test]
    fn failure_drops_the_rest() {
        let mut world = TestWorld::default();
        let mut blackboard = Blackboard::default();

        let mut plan = PlanQueue::empty()
            .then(scripted("op1", vec![OperatorStatus::Succeeded]))
            .then(scripted("op2", vec![OperatorStatus::Failed]))
            .then(scripted("op3", vec![OperatorStatus::Succeeded]));

        assert_eq!(tick(&mut plan, &mut world, &mut blackboard), PlanStatus::Running);
        assert_eq!(tick(&mut plan, &mut world, &mut blackboard), PlanStatus::Failed);
        assert_eq!(plan.remaining(), 0);
        assert!(world.log.iter().all(|line| !line.starts_with("op3")));
    }

    #[test]
    fn empty_plans_fail() {
        let mut world = TestWorld::default();
        let mut blackboard = Blackboard::default();

        let mut plan = PlanQueue::empty();
        assert_eq!(tick(&mut plan, &mut world, &mut blackboard), PlanStatus::Failed);
        assert_eq!(PlanQueue::<TestWorld>::failed().status(), PlanStatus::Failed);
    }

    #[test]
    fn cancel_reaches_only_the_head_exactly_once() {
        let mut world = TestWorld::default();
        let mut blackboard = Blackboard::default();

        let mut plan = PlanQueue::empty()
            .then(scripted("op1", vec![OperatorStatus::Running]))
            .then(scripted("op2", vec![]));

        tick(&mut plan, &mut world, &mut blackboard);

        let mut ctx = OperatorContext::new(AGENT, &mut world, &mut blackboard);
        assert!(plan.cancel(&mut ctx));
        assert!(!plan.cancel(&mut ctx));
        assert_eq!(plan.status(), PlanStatus::Cancelled);

        assert_eq!(world.log, vec!["op1 start", "op1 advance", "op1 cancel"]);
    }

    #[test]
    fn cancel_before_the_first_tick_still_notifies_the_head() {
        let mut world = TestWorld::default();
        let mut blackboard = Blackboard::default();

        let mut plan = PlanQueue::empty().then(scripted("op1", vec![]));

        let mut ctx = OperatorContext::new(AGENT, &mut world, &mut blackboard);
        plan.cancel(&mut ctx);

        assert_eq!(world.log, vec!["op1 cancel"]);
    }
}
