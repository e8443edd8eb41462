/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Operators - the executable steps an action's plan is made of.
//!
//! An Operator is a small, resumable state machine. The plan advances its head Operator
//! once per tick, handing it a mutable view of the world; the Operator reports whether it
//! is still Running, or has Succeeded or Failed. An Operator that gets cancelled before
//! it finishes must undo or abandon whatever it started in `cancel()`.
//!
//! Operators are built fresh for every plan, so they can keep whatever private progress
//! state they need without worrying about other agents or earlier runs.
//!
//! Data-driven plans refer to Operators by key; the `OperatorRegistry` maps these keys
//! to factories that build an Operator from authored parameters.

use alloc::collections::BTreeMap;
use core::marker::PhantomData;

use bevy::platform::sync::Arc;
use bevy::reflect::Reflect;

#[cfg(any(feature = "actionset_loader"))]
use serde::{Deserialize, Serialize};

use crate::blackboard::{Blackboard, StateKey, StateValue};
use crate::errors::{CatalogueError, OperatorBuildError};
use crate::types::{DeltaTime, GanglionKvMap, OperatorKey};
use crate::world::{AgentView, AgentWorld};

/// The result of advancing an Operator once.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Reflect)]
#[cfg_attr(any(feature = "actionset_loader"), derive(Serialize, Deserialize))]
pub enum OperatorStatus {
    Running,
    Succeeded,
    Failed,
}

/// Everything an Operator may touch while executing: the world (mutably), the agent
/// it is acting for, and that agent's Blackboard (mostly for memory).
pub struct OperatorContext<'a, W: AgentWorld> {
    pub agent: W::Agent,
    pub world: &'a mut W,
    pub blackboard: &'a mut Blackboard<W>,
}

impl<'a, W: AgentWorld> OperatorContext<'a, W> {
    pub fn new(agent: W::Agent, world: &'a mut W, blackboard: &'a mut Blackboard<W>) -> Self {
        Self { agent, world, blackboard }
    }

    /// A read-only view, e.g. for reading world-state through the Blackboard.
    pub fn view(&self) -> AgentView<'_, W> {
        AgentView::new(self.agent, &*self.world)
    }
}

/// One executable step of a plan.
pub trait Operator<W: AgentWorld>: Send + Sync {
    /// Called once, right before the first `advance()`.
    fn startup(&mut self, _ctx: &mut OperatorContext<'_, W>) {}

    /// Does one tick's worth of work. Should return quickly.
    fn advance(&mut self, ctx: &mut OperatorContext<'_, W>, delta: DeltaTime) -> OperatorStatus;

    /// Called at most once, if the plan gets cancelled while this Operator is at its head.
    fn cancel(&mut self, _ctx: &mut OperatorContext<'_, W>) {}

    /// For logs and diagnostics.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }
}

/// Succeeds once the given amount of time has been spent at the head of the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitOperator {
    duration: DeltaTime,
    elapsed: DeltaTime,
}

impl WaitOperator {
    pub fn new(seconds: DeltaTime) -> Self {
        Self { duration: seconds.max(0.), elapsed: 0. }
    }

    pub fn remaining(&self) -> DeltaTime {
        (self.duration - self.elapsed).max(0.)
    }
}

impl<W: AgentWorld> Operator<W> for WaitOperator {
    fn advance(&mut self, _ctx: &mut OperatorContext<'_, W>, delta: DeltaTime) -> OperatorStatus {
        self.elapsed += delta.max(0.);

        match self.elapsed >= self.duration {
            true => OperatorStatus::Succeeded,
            false => OperatorStatus::Running,
        }
    }

    fn name(&self) -> &str {
        "Wait"
    }
}

/// Wraps another Operator and fails it if it is still running after a deadline.
///
/// The wrapped Operator is cancelled when the deadline passes, or when the timeout
/// itself is cancelled while the inner Operator is still going.
pub struct TimeoutOperator<W: AgentWorld> {
    inner: Box<dyn Operator<W>>,
    deadline: DeltaTime,
    elapsed: DeltaTime,
    inner_finished: bool,
}

impl<W: AgentWorld> TimeoutOperator<W> {
    pub fn new<O: Operator<W> + 'static>(inner: O, deadline: DeltaTime) -> Self {
        Self::from_boxed(Box::new(inner), deadline)
    }

    pub fn from_boxed(inner: Box<dyn Operator<W>>, deadline: DeltaTime) -> Self {
        Self { inner, deadline: deadline.max(0.), elapsed: 0., inner_finished: false }
    }
}

impl<W: AgentWorld> Operator<W> for TimeoutOperator<W> {
    fn startup(&mut self, ctx: &mut OperatorContext<'_, W>) {
        self.inner.startup(ctx)
    }

    fn advance(&mut self, ctx: &mut OperatorContext<'_, W>, delta: DeltaTime) -> OperatorStatus {
        self.elapsed += delta.max(0.);

        let status = self.inner.advance(ctx, delta);
        if status != OperatorStatus::Running {
            self.inner_finished = true;
            return status;
        }

        if self.elapsed >= self.deadline {
            #[cfg(feature = "logging")]
            bevy::log::debug!(
                "Operator {:?} for {:?} timed out after {}s",
                self.inner.name(),
                ctx.agent,
                self.elapsed
            );

            self.inner.cancel(ctx);
            self.inner_finished = true;
            return OperatorStatus::Failed;
        }

        OperatorStatus::Running
    }

    fn cancel(&mut self, ctx: &mut OperatorContext<'_, W>) {
        if !self.inner_finished {
            self.inner_finished = true;
            self.inner.cancel(ctx);
        }
    }

    fn name(&self) -> &str {
        "Timeout"
    }
}

/// Writes a value into the agent's memory and succeeds immediately.
pub struct RememberOperator<T: StateValue> {
    key: StateKey<T>,
    value: T,
}

impl<T: StateValue> RememberOperator<T> {
    pub fn new(key: &StateKey<T>, value: T) -> Self {
        Self { key: key.clone(), value }
    }
}

impl<W: AgentWorld, T: StateValue> Operator<W> for RememberOperator<T> {
    fn advance(&mut self, ctx: &mut OperatorContext<'_, W>, _delta: DeltaTime) -> OperatorStatus {
        ctx.blackboard.remember(&self.key, self.value.clone());
        OperatorStatus::Succeeded
    }

    fn name(&self) -> &str {
        "Remember"
    }
}

/// An Operator out of a closure; handy for one-off steps and for tests.
///
/// Cancellation is a no-op unless a cancel hook is attached with `with_cancel()`.
pub struct FnOperator<W: AgentWorld, F> {
    name: String,
    func: F,
    on_cancel: Option<Box<dyn FnMut(&mut OperatorContext<'_, W>) + Send + Sync>>,
    _marker: PhantomData<fn(W)>,
}

impl<W, F> FnOperator<W, F>
where
    W: AgentWorld,
    F: FnMut(&mut OperatorContext<'_, W>, DeltaTime) -> OperatorStatus + Send + Sync,
{
    pub fn new<IS: Into<String>>(name: IS, func: F) -> Self {
        Self { name: name.into(), func, on_cancel: None, _marker: PhantomData }
    }

    pub fn with_cancel<C>(mut self, on_cancel: C) -> Self
    where
        C: FnMut(&mut OperatorContext<'_, W>) + Send + Sync + 'static,
    {
        self.on_cancel = Some(Box::new(on_cancel));
        self
    }
}

impl<W, F> Operator<W> for FnOperator<W, F>
where
    W: AgentWorld,
    F: FnMut(&mut OperatorContext<'_, W>, DeltaTime) -> OperatorStatus + Send + Sync,
{
    fn advance(&mut self, ctx: &mut OperatorContext<'_, W>, delta: DeltaTime) -> OperatorStatus {
        (self.func)(ctx, delta)
    }

    fn cancel(&mut self, ctx: &mut OperatorContext<'_, W>) {
        if let Some(hook) = self.on_cancel.as_mut() {
            hook(ctx)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A single authored Operator parameter.
#[derive(Debug, Clone, PartialEq, Reflect)]
#[cfg_attr(any(feature = "actionset_loader"), derive(Serialize, Deserialize), serde(untagged))]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Named, authored parameters for an Operator factory.
///
/// Kept ordered so that serialized plans are stable.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(any(feature = "actionset_loader"), derive(Serialize, Deserialize), serde(transparent))]
pub struct OperatorParams(BTreeMap<String, ParamValue>);

impl OperatorParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<IS: Into<String>, V: Into<ParamValue>>(mut self, name: IS, value: V) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<IS: Into<String>, V: Into<ParamValue>>(&mut self, name: IS, value: V) -> Option<ParamValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn number(&self, name: &str) -> Result<f64, OperatorBuildError> {
        match self.get(name) {
            Some(ParamValue::Number(value)) => Ok(*value),
            Some(_) => Err(OperatorBuildError::WrongParamType { param: name.to_string(), expected: "number" }),
            None => Err(OperatorBuildError::MissingParam(name.to_string())),
        }
    }

    pub fn flag(&self, name: &str) -> Result<bool, OperatorBuildError> {
        match self.get(name) {
            Some(ParamValue::Bool(value)) => Ok(*value),
            Some(_) => Err(OperatorBuildError::WrongParamType { param: name.to_string(), expected: "bool" }),
            None => Err(OperatorBuildError::MissingParam(name.to_string())),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str, OperatorBuildError> {
        match self.get(name) {
            Some(ParamValue::Text(value)) => Ok(value.as_str()),
            Some(_) => Err(OperatorBuildError::WrongParamType { param: name.to_string(), expected: "string" }),
            None => Err(OperatorBuildError::MissingParam(name.to_string())),
        }
    }
}

type OperatorFactoryFn<W> = dyn Fn(&OperatorParams, &mut Blackboard<W>, AgentView<'_, W>) -> Result<Box<dyn Operator<W>>, OperatorBuildError>
    + Send
    + Sync;

struct OperatorFactory<W: AgentWorld> {
    build: Arc<OperatorFactoryFn<W>>,
    required_params: Vec<String>,
}

impl<W: AgentWorld> Clone for OperatorFactory<W> {
    fn clone(&self) -> Self {
        Self { build: self.build.clone(), required_params: self.required_params.clone() }
    }
}

/// Maps Operator keys used in authored plans to factories.
///
/// Factories run when a plan is compiled, so they get to see the Blackboard
/// (e.g. to read a target picked by `on_selected()` out of memory).
pub struct OperatorRegistry<W: AgentWorld> {
    factories: GanglionKvMap<OperatorKey, OperatorFactory<W>>,
}

impl<W: AgentWorld> Default for OperatorRegistry<W> {
    fn default() -> Self {
        Self { factories: GanglionKvMap::default() }
    }
}

impl<W: AgentWorld> Clone for OperatorRegistry<W> {
    fn clone(&self) -> Self {
        Self { factories: self.factories.clone() }
    }
}

impl<W: AgentWorld> OperatorRegistry<W> {
    /// A registry with the built-in `Wait` (`seconds`) Operator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register("Wait", &["seconds"], |params: &OperatorParams, _blackboard: &mut Blackboard<W>, _view: AgentView<'_, W>| {
            let seconds = params.number("seconds")?;
            Ok(Box::new(WaitOperator::new(seconds as DeltaTime)) as Box<dyn Operator<W>>)
        });
        registry
    }

    /// Registers a factory. `required_params` are checked when authored plans are validated,
    /// long before the factory ever runs.
    pub fn register<IS, F>(&mut self, key: IS, required_params: &[&str], factory: F) -> &mut Self
    where
        IS: Into<OperatorKey>,
        F: Fn(&OperatorParams, &mut Blackboard<W>, AgentView<'_, W>) -> Result<Box<dyn Operator<W>>, OperatorBuildError>
            + Send
            + Sync
            + 'static,
    {
        let key = key.into();
        let entry = OperatorFactory {
            build: Arc::new(factory),
            required_params: required_params.iter().map(|param| param.to_string()).collect(),
        };

        let _old = self.factories.insert(key.clone(), entry);

        #[cfg(feature = "logging")]
        {
            if _old.is_some() {
                bevy::log::warn!(
                    "Detected a key collision for Operator {:?}. Ejecting previous registration...",
                    key
                );
            }
        }

        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Checks an authored Operator reference without building anything.
    pub fn validate(&self, key: &OperatorKey, params: &OperatorParams) -> Result<(), CatalogueError> {
        let factory = self.factories
            .get(key.as_str())
            .ok_or_else(|| CatalogueError::UnknownOperator(key.clone()))?;

        match factory.required_params.iter().find(|param| !params.contains(param)) {
            Some(missing) => Err(CatalogueError::MissingOperatorParam { operator: key.clone(), param: missing.clone() }),
            None => Ok(()),
        }
    }

    pub fn build(
        &self,
        key: &OperatorKey,
        params: &OperatorParams,
        blackboard: &mut Blackboard<W>,
        view: AgentView<'_, W>,
    ) -> Result<Box<dyn Operator<W>>, OperatorBuildError> {
        let factory = self.factories
            .get(key.as_str())
            .ok_or_else(|| OperatorBuildError::Unavailable(alloc::format!("no Operator factory named {:?}", key.as_str())))?;

        (factory.build)(params, blackboard, view)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::testing::{AGENT, TestWorld};

    fn run<O: Operator<TestWorld>>(op: &mut O, world: &mut TestWorld, delta: DeltaTime) -> OperatorStatus {
        let mut blackboard = Blackboard::default();
        let mut ctx = OperatorContext::new(AGENT, world, &mut blackboard);
        op.advance(&mut ctx, delta)
    }

    #[test]
    fn wait_runs_until_the_time_is_up() {
        let mut world = TestWorld::default();
        let mut wait = WaitOperator::new(1.0);

        assert_eq!(run(&mut wait, &mut world, 0.4), OperatorStatus::Running);
        assert_eq!(run(&mut wait, &mut world, 0.4), OperatorStatus::Running);
        assert_eq!(run(&mut wait, &mut world, 0.4), OperatorStatus::Succeeded);

        let mut instant = WaitOperator::new(0.0);
        assert_eq!(run(&mut instant, &mut world, 0.0), OperatorStatus::Succeeded);
    }

    #[test]
    fn timeout_fails_and_cancels_the_inner_operator() {
        let mut world = TestWorld::default();
        let stuck = FnOperator::new("Stuck", |_ctx: &mut OperatorContext<'_, TestWorld>, _delta: DeltaTime| OperatorStatus::Running)
            .with_cancel(|ctx: &mut OperatorContext<'_, TestWorld>| ctx.world.log.push("stuck cancelled".into()));

        let mut timeout = TimeoutOperator::new(stuck, 1.0);

        assert_eq!(run(&mut timeout, &mut world, 0.6), OperatorStatus::Running);
        assert_eq!(run(&mut timeout, &mut world, 0.6), OperatorStatus::Failed);
        assert_eq!(world.log, vec!["stuck cancelled".to_string()]);

        let mut blackboard = Blackboard::default();
        let mut ctx = OperatorContext::new(AGENT, &mut world, &mut blackboard);
        timeout.cancel(&mut ctx);
        assert_eq!(world.log.len(), 1);
    }

    #[test]
    fn timeout_passes_through_inner_results() {
        let mut world = TestWorld::default();
        let mut timeout = TimeoutOperator::new(WaitOperator::new(0.5), 1.0);

        assert_eq!(run(&mut timeout, &mut world, 0.5), OperatorStatus::Succeeded);
    }

    #[test]
    fn remember_writes_memory() {
        let mut world = TestWorld::default();
        let mut blackboard = Blackboard::default();
        let key = StateKey::<u32>::new("Target");

        let mut remember = RememberOperator::new(&key, 42);
        let mut ctx = OperatorContext::new(AGENT, &mut world, &mut blackboard);
        assert_eq!(remember.advance(&mut ctx, 0.1), OperatorStatus::Succeeded);
        assert_eq!(blackboard.recall(&key), Some(42));
    }

    #[test]
    fn params_are_typed() {
        let params = OperatorParams::new()
            .with("seconds", 2.0)
            .with("loud", true)
            .with("target", "Door");

        assert_eq!(params.number("seconds"), Ok(2.0));
        assert_eq!(params.flag("loud"), Ok(true));
        assert_eq!(params.text("target"), Ok("Door"));
        assert!(matches!(params.number("target"), Err(OperatorBuildError::WrongParamType { .. })));
        assert!(matches!(params.flag("missing"), Err(OperatorBuildError::MissingParam(_))));
    }

    #[test]
    fn registry_validates_and_builds() {
        let registry = OperatorRegistry::<TestWorld>::with_builtins();
        let wait = OperatorKey::from("Wait");

        assert!(registry.validate(&wait, &OperatorParams::new().with("seconds", 1.0)).is_ok());
        assert_eq!(
            registry.validate(&wait, &OperatorParams::new()),
            Err(CatalogueError::MissingOperatorParam { operator: wait.clone(), param: "seconds".into() })
        );
        assert_eq!(
            registry.validate(&OperatorKey::from("Fly"), &OperatorParams::new()),
            Err(CatalogueError::UnknownOperator(OperatorKey::from("Fly")))
        );

        let world = TestWorld::default();
        let mut blackboard = Blackboard::default();
        let built = registry.build(&wait, &OperatorParams::new().with("seconds", 1.0), &mut blackboard, AgentView::new(AGENT, &world));
        assert_eq!(built.map(|op| op.name().to_string()), Ok("Wait".to_string()));

        let wrong = registry.build(&wait, &OperatorParams::new().with("seconds", "soon"), &mut blackboard, AgentView::new(AGENT, &world));
        assert!(wrong.is_err());
    }
}
