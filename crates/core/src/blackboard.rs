/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! The Blackboard - a per-agent, per-decision-cycle cache of named world-state values.
//!
//! Scoring a catalogue of actions tends to ask the same questions over and over
//! ("how far is the nearest hostile?"). The Blackboard makes sure each question is
//! answered at most once per decision cycle: the first read of a key runs the registered
//! computation, every later read in the same cycle gets the cached answer, even if the
//! world changed in the meantime. `reset()` wipes the cache at the start of each cycle.
//!
//! Computations that cannot produce a value (no inventory, target gone) do not propagate
//! errors; the Blackboard hands out the type's `Default` instead, which is what lets
//! Considerations score absence as zero without special-casing anything.
//!
//! Separately from the cache, each Blackboard holds the agent's persistent `AgentMemory`,
//! which survives resets. This is where actions stash things like "the target I picked".

use core::any::{Any, type_name};
use core::marker::PhantomData;

use bevy::platform::sync::Arc;

use crate::errors::{BlackboardError, CatalogueError, StateError};
use crate::types::{ActionScore, BlackboardGeneration, GanglionKvMap, StateKeyName, ThreadSafeRef};
use crate::world::{AgentView, AgentWorld};

/// Anything that can be stored in the Blackboard or in agent memory.
pub trait StateValue: Any + Clone + Send + Sync {}

impl<T: Any + Clone + Send + Sync> StateValue for T {}

type ErasedValue = Box<dyn Any + Send + Sync>;

/// World-state values a Consideration can read directly as a raw scalar.
pub trait ScalarMeasure {
    fn to_raw_score(&self) -> ActionScore;
}

impl ScalarMeasure for f32 {
    fn to_raw_score(&self) -> ActionScore {
        *self
    }
}

impl ScalarMeasure for f64 {
    fn to_raw_score(&self) -> ActionScore {
        *self as ActionScore
    }
}

impl ScalarMeasure for bool {
    fn to_raw_score(&self) -> ActionScore {
        match self {
            true => 1.,
            false => 0.,
        }
    }
}

macro_rules! integer_measure {
    ($($int:ty),*) => {
        $(
            impl ScalarMeasure for $int {
                fn to_raw_score(&self) -> ActionScore {
                    *self as ActionScore
                }
            }
        )*
    };
}

integer_measure!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// Presence test: `Some(_)` measures as 1.0, `None` as 0.0.
impl<T> ScalarMeasure for Option<T> {
    fn to_raw_score(&self) -> ActionScore {
        match self {
            Some(_) => 1.,
            None => 0.,
        }
    }
}

/// A typed handle to a named world-state entry.
///
/// The name is what the registry and the cache are keyed by; the type parameter
/// just saves callers from downcasting by hand.
pub struct StateKey<T> {
    name: StateKeyName,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StateKey<T> {
    pub fn new<IS: Into<StateKeyName>>(name: IS) -> Self {
        Self { name: name.into(), _marker: PhantomData }
    }

    pub fn name(&self) -> &StateKeyName {
        &self.name
    }
}

impl<T> Clone for StateKey<T> {
    fn clone(&self) -> Self {
        Self::new(self.name.clone())
    }
}

impl<T> core::fmt::Debug for StateKey<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("StateKey").field(&self.name).field(&type_name::<T>()).finish()
    }
}

/// Persistent, per-agent memory. Unlike the cycle cache, it is never cleared automatically.
#[derive(Default)]
pub struct AgentMemory {
    entries: GanglionKvMap<StateKeyName, ErasedValue>,
}

impl AgentMemory {
    pub fn remember<T: StateValue>(&mut self, key: &StateKey<T>, value: T) {
        self.entries.insert(key.name.clone(), Box::new(value));
    }

    /// Returns None if nothing was remembered under this key, or it holds another type.
    pub fn recall<T: StateValue>(&self, key: &StateKey<T>) -> Option<T> {
        self.entries
            .get(key.name.as_str())
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Returns true if there was anything to forget.
    pub fn forget<T>(&mut self, key: &StateKey<T>) -> bool {
        self.entries.remove(key.name.as_str()).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A type-erased world-state computation.
trait ErasedComputation<W: AgentWorld>: Send + Sync {
    fn compute(&self, view: AgentView<'_, W>, memory: &AgentMemory) -> Result<ErasedValue, StateError>;
}

struct TypedComputation<F, T> {
    func: F,
    _marker: PhantomData<fn() -> T>,
}

impl<W, T, F> ErasedComputation<W> for TypedComputation<F, T>
where
    W: AgentWorld,
    T: StateValue,
    F: Fn(AgentView<'_, W>, &AgentMemory) -> Result<T, StateError> + Send + Sync,
{
    fn compute(&self, view: AgentView<'_, W>, memory: &AgentMemory) -> Result<ErasedValue, StateError> {
        (self.func)(view, memory).map(|value| Box::new(value) as ErasedValue)
    }
}

type MeasureFn = fn(&(dyn Any + Send + Sync)) -> Option<ActionScore>;

fn measure_as<T: ScalarMeasure + 'static>(value: &(dyn Any + Send + Sync)) -> Option<ActionScore> {
    value.downcast_ref::<T>().map(ScalarMeasure::to_raw_score)
}

fn fallback_for<T: StateValue + Default>() -> ErasedValue {
    Box::new(T::default())
}

struct StateEntry<W: AgentWorld> {
    computation: Arc<dyn ErasedComputation<W>>,
    fallback: fn() -> ErasedValue,
    measure: Option<MeasureFn>,
    type_name: &'static str,
}

impl<W: AgentWorld> Clone for StateEntry<W> {
    fn clone(&self) -> Self {
        Self {
            computation: self.computation.clone(),
            fallback: self.fallback,
            measure: self.measure,
            type_name: self.type_name,
        }
    }
}

/// Maps state names to the world-state computations (the external collaborators) that produce them.
///
/// Shared between all agents of a given world type; each agent's Blackboard caches its own results.
pub struct StateRegistry<W: AgentWorld> {
    entries: GanglionKvMap<StateKeyName, StateEntry<W>>,
}

impl<W: AgentWorld> Default for StateRegistry<W> {
    fn default() -> Self {
        Self { entries: GanglionKvMap::default() }
    }
}

impl<W: AgentWorld> Clone for StateRegistry<W> {
    fn clone(&self) -> Self {
        Self { entries: self.entries.clone() }
    }
}

impl<W: AgentWorld> StateRegistry<W> {
    fn insert_entry(&mut self, name: StateKeyName, entry: StateEntry<W>) {
        let _old = self.entries.insert(name.clone(), entry);

        #[cfg(feature = "logging")]
        {
            if _old.is_some() {
                bevy::log::warn!(
                    "Detected a key collision for world-state {:?}. Ejecting previous registration...",
                    name
                );
            }
        }
    }

    /// Registers a computation for any cloneable value.
    ///
    /// The computation must be deterministic within a decision cycle and must not block.
    pub fn register<T, F>(&mut self, key: &StateKey<T>, computation: F) -> &mut Self
    where
        T: StateValue + Default,
        F: Fn(AgentView<'_, W>, &AgentMemory) -> Result<T, StateError> + Send + Sync + 'static,
    {
        let entry = StateEntry {
            computation: Arc::new(TypedComputation { func: computation, _marker: PhantomData }),
            fallback: fallback_for::<T>,
            measure: None,
            type_name: type_name::<T>(),
        };
        self.insert_entry(key.name.clone(), entry);
        self
    }

    /// Registers a computation whose values can also be read by name as a raw scalar,
    /// which is what data-driven Considerations need.
    pub fn register_measurement<T, F>(&mut self, key: &StateKey<T>, computation: F) -> &mut Self
    where
        T: StateValue + Default + ScalarMeasure,
        F: Fn(AgentView<'_, W>, &AgentMemory) -> Result<T, StateError> + Send + Sync + 'static,
    {
        let entry = StateEntry {
            computation: Arc::new(TypedComputation { func: computation, _marker: PhantomData }),
            fallback: fallback_for::<T>,
            measure: Some(measure_as::<T>),
            type_name: type_name::<T>(),
        };
        self.insert_entry(key.name.clone(), entry);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Checks that a name can be read as a raw scalar, for validating authored Considerations.
    pub fn validate_measurement(&self, name: &StateKeyName) -> Result<(), CatalogueError> {
        match self.entries.get(name.as_str()) {
            None => Err(CatalogueError::UnknownStateKey(name.clone())),
            Some(entry) if entry.measure.is_none() => Err(CatalogueError::NotAMeasurement(name.clone())),
            Some(_) => Ok(()),
        }
    }

    pub fn type_name_of(&self, name: &str) -> Option<&'static str> {
        self.entries.get(name).map(|entry| entry.type_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct CachedState {
    value: ErasedValue,
    failure: Option<StateError>,
}

/// Per-agent memoized world-state cache; see the module docs.
pub struct Blackboard<W: AgentWorld> {
    registry: ThreadSafeRef<StateRegistry<W>>,
    cache: GanglionKvMap<StateKeyName, CachedState>,
    memory: AgentMemory,
    generation: BlackboardGeneration,
    computations_this_cycle: usize,
}

impl<W: AgentWorld> Default for Blackboard<W> {
    fn default() -> Self {
        Self::new(ThreadSafeRef::new(StateRegistry::default()))
    }
}

impl<W: AgentWorld> Blackboard<W> {
    pub fn new(registry: ThreadSafeRef<StateRegistry<W>>) -> Self {
        Self {
            registry,
            cache: GanglionKvMap::default(),
            memory: AgentMemory::default(),
            generation: 0,
            computations_this_cycle: 0,
        }
    }

    pub fn registry(&self) -> &ThreadSafeRef<StateRegistry<W>> {
        &self.registry
    }

    /// Invalidates everything cached in the previous cycle.
    ///
    /// The map is cleared rather than reallocated, so steady-state cycles do not allocate for it.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.generation = self.generation.wrapping_add(1);
        self.computations_this_cycle = 0;
    }

    /// Incremented by every `reset()`.
    pub fn generation(&self) -> BlackboardGeneration {
        self.generation
    }

    /// How many world-state computations actually ran since the last `reset()`.
    pub fn computations_this_cycle(&self) -> usize {
        self.computations_this_cycle
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    fn resolve(&mut self, name: &StateKeyName, view: AgentView<'_, W>) -> Result<&CachedState, BlackboardError> {
        if !self.cache.contains_key(name.as_str()) {
            let entry = self.registry.entries
                .get(name.as_str())
                .ok_or_else(|| BlackboardError::Unregistered(name.clone()))?;

            self.computations_this_cycle += 1;

            let cached = match entry.computation.compute(view, &self.memory) {
                Ok(value) => CachedState { value, failure: None },
                Err(err) => {
                    #[cfg(feature = "logging")]
                    bevy::log::debug!(
                        "Blackboard: world-state {:?} unavailable for {:?} ({}), using the default",
                        name, view.agent, err
                    );
                    CachedState { value: (entry.fallback)(), failure: Some(err) }
                }
            };
            self.cache.insert(name.clone(), cached);
        }

        self.cache
            .get(name.as_str())
            .ok_or_else(|| BlackboardError::Unregistered(name.clone()))
    }

    /// Reads a world-state value, computing it on the first read this cycle.
    ///
    /// Never fails: unregistered keys, type mismatches and failed computations
    /// all yield `T::default()`.
    pub fn get_state<T: StateValue + Default>(&mut self, key: &StateKey<T>, view: AgentView<'_, W>) -> T {
        match self.try_get_state(key, view) {
            Ok(value) => value,
            Err(_err) => {
                #[cfg(feature = "logging")]
                {
                    if !matches!(_err, BlackboardError::Unavailable { .. }) {
                        bevy::log::warn!("Blackboard: {} - returning the default value", _err);
                    }
                }
                T::default()
            }
        }
    }

    /// Like `get_state()`, but tells you why a real value could not be produced.
    pub fn try_get_state<T: StateValue>(&mut self, key: &StateKey<T>, view: AgentView<'_, W>) -> Result<T, BlackboardError> {
        let cached = self.resolve(&key.name, view)?;

        if let Some(err) = &cached.failure {
            return Err(BlackboardError::Unavailable { key: key.name.clone(), source: err.clone() });
        }

        cached.value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| BlackboardError::TypeMismatch { key: key.name.clone(), expected: type_name::<T>() })
    }

    /// Reads a registered measurement by name as a raw scalar.
    ///
    /// Failed computations measure their default value; unknown names measure as 0.
    pub fn measure(&mut self, name: &StateKeyName, view: AgentView<'_, W>) -> ActionScore {
        let measure = self.registry.entries.get(name.as_str()).and_then(|entry| entry.measure);

        let (Some(measure), Ok(cached)) = (measure, self.resolve(name, view)) else {
            #[cfg(feature = "logging")]
            bevy::log::warn!("Blackboard: {:?} is not a registered measurement, scoring it as 0", name);
            return crate::types::MIN_CONSIDERATION_SCORE;
        };

        measure(cached.value.as_ref()).unwrap_or(crate::types::MIN_CONSIDERATION_SCORE)
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut AgentMemory {
        &mut self.memory
    }

    pub fn remember<T: StateValue>(&mut self, key: &StateKey<T>, value: T) {
        self.memory.remember(key, value)
    }

    pub fn recall<T: StateValue>(&self, key: &StateKey<T>) -> Option<T> {
        self.memory.recall(key)
    }

    pub fn forget<T>(&mut self, key: &StateKey<T>) -> bool {
        self.memory.forget(key)
    }
}
