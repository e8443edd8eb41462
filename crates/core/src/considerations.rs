/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Considerations - one scoring input of a UtilityAction.
//!
//! A Consideration pairs an accessor (which Blackboard entry to read, and how to turn it
//! into a raw scalar) with a response Curve. Evaluating it yields one normalized score.
//!
//! Considerations are immutable once built and read-only with respect to the world;
//! the only thing they are allowed to touch is the Blackboard's memoization cache.
//! Multiple Considerations may read the same Blackboard key; the Blackboard makes sure
//! the underlying computation still only runs once per decision cycle.

use bevy::platform::sync::Arc;

use crate::blackboard::{Blackboard, ScalarMeasure, StateKey, StateValue};
use crate::curves::{SupportedUtilityCurve, UtilityCurve};
use crate::errors::CatalogueError;
use crate::types::{ActionScore, StateKeyName};
use crate::world::{AgentView, AgentWorld};

type Accessor<W> = Arc<dyn Fn(&mut Blackboard<W>, AgentView<'_, W>) -> ActionScore + Send + Sync>;

fn accessor<W, F>(func: F) -> Accessor<W>
where
    W: AgentWorld,
    F: Fn(&mut Blackboard<W>, AgentView<'_, W>) -> ActionScore + Send + Sync + 'static,
{
    Arc::new(func)
}

/// Linear rescaling of a raw measurement onto the curve domain: `(raw - min) / (max - min)`.
///
/// Values outside of [min, max] land outside of [0, 1]; the Curve clamps them.
/// Swapping the bounds inverts the mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "actionset_loader", derive(serde::Serialize, serde::Deserialize))]
pub struct Normalization {
    pub min: ActionScore,
    pub max: ActionScore,
}

impl Normalization {
    pub fn new(min: ActionScore, max: ActionScore) -> Result<Self, CatalogueError> {
        let candidate = Self { min, max };
        candidate.validate().map(|_| candidate)
    }

    pub fn validate(&self) -> Result<(), CatalogueError> {
        match self.min.is_finite() && self.max.is_finite() && self.min != self.max {
            true => Ok(()),
            false => Err(CatalogueError::InvalidNormalization { min: self.min, max: self.max }),
        }
    }

    pub fn apply(&self, raw: ActionScore) -> ActionScore {
        (raw - self.min) / (self.max - self.min)
    }
}

/// One scoring input of an action: a Blackboard accessor fed through a response Curve.
pub struct Consideration<W: AgentWorld> {
    name: String,
    accessor: Accessor<W>,
    normalization: Option<Normalization>,
    curve: SupportedUtilityCurve,
}

impl<W: AgentWorld> Clone for Consideration<W> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            accessor: self.accessor.clone(),
            normalization: self.normalization,
            curve: self.curve.clone(),
        }
    }
}

impl<W: AgentWorld> core::fmt::Debug for Consideration<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Consideration")
            .field("name", &self.name)
            .field("normalization", &self.normalization)
            .field("curve", &self.curve)
            .finish()
    }
}

impl<W: AgentWorld> Consideration<W> {
    /// Reads a typed Blackboard entry.
    pub fn from_state<T>(key: &StateKey<T>, curve: SupportedUtilityCurve) -> Self
    where
        T: StateValue + Default + ScalarMeasure,
    {
        let key = key.clone();
        Self {
            name: key.name().to_string(),
            accessor: accessor(move |blackboard: &mut Blackboard<W>, view: AgentView<'_, W>| {
                blackboard.get_state(&key, view).to_raw_score()
            }),
            normalization: None,
            curve,
        }
    }

    /// Reads a Blackboard entry by name; it must have been registered as a measurement.
    ///
    /// This is what authored (data-driven) Considerations compile down to.
    pub fn from_measurement<IS: Into<StateKeyName>>(name: IS, curve: SupportedUtilityCurve) -> Self {
        let state_name: StateKeyName = name.into();
        Self {
            name: state_name.to_string(),
            accessor: accessor(move |blackboard: &mut Blackboard<W>, view: AgentView<'_, W>| {
                blackboard.measure(&state_name, view)
            }),
            normalization: None,
            curve,
        }
    }

    /// Uses an arbitrary accessor; typically a typed getter supplied by domain code.
    ///
    /// The accessor should only read from the Blackboard, so results stay memoized.
    pub fn from_fn<IS, F>(name: IS, curve: SupportedUtilityCurve, func: F) -> Self
    where
        IS: Into<String>,
        F: Fn(&mut Blackboard<W>, AgentView<'_, W>) -> ActionScore + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            accessor: accessor(func),
            normalization: None,
            curve,
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = Some(normalization);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn curve(&self) -> &SupportedUtilityCurve {
        &self.curve
    }

    pub fn normalization(&self) -> Option<&Normalization> {
        self.normalization.as_ref()
    }

    /// The curve input: the measurement after normalization, before the curve.
    pub fn input(&self, blackboard: &mut Blackboard<W>, view: AgentView<'_, W>) -> ActionScore {
        let raw = (self.accessor)(blackboard, view);
        match &self.normalization {
            Some(normalization) => normalization.apply(raw),
            None => raw,
        }
    }

    /// Always within [0, 1].
    pub fn score(&self, blackboard: &mut Blackboard<W>, view: AgentView<'_, W>) -> ActionScore {
        let score = self.curve.evaluate(self.input(blackboard, view));

        #[cfg(feature = "logging")]
        bevy::log::trace!("Consideration {:?} for {:?} scored {}", self.name, view.agent, score);

        score
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::StateRegistry;
    use crate::curves::LinearCurve;
    use crate::types::ThreadSafeRef;
    use crate::world::testing::{AGENT, TestWorld};

    fn ammo() -> StateKey<u32> {
        StateKey::new("Ammo")
    }

    fn blackboard() -> Blackboard<TestWorld> {
        let mut registry = StateRegistry::<TestWorld>::default();
        registry.register_measurement(&ammo(), |view, _memory| {
            Ok(view.world.numbers.get("ammo").copied().unwrap_or_default() as u32)
        });
        Blackboard::new(ThreadSafeRef::new(registry))
    }

    #[test]
    fn normalized_measurements_go_through_the_curve() {
        let world = TestWorld::default().with_number("ammo", 15.);
        let view = AgentView::new(AGENT, &world);
        let mut blackboard = blackboard();

        let consideration = Consideration::from_state(&ammo(), SupportedUtilityCurve::Linear(LinearCurve))
            .with_normalization(Normalization::new(0., 30.).unwrap());

        assert_eq!(consideration.input(&mut blackboard, view), 0.5);
        assert_eq!(consideration.score(&mut blackboard, view), 0.5);
    }

    #[test]
    fn out_of_range_inputs_clamp() {
        let world = TestWorld::default().with_number("ammo", 300.);
        let view = AgentView::new(AGENT, &world);
        let mut blackboard = blackboard();

        let consideration = Consideration::from_measurement("Ammo", SupportedUtilityCurve::Linear(LinearCurve))
            .with_normalization(Normalization::new(0., 30.).unwrap());

        assert_eq!(consideration.score(&mut blackboard, view), 1.0);
    }

    #[test]
    fn shared_keys_compute_once() {
        let world = TestWorld::default().with_number("ammo", 3.);
        let view = AgentView::new(AGENT, &world);
        let mut blackboard = blackboard();

        let gate = Consideration::from_measurement("Ammo", SupportedUtilityCurve::Bool(Default::default()));
        let amount = Consideration::from_state(&ammo(), SupportedUtilityCurve::Linear(LinearCurve))
            .with_normalization(Normalization::new(0., 6.).unwrap());

        assert_eq!(gate.score(&mut blackboard, view), 1.0);
        assert_eq!(amount.score(&mut blackboard, view), 0.5);
        assert_eq!(blackboard.computations_this_cycle(), 1);
    }

    #[test]
    fn custom_accessors_and_absence() {
        let world = TestWorld::default();
        let view = AgentView::new(AGENT, &world);
        let mut blackboard = blackboard();

        let has_ammo = Consideration::from_fn(
            "HasAmmo",
            SupportedUtilityCurve::Bool(Default::default()),
            |blackboard: &mut Blackboard<TestWorld>, view: AgentView<'_, TestWorld>| {
                blackboard.get_state(&ammo(), view) as ActionScore
            },
        );

        assert_eq!(has_ammo.name(), "HasAmmo");
        assert_eq!(has_ammo.score(&mut blackboard, view), 0.0);
    }

    #[test]
    fn degenerate_normalization_is_rejected() {
        assert!(Normalization::new(5., 5.).is_err());
        assert!(Normalization::new(0., f32::INFINITY).is_err());

        let inverted = Normalization::new(10., 0.).unwrap();
        assert_eq!(inverted.apply(2.5), 0.75);
    }
}
