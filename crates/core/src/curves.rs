/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Response Curves - pure functions that map a normalized measurement onto a desirability in [0, 1].
//!
//! For Utility AI purposes, all Curves have a unit interval domain (i.e. 0.0 to 1.0),
//! and a range of values that is ALSO a unit interval (visually, forming a 1x1 square).
//! Callers are responsible for normalizing raw measurements (e.g. distance divided by
//! some max range) before they reach a Curve; a Consideration's accessor or its optional
//! `Normalization` is where that knowledge lives.
//!
//! Curves are built on top of Bevy's generic `Curve<f32>` trait, so any Bevy curve with
//! a unit domain can be promoted into a Utility Curve with a one-line impl.
//!
//! The most important items in this module, in descending order, are:
//! 1) The `UtilityCurve` trait and its `evaluate()` method - the ONE way curves get sampled for scoring.
//! 2) The `SupportedUtilityCurve` enum which holds all built-in curve families plus user-defined ones.
//! 3) The `UtilityCurveRegistry`, which allows you to register your own Curves under a name (presets).
//! 4) `UtilityCurveExt`, with constructors for transforms that are still valid Utility Curves.
use bevy::math::curve::{Curve, Interval};
use bevy::platform::sync::Arc;

use crate::errors::{CatalogueError, CurveError};
use crate::types::{ActionScore, CurveIdentifier, GanglionKvMap, MAX_CONSIDERATION_SCORE, MIN_CONSIDERATION_SCORE};

// Reexporting the basic Bevy curves used by the built-ins for easy access when building custom Curves.
pub use bevy::math::curve::{LinearCurve, QuadraticInCurve};

/// Maps an arbitrary input onto the unit interval; NaN counts as 0.
#[inline]
pub fn sanitize_input(t: ActionScore) -> ActionScore {
    match t.is_nan() {
        true => MIN_CONSIDERATION_SCORE,
        false => Interval::UNIT.clamp(t),
    }
}

/// Maps an arbitrary curve output onto the unit interval; NaN counts as 0.
#[inline]
pub fn sanitize_output(score: ActionScore) -> ActionScore {
    match score.is_nan() {
        true => MIN_CONSIDERATION_SCORE,
        false => score.clamp(MIN_CONSIDERATION_SCORE, MAX_CONSIDERATION_SCORE),
    }
}

fn check_finite(name: &'static str, value: ActionScore) -> Result<ActionScore, CurveError> {
    match value.is_finite() {
        true => Ok(value),
        false => Err(CurveError::NonFiniteParameter { name, value }),
    }
}

fn check_unit(name: &'static str, value: ActionScore) -> Result<ActionScore, CurveError> {
    match Interval::UNIT.contains(value) {
        true => Ok(value),
        false => Err(CurveError::OutOfUnitRange { name, value }),
    }
}

/// Curve functions suitable for Utility scoring purposes.
///
/// All eligible functions must have a unit domain (i.e. <0.0; 1.0>) **AND** an output range
/// of unity as well, or at least you must be willing to allow them to be clamped to this range
/// by `UtilityCurve::evaluate(&self, t)`.
pub trait UtilityCurve: Curve<ActionScore> + Send + Sync {
    /// **IMPORTANT!** Use this method for sampling for Utility purposes.
    ///
    /// Total function: clamps the input to the unit interval, samples, and clamps the output
    /// to the unit interval too. NaNs on either side are treated as zero.
    ///
    /// Curves that interpret the raw input directly (like the boolean steps) override this.
    fn evaluate(&self, t: ActionScore) -> ActionScore {
        sanitize_output(self.sample_unchecked(sanitize_input(t)))
    }
}

pub trait UtilityCurveExt: UtilityCurve + Sized {
    /// Creates a new Curve returning `1.0 - self.evaluate(t)`.
    fn inverted(self) -> Inverted<Self> {
        Inverted::new(self)
    }

    /// Creates a new Curve that has the same shape as this Curve, but squished above a provided
    /// 'floor' of Utility - e.g. `c.soft_leak(0.1)` will always output AT LEAST 0.1 Utility.
    fn soft_leak(self, gain: ActionScore) -> SoftLeak<Self> {
        SoftLeak::new(self, gain)
    }

    /// Creates a new Curve that has the same shape as this Curve, but shifted up and clipped
    /// at 1.0 - e.g. `c.hard_leak(0.1)` will always output AT LEAST 0.1 Utility.
    fn hard_leak(self, gain: ActionScore) -> HardLeak<Self> {
        HardLeak::new(self, gain)
    }
}

impl<T: UtilityCurve + Sized> UtilityCurveExt for T {}

/// A curve with a constant, user-defined value.
///
/// Will return the same score when sampled anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct UtilityConstantCurve {
    val: ActionScore
}

impl UtilityConstantCurve {
    /// Fallible - rejects values outside of the unit interval (and NaNs).
    pub fn new(value: ActionScore) -> Result<Self, CurveError> {
        check_unit("value", value).map(|val| Self { val })
    }

    /// Ensures that the constant value is valid by clamping it.
    pub fn new_clamped(value: ActionScore) -> Self {
        Self { val: sanitize_output(value) }
    }

    /// The value is effectively calculated as (VAL/256), except that 255 maps to exactly 1.0;
    /// always safe to construct, so it works in const contexts.
    pub const fn new_const(value: u8) -> Self {
        Self {
            val: match value {
                0 => 0.,
                255 => 1.,
                mid => (mid as ActionScore) / 256.
            }
        }
    }

    pub fn value(&self) -> ActionScore {
        self.val
    }
}

impl Curve<ActionScore> for UtilityConstantCurve {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, _: f32) -> ActionScore {
        self.val
    }
}

impl UtilityCurve for UtilityConstantCurve {}


/// Boolean step: 1.0 for any raw input other than zero, 0.0 for zero.
///
/// Reads the *raw* input, so negative values and NaN count as truthy.
/// This is the curve to use for hard gates ("is a weapon equipped").
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoolCurve;

impl Curve<ActionScore> for BoolCurve {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, t: f32) -> ActionScore {
        match t != 0. {
            true => MAX_CONSIDERATION_SCORE,
            false => MIN_CONSIDERATION_SCORE,
        }
    }
}

impl UtilityCurve for BoolCurve {
    fn evaluate(&self, t: ActionScore) -> ActionScore {
        self.sample_unchecked(t)
    }
}

/// The logical complement of `BoolCurve`: 1.0 for a raw zero, 0.0 otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InverseBoolCurve;

impl Curve<ActionScore> for InverseBoolCurve {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, t: f32) -> ActionScore {
        MAX_CONSIDERATION_SCORE - BoolCurve.sample_unchecked(t)
    }
}

impl UtilityCurve for InverseBoolCurve {
    fn evaluate(&self, t: ActionScore) -> ActionScore {
        self.sample_unchecked(t)
    }
}

/// `clamp(a*x^2 + b*x + c, intercept, 1.0)` over the normalized input `x`.
///
/// The intercept doubles as a floor: no input can drag the score below it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticCurve {
    a: ActionScore,
    b: ActionScore,
    c: ActionScore,
    intercept: ActionScore,
}

impl QuadraticCurve {
    /// Coefficients must be finite and the intercept must lie within [0, 1].
    pub fn new(a: ActionScore, b: ActionScore, c: ActionScore, intercept: ActionScore) -> Result<Self, CurveError> {
        Ok(Self {
            a: check_finite("a", a)?,
            b: check_finite("b", b)?,
            c: check_finite("c", c)?,
            intercept: check_unit("intercept", intercept)?,
        })
    }

    pub fn coefficients(&self) -> (ActionScore, ActionScore, ActionScore, ActionScore) {
        (self.a, self.b, self.c, self.intercept)
    }
}

impl Curve<ActionScore> for QuadraticCurve {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, x: f32) -> ActionScore {
        let raw = self.a * x * x + self.b * x + self.c;
        match raw.is_nan() {
            true => self.intercept,
            false => raw.clamp(self.intercept, MAX_CONSIDERATION_SCORE),
        }
    }
}

impl UtilityCurve for QuadraticCurve {}

/// `clamp(slope * (x - x_offset)^exponent + y_offset, 0, 1)`.
///
/// Fractional exponents over a negative base produce NaN, which evaluates as zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerCurve {
    slope: ActionScore,
    exponent: ActionScore,
    x_offset: ActionScore,
    y_offset: ActionScore,
}

impl PowerCurve {
    pub fn new(slope: ActionScore, exponent: ActionScore, x_offset: ActionScore, y_offset: ActionScore) -> Result<Self, CurveError> {
        Ok(Self {
            slope: check_finite("slope", slope)?,
            exponent: check_finite("exponent", exponent)?,
            x_offset: check_finite("x_offset", x_offset)?,
            y_offset: check_finite("y_offset", y_offset)?,
        })
    }
}

impl Curve<ActionScore> for PowerCurve {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, x: f32) -> ActionScore {
        self.slope * (x - self.x_offset).powf(self.exponent) + self.y_offset
    }
}

impl UtilityCurve for PowerCurve {}

/// `1.0 - f(x)` for any wrapped Utility Curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Inverted<C: UtilityCurve> {
    curve: C,
}

impl<C: UtilityCurve> Inverted<C> {
    pub const fn new(curve: C) -> Self {
        Self { curve }
    }
}

impl<C: UtilityCurve> Curve<ActionScore> for Inverted<C> {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, t: f32) -> ActionScore {
        MAX_CONSIDERATION_SCORE - self.curve.evaluate(t)
    }
}

impl<C: UtilityCurve> UtilityCurve for Inverted<C> {
    fn evaluate(&self, t: ActionScore) -> ActionScore {
        sanitize_output(self.sample_unchecked(t))
    }
}

/// `g + (1.0 - g) * f(x)`.
///
/// Creates a floor of minimum Utility while keeping the shape of the wrapped Curve,
/// at the cost of squishing it. A negative gain turns this into an expander instead.
#[derive(Debug, Clone)]
pub struct SoftLeak<C: UtilityCurve> {
    curve: C,
    gain: ActionScore,
}

impl<C: UtilityCurve> SoftLeak<C> {
    pub fn new(curve: C, gain: ActionScore) -> Self {
        Self { curve, gain }
    }
}

impl<C: UtilityCurve> Curve<ActionScore> for SoftLeak<C> {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, t: f32) -> ActionScore {
        self.gain + (1. - self.gain) * self.curve.evaluate(t)
    }
}

impl<C: UtilityCurve> UtilityCurve for SoftLeak<C> {
    fn evaluate(&self, t: ActionScore) -> ActionScore {
        sanitize_output(self.sample_unchecked(t))
    }
}

/// `clamp(g + f(x), 0, 1)`.
///
/// Shifts the wrapped Curve up, flattening whatever ends up above 1.0.
/// A negative gain acts as a saturating subtraction.
#[derive(Debug, Clone)]
pub struct HardLeak<C: UtilityCurve> {
    curve: C,
    gain: ActionScore,
}

impl<C: UtilityCurve> HardLeak<C> {
    pub fn new(curve: C, gain: ActionScore) -> Self {
        Self { curve, gain }
    }
}

impl<C: UtilityCurve> Curve<ActionScore> for HardLeak<C> {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, t: f32) -> ActionScore {
        self.gain + self.curve.evaluate(t)
    }
}

impl<C: UtilityCurve> UtilityCurve for HardLeak<C> {
    fn evaluate(&self, t: ActionScore) -> ActionScore {
        sanitize_output(self.sample_unchecked(t))
    }
}

// Bevy easing curves that natively output on the unit interval.
impl UtilityCurve for LinearCurve {}
impl UtilityCurve for QuadraticInCurve {}

/// A curve that always returns zero; handy for knocking an action out without deleting it.
pub const CURVE_CONST_ZERO: UtilityConstantCurve = UtilityConstantCurve::new_const(0);
/// A curve that always returns 0.5; mainly useful as a placeholder.
pub const CURVE_CONST_HALF: UtilityConstantCurve = UtilityConstantCurve::new_const(128);
/// A curve that always returns full score; mainly useful as a placeholder.
pub const CURVE_CONST_MAX: UtilityConstantCurve = UtilityConstantCurve::new_const(255);


/// All response curve families the engine knows about, plus an escape hatch for user curves.
#[derive(Clone)]
pub enum SupportedUtilityCurve {
    /// 1.0 if `raw != 0`, else 0.0. Dirt-cheap; the go-to for hard gates.
    Bool(BoolCurve),

    /// 1.0 if `raw == 0`, else 0.0. Complement of `Bool`.
    InverseBool(InverseBoolCurve),

    /// `clamp(a*x^2 + b*x + c, intercept, 1.0)`.
    Quadratic(QuadraticCurve),

    /// `clamp(slope * (x - x_offset)^exponent + y_offset, 0, 1)`.
    Power(PowerCurve),

    /// Same value everywhere.
    Constant(UtilityConstantCurve),

    /// `x`. The most fundamental 'fuzzy logic' curve; recommended first option.
    Linear(LinearCurve),

    /// `1 - x`.
    AntiLinear(Inverted<LinearCurve>),

    /// `x^2`.
    Square(QuadraticInCurve),

    /// `1 - x^2`.
    AntiSquare(Inverted<QuadraticInCurve>),

    /// A user-defined Curve type, typically registered in the UtilityCurveRegistry.
    ///
    /// Due to the Arc<dyn T> overhead, these are slightly slower than the built-ins.
    Custom(Arc<dyn UtilityCurve>),
}

impl SupportedUtilityCurve {
    pub fn quadratic(a: ActionScore, b: ActionScore, c: ActionScore, intercept: ActionScore) -> Result<Self, CurveError> {
        QuadraticCurve::new(a, b, c, intercept).map(Self::Quadratic)
    }

    pub fn power(slope: ActionScore, exponent: ActionScore, x_offset: ActionScore, y_offset: ActionScore) -> Result<Self, CurveError> {
        PowerCurve::new(slope, exponent, x_offset, y_offset).map(Self::Power)
    }

    pub fn constant(value: ActionScore) -> Result<Self, CurveError> {
        UtilityConstantCurve::new(value).map(Self::Constant)
    }

    pub fn custom<C: UtilityCurve + 'static>(curve: C) -> Self {
        Self::Custom(Arc::new(curve))
    }
}

impl core::fmt::Debug for SupportedUtilityCurve {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bool(_) => f.debug_tuple("Bool").finish(),
            Self::InverseBool(_) => f.debug_tuple("InverseBool").finish(),
            Self::Quadratic(c) => f.debug_tuple("Quadratic").field(c).finish(),
            Self::Power(c) => f.debug_tuple("Power").field(c).finish(),
            Self::Constant(c) => f.debug_tuple("Constant").field(&c.value()).finish(),
            Self::Linear(_) => f.debug_tuple("Linear").finish(),
            Self::AntiLinear(_) => f.debug_tuple("AntiLinear").finish(),
            Self::Square(_) => f.debug_tuple("Square").finish(),
            Self::AntiSquare(_) => f.debug_tuple("AntiSquare").finish(),
            Self::Custom(_) => f.debug_tuple("Custom").finish(),
        }
    }
}

impl Curve<ActionScore> for SupportedUtilityCurve {
    fn domain(&self) -> Interval {
        Interval::UNIT
    }

    fn sample_unchecked(&self, t: f32) -> ActionScore {
        self.evaluate(t)
    }
}

impl UtilityCurve for SupportedUtilityCurve {
    fn evaluate(&self, t: ActionScore) -> ActionScore {
        match self {
            Self::Bool(c) => c.evaluate(t),
            Self::InverseBool(c) => c.evaluate(t),
            Self::Quadratic(c) => c.evaluate(t),
            Self::Power(c) => c.evaluate(t),
            Self::Constant(c) => c.evaluate(t),
            Self::Linear(c) => c.evaluate(t),
            Self::AntiLinear(c) => c.evaluate(t),
            Self::Square(c) => c.evaluate(t),
            Self::AntiSquare(c) => c.evaluate(t),
            // User code may override evaluate() carelessly, so re-sanitize.
            Self::Custom(c) => sanitize_output(c.evaluate(t)),
        }
    }
}

impl TryFrom<&str> for SupportedUtilityCurve {
    type Error = CatalogueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        resolve_curve_from_name(value).ok_or_else(|| CatalogueError::UnknownCurve(value.into()))
    }
}

/// Retrieves one of the parameterless built-in curves by name.
///
/// This will only work for curves included with the library;
/// for user-registered presets, go through the `UtilityCurveRegistry`.
pub fn resolve_curve_from_name<S: core::borrow::Borrow<str>>(curve_name: S) -> Option<SupportedUtilityCurve> {
    match curve_name.borrow() {
        "Bool" => Some(SupportedUtilityCurve::Bool(BoolCurve)),
        "InverseBool" => Some(SupportedUtilityCurve::InverseBool(InverseBoolCurve)),
        "ConstZero" => Some(SupportedUtilityCurve::Constant(CURVE_CONST_ZERO)),
        "ConstHalf" => Some(SupportedUtilityCurve::Constant(CURVE_CONST_HALF)),
        "ConstMax" => Some(SupportedUtilityCurve::Constant(CURVE_CONST_MAX)),
        "Linear" => Some(SupportedUtilityCurve::Linear(LinearCurve)),
        "AntiLinear" => Some(SupportedUtilityCurve::AntiLinear(Inverted::new(LinearCurve))),
        "Square" => Some(SupportedUtilityCurve::Square(QuadraticInCurve)),
        "AntiSquare" => Some(SupportedUtilityCurve::AntiSquare(Inverted::new(QuadraticInCurve))),
        _ => None,
    }
}

/// A map that lets us request Utility Curves by name and register new entries (presets) for custom Curves.
#[derive(Clone, Default)]
pub struct UtilityCurveRegistry {
    mapping: GanglionKvMap<CurveIdentifier, SupportedUtilityCurve>
}

impl UtilityCurveRegistry {
    /// Built-in names resolve first; everything else comes from registrations.
    pub fn get_curve_by_name<S: core::borrow::Borrow<str>>(&self, name: S) -> Option<SupportedUtilityCurve> {
        match resolve_curve_from_name(name.borrow()) {
            Some(static_curve) => Some(static_curve),
            None => self.mapping.get(name.borrow()).cloned()
        }
    }

    /// Registers a named curve.
    ///
    /// Built-in names cannot be shadowed. Re-registering a custom name replaces the old curve.
    pub fn register_curve<IS: Into<CurveIdentifier>>(
        &mut self,
        name: IS,
        curve: SupportedUtilityCurve,
    ) -> Result<&mut Self, CatalogueError> {
        let name = name.into();
        if resolve_curve_from_name(name.as_str()).is_some() {
            #[cfg(feature = "logging")]
            bevy::log::error!("Curve name {:?} is reserved for a built-in curve", name);
            return Err(CatalogueError::ReservedCurveName(name));
        }

        let _old = self.mapping.insert(name.clone(), curve);

        #[cfg(feature = "logging")]
        {
            if _old.is_some() {
                bevy::log::warn!(
                    "Detected a key collision for curve {:?}. Ejecting previous registration...",
                    name
                );
            }
        }

        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}
