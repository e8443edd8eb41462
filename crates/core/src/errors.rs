/* 
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. 
If a copy of the MPL was not distributed with this file, 
You can obtain one at https://mozilla.org/MPL/2.0/. 
*/
//! Error types and error-handling policies.
//! 
//! The engine draws a hard line between two kinds of trouble: 
//! 
//! 1) Bad authored data (malformed curves, duplicate keys, unknown names). 
//!    These are `CatalogueError`s and are rejected at registration time.
//! 2) Bad luck at runtime (a measurement is unavailable, a target vanished). 
//!    These never surface as errors out of scoring or execution; they turn into 
//!    sentinel values, Failed Operators, or an idle agent.

use thiserror::Error;

use crate::curves::SupportedUtilityCurve;
use crate::types::{ActionKey, ActionScore, CurveIdentifier, OperatorKey, StateKeyName};

/// Something is wrong with the parameters of a response curve.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurveError {
    #[error("curve parameter `{name}` must be finite, got {value}")]
    NonFiniteParameter { name: &'static str, value: ActionScore },

    #[error("curve parameter `{name}` must lie within [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: ActionScore },
}

/// Malformed catalogue or configuration data, detected when registering or building actions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogueError {
    #[error("an action with key `{0}` is already registered")]
    DuplicateActionKey(ActionKey),

    #[error("action `{action}` has an invalid bonus {bonus} (must be finite and non-negative)")]
    InvalidBonus { action: ActionKey, bonus: ActionScore },

    #[error("invalid curve in {context}")]
    InvalidCurve {
        context: String,
        #[source]
        source: CurveError,
    },

    #[error("no curve named `{0}` is registered")]
    UnknownCurve(CurveIdentifier),

    #[error("curve name `{0}` is reserved for a built-in curve")]
    ReservedCurveName(CurveIdentifier),

    #[error("no world-state computation named `{0}` is registered")]
    UnknownStateKey(StateKeyName),

    #[error("world-state `{0}` cannot be used as a measurement (register it with `register_measurement`)")]
    NotAMeasurement(StateKeyName),

    #[error("normalization bounds [{min}, {max}] are degenerate or non-finite")]
    InvalidNormalization { min: ActionScore, max: ActionScore },

    #[error("no operator factory named `{0}` is registered")]
    UnknownOperator(OperatorKey),

    #[error("operator `{operator}` requires parameter `{param}`")]
    MissingOperatorParam { operator: OperatorKey, param: String },

    #[error("no ActionSet named `{0}` is available")]
    UnknownActionSet(String),
}

/// Why a typed Blackboard read could not be served from a real value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BlackboardError {
    #[error("no world-state computation named `{0}` is registered")]
    Unregistered(StateKeyName),

    #[error("world-state `{key}` does not hold a value of type `{expected}`")]
    TypeMismatch { key: StateKeyName, expected: &'static str },

    #[error("world-state `{key}` is unavailable: {source}")]
    Unavailable {
        key: StateKeyName,
        #[source]
        source: StateError,
    },
}

/// Returned by user world-state computations when they cannot produce a value.
/// 
/// The Blackboard swallows these and hands out the type's default instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("{0}")]
    Unavailable(String),

    #[error("agent no longer exists")]
    MissingAgent,
}

impl StateError {
    pub fn unavailable<IS: Into<String>>(reason: IS) -> Self {
        Self::Unavailable(reason.into())
    }
}

/// Returned by Operator factories that cannot build an Operator from the given parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OperatorBuildError {
    #[error("missing parameter `{0}`")]
    MissingParam(String),

    #[error("parameter `{param}` should be a {expected}")]
    WrongParamType { param: String, expected: &'static str },

    #[error("{0}")]
    Unavailable(String),
}

/// Determines what the library will do if an authored Consideration references a Curve name 
/// that is neither built-in nor present in the `UtilityCurveRegistry`.
#[derive(Clone, Debug, Default)]
pub enum NoCurveMatchStrategy {
    /// Reject the whole action with a `CatalogueError::UnknownCurve`.
    #[default]
    Reject,

    /// Drop the offending Consideration and build the rest of the action; logs a warning. 
    /// 
    /// Dropping a Consideration can only ever raise the action's score, so use with care.
    SkipConsiderationWithLog,

    /// Leave the whole action out of the catalogue; logs a warning.
    SkipActionWithLog,

    /// Substitute the provided Curve and log a warning.
    DefaultCurveWithLog(SupportedUtilityCurve),

    /// Substitute the provided Curve silently.
    DefaultCurveWithoutLog(SupportedUtilityCurve),
}

impl NoCurveMatchStrategy {
    pub const fn reject() -> Self {
        Self::Reject
    }

    pub const fn skip_consideration() -> Self {
        Self::SkipConsiderationWithLog
    }

    pub const fn skip_action() -> Self {
        Self::SkipActionWithLog
    }

    pub fn default_curve(curve: SupportedUtilityCurve, log: bool) -> Self {
        match log {
            true => Self::DefaultCurveWithLog(curve),
            false => Self::DefaultCurveWithoutLog(curve),
        }
    }
}
