//! The authored data model: action catalogues as plain data.
//!
//! An `ActionSet` is what designers write (in JSON, RON, YAML...; see the loader crate).
//! Nothing here is executable yet; the `ActionLibrary` turns templates into real actions,
//! resolving curve, state and Operator names against its registries.
//!
//! The serde derives are only available with the `actionset_loader` feature.

#[cfg(any(feature = "actionset_loader"))]
use serde::{Deserialize, Serialize};

use crate::considerations::Normalization;
use crate::curves::{SoftLeak, HardLeak, SupportedUtilityCurve, UtilityCurveRegistry};
use crate::errors::CatalogueError;
use crate::operators::OperatorParams;
use crate::types::{ActionKey, ActionScore, CurveIdentifier, OperatorKey, StateKeyName};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "actionset_loader"), derive(Serialize, Deserialize))]
pub struct ActionSet {
    pub name: String,

    #[cfg_attr(any(feature = "actionset_loader"), serde(default))]
    pub actions: Vec<ActionTemplate>,
}

impl ActionSet {
    pub fn new<IS: Into<String>>(name: IS) -> Self {
        Self { name: name.into(), actions: Vec::new() }
    }

    pub fn with_action(mut self, action: ActionTemplate) -> Self {
        self.actions.push(action);
        self
    }
}

fn default_bonus() -> ActionScore {
    1.
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "actionset_loader"), derive(Serialize, Deserialize))]
pub struct ActionTemplate {
    pub key: ActionKey,

    #[cfg_attr(any(feature = "actionset_loader"), serde(default = "default_bonus"))]
    pub bonus: ActionScore,

    #[cfg_attr(any(feature = "actionset_loader"), serde(default = "default_true"))]
    pub can_override: bool,

    #[cfg_attr(any(feature = "actionset_loader"), serde(default))]
    pub considerations: Vec<ConsiderationTemplate>,

    #[cfg_attr(any(feature = "actionset_loader"), serde(default))]
    pub plan: Vec<OperatorTemplate>,
}

impl ActionTemplate {
    pub fn new<IS: Into<ActionKey>>(key: IS) -> Self {
        Self {
            key: key.into(),
            bonus: default_bonus(),
            can_override: true,
            considerations: Vec::new(),
            plan: Vec::new(),
        }
    }

    pub fn with_bonus(mut self, bonus: ActionScore) -> Self {
        self.bonus = bonus;
        self
    }

    pub fn with_can_override(mut self, can_override: bool) -> Self {
        self.can_override = can_override;
        self
    }

    pub fn with_consideration(mut self, consideration: ConsiderationTemplate) -> Self {
        self.considerations.push(consideration);
        self
    }

    pub fn with_step(mut self, step: OperatorTemplate) -> Self {
        self.plan.push(step);
        self
    }
}

/// Reads the named measurement (see `StateRegistry::register_measurement()`) through a curve.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "actionset_loader"), derive(Serialize, Deserialize))]
pub struct ConsiderationTemplate {
    pub state: StateKeyName,
    pub curve: CurveTemplate,

    #[cfg_attr(any(feature = "actionset_loader"), serde(default))]
    pub normalization: Option<Normalization>,
}

impl ConsiderationTemplate {
    pub fn new<IS: Into<StateKeyName>>(state: IS, curve: CurveTemplate) -> Self {
        Self { state: state.into(), curve, normalization: None }
    }

    pub fn normalized(mut self, min: ActionScore, max: ActionScore) -> Self {
        self.normalization = Some(Normalization { min, max });
        self
    }
}

/// Authored curve descriptions. Unit variants are written as plain strings (`"Linear"`),
/// parameterized ones as single-key maps (`{"Quadratic": {"a": -1.2, "b": 2.0, "c": 1.2}}`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "actionset_loader"), derive(Serialize, Deserialize))]
pub enum CurveTemplate {
    Bool,
    InverseBool,
    Linear,
    AntiLinear,
    Square,
    AntiSquare,
    Constant {
        value: ActionScore,
    },
    Quadratic {
        a: ActionScore,
        b: ActionScore,
        c: ActionScore,
        #[cfg_attr(any(feature = "actionset_loader"), serde(default))]
        intercept: ActionScore,
    },
    Power {
        slope: ActionScore,
        exponent: ActionScore,
        #[cfg_attr(any(feature = "actionset_loader"), serde(default))]
        x_offset: ActionScore,
        #[cfg_attr(any(feature = "actionset_loader"), serde(default))]
        y_offset: ActionScore,
    },
    SoftLeak {
        gain: ActionScore,
        curve: Box<CurveTemplate>,
    },
    HardLeak {
        gain: ActionScore,
        curve: Box<CurveTemplate>,
    },
    /// A named curve: a built-in one or a preset from the `UtilityCurveRegistry`.
    Preset {
        name: CurveIdentifier,
    },
}

impl CurveTemplate {
    pub fn preset<IS: Into<CurveIdentifier>>(name: IS) -> Self {
        Self::Preset { name: name.into() }
    }

    /// Builds the curve. Bad parameters and unknown preset names are errors.
    pub fn resolve(&self, registry: &UtilityCurveRegistry) -> Result<SupportedUtilityCurve, CatalogueError> {
        let invalid = |source| CatalogueError::InvalidCurve { context: alloc::format!("{:?}", self), source };

        let curve = match self {
            Self::Bool => SupportedUtilityCurve::Bool(Default::default()),
            Self::InverseBool => SupportedUtilityCurve::InverseBool(Default::default()),
            Self::Linear | Self::AntiLinear | Self::Square | Self::AntiSquare => {
                let name = match self {
                    Self::Linear => "Linear",
                    Self::AntiLinear => "AntiLinear",
                    Self::Square => "Square",
                    _ => "AntiSquare",
                };
                SupportedUtilityCurve::try_from(name)?
            },
            Self::Constant { value } => SupportedUtilityCurve::constant(*value).map_err(invalid)?,
            Self::Quadratic { a, b, c, intercept } => {
                SupportedUtilityCurve::quadratic(*a, *b, *c, *intercept).map_err(invalid)?
            },
            Self::Power { slope, exponent, x_offset, y_offset } => {
                SupportedUtilityCurve::power(*slope, *exponent, *x_offset, *y_offset).map_err(invalid)?
            },
            Self::SoftLeak { gain, curve } => {
                SupportedUtilityCurve::custom(SoftLeak::new(curve.resolve(registry)?, *gain))
            },
            Self::HardLeak { gain, curve } => {
                SupportedUtilityCurve::custom(HardLeak::new(curve.resolve(registry)?, *gain))
            },
            Self::Preset { name } => registry
                .get_curve_by_name(name.as_str())
                .ok_or_else(|| CatalogueError::UnknownCurve(name.clone()))?,
        };

        Ok(curve)
    }
}

/// One plan step: an Operator key plus its authored parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "actionset_loader"), derive(Serialize, Deserialize))]
pub struct OperatorTemplate {
    pub operator: OperatorKey,

    #[cfg_attr(any(feature = "actionset_loader"), serde(default))]
    pub params: OperatorParams,
}

impl OperatorTemplate {
    pub fn new<IS: Into<OperatorKey>>(operator: IS) -> Self {
        Self { operator: operator.into(), params: OperatorParams::default() }
    }

    pub fn with_params(mut self, params: OperatorParams) -> Self {
        self.params = params;
        self
    }
}
