// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Engine, fuel, transmission and tire calculators.
//!
//! Every evaluator is a pure function over validated numeric inputs. Nothing
//! here touches the network or the database; quota accounting happens in the
//! route layer once a result has been produced.

pub mod engine;
pub mod fuel;
pub mod input;
pub mod tires;
pub mod transmission;

pub use engine::{
    compression_ratio, displacement, piston_speed, valve_sizes, CompressionInputs,
    CompressionRatio, Displacement, PistonSpeed, ValveLayout, ValveSizes,
};
pub use fuel::{carburetor_cfm, carburetor_venturi, CarburetorCfm, UsageProfile, VenturiSize};
pub use input::NumericInput;
pub use tires::{compare_tires, TireComparison, TireDimensions, TireSize};
pub use transmission::{gear_ratios, top_speed, Drivetrain, GearRatios, GearSpeed};

use serde::Serialize;
use std::fmt;

/// Validation failure for calculator input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{0} must be a number")]
    NotNumeric(&'static str),

    #[error("{field} must be greater than 0 and at most {max}")]
    OutOfRange { field: &'static str, max: f64 },

    #[error("{field} must not be negative and at most {max}")]
    NegativeOrTooLarge { field: &'static str, max: f64 },

    #[error("{0} must be a whole number")]
    NotWhole(&'static str),

    #[error("{field} must be one of {allowed}")]
    InvalidChoice {
        field: &'static str,
        allowed: &'static str,
    },

    #[error("Combustion chamber volume must be greater than 0 (chamber + gasket - dome)")]
    NonPositiveClearance,

    #[error("At least one gear ratio is required")]
    NoGears,

    #[error("At most {0} gear ratios are supported")]
    TooManyGears(usize),
}

/// Calculator identifiers, used for routing and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculatorKind {
    Displacement,
    CompressionRatio,
    PistonSpeed,
    ValveSize,
    CarburetorCfm,
    CarburetorVenturi,
    GearRatios,
    TopSpeed,
    TireComparison,
}

impl CalculatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculatorKind::Displacement => "displacement",
            CalculatorKind::CompressionRatio => "compression_ratio",
            CalculatorKind::PistonSpeed => "piston_speed",
            CalculatorKind::ValveSize => "valve_size",
            CalculatorKind::CarburetorCfm => "carburetor_cfm",
            CalculatorKind::CarburetorVenturi => "carburetor_venturi",
            CalculatorKind::GearRatios => "gear_ratios",
            CalculatorKind::TopSpeed => "top_speed",
            CalculatorKind::TireComparison => "tire_comparison",
        }
    }
}

impl fmt::Display for CalculatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Require `value` to be finite, strictly positive and no larger than `max`.
pub(crate) fn positive(field: &'static str, value: f64, max: f64) -> Result<f64, CalcError> {
    if value.is_finite() && value > 0.0 && value <= max {
        Ok(value)
    } else {
        Err(CalcError::OutOfRange { field, max })
    }
}

/// Like [`positive`], but zero is accepted.
pub(crate) fn non_negative(field: &'static str, value: f64, max: f64) -> Result<f64, CalcError> {
    if value.is_finite() && value >= 0.0 && value <= max {
        Ok(value)
    } else {
        Err(CalcError::NegativeOrTooLarge { field, max })
    }
}

/// Require a positive whole count (cylinders, sprocket teeth).
pub(crate) fn whole(field: &'static str, value: f64, max: f64) -> Result<u32, CalcError> {
    let value = positive(field, value, max)?;
    if value.fract() != 0.0 {
        return Err(CalcError::NotWhole(field));
    }
    Ok(value as u32)
}
