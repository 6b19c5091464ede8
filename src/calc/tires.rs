// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tire geometry and size comparison.

use super::{positive, CalcError};
use serde::Serialize;
use std::f64::consts::PI;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const MAX_WIDTH_MM: f64 = 400.0;
const MAX_ASPECT_PERCENT: f64 = 100.0;
const MAX_RIM_INCHES: f64 = 30.0;
const MM_PER_INCH: f64 = 25.4;

/// Metric tire size, e.g. 120/70-17.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TireSize {
    pub width_mm: f64,
    /// Sidewall height as a percentage of width
    pub aspect_ratio: f64,
    pub rim_inches: f64,
}

impl TireSize {
    pub fn validated(self) -> Result<Self, CalcError> {
        Ok(Self {
            width_mm: positive("tire_width", self.width_mm, MAX_WIDTH_MM)?,
            aspect_ratio: positive("tire_aspect_ratio", self.aspect_ratio, MAX_ASPECT_PERCENT)?,
            rim_inches: positive("tire_rim", self.rim_inches, MAX_RIM_INCHES)?,
        })
    }

    pub fn sidewall_mm(&self) -> f64 {
        self.width_mm * (self.aspect_ratio / 100.0)
    }

    /// Overall diameter in mm.
    pub fn diameter_mm(&self) -> f64 {
        self.sidewall_mm() * 2.0 + self.rim_inches * MM_PER_INCH
    }

    /// Rolling circumference in mm.
    pub fn circumference_mm(&self) -> f64 {
        self.diameter_mm() * PI
    }

    pub fn dimensions(&self) -> TireDimensions {
        TireDimensions {
            diameter_mm: self.diameter_mm(),
            circumference_mm: self.circumference_mm(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TireDimensions {
    pub diameter_mm: f64,
    pub circumference_mm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TireComparison {
    pub stock: TireDimensions,
    pub new: TireDimensions,
    /// New minus stock diameter (mm)
    pub diameter_diff_mm: f64,
    /// Circumference change relative to stock, in percent
    pub circumference_diff_percent: f64,
    /// What the speedometer shows at a true 100 km/h on the new tire
    pub speedometer_at_100: f64,
}

pub fn compare_tires(stock: TireSize, new: TireSize) -> Result<TireComparison, CalcError> {
    let stock = stock.validated()?.dimensions();
    let new = new.validated()?.dimensions();

    Ok(TireComparison {
        diameter_diff_mm: new.diameter_mm - stock.diameter_mm,
        circumference_diff_percent: (new.circumference_mm - stock.circumference_mm)
            / stock.circumference_mm
            * 100.0,
        speedometer_at_100: 100.0 * (stock.circumference_mm / new.circumference_mm),
        stock,
        new,
    })
}
