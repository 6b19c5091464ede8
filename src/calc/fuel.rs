// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Carburetor sizing.

use super::{positive, CalcError};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const MAX_CUBIC_INCHES: f64 = 1_000.0;
const MAX_ENGINE_CC: f64 = 10_000.0;
const MAX_RPM: f64 = 30_000.0;
const MAX_VOLUMETRIC_EFFICIENCY: f64 = 1.2;

/// Typical volumetric efficiency of a street engine.
pub const DEFAULT_VOLUMETRIC_EFFICIENCY: f64 = 0.85;

/// Cubic inches per cubic foot, times two for a four-stroke intake cycle.
const CFM_DIVISOR: f64 = 3456.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CarburetorCfm {
    pub cfm: f64,
    pub volumetric_efficiency: f64,
}

/// Airflow requirement in CFM for an engine size (cubic inches) at max rpm.
pub fn carburetor_cfm(
    cubic_inches: f64,
    rpm: f64,
    volumetric_efficiency: f64,
) -> Result<CarburetorCfm, CalcError> {
    let cid = positive("engine_size", cubic_inches, MAX_CUBIC_INCHES)?;
    let rpm = positive("rpm", rpm, MAX_RPM)?;
    let ve = positive(
        "volumetric_efficiency",
        volumetric_efficiency,
        MAX_VOLUMETRIC_EFFICIENCY,
    )?;

    Ok(CarburetorCfm {
        cfm: cid * rpm * ve / CFM_DIVISOR,
        volumetric_efficiency: ve,
    })
}

/// How the engine is used; selects the sizing constant and target rpm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum UsageProfile {
    /// Daily / stock
    #[default]
    Daily,
    /// Touring / semi-race
    Touring,
    /// Full competition
    Racing,
}

impl UsageProfile {
    /// Read the usage profile from a form field; absent or blank means
    /// daily use.
    pub fn from_input(input: Option<&str>) -> Result<Self, CalcError> {
        match input.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(UsageProfile::Daily),
            Some(value) if value.eq_ignore_ascii_case("daily") => Ok(UsageProfile::Daily),
            Some(value) if value.eq_ignore_ascii_case("touring") => Ok(UsageProfile::Touring),
            Some(value) if value.eq_ignore_ascii_case("racing") => Ok(UsageProfile::Racing),
            Some(_) => Err(CalcError::InvalidChoice {
                field: "usage",
                allowed: "daily, touring or racing",
            }),
        }
    }

    /// (K, target rpm)
    fn constants(self) -> (f64, f64) {
        match self {
            UsageProfile::Daily => (0.80, 9_000.0),
            UsageProfile::Touring => (0.85, 11_000.0),
            UsageProfile::Racing => (0.90, 13_000.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VenturiSize {
    /// Computed venturi diameter (mm)
    pub exact_mm: f64,
    /// Nearest common carburetor size (multiple of 2 mm)
    pub recommended_mm: f64,
    pub target_rpm: f64,
}

/// Empirical venturi size: K x sqrt(cc x rpm / 1000), rounded to 2 mm steps.
pub fn carburetor_venturi(engine_cc: f64, usage: UsageProfile) -> Result<VenturiSize, CalcError> {
    let cc = positive("engine_cc", engine_cc, MAX_ENGINE_CC)?;
    let (k, target_rpm) = usage.constants();

    let exact_mm = k * (cc * target_rpm / 1000.0).sqrt();

    Ok(VenturiSize {
        exact_mm,
        recommended_mm: round_half_up(exact_mm / 2.0) * 2.0,
        target_rpm,
    })
}

/// Round to nearest, halves toward positive infinity.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
