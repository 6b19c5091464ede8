// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Engine geometry: displacement, compression ratio, piston speed, valves.

use super::input::{required, NumericInput};
use super::{non_negative, positive, whole, CalcError};
use serde::Serialize;
use std::f64::consts::PI;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const MAX_BORE_MM: f64 = 300.0;
const MAX_STROKE_MM: f64 = 300.0;
const MAX_CYLINDERS: f64 = 16.0;
const MAX_RPM: f64 = 30_000.0;
const MAX_VOLUME_CC: f64 = 5_000.0;

/// Cubic centimeters per cubic inch.
pub const CC_PER_CUBIC_INCH: f64 = 16.387_064;

/// Mean piston speed divisor: stroke (mm) x rpm / 30000 = m/s.
const PISTON_SPEED_DIVISOR: f64 = 30_000.0;

/// Engine displacement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Displacement {
    pub per_cylinder_cc: f64,
    pub total_cc: f64,
    pub total_cubic_inches: f64,
    pub cylinders: u32,
}

/// Compute displacement from bore, stroke (both mm) and cylinder count.
pub fn displacement(bore_mm: f64, stroke_mm: f64, cylinders: f64) -> Result<Displacement, CalcError> {
    let bore = positive("bore", bore_mm, MAX_BORE_MM)?;
    let stroke = positive("stroke", stroke_mm, MAX_STROKE_MM)?;
    let cylinders = whole("cylinders", cylinders, MAX_CYLINDERS)?;

    let per_cylinder_cc = PI / 4.0 * bore * bore * stroke / 1000.0;
    let total_cc = per_cylinder_cc * f64::from(cylinders);

    Ok(Displacement {
        per_cylinder_cc,
        total_cc,
        total_cubic_inches: total_cc / CC_PER_CUBIC_INCH,
        cylinders,
    })
}

/// Volumes that make up the compression ratio, all in cc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionInputs {
    /// Swept volume of one cylinder
    pub cylinder_cc: f64,
    /// Combustion chamber volume in the head
    pub chamber_cc: f64,
    /// Head gasket volume
    pub gasket_cc: f64,
    /// Piston dome volume (reduces the clearance volume)
    pub dome_cc: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompressionRatio {
    /// Compression ratio, expressed as `ratio : 1`
    pub ratio: f64,
    /// Total clearance volume (chamber + gasket - dome)
    pub clearance_cc: f64,
}

pub fn compression_ratio(inputs: CompressionInputs) -> Result<CompressionRatio, CalcError> {
    let cylinder = positive("cylinder_volume", inputs.cylinder_cc, MAX_VOLUME_CC)?;
    let chamber = positive("chamber_volume", inputs.chamber_cc, MAX_VOLUME_CC)?;
    let gasket = non_negative("gasket_volume", inputs.gasket_cc, MAX_VOLUME_CC)?;
    let dome = non_negative("dome_volume", inputs.dome_cc, MAX_VOLUME_CC)?;

    let clearance_cc = chamber + gasket - dome;
    if clearance_cc <= 0.0 {
        return Err(CalcError::NonPositiveClearance);
    }

    Ok(CompressionRatio {
        ratio: (cylinder + clearance_cc) / clearance_cc,
        clearance_cc,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PistonSpeed {
    pub meters_per_second: f64,
}

/// Mean piston speed for a stroke (mm) at a given rpm.
pub fn piston_speed(stroke_mm: f64, rpm: f64) -> Result<PistonSpeed, CalcError> {
    let stroke = positive("stroke", stroke_mm, MAX_STROKE_MM)?;
    let rpm = positive("rpm", rpm, MAX_RPM)?;

    Ok(PistonSpeed {
        meters_per_second: stroke * rpm / PISTON_SPEED_DIVISOR,
    })
}

/// Valves per cylinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ValveLayout {
    #[serde(rename = "2")]
    TwoValve,
    #[serde(rename = "4")]
    FourValve,
}

impl ValveLayout {
    /// Read the valve count from a form field (`2` or `4`, number or text).
    pub fn from_input(input: Option<&NumericInput>) -> Result<Self, CalcError> {
        let count = required("valves", input)?;
        if count == 2.0 {
            Ok(ValveLayout::TwoValve)
        } else if count == 4.0 {
            Ok(ValveLayout::FourValve)
        } else {
            Err(CalcError::InvalidChoice {
                field: "valves",
                allowed: "2 or 4",
            })
        }
    }

    /// Intake valve head diameter as a fraction of bore.
    fn intake_fraction(self) -> f64 {
        match self {
            ValveLayout::TwoValve => 0.50,
            ValveLayout::FourValve => 0.34,
        }
    }
}

/// Exhaust valve diameter as a fraction of intake diameter.
const EXHAUST_TO_INTAKE: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ValveSizes {
    /// Intake valve head diameter (mm), per valve
    pub intake_mm: f64,
    /// Exhaust valve head diameter (mm), per valve
    pub exhaust_mm: f64,
}

/// Recommended valve head diameters for a bore (mm).
pub fn valve_sizes(bore_mm: f64, layout: ValveLayout) -> Result<ValveSizes, CalcError> {
    let bore = positive("bore", bore_mm, MAX_BORE_MM)?;
    let intake_mm = bore * layout.intake_fraction();

    Ok(ValveSizes {
        intake_mm,
        exhaust_mm: intake_mm * EXHAUST_TO_INTAKE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_displacement_single_cylinder() {
        let result = displacement(70.0, 57.9, 1.0).unwrap();
        assert!(approx(result.total_cc, 222.83, 0.01), "{}", result.total_cc);
        assert_eq!(result.per_cylinder_cc, result.total_cc);
        assert_eq!(result.cylinders, 1);
    }

    #[test]
    fn test_displacement_multi_cylinder() {
        let single = displacement(67.0, 42.5, 1.0).unwrap();
        let four = displacement(67.0, 42.5, 4.0).unwrap();
        assert!(approx(four.total_cc, single.total_cc * 4.0, 1e-9));
        assert!(approx(four.total_cc, 599.36, 0.01), "{}", four.total_cc);
        assert!(approx(four.total_cubic_inches, 36.57, 0.01));
    }

    #[test]
    fn test_displacement_rejects_invalid_input() {
        assert!(matches!(
            displacement(0.0, 57.9, 1.0),
            Err(CalcError::OutOfRange { field: "bore", .. })
        ));
        assert!(matches!(
            displacement(70.0, -1.0, 1.0),
            Err(CalcError::OutOfRange { field: "stroke", .. })
        ));
        assert_eq!(
            displacement(70.0, 57.9, 1.5),
            Err(CalcError::NotWhole("cylinders"))
        );
        assert!(displacement(70.0, 57.9, 0.0).is_err());
    }

    #[test]
    fn test_compression_ratio() {
        let result = compression_ratio(CompressionInputs {
            cylinder_cc: 124.7,
            chamber_cc: 12.0,
            gasket_cc: 1.5,
            dome_cc: 0.5,
        })
        .unwrap();

        assert!(approx(result.clearance_cc, 13.0, 1e-9));
        assert!(approx(result.ratio, (124.7 + 13.0) / 13.0, 1e-9));
    }

    #[test]
    fn test_compression_ratio_without_gasket_or_dome() {
        let result = compression_ratio(CompressionInputs {
            cylinder_cc: 450.0,
            chamber_cc: 50.0,
            gasket_cc: 0.0,
            dome_cc: 0.0,
        })
        .unwrap();
        assert!(approx(result.ratio, 10.0, 1e-9));
    }

    #[test]
    fn test_compression_ratio_rejects_non_positive_clearance() {
        let err = compression_ratio(CompressionInputs {
            cylinder_cc: 124.7,
            chamber_cc: 10.0,
            gasket_cc: 1.0,
            dome_cc: 11.0,
        })
        .unwrap_err();
        assert_eq!(err, CalcError::NonPositiveClearance);
    }

    #[test]
    fn test_piston_speed() {
        let result = piston_speed(57.9, 9000.0).unwrap();
        assert!(approx(result.meters_per_second, 17.37, 1e-9));
        assert!(piston_speed(57.9, 0.0).is_err());
        assert!(piston_speed(57.9, 50_000.0).is_err());
    }

    #[test]
    fn test_valve_sizes() {
        let two = valve_sizes(58.0, ValveLayout::TwoValve).unwrap();
        assert!(approx(two.intake_mm, 29.0, 1e-9));
        assert!(approx(two.exhaust_mm, 24.65, 1e-9));

        let four = valve_sizes(58.0, ValveLayout::FourValve).unwrap();
        assert!(approx(four.intake_mm, 19.72, 1e-9));
        assert!(approx(four.exhaust_mm, 16.762, 1e-9));
    }

    #[test]
    fn test_valve_layout_from_count() {
        assert_eq!(
            ValveLayout::from_input(Some(&NumericInput::from("4"))),
            Ok(ValveLayout::FourValve)
        );
        assert_eq!(
            ValveLayout::from_input(Some(&NumericInput::from(2.0))),
            Ok(ValveLayout::TwoValve)
        );
        assert_eq!(
            ValveLayout::from_input(Some(&NumericInput::from("3"))),
            Err(CalcError::InvalidChoice {
                field: "valves",
                allowed: "2 or 4"
            })
        );
        assert_eq!(
            ValveLayout::from_input(None),
            Err(CalcError::Missing("valves"))
        );
    }
}
