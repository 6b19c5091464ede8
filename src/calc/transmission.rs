// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gearbox ratios and theoretical top speed per gear.

use super::tires::TireSize;
use super::{positive, whole, CalcError};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const MAX_RATIO: f64 = 20.0;
const MAX_SPROCKET_TEETH: f64 = 150.0;
const MAX_RPM: f64 = 30_000.0;
pub const MAX_GEARS: usize = 8;

/// mm/min to km/h: x 60 min/h / 1_000_000 mm/km
const MM_PER_MIN_TO_KMH: f64 = 60.0 / 1_000_000.0;

/// Primary drive, gearbox and final drive.
#[derive(Debug, Clone, PartialEq)]
pub struct Drivetrain {
    pub primary_ratio: f64,
    pub gear_ratios: Vec<f64>,
    pub front_sprocket: f64,
    pub rear_sprocket: f64,
}

/// Drivetrain after validation: whole sprocket counts, at least one gear.
struct CheckedDrivetrain {
    primary_ratio: f64,
    gear_ratios: Vec<f64>,
    final_ratio: f64,
}

impl Drivetrain {
    fn validated(&self) -> Result<CheckedDrivetrain, CalcError> {
        let primary_ratio = positive("primary_ratio", self.primary_ratio, MAX_RATIO)?;
        let front = whole("front_sprocket", self.front_sprocket, MAX_SPROCKET_TEETH)?;
        let rear = whole("rear_sprocket", self.rear_sprocket, MAX_SPROCKET_TEETH)?;

        if self.gear_ratios.is_empty() {
            return Err(CalcError::NoGears);
        }
        if self.gear_ratios.len() > MAX_GEARS {
            return Err(CalcError::TooManyGears(MAX_GEARS));
        }
        let gear_ratios = self
            .gear_ratios
            .iter()
            .map(|&ratio| positive("gear_ratio", ratio, MAX_RATIO))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CheckedDrivetrain {
            primary_ratio,
            gear_ratios,
            final_ratio: f64::from(rear) / f64::from(front),
        })
    }
}

impl CheckedDrivetrain {
    /// Overall reduction for each gear, in order.
    fn overall_ratios(&self) -> impl Iterator<Item = f64> + '_ {
        self.gear_ratios
            .iter()
            .map(move |gear| self.primary_ratio * gear * self.final_ratio)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GearRatio {
    /// 1-based gear number
    pub gear: u32,
    pub overall_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GearRatios {
    pub final_ratio: f64,
    pub gears: Vec<GearRatio>,
}

pub fn gear_ratios(drivetrain: &Drivetrain) -> Result<GearRatios, CalcError> {
    let checked = drivetrain.validated()?;

    let gears = checked
        .overall_ratios()
        .zip(1..)
        .map(|(overall_ratio, gear)| GearRatio {
            gear,
            overall_ratio,
        })
        .collect();

    Ok(GearRatios {
        final_ratio: checked.final_ratio,
        gears,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GearSpeed {
    pub gear: u32,
    pub overall_ratio: f64,
    pub speed_kmh: f64,
}

/// Theoretical speed in each gear at `rpm`, ignoring slip and drag.
pub fn top_speed(
    drivetrain: &Drivetrain,
    tire: TireSize,
    rpm: f64,
) -> Result<Vec<GearSpeed>, CalcError> {
    let checked = drivetrain.validated()?;
    let circumference_mm = tire.validated()?.circumference_mm();
    let rpm = positive("rpm", rpm, MAX_RPM)?;

    Ok(checked
        .overall_ratios()
        .zip(1..)
        .map(|(overall_ratio, gear)| GearSpeed {
            gear,
            overall_ratio,
            speed_kmh: rpm * circumference_mm / overall_ratio * MM_PER_MIN_TO_KMH,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five_speed() -> Drivetrain {
        Drivetrain {
            primary_ratio: 3.0,
            gear_ratios: vec![2.5, 1.6, 1.25, 1.0, 0.8],
            front_sprocket: 14.0,
            rear_sprocket: 42.0,
        }
    }

    #[test]
    fn test_gear_ratios() {
        let result = gear_ratios(&five_speed()).unwrap();
        assert_eq!(result.final_ratio, 3.0);
        assert_eq!(result.gears.len(), 5);
        assert_eq!(result.gears[0].gear, 1);
        assert!((result.gears[0].overall_ratio - 22.5).abs() < 1e-9);
        assert!((result.gears[3].overall_ratio - 9.0).abs() < 1e-9);
        assert_eq!(result.gears[4].gear, 5);
    }

    #[test]
    fn test_gear_ratios_requires_gears() {
        let mut drivetrain = five_speed();
        drivetrain.gear_ratios.clear();
        assert_eq!(gear_ratios(&drivetrain), Err(CalcError::NoGears));

        drivetrain.gear_ratios = vec![1.0; MAX_GEARS + 1];
        assert_eq!(
            gear_ratios(&drivetrain),
            Err(CalcError::TooManyGears(MAX_GEARS))
        );
    }

    #[test]
    fn test_gear_ratios_rejects_fractional_sprocket() {
        let mut drivetrain = five_speed();
        drivetrain.front_sprocket = 14.5;
        assert_eq!(
            gear_ratios(&drivetrain),
            Err(CalcError::NotWhole("front_sprocket"))
        );
    }

    #[test]
    fn test_top_speed_per_gear() {
        let tire = TireSize {
            width_mm: 100.0,
            aspect_ratio: 80.0,
            rim_inches: 17.0,
        };
        let speeds = top_speed(&five_speed(), tire, 9000.0).unwrap();

        assert_eq!(speeds.len(), 5);
        // 4th gear overall 9.0: 9000 * 591.8 * pi * 60 / (9 * 1e6)
        let expected = 9000.0 * 591.8 * std::f64::consts::PI * 60.0 / (9.0 * 1_000_000.0);
        assert!((speeds[3].speed_kmh - expected).abs() < 1e-9);
        assert!(speeds.windows(2).all(|w| w[0].speed_kmh < w[1].speed_kmh));
    }

    #[test]
    fn test_top_speed_rejects_zero_rpm() {
        let tire = TireSize {
            width_mm: 100.0,
            aspect_ratio: 80.0,
            rim_inches: 17.0,
        };
        assert!(top_speed(&five_speed(), tire, 0.0).is_err());
    }
}
