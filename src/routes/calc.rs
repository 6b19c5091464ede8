// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calculator routes.
//!
//! Every calculator follows the same flow: parse and validate the form,
//! compute, then count the calculation against the caller's daily quota.
//! Invalid input is rejected before the quota is touched.

use crate::calc::{
    self,
    input::{gear_list, optional, required},
    CalcError, CalculatorKind, CompressionInputs, Drivetrain, NumericInput, TireSize,
    UsageProfile, ValveLayout,
};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::UserProfile;
use crate::routes::api::ensure_profile;
use crate::services::quota::{QuotaDecision, QuotaUsage};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

/// Calculator routes (require authentication).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/calc/displacement", post(calculate::<DisplacementRequest>))
        .route(
            "/api/calc/compression-ratio",
            post(calculate::<CompressionRatioRequest>),
        )
        .route("/api/calc/piston-speed", post(calculate::<PistonSpeedRequest>))
        .route("/api/calc/valve-size", post(calculate::<ValveSizeRequest>))
        .route(
            "/api/calc/carburetor-cfm",
            post(calculate::<CarburetorCfmRequest>),
        )
        .route(
            "/api/calc/carburetor-venturi",
            post(calculate::<CarburetorVenturiRequest>),
        )
        .route("/api/calc/gear-ratios", post(calculate::<DrivetrainInput>))
        .route("/api/calc/top-speed", post(calculate::<TopSpeedRequest>))
        .route(
            "/api/calc/tire-comparison",
            post(calculate::<TireComparisonRequest>),
        )
}

/// A calculator form: parses its fields and evaluates the calculator.
pub trait CalculatorRequest: DeserializeOwned + Send + 'static {
    type Output: Serialize + Send + 'static;

    const KIND: CalculatorKind;

    fn evaluate(&self) -> std::result::Result<Self::Output, CalcError>;
}

/// A calculator result with the caller's quota usage after it.
#[derive(Debug, Serialize)]
pub struct CalculationResponse<T> {
    pub calculator: CalculatorKind,
    pub result: T,
    /// Absent when the calculation could not be counted
    pub quota: Option<QuotaUsage>,
}

/// Evaluate a calculator form for the signed-in user.
///
/// A body that is not a JSON object of the right shape is a bad request;
/// field values that are not numbers are validation errors.
async fn calculate<R: CalculatorRequest>(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<R>, JsonRejection>,
) -> Result<Json<CalculationResponse<R::Output>>> {
    let Json(req) = payload?;
    gated(&state, &user, R::KIND, req.evaluate()).await
}

// ─── Quota Gate ──────────────────────────────────────────────

/// Count a computed result against the caller's quota and wrap it.
///
/// Quota exhaustion discards the result. A storage failure while counting
/// does not: the result is returned uncounted.
async fn gated<T: Serialize>(
    state: &AppState,
    user: &AuthUser,
    calculator: CalculatorKind,
    result: std::result::Result<T, CalcError>,
) -> Result<Json<CalculationResponse<T>>> {
    let result = result.map_err(|e| {
        tracing::debug!(calculator = %calculator, error = %e, "Rejected calculator input");
        AppError::from(e)
    })?;

    let now = Utc::now();
    let quota = match reserve(state, user, now).await {
        Ok((QuotaDecision::Exceeded { limit }, _)) => {
            tracing::info!(
                uid = %user.uid,
                calculator = %calculator,
                limit,
                "Daily calculation limit reached"
            );
            return Err(AppError::QuotaExceeded { limit });
        }
        Ok((QuotaDecision::Allowed { count, .. }, profile)) => {
            tracing::debug!(uid = %user.uid, calculator = %calculator, count, "Calculation counted");
            record_stat(state, now);
            Some(state.quota_policy.usage(&profile, now))
        }
        Err(e) => {
            tracing::warn!(
                uid = %user.uid,
                calculator = %calculator,
                error = %e,
                "Failed to count calculation, returning result uncounted"
            );
            None
        }
    };

    Ok(Json(CalculationResponse {
        calculator,
        result,
        quota,
    }))
}

/// Reserve one calculation, creating the profile first if the user has
/// never signed in through the profile endpoint.
async fn reserve(
    state: &AppState,
    user: &AuthUser,
    now: DateTime<Utc>,
) -> Result<(QuotaDecision, UserProfile)> {
    match state
        .db
        .reserve_calculation(&user.uid, &state.quota_policy, now)
        .await
    {
        Err(AppError::NotFound(_)) => {
            ensure_profile(state, user, None).await?;
            state
                .db
                .reserve_calculation(&user.uid, &state.quota_policy, now)
                .await
        }
        other => other,
    }
}

fn record_stat(state: &AppState, now: DateTime<Utc>) {
    let db = state.db.clone();
    let policy = state.quota_policy;
    tokio::spawn(async move {
        if let Err(e) = db.record_calculation_stat(&policy, now).await {
            tracing::warn!(error = %e, "Failed to record calculation in stats");
        }
    });
}

// ─── Engine ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DisplacementRequest {
    pub bore: Option<NumericInput>,
    pub stroke: Option<NumericInput>,
    pub cylinders: Option<NumericInput>,
}

impl CalculatorRequest for DisplacementRequest {
    type Output = calc::Displacement;
    const KIND: CalculatorKind = CalculatorKind::Displacement;

    fn evaluate(&self) -> std::result::Result<Self::Output, CalcError> {
        calc::displacement(
            required("bore", self.bore.as_ref())?,
            required("stroke", self.stroke.as_ref())?,
            required("cylinders", self.cylinders.as_ref())?,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct CompressionRatioRequest {
    /// Swept volume of one cylinder, cc
    pub cylinder_volume: Option<NumericInput>,
    pub chamber_volume: Option<NumericInput>,
    pub gasket_volume: Option<NumericInput>,
    pub dome_volume: Option<NumericInput>,
}

impl CalculatorRequest for CompressionRatioRequest {
    type Output = calc::CompressionRatio;
    const KIND: CalculatorKind = CalculatorKind::CompressionRatio;

    fn evaluate(&self) -> std::result::Result<Self::Output, CalcError> {
        calc::compression_ratio(CompressionInputs {
            cylinder_cc: required("cylinder_volume", self.cylinder_volume.as_ref())?,
            chamber_cc: required("chamber_volume", self.chamber_volume.as_ref())?,
            gasket_cc: optional("gasket_volume", self.gasket_volume.as_ref(), 0.0)?,
            dome_cc: optional("dome_volume", self.dome_volume.as_ref(), 0.0)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PistonSpeedRequest {
    pub stroke: Option<NumericInput>,
    pub rpm: Option<NumericInput>,
}

impl CalculatorRequest for PistonSpeedRequest {
    type Output = calc::PistonSpeed;
    const KIND: CalculatorKind = CalculatorKind::PistonSpeed;

    fn evaluate(&self) -> std::result::Result<Self::Output, CalcError> {
        calc::piston_speed(
            required("stroke", self.stroke.as_ref())?,
            required("rpm", self.rpm.as_ref())?,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct ValveSizeRequest {
    pub bore: Option<NumericInput>,
    /// 2 or 4
    pub valves: Option<NumericInput>,
}

impl CalculatorRequest for ValveSizeRequest {
    type Output = calc::ValveSizes;
    const KIND: CalculatorKind = CalculatorKind::ValveSize;

    fn evaluate(&self) -> std::result::Result<Self::Output, CalcError> {
        calc::valve_sizes(
            required("bore", self.bore.as_ref())?,
            ValveLayout::from_input(self.valves.as_ref())?,
        )
    }
}

// ─── Fuel ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CarburetorCfmRequest {
    /// Engine size in cubic inches
    pub engine_size: Option<NumericInput>,
    pub rpm: Option<NumericInput>,
    pub volumetric_efficiency: Option<NumericInput>,
}

impl CalculatorRequest for CarburetorCfmRequest {
    type Output = calc::CarburetorCfm;
    const KIND: CalculatorKind = CalculatorKind::CarburetorCfm;

    fn evaluate(&self) -> std::result::Result<Self::Output, CalcError> {
        calc::carburetor_cfm(
            required("engine_size", self.engine_size.as_ref())?,
            required("rpm", self.rpm.as_ref())?,
            optional(
                "volumetric_efficiency",
                self.volumetric_efficiency.as_ref(),
                calc::fuel::DEFAULT_VOLUMETRIC_EFFICIENCY,
            )?,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct CarburetorVenturiRequest {
    pub engine_cc: Option<NumericInput>,
    /// "daily" (default), "touring" or "racing"
    pub usage: Option<String>,
}

impl CalculatorRequest for CarburetorVenturiRequest {
    type Output = calc::VenturiSize;
    const KIND: CalculatorKind = CalculatorKind::CarburetorVenturi;

    fn evaluate(&self) -> std::result::Result<Self::Output, CalcError> {
        calc::carburetor_venturi(
            required("engine_cc", self.engine_cc.as_ref())?,
            UsageProfile::from_input(self.usage.as_deref())?,
        )
    }
}

// ─── Transmission & Tires ────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DrivetrainInput {
    pub primary_ratio: Option<NumericInput>,
    /// One entry per gearbox slot; blank slots are skipped
    pub gear_ratios: Vec<NumericInput>,
    pub front_sprocket: Option<NumericInput>,
    pub rear_sprocket: Option<NumericInput>,
}

impl DrivetrainInput {
    fn parse(&self) -> std::result::Result<Drivetrain, CalcError> {
        Ok(Drivetrain {
            primary_ratio: required("primary_ratio", self.primary_ratio.as_ref())?,
            gear_ratios: gear_list(&self.gear_ratios)?,
            front_sprocket: required("front_sprocket", self.front_sprocket.as_ref())?,
            rear_sprocket: required("rear_sprocket", self.rear_sprocket.as_ref())?,
        })
    }
}

impl CalculatorRequest for DrivetrainInput {
    type Output = calc::GearRatios;
    const KIND: CalculatorKind = CalculatorKind::GearRatios;

    fn evaluate(&self) -> std::result::Result<Self::Output, CalcError> {
        calc::gear_ratios(&self.parse()?)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TireInput {
    pub width: Option<NumericInput>,
    pub aspect_ratio: Option<NumericInput>,
    pub rim: Option<NumericInput>,
}

impl TireInput {
    fn parse(&self) -> std::result::Result<TireSize, CalcError> {
        Ok(TireSize {
            width_mm: required("tire_width", self.width.as_ref())?,
            aspect_ratio: required("tire_aspect_ratio", self.aspect_ratio.as_ref())?,
            rim_inches: required("tire_rim", self.rim.as_ref())?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TopSpeedRequest {
    #[serde(default)]
    pub drivetrain: DrivetrainInput,
    #[serde(default)]
    pub tire: TireInput,
    pub rpm: Option<NumericInput>,
}

impl CalculatorRequest for TopSpeedRequest {
    type Output = Vec<calc::GearSpeed>;
    const KIND: CalculatorKind = CalculatorKind::TopSpeed;

    fn evaluate(&self) -> std::result::Result<Self::Output, CalcError> {
        calc::top_speed(
            &self.drivetrain.parse()?,
            self.tire.parse()?,
            required("rpm", self.rpm.as_ref())?,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct TireComparisonRequest {
    #[serde(default)]
    pub stock: TireInput,
    #[serde(default)]
    pub new: TireInput,
}

impl CalculatorRequest for TireComparisonRequest {
    type Output = calc::TireComparison;
    const KIND: CalculatorKind = CalculatorKind::TireComparison;

    fn evaluate(&self) -> std::result::Result<Self::Output, CalcError> {
        calc::compare_tires(self.stock.parse()?, self.new.parse()?)
    }
}
