// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Membership tier. Stored with the labels the dashboard displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum MembershipTier {
    #[default]
    #[serde(rename = "Free User")]
    Free,
    #[serde(rename = "Premium User")]
    Premium,
}

/// User profile stored in Firestore at `users/{uid}`.
///
/// Stored field names are camelCase, matching documents written by the web
/// client (`displayName`, `calculationCount`, `lastCalculationDate`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Firebase uid (also used as document ID)
    pub uid: String,
    pub display_name: String,
    pub email: String,
    /// Membership tier
    #[serde(default)]
    pub status: MembershipTier,
    /// Calculations performed on the day of `last_calculation_at`
    #[serde(default)]
    pub calculation_count: u32,
    /// When the current day's counter was started (server time)
    #[serde(
        default,
        rename = "lastCalculationDate",
        with = "firestore::serialize_as_optional_timestamp"
    )]
    pub last_calculation_at: Option<DateTime<Utc>>,
    /// When the profile was created (ISO 8601)
    #[serde(default)]
    pub created_at: String,
}

impl UserProfile {
    /// Stored names of the fields written by a quota reservation.
    pub const QUOTA_FIELDS: [&'static str; 2] = ["calculationCount", "lastCalculationDate"];
    pub const DISPLAY_NAME_FIELD: &'static str = "displayName";

    /// A fresh Free-tier profile with an empty counter.
    pub fn new(
        uid: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
        created_at: &str,
    ) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
            email: email.into(),
            status: MembershipTier::Free,
            calculation_count: 0,
            last_calculation_at: None,
            created_at: created_at.to_string(),
        }
    }

    pub fn is_premium(&self) -> bool {
        self.status == MembershipTier::Premium
    }
}
