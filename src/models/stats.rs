// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application-wide usage aggregates.
//!
//! A single document that counts users and today's calculations. Updates are
//! best effort: a failed write is logged and never fails the request that
//! triggered it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate usage stats.
///
/// Stored at: `app-stats/live`, with the field names the web client uses
/// (`totalUsers`, `dailyCalculations`, `lastCalculationDate`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStats {
    /// Registered users (created profiles minus deleted ones)
    #[serde(default)]
    pub total_users: i64,
    /// Calculations performed on the day of `last_calculation_at`
    #[serde(default)]
    pub daily_calculations: u32,
    #[serde(
        default,
        rename = "lastCalculationDate",
        with = "firestore::serialize_as_optional_timestamp"
    )]
    pub last_calculation_at: Option<DateTime<Utc>>,
    /// Last update timestamp (ISO 8601)
    #[serde(default)]
    pub updated_at: String,
}

impl AppStats {
    /// Count one calculation.
    ///
    /// `day_of` maps a timestamp to its calendar day; the daily counter
    /// restarts at 1 when `now` falls on a different day than the last
    /// recorded calculation.
    pub fn record_calculation<F>(&mut self, now: DateTime<Utc>, day_of: F)
    where
        F: Fn(DateTime<Utc>) -> NaiveDate,
    {
        let same_day = self
            .last_calculation_at
            .is_some_and(|last| day_of(last) == day_of(now));

        if same_day {
            self.daily_calculations = self.daily_calculations.saturating_add(1);
        } else {
            self.daily_calculations = 1;
            self.last_calculation_at = Some(now);
        }
    }

    /// Adjust the user count; never goes below zero.
    pub fn adjust_users(&mut self, delta: i64) {
        self.total_users = (self.total_users + delta).max(0);
    }

    /// Today's calculation count as seen at `now`.
    pub fn calculations_on<F>(&self, now: DateTime<Utc>, day_of: F) -> u32
    where
        F: Fn(DateTime<Utc>) -> NaiveDate,
    {
        match self.last_calculation_at {
            Some(last) if day_of(last) == day_of(now) => self.daily_calculations,
            _ => 0,
        }
    }
}
