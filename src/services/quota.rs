// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily calculation quota.
//!
//! Free-tier users may run a fixed number of calculations per calendar day.
//! The counter lives on the profile document and restarts at 1 on the first
//! calculation of a new day. Premium users are never refused, but their
//! counter is maintained the same way.
//!
//! The decision and the counter update must happen in one atomic step (see
//! [`crate::db::FirestoreDb::reserve_calculation`]); evaluating here and
//! writing later would let concurrent requests slip past the limit.

use crate::config::Config;
use crate::models::UserProfile;
use crate::time_utils::calendar_day;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// The calculation may proceed; `count` is the counter after it.
    Allowed { count: u32, reset: bool },
    /// The daily limit has been reached.
    Exceeded { limit: u32 },
}

/// Quota usage reported alongside results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct QuotaUsage {
    /// Calculations counted today
    pub count: u32,
    /// Daily limit, absent for unlimited tiers
    pub limit: Option<u32>,
    /// Calculations left today, absent for unlimited tiers
    pub remaining: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    daily_limit: u32,
    day_offset: FixedOffset,
}

impl QuotaPolicy {
    pub fn new(daily_limit: u32, day_offset: FixedOffset) -> Self {
        Self {
            daily_limit,
            day_offset,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.daily_calculation_limit, config.quota_day_offset())
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Calendar day of `at` for quota purposes.
    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        calendar_day(at, self.day_offset)
    }

    fn counted_today(&self, profile: &UserProfile, now: DateTime<Utc>) -> Option<u32> {
        profile
            .last_calculation_at
            .filter(|last| self.day_of(*last) == self.day_of(now))
            .map(|_| profile.calculation_count)
    }

    /// Decide whether `profile` may run one more calculation at `now`.
    pub fn evaluate(&self, profile: &UserProfile, now: DateTime<Utc>) -> QuotaDecision {
        match self.counted_today(profile, now) {
            Some(count) if !profile.is_premium() && count >= self.daily_limit => {
                QuotaDecision::Exceeded {
                    limit: self.daily_limit,
                }
            }
            Some(count) => QuotaDecision::Allowed {
                count: count.saturating_add(1),
                reset: false,
            },
            None => QuotaDecision::Allowed {
                count: 1,
                reset: true,
            },
        }
    }

    /// Evaluate and, if allowed, update the profile's counter in place.
    pub fn apply(&self, profile: &mut UserProfile, now: DateTime<Utc>) -> QuotaDecision {
        let decision = self.evaluate(profile, now);
        if let QuotaDecision::Allowed { count, reset } = decision {
            profile.calculation_count = count;
            if reset {
                profile.last_calculation_at = Some(now);
            }
        }
        decision
    }

    /// Current usage for display.
    pub fn usage(&self, profile: &UserProfile, now: DateTime<Utc>) -> QuotaUsage {
        let count = self.counted_today(profile, now).unwrap_or(0);
        if profile.is_premium() {
            QuotaUsage {
                count,
                limit: None,
                remaining: None,
            }
        } else {
            QuotaUsage {
                count,
                limit: Some(self.daily_limit),
                remaining: Some(self.daily_limit.saturating_sub(count)),
            }
        }
    }
}
