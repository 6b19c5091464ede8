// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use chrono::{FixedOffset, Offset, Utc};
use std::env;

/// Free-tier calculations allowed per calendar day.
pub const DEFAULT_DAILY_CALCULATION_LIMIT: u32 = 50;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Firebase project ID (token audience and issuer suffix)
    pub firebase_project_id: String,
    /// GCP project hosting Firestore (defaults to the Firebase project)
    pub gcp_project_id: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,

    // --- Usage quota ---
    /// Free-tier calculations per day
    pub daily_calculation_limit: u32,
    /// Offset from UTC that defines the calendar day for quota resets
    pub quota_utc_offset_minutes: i32,
}

impl Config {
    /// Config for tests: fixed project, no network-dependent values.
    pub fn test_default() -> Self {
        Self {
            firebase_project_id: "test-project".to_string(),
            gcp_project_id: "test-project".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            daily_calculation_limit: DEFAULT_DAILY_CALCULATION_LIMIT,
            quota_utc_offset_minutes: 0,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let firebase_project_id = env::var("FIREBASE_PROJECT_ID")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("FIREBASE_PROJECT_ID"))?;

        let quota_utc_offset_minutes: i32 = parse_var("QUOTA_UTC_OFFSET_MINUTES", 0)?;
        if quota_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Invalid("QUOTA_UTC_OFFSET_MINUTES"));
        }

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID")
                .unwrap_or_else(|_| firebase_project_id.clone()),
            firebase_project_id,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            daily_calculation_limit: parse_var(
                "DAILY_CALCULATION_LIMIT",
                DEFAULT_DAILY_CALCULATION_LIMIT,
            )?,
            quota_utc_offset_minutes,
        })
    }

    /// The offset at which quota days roll over.
    pub fn quota_day_offset(&self) -> FixedOffset {
        // Range is checked in from_env; fall back to UTC for hand-built configs.
        FixedOffset::east_opt(self.quota_utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
