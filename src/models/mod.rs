// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod stats;
pub mod user;

pub use stats::AppStats;
pub use user::{MembershipTier, UserProfile};
