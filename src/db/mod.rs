// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    /// User profiles (keyed by Firebase uid)
    pub const USERS: &str = "users";
    /// Application-wide aggregates
    pub const APP_STATS: &str = "app-stats";
}

/// Document ID of the singleton stats document.
pub const APP_STATS_DOC: &str = "live";
