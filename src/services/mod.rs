// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod firebase_auth;
pub mod quota;
pub mod session;

pub use firebase_auth::{FirebaseTokenVerifier, TokenError, VerifiedIdentity};
pub use quota::{QuotaDecision, QuotaPolicy, QuotaUsage};
pub use session::{ProfileSession, SessionEvent, SessionHandle, SessionState};
