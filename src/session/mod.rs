// ABOUTME: Client-side session handling: token store, silent refresh and the session manager
// ABOUTME: Sessions are explicit context objects; background refresh stops on teardown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Login, token retrieval and logout
pub mod manager;
/// Timer-driven single-flight refresh
pub mod scheduler;
/// Sessions and refresh families
pub mod store;

pub use manager::{LoginRequest, SessionManager};
pub use scheduler::{RefreshScheduler, RefreshState, SchedulerConfig, TokenRefresher};
pub use store::{FamilyId, ReusePolicy, Session, SessionId, TokenStore};
