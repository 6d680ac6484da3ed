// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later
//! Personal blog API
//!
//! Features:
//! - Posts with optional hosted cover images and subscriber notification
//! - Comments held for moderation until approved
//! - One upvote per post per client identity
//! - Store-backed sliding-window rate limits on comments and upvotes
//! - Salted client identity hashing (raw addresses are never stored)
//! - Newsletter subscription through a mailing list provider

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod integrations;
pub mod ledger;
pub mod limiter;
pub mod metrics;
pub mod models;
pub mod moderation;
pub mod posts;
pub mod sanitizer;

pub use config::Config;
pub use db::Database;
pub use error::{AppError, Result};
pub use handlers::{router, AppState};
