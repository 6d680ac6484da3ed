// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding-window rate limiter for comment and upvote submissions.
//!
//! Admitted actions are appended to the `rate_event` collection. A check
//! counts the caller's events inside the window for that action kind:
//!
//! - comment: 3 per hour (default)
//! - upvote: 10 per 5 minutes (default)
//!
//! Events older than their window are never counted. They are physically
//! removed by [`RateLimiter::cleanup`], which runs on a background interval.

use crate::config::RateLimitConfig;
use crate::db::Database;
use crate::error::Result;
use crate::models::{ActionKind, RateLimitEvent};
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;
use tracing::{debug, warn};

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining actions in the current window
        remaining: u32,
    },
    /// Request is rate limited
    Limited {
        /// Time until the oldest counted action leaves the window
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    pub fn remaining(&self) -> u32 {
        match self {
            RateLimitResult::Allowed { remaining } => *remaining,
            RateLimitResult::Limited { .. } => 0,
        }
    }
}

/// Store-backed rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    db: Database,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig, db: Database) -> Self {
        Self { config, db }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check and, if admitted, record an action for `identity`.
    pub async fn check(&self, identity: &str, kind: ActionKind) -> Result<RateLimitResult> {
        self.check_at(identity, kind, Utc::now()).await
    }

    /// [`check`](Self::check) against an explicit clock reading.
    pub async fn check_at(
        &self,
        identity: &str,
        kind: ActionKind,
        now: DateTime<Utc>,
    ) -> Result<RateLimitResult> {
        let now = to_store_precision(now);
        let limit = self.config.limit_for(kind);
        let window_start = window_start(now, limit.window_duration());

        let count = self.db.count_rate_events(identity, kind, window_start).await?;

        if count >= u64::from(limit.max_actions) {
            let retry_after = match self.db.oldest_rate_event(identity, kind, window_start).await? {
                Some(oldest) => (oldest - window_start).to_std().unwrap_or(Duration::ZERO),
                None => limit.window_duration(),
            };
            warn!(
                %identity,
                action = %kind,
                count,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            return Ok(RateLimitResult::Limited { retry_after });
        }

        self.db
            .insert_rate_event(&RateLimitEvent::new(identity, kind, now))
            .await?;

        // count < max_actions, so this fits in u32 and never underflows
        let remaining = limit.max_actions - count as u32 - 1;
        debug!(%identity, action = %kind, remaining, "Action admitted");
        Ok(RateLimitResult::Allowed { remaining })
    }

    /// Purge events that have left their window, for every identity.
    pub async fn cleanup(&self) -> Result<()> {
        self.cleanup_at(Utc::now()).await
    }

    pub async fn cleanup_at(&self, now: DateTime<Utc>) -> Result<()> {
        for kind in ActionKind::ALL {
            let limit = self.config.limit_for(kind);
            self.db
                .purge_rate_events(kind, window_start(now, limit.window_duration()))
                .await?;
        }
        debug!("Stale rate limit events purged");
        Ok(())
    }
}

/// Events are stored with millisecond timestamps.
fn to_store_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(at.timestamp_millis())
        .single()
        .unwrap_or(at)
}

fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActionLimit;

    async fn limiter(config: RateLimitConfig) -> RateLimiter {
        RateLimiter::new(config, Database::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_comment_cap() {
        let limiter = limiter(RateLimitConfig::default()).await;
        let now = Utc::now();

        for expected in [2, 1, 0] {
            let result = limiter.check_at("ip-a", ActionKind::Comment, now).await.unwrap();
            assert_eq!(result, RateLimitResult::Allowed { remaining: expected });
        }

        let result = limiter.check_at("ip-a", ActionKind::Comment, now).await.unwrap();
        assert!(!result.allowed());
        assert_eq!(result.remaining(), 0);
    }

    #[tokio::test]
    async fn test_window_elapses() {
        let limiter = limiter(RateLimitConfig {
            upvote: ActionLimit {
                max_actions: 2,
                window_secs: 300,
            },
            ..Default::default()
        })
        .await;
        let start = Utc::now();

        for _ in 0..2 {
            assert!(limiter
                .check_at("ip-a", ActionKind::Upvote, start)
                .await
                .unwrap()
                .allowed());
        }

        let denied = limiter
            .check_at("ip-a", ActionKind::Upvote, start + chrono::Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(
            denied,
            RateLimitResult::Limited {
                retry_after: Duration::from_secs(240)
            }
        );

        let later = start + chrono::Duration::seconds(301);
        assert!(limiter
            .check_at("ip-a", ActionKind::Upvote, later)
            .await
            .unwrap()
            .allowed());
    }

    #[tokio::test]
    async fn test_denied_checks_are_not_recorded() {
        let limiter = limiter(RateLimitConfig {
            comment: ActionLimit {
                max_actions: 1,
                window_secs: 60,
            },
            ..Default::default()
        })
        .await;
        let start = Utc::now();

        assert!(limiter.check_at("ip-a", ActionKind::Comment, start).await.unwrap().allowed());
        for offset in 1..5 {
            let at = start + chrono::Duration::seconds(offset);
            assert!(!limiter.check_at("ip-a", ActionKind::Comment, at).await.unwrap().allowed());
        }

        // Only the admitted event counts, so the window reopens 60s after it.
        let reopened = start + chrono::Duration::seconds(61);
        assert!(limiter.check_at("ip-a", ActionKind::Comment, reopened).await.unwrap().allowed());
    }

    #[tokio::test]
    async fn test_identities_and_kinds_are_independent() {
        let limiter = limiter(RateLimitConfig {
            comment: ActionLimit {
                max_actions: 1,
                window_secs: 3600,
            },
            ..Default::default()
        })
        .await;
        let now = Utc::now();

        assert!(limiter.check_at("ip-a", ActionKind::Comment, now).await.unwrap().allowed());
        assert!(!limiter.check_at("ip-a", ActionKind::Comment, now).await.unwrap().allowed());
        assert!(limiter.check_at("ip-b", ActionKind::Comment, now).await.unwrap().allowed());
        assert!(limiter.check_at("ip-a", ActionKind::Upvote, now).await.unwrap().allowed());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_events_inside_their_window() {
        let limiter = limiter(RateLimitConfig::default()).await;
        let start = Utc::now();

        limiter.check_at("ip-a", ActionKind::Comment, start).await.unwrap();
        limiter.check_at("ip-a", ActionKind::Upvote, start).await.unwrap();

        // Ten minutes later the upvote event is stale, the comment event is not.
        limiter
            .cleanup_at(start + chrono::Duration::minutes(10))
            .await
            .unwrap();

        let db = &limiter.db;
        assert_eq!(
            db.count_rate_events("ip-a", ActionKind::Upvote, DateTime::<Utc>::MIN_UTC)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            db.count_rate_events("ip-a", ActionKind::Comment, DateTime::<Utc>::MIN_UTC)
                .await
                .unwrap(),
            1
        );
    }
}
