// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Abuse simulations for the engagement endpoints.
//!
//! Each scenario replays an attack pattern against the limiter, the
//! sanitizer or the upvote ledger and checks how much of it gets through.

use axum::http::HeaderMap;
use blog_api::{
    config::{RateLimitConfig, ValidationConfig},
    db::Database,
    identity::IdentityHasher,
    ledger::UpvoteLedger,
    limiter::RateLimiter,
    models::{ActionKind, Post},
    sanitizer::{sanitize, CommentValidator},
};
use chrono::{Duration, Utc};

/// Admitted and denied counts for one simulated burst.
#[derive(Debug, Default)]
struct Outcome {
    admitted: usize,
    denied: usize,
}

async fn flood(limiter: &RateLimiter, identities: &[String], kind: ActionKind, requests: usize) -> Outcome {
    let now = Utc::now();
    let mut outcome = Outcome::default();
    for i in 0..requests {
        let identity = &identities[i % identities.len()];
        let at = now + Duration::milliseconds(i as i64);
        if limiter.check_at(identity, kind, at).await.unwrap().allowed() {
            outcome.admitted += 1;
        } else {
            outcome.denied += 1;
        }
    }
    outcome
}

fn identities(hasher: &IdentityHasher, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| hasher.hash(&format!("192.0.2.{}", i + 1)))
        .collect()
}

#[tokio::test]
async fn test_single_client_comment_flood() {
    let db = Database::in_memory().await.unwrap();
    let limiter = RateLimiter::new(RateLimitConfig::default(), db);
    let hasher = IdentityHasher::new("salt");

    let outcome = flood(&limiter, &identities(&hasher, 1), ActionKind::Comment, 50).await;
    assert_eq!(outcome.admitted, 3);
    assert_eq!(outcome.denied, 47);
}

#[tokio::test]
async fn test_distributed_upvote_spray() {
    let db = Database::in_memory().await.unwrap();
    let limiter = RateLimiter::new(RateLimitConfig::default(), db);
    let hasher = IdentityHasher::new("salt");

    // 5 clients, 20 requests each: every client gets its own 10.
    let outcome = flood(&limiter, &identities(&hasher, 5), ActionKind::Upvote, 100).await;
    assert_eq!(outcome.admitted, 50);
    assert_eq!(outcome.denied, 50);
}

#[tokio::test]
async fn test_upvote_stuffing_from_one_client() {
    let db = Database::in_memory().await.unwrap();
    db.create_post(&Post::new("T".into(), "target".into(), "Body".into(), None))
        .await
        .unwrap();
    let ledger = UpvoteLedger::new(db);
    let identity = IdentityHasher::new("salt").hash("198.51.100.1");

    let mut accepted = 0;
    for _ in 0..25 {
        if ledger.try_upvote("target", &identity).await.is_ok() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(ledger.status("target", &identity).await.unwrap().upvote_count, 1);
}

#[test]
fn test_script_payloads_are_stripped() {
    let payloads = [
        "<script>alert('x')</script>Nice post, thanks!",
        "<SCRIPT src=//evil.example>\n</SCRIPT>Nice post, thanks!",
        "<scr<script></script>ipt>alert(1)</script>Nice post, thanks!",
        "<a href=\"javascript:steal()\">Nice post, thanks!</a>",
        "<img src=x onerror=alert(1)>Nice post, thanks!",
        "<img src=x ononerror==alert(1)>Nice post, thanks!",
    ];

    for payload in payloads {
        let cleaned = sanitize(payload).to_lowercase();
        assert!(!cleaned.contains("<script"), "script survived: {payload}");
        assert!(!cleaned.contains("javascript:"), "scheme survived: {payload}");
        assert!(!cleaned.contains("onerror="), "handler survived: {payload}");
    }
}

#[test]
fn test_oversized_comment_is_truncated() {
    let validator = CommentValidator::new(ValidationConfig::default());
    let clean = validator
        .validate("Mallory", "mallory@example.com", &"a".repeat(100_000))
        .unwrap();
    assert_eq!(clean.content.chars().count(), 1000);

    let result = validator.validate(&"m".repeat(5_000), "mallory@example.com", "Long enough content");
    assert!(result.is_err());
}

#[test]
fn test_rotating_forwarded_header_changes_identity() {
    // Documented limitation: a client that rotates X-Forwarded-For gets a
    // fresh identity each time. The hash must still be stable per address.
    let hasher = IdentityHasher::new("salt");
    let mut seen = std::collections::HashSet::new();
    for i in 0..10 {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            format!("203.0.113.{i}, 10.0.0.1").parse().unwrap(),
        );
        seen.insert(hasher.identify(&headers));
    }
    assert_eq!(seen.len(), 10);
    assert_eq!(hasher.hash("203.0.113.1"), hasher.hash("203.0.113.1"));
}
