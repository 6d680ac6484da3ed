// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for the engagement endpoints.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub comments_submitted: IntCounter,
    /// Labelled by outcome: accepted, duplicate
    pub upvotes: IntCounterVec,
    /// Labelled by action kind
    pub rate_limited: IntCounterVec,
    /// Labelled by outcome: subscribed, already_subscribed
    pub subscriptions: IntCounterVec,
    pub posts_published: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("blog".to_string()), None)?;

        let comments_submitted = IntCounter::new(
            "comments_submitted_total",
            "Comments accepted for moderation",
        )?;
        let upvotes = IntCounterVec::new(
            Opts::new("upvotes_total", "Upvote attempts by outcome"),
            &["outcome"],
        )?;
        let rate_limited = IntCounterVec::new(
            Opts::new("rate_limited_total", "Requests denied by the rate limiter"),
            &["action"],
        )?;
        let subscriptions = IntCounterVec::new(
            Opts::new("subscriptions_total", "Newsletter subscriptions by outcome"),
            &["outcome"],
        )?;
        let posts_published = IntCounter::new("posts_published_total", "Posts created")?;

        registry.register(Box::new(comments_submitted.clone()))?;
        registry.register(Box::new(upvotes.clone()))?;
        registry.register(Box::new(rate_limited.clone()))?;
        registry.register(Box::new(subscriptions.clone()))?;
        registry.register(Box::new(posts_published.clone()))?;

        Ok(Self {
            registry,
            comments_submitted,
            upvotes,
            rate_limited,
            subscriptions,
            posts_published,
        })
    }

    /// Render every registered metric in the text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
