// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Data models for posts, comments, upvotes and rate-limit events.
//!
//! Stored documents keep their timestamps as Unix milliseconds so that
//! window queries compare integers; API views serialize RFC 3339 strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Rate-limited action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Comment,
    Upvote,
}

impl ActionKind {
    pub const ALL: [ActionKind; 2] = [ActionKind::Comment, ActionKind::Upvote];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Upvote => "upvote",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published blog post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    /// URL slug, unique across posts
    pub slug: String,
    /// Markdown body
    pub body: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Post {
    pub fn new(title: String, slug: String, body: String, image_url: Option<String>) -> Self {
        Self {
            title,
            slug,
            body,
            date: Utc::now(),
            image_url,
        }
    }

    /// First `max_chars` characters of the body followed by an ellipsis.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let mut excerpt: String = self.body.chars().take(max_chars).collect();
        excerpt.push_str("...");
        excerpt
    }
}

/// Post as returned by the HTTP API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub title: String,
    pub slug: String,
    pub body: String,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        Self {
            title: post.title,
            slug: post.slug,
            body: post.body,
            date: post.date,
            image_url: post.image_url,
        }
    }
}

/// Reader comment. Created unapproved; only moderation flips `approved`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(skip)]
    pub id: String,
    pub post_slug: String,
    pub author: String,
    pub email: String,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub approved: bool,
    pub identity: String,
}

/// Moderation state derived from the approval flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationState {
    Pending,
    Approved,
}

impl Comment {
    /// Build a comment in the Pending state.
    pub fn pending(
        post_slug: String,
        author: String,
        email: String,
        content: String,
        identity: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            post_slug,
            author,
            email,
            content,
            timestamp: Utc::now(),
            approved: false,
            identity,
        }
    }

    pub fn state(&self) -> ModerationState {
        if self.approved {
            ModerationState::Approved
        } else {
            ModerationState::Pending
        }
    }
}

/// Approved comment as shown to readers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicComment {
    pub id: String,
    pub author: String,
    pub content: String,
    #[serde(deserialize_with = "chrono::serde::ts_milliseconds::deserialize")]
    pub timestamp: DateTime<Utc>,
}

/// One upvote per (post, identity)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upvote {
    pub post_slug: String,
    pub identity: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Upvote {
    pub fn new(post_slug: String, identity: String) -> Self {
        Self {
            post_slug,
            identity,
            timestamp: Utc::now(),
        }
    }
}

/// Admitted action recorded by the rate limiter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitEvent {
    pub identity: String,
    pub action: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl RateLimitEvent {
    pub fn new(identity: &str, action: ActionKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            identity: identity.to_string(),
            action: action.as_str().to_string(),
            timestamp,
        }
    }
}
