// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! SurrealDB document store for posts, comments, upvotes and rate-limit events.

use crate::{
    config::DatabaseConfig,
    error::{AppError, Result},
    models::{ActionKind, Comment, Post, PublicComment, RateLimitEvent, Upvote},
};
use chrono::{DateTime, TimeZone, Utc};
use surrealdb::{
    engine::any::{self, Any},
    Surreal,
};
use tracing::debug;

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    db: Surreal<Any>,
}

impl Database {
    /// Connect to the configured SurrealDB endpoint and prepare the schema.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let db = any::connect(config.url.as_str()).await?;

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await?;

        Self::init_schema(&db).await?;

        Ok(Self { db })
    }

    /// Fresh in-memory store.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(&DatabaseConfig::default()).await
    }

    /// Initialize database schema
    async fn init_schema(db: &Surreal<Any>) -> Result<()> {
        db.query(
            r#"
            DEFINE TABLE post SCHEMAFULL;
            DEFINE FIELD title ON post TYPE string;
            DEFINE FIELD slug ON post TYPE string;
            DEFINE FIELD body ON post TYPE string;
            DEFINE FIELD date ON post TYPE int;
            DEFINE FIELD image_url ON post TYPE option<string>;

            DEFINE INDEX post_slug_idx ON post COLUMNS slug UNIQUE;
            DEFINE INDEX post_date_idx ON post COLUMNS date;
        "#,
        )
        .await?
        .check()?;

        db.query(
            r#"
            DEFINE TABLE comment SCHEMAFULL;
            DEFINE FIELD post_slug ON comment TYPE string;
            DEFINE FIELD author ON comment TYPE string;
            DEFINE FIELD email ON comment TYPE string;
            DEFINE FIELD content ON comment TYPE string;
            DEFINE FIELD timestamp ON comment TYPE int;
            DEFINE FIELD approved ON comment TYPE bool DEFAULT false;
            DEFINE FIELD identity ON comment TYPE string;

            DEFINE INDEX comment_post_idx ON comment COLUMNS post_slug, approved;
        "#,
        )
        .await?
        .check()?;

        // The unique index is what actually enforces one upvote per origin;
        // the ledger's existence check is only a fast path.
        db.query(
            r#"
            DEFINE TABLE upvote SCHEMAFULL;
            DEFINE FIELD post_slug ON upvote TYPE string;
            DEFINE FIELD identity ON upvote TYPE string;
            DEFINE FIELD timestamp ON upvote TYPE int;

            DEFINE INDEX upvote_origin_idx ON upvote COLUMNS post_slug, identity UNIQUE;
        "#,
        )
        .await?
        .check()?;

        db.query(
            r#"
            DEFINE TABLE rate_event SCHEMAFULL;
            DEFINE FIELD identity ON rate_event TYPE string;
            DEFINE FIELD action ON rate_event TYPE string;
            DEFINE FIELD timestamp ON rate_event TYPE int;

            DEFINE INDEX rate_event_idx ON rate_event COLUMNS identity, action, timestamp;
        "#,
        )
        .await?
        .check()?;

        Ok(())
    }

    /// Store a new post. A duplicate slug is a conflict.
    pub async fn create_post(&self, post: &Post) -> Result<()> {
        let result = self
            .db
            .query("CREATE post CONTENT $post RETURN NONE")
            .bind(("post", post.clone()))
            .await?
            .check();

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(AppError::Conflict(format!(
                "A post with slug '{}' already exists",
                post.slug
            ))),
            Err(err) => Err(err.into()),
        }
    }

    /// Get a post by slug
    pub async fn get_post(&self, slug: &str) -> Result<Option<Post>> {
        let mut result = self
            .db
            .query(
                "SELECT title, slug, body, date, image_url FROM post \
                 WHERE slug = $slug LIMIT 1",
            )
            .bind(("slug", slug.to_string()))
            .await?;

        let posts: Vec<Post> = result.take(0)?;
        Ok(posts.into_iter().next())
    }

    /// Check whether a post with the given slug exists
    pub async fn post_exists(&self, slug: &str) -> Result<bool> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM post WHERE slug = $slug GROUP ALL")
            .bind(("slug", slug.to_string()))
            .await?;

        Ok(take_total(&mut result)? > 0)
    }

    /// All posts, newest first
    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        let mut result = self
            .db
            .query("SELECT title, slug, body, date, image_url FROM post ORDER BY date DESC")
            .await?;

        Ok(result.take(0)?)
    }

    /// Store a comment under its generated record id
    pub async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        self.db
            .query("CREATE type::thing('comment', $id) CONTENT $comment RETURN NONE")
            .bind(("id", comment.id.clone()))
            .bind(("comment", comment.clone()))
            .await?
            .check()?;

        debug!(comment_id = %comment.id, post_slug = %comment.post_slug, "Comment stored");
        Ok(())
    }

    /// Get a comment by id
    pub async fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        let mut result = self
            .db
            .query(
                "SELECT post_slug, author, email, content, timestamp, approved, identity \
                 FROM type::thing('comment', $id)",
            )
            .bind(("id", id.to_string()))
            .await?;

        let comments: Vec<Comment> = result.take(0)?;
        Ok(comments.into_iter().next().map(|mut comment| {
            comment.id = id.to_string();
            comment
        }))
    }

    /// Approved comments for a post, oldest first
    pub async fn approved_comments(&self, post_slug: &str) -> Result<Vec<PublicComment>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS id, author, content, timestamp FROM comment \
                 WHERE post_slug = $slug AND approved = true ORDER BY timestamp ASC",
            )
            .bind(("slug", post_slug.to_string()))
            .await?;

        Ok(result.take(0)?)
    }

    /// Set the approval flag on an existing comment
    pub async fn set_comment_approved(&self, id: &str) -> Result<()> {
        self.db
            .query("UPDATE type::thing('comment', $id) SET approved = true RETURN NONE")
            .bind(("id", id.to_string()))
            .await?
            .check()?;
        Ok(())
    }

    /// Check whether an origin already upvoted a post
    pub async fn has_upvoted(&self, post_slug: &str, identity: &str) -> Result<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM upvote \
                 WHERE post_slug = $slug AND identity = $identity GROUP ALL",
            )
            .bind(("slug", post_slug.to_string()))
            .bind(("identity", identity.to_string()))
            .await?;

        Ok(take_total(&mut result)? > 0)
    }

    /// Insert an upvote. A second upvote from the same origin is a conflict.
    pub async fn insert_upvote(&self, upvote: &Upvote) -> Result<()> {
        let result = self
            .db
            .query("CREATE upvote CONTENT $upvote RETURN NONE")
            .bind(("upvote", upvote.clone()))
            .await?
            .check();

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(AppError::Conflict(
                "You have already upvoted this post".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    /// Count upvotes for a post
    pub async fn count_upvotes(&self, post_slug: &str) -> Result<u64> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM upvote WHERE post_slug = $slug GROUP ALL")
            .bind(("slug", post_slug.to_string()))
            .await?;

        take_total(&mut result)
    }

    /// Record an admitted action
    pub async fn insert_rate_event(&self, event: &RateLimitEvent) -> Result<()> {
        self.db
            .query("CREATE rate_event CONTENT $event RETURN NONE")
            .bind(("event", event.clone()))
            .await?
            .check()?;
        Ok(())
    }

    /// Count events for an identity and action at or after `since`
    pub async fn count_rate_events(
        &self,
        identity: &str,
        action: ActionKind,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM rate_event \
                 WHERE identity = $identity AND action = $action AND timestamp >= $since \
                 GROUP ALL",
            )
            .bind(("identity", identity.to_string()))
            .bind(("action", action.as_str().to_string()))
            .bind(("since", since.timestamp_millis()))
            .await?;

        take_total(&mut result)
    }

    /// Timestamp of the oldest event still inside the window
    pub async fn oldest_rate_event(
        &self,
        identity: &str,
        action: ActionKind,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut result = self
            .db
            .query(
                "SELECT timestamp FROM rate_event \
                 WHERE identity = $identity AND action = $action AND timestamp >= $since \
                 ORDER BY timestamp ASC LIMIT 1",
            )
            .bind(("identity", identity.to_string()))
            .bind(("action", action.as_str().to_string()))
            .bind(("since", since.timestamp_millis()))
            .await?;

        let oldest: Option<i64> = result.take((0, "timestamp"))?;
        Ok(oldest.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
    }

    /// Delete every event of `action` older than `before`, for all identities
    pub async fn purge_rate_events(&self, action: ActionKind, before: DateTime<Utc>) -> Result<()> {
        self.db
            .query("DELETE rate_event WHERE action = $action AND timestamp < $before")
            .bind(("action", action.as_str().to_string()))
            .bind(("before", before.timestamp_millis()))
            .await?
            .check()?;
        Ok(())
    }
}

/// Read the `total` column of a `count() ... GROUP ALL` query.
fn take_total(result: &mut surrealdb::Response) -> Result<u64> {
    // GROUP ALL over zero rows yields no row at all.
    let total: Option<i64> = result.take((0, "total"))?;
    Ok(total.map_or(0, |n| n.max(0) as u64))
}

/// Whether a statement failed because a UNIQUE index already holds the value.
fn is_unique_violation(err: &surrealdb::Error) -> bool {
    match err {
        surrealdb::Error::Db(surrealdb::error::Db::IndexExists { .. }) => true,
        // Remote engines only carry the rendered message.
        other => other.to_string().contains("already contains"),
    }
}
