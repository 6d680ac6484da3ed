// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Upvote ledger: at most one upvote per (post, identity).

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::Upvote;
use serde::Serialize;
use tracing::{debug, info};

/// Upvote totals as seen by one reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteStatus {
    pub upvote_count: u64,
    pub has_upvoted: bool,
}

#[derive(Clone)]
pub struct UpvoteLedger {
    db: Database,
}

impl UpvoteLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record an upvote and return the post's new total.
    ///
    /// Fails with `NotFound` for an unknown post and `Conflict` when this
    /// identity has already upvoted it. The existence check only saves a
    /// write; the store's unique index decides concurrent duplicates.
    pub async fn try_upvote(&self, post_slug: &str, identity: &str) -> Result<u64> {
        if !self.db.post_exists(post_slug).await? {
            return Err(AppError::NotFound("Post not found".to_string()));
        }

        if self.db.has_upvoted(post_slug, identity).await? {
            debug!(%post_slug, %identity, "Duplicate upvote rejected");
            return Err(AppError::Conflict(
                "You have already upvoted this post".to_string(),
            ));
        }

        self.db
            .insert_upvote(&Upvote::new(post_slug.to_string(), identity.to_string()))
            .await?;

        let count = self.db.count_upvotes(post_slug).await?;
        info!(%post_slug, upvote_count = count, "Upvote recorded");
        Ok(count)
    }

    /// Total upvotes for a post and whether `identity` is among them.
    pub async fn status(&self, post_slug: &str, identity: &str) -> Result<UpvoteStatus> {
        Ok(UpvoteStatus {
            upvote_count: self.db.count_upvotes(post_slug).await?,
            has_upvoted: self.db.has_upvoted(post_slug, identity).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Post;

    async fn ledger_with_post(slug: &str) -> UpvoteLedger {
        let db = Database::in_memory().await.unwrap();
        db.create_post(&Post::new("Title".into(), slug.into(), "Body".into(), None))
            .await
            .unwrap();
        UpvoteLedger::new(db)
    }

    #[tokio::test]
    async fn test_first_upvote_counts_second_conflicts() {
        let ledger = ledger_with_post("hello").await;

        assert_eq!(ledger.try_upvote("hello", "id-1").await.unwrap(), 1);

        let err = ledger.try_upvote("hello", "id-1").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(ledger.status("hello", "id-1").await.unwrap().upvote_count, 1);

        assert_eq!(ledger.try_upvote("hello", "id-2").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_post() {
        let ledger = ledger_with_post("hello").await;
        let err = ledger.try_upvote("nope", "id-1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_status() {
        let ledger = ledger_with_post("hello").await;
        assert_eq!(
            ledger.status("hello", "id-1").await.unwrap(),
            UpvoteStatus {
                upvote_count: 0,
                has_upvoted: false
            }
        );

        ledger.try_upvote("hello", "id-1").await.unwrap();
        assert!(ledger.status("hello", "id-1").await.unwrap().has_upvoted);
        assert!(!ledger.status("hello", "id-2").await.unwrap().has_upvoted);
    }

    #[tokio::test]
    async fn test_unique_index_backs_the_precheck() {
        let ledger = ledger_with_post("hello").await;
        let upvote = Upvote::new("hello".into(), "id-1".into());

        ledger.db.insert_upvote(&upvote).await.unwrap();
        let err = ledger.db.insert_upvote(&upvote).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(ledger.db.count_upvotes("hello").await.unwrap(), 1);
    }
}
