// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Comment moderation gate.
//!
//! Comments move through a single transition, `Pending -> Approved`.
//! Submissions always enter as Pending and readers only ever see Approved
//! comments. There is no rejected state and no expiry; a comment that is
//! never approved simply never surfaces.

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Comment, ModerationState, PublicComment};
use crate::sanitizer::CleanComment;
use tracing::info;

#[derive(Clone)]
pub struct ModerationGate {
    db: Database,
}

impl ModerationGate {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store a validated comment in the Pending state.
    pub async fn submit(
        &self,
        post_slug: &str,
        fields: CleanComment,
        identity: &str,
    ) -> Result<Comment> {
        let comment = Comment::pending(
            post_slug.to_string(),
            fields.author,
            fields.email,
            fields.content,
            identity.to_string(),
        );
        self.db.insert_comment(&comment).await?;

        info!(comment_id = %comment.id, %post_slug, "Comment submitted for moderation");
        Ok(comment)
    }

    /// Approved comments for a post, oldest first.
    pub async fn public_comments(&self, post_slug: &str) -> Result<Vec<PublicComment>> {
        self.db.approved_comments(post_slug).await
    }

    /// Moderator action: move a comment to Approved. Approving an
    /// already-approved comment is a no-op.
    pub async fn approve(&self, comment_id: &str) -> Result<Comment> {
        let mut comment = self
            .db
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment not found: {comment_id}")))?;

        if comment.state() == ModerationState::Pending {
            self.db.set_comment_approved(comment_id).await?;
            comment.approved = true;
            info!(%comment_id, post_slug = %comment.post_slug, "Comment approved");
        }

        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(content: &str) -> CleanComment {
        CleanComment {
            author: "Ada".into(),
            email: "ada@example.com".into(),
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn test_submitted_comment_is_hidden_until_approved() {
        let gate = ModerationGate::new(Database::in_memory().await.unwrap());

        let comment = gate
            .submit("hello", fields("First comment here"), "id-1")
            .await
            .unwrap();
        assert_eq!(comment.state(), ModerationState::Pending);
        assert!(gate.public_comments("hello").await.unwrap().is_empty());

        let approved = gate.approve(&comment.id).await.unwrap();
        assert_eq!(approved.state(), ModerationState::Approved);

        let visible = gate.public_comments("hello").await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, comment.id);
        assert_eq!(visible[0].content, "First comment here");
    }

    #[tokio::test]
    async fn test_approve_unknown_comment() {
        let gate = ModerationGate::new(Database::in_memory().await.unwrap());
        let err = gate.approve("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_approve_is_idempotent() {
        let gate = ModerationGate::new(Database::in_memory().await.unwrap());
        let comment = gate
            .submit("hello", fields("Approve me twice"), "id-1")
            .await
            .unwrap();

        gate.approve(&comment.id).await.unwrap();
        gate.approve(&comment.id).await.unwrap();
        assert_eq!(gate.public_comments("hello").await.unwrap().len(), 1);
    }
}
