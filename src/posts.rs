// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Post publishing: optional image upload, storage, subscriber notification.

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::integrations::{ImageHost, ImageUpload, PostNotifier};
use crate::models::Post;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Author-supplied post fields.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub body: String,
}

/// Outcome of a publish. `email_sent` is false when notification failed
/// or is not configured; the post is stored either way.
#[derive(Debug, Clone)]
pub struct Published {
    pub post: Post,
    pub email_sent: bool,
}

#[derive(Clone)]
pub struct PostPublisher {
    db: Database,
    image_host: Option<Arc<dyn ImageHost>>,
    notifier: Option<Arc<dyn PostNotifier>>,
}

impl PostPublisher {
    pub fn new(
        db: Database,
        image_host: Option<Arc<dyn ImageHost>>,
        notifier: Option<Arc<dyn PostNotifier>>,
    ) -> Self {
        Self {
            db,
            image_host,
            notifier,
        }
    }

    pub async fn publish(&self, new_post: NewPost, image: Option<ImageUpload>) -> Result<Published> {
        let title = new_post.title.trim();
        let slug = new_post.slug.trim();
        let body = new_post.body.trim();

        if title.is_empty() || slug.is_empty() || body.is_empty() {
            return Err(AppError::Validation(
                "Title, slug, and body are required".to_string(),
            ));
        }
        if !is_valid_slug(slug) {
            return Err(AppError::Validation(
                "Slug may only contain letters, digits, '-' and '_'".to_string(),
            ));
        }

        // Checked before the upload so a duplicate does not leave an orphaned image.
        if self.db.post_exists(slug).await? {
            return Err(AppError::Conflict(format!(
                "A post with slug '{slug}' already exists"
            )));
        }

        let image_url = match image.filter(|i| !i.bytes.is_empty()) {
            Some(image) => {
                let host = self.image_host.as_ref().ok_or_else(|| {
                    AppError::Internal("image upload requested but no image host configured".into())
                })?;
                let url = host
                    .upload(image)
                    .await
                    .map_err(|e| AppError::Upstream(format!("image upload: {e:#}")))?;
                Some(url)
            }
            None => None,
        };

        let post = Post::new(
            title.to_string(),
            slug.to_string(),
            body.to_string(),
            image_url,
        );
        self.db.create_post(&post).await?;
        info!(slug = %post.slug, has_image = post.image_url.is_some(), "Post created");

        let email_sent = match &self.notifier {
            Some(notifier) => match notifier.notify_new_post(&post).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(slug = %post.slug, error = ?e, "Failed to send notification email");
                    false
                }
            },
            None => {
                debug!("No notifier configured, skipping new post email");
                false
            }
        };

        Ok(Published { post, email_sent })
    }

    pub async fn get(&self, slug: &str) -> Result<Post> {
        self.db
            .get_post(slug)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    pub async fn exists(&self, slug: &str) -> Result<bool> {
        self.db.post_exists(slug).await
    }

    /// All posts, newest first.
    pub async fn list(&self) -> Result<Vec<Post>> {
        self.db.list_posts().await
    }
}

fn is_valid_slug(slug: &str) -> bool {
    slug.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
