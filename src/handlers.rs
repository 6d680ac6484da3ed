// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the blog API.
//!
//! Write paths run the abuse controls in a fixed order: identify the
//! client, consult the rate limiter, sanitize and validate, confirm the
//! post exists, then hand off to the moderation gate or upvote ledger.

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::identity::IdentityHasher;
use crate::integrations::{ImageUpload, Integrations, MailingList};
use crate::ledger::{UpvoteLedger, UpvoteStatus};
use crate::limiter::{RateLimitResult, RateLimiter};
use crate::metrics::Metrics;
use crate::models::{ActionKind, PostView, PublicComment};
use crate::moderation::ModerationGate;
use crate::posts::{NewPost, PostPublisher};
use crate::sanitizer::{is_valid_email, CommentValidator, ValidationError};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub hasher: IdentityHasher,
    pub limiter: RateLimiter,
    pub validator: CommentValidator,
    pub moderation: ModerationGate,
    pub ledger: UpvoteLedger,
    pub posts: PostPublisher,
    pub mailing_list: Option<Arc<dyn MailingList>>,
    pub metrics: Metrics,
}

impl AppState {
    /// Wire every component to the shared store handle.
    pub fn new(config: Config, db: Database, integrations: Integrations) -> prometheus::Result<Self> {
        Ok(Self {
            hasher: IdentityHasher::from_config(config.identity.salt.as_deref()),
            limiter: RateLimiter::new(config.rate_limit.clone(), db.clone()),
            validator: CommentValidator::new(config.validation.clone()),
            moderation: ModerationGate::new(db.clone()),
            ledger: UpvoteLedger::new(db.clone()),
            posts: PostPublisher::new(db, integrations.image_host, integrations.notifier),
            mailing_list: integrations.mailing_list,
            metrics: Metrics::new()?,
            config,
        })
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let origins: Vec<http::HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers([http::header::CONTENT_TYPE]);

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/api/comments", get(list_comments).post(create_comment))
        .route("/api/upvotes", get(upvote_status).post(create_upvote))
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/{slug}", get(get_post))
        .route("/api/subscribe", axum::routing::post(subscribe));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    #[serde(default)]
    pub post_slug: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CommentsResponse {
    pub comments: Vec<PublicComment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlugQuery {
    #[serde(default)]
    pub post_slug: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteRequest {
    #[serde(default)]
    pub post_slug: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteResponse {
    pub success: bool,
    pub upvote_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostResponse {
    pub message: &'static str,
    pub post: PostView,
    pub email_sent: bool,
}

#[derive(Debug, Serialize)]
pub struct PostsResponse {
    pub posts: Vec<PostView>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "blog-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::Internal(format!("metrics encoding: {e}")))?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}

/// Submit a comment. It is stored Pending and not shown until approved.
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CommentRequest>, JsonRejection>,
) -> Result<Json<CommentResponse>> {
    let Json(req) = payload.map_err(invalid_body)?;

    let (Some(post_slug), Some(author), Some(email), Some(content)) = (
        present(req.post_slug),
        present(req.author),
        present(req.email),
        present(req.content),
    ) else {
        return Err(ValidationError::MissingFields.into());
    };

    let identity = state.hasher.identify(&headers);
    let rate = state.limiter.check(&identity, ActionKind::Comment).await?;
    if let RateLimitResult::Limited { retry_after } = rate {
        state
            .metrics
            .rate_limited
            .with_label_values(&[ActionKind::Comment.as_str()])
            .inc();
        return Err(AppError::RateLimited {
            message: "Please wait before submitting another comment.",
            retry_after,
        });
    }

    let clean = state.validator.validate(&author, &email, &content)?;

    if !state.posts.exists(&post_slug).await? {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    state.moderation.submit(&post_slug, clean, &identity).await?;
    state.metrics.comments_submitted.inc();

    Ok(Json(CommentResponse {
        success: true,
        message: "Your comment has reached the admin and will appear publicly after approval.",
    }))
}

/// Approved comments for a post, oldest first.
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<SlugQuery>, QueryRejection>,
) -> Result<Json<CommentsResponse>> {
    let post_slug = required_slug(query)?;
    let comments = state.moderation.public_comments(&post_slug).await?;
    debug!(%post_slug, count = comments.len(), "Listing comments");
    Ok(Json(CommentsResponse { comments }))
}

/// Upvote a post, once per origin.
pub async fn create_upvote(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<UpvoteRequest>, JsonRejection>,
) -> Result<Json<UpvoteResponse>> {
    let Json(req) = payload.map_err(invalid_body)?;
    let post_slug =
        present(req.post_slug).ok_or(ValidationError::MissingParameter("postSlug"))?;

    let identity = state.hasher.identify(&headers);
    let rate = state.limiter.check(&identity, ActionKind::Upvote).await?;
    if let RateLimitResult::Limited { retry_after } = rate {
        state
            .metrics
            .rate_limited
            .with_label_values(&[ActionKind::Upvote.as_str()])
            .inc();
        return Err(AppError::RateLimited {
            message: "Please wait before upvoting again.",
            retry_after,
        });
    }

    match state.ledger.try_upvote(&post_slug, &identity).await {
        Ok(upvote_count) => {
            state.metrics.upvotes.with_label_values(&["accepted"]).inc();
            Ok(Json(UpvoteResponse {
                success: true,
                upvote_count,
            }))
        }
        Err(err @ AppError::Conflict(_)) => {
            state.metrics.upvotes.with_label_values(&["duplicate"]).inc();
            Err(err)
        }
        Err(err) => Err(err),
    }
}

/// Upvote count for a post and whether the caller has upvoted it.
pub async fn upvote_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: std::result::Result<Query<SlugQuery>, QueryRejection>,
) -> Result<Json<UpvoteStatus>> {
    let post_slug = required_slug(query)?;
    let identity = state.hasher.identify(&headers);
    Ok(Json(state.ledger.status(&post_slug, &identity).await?))
}

/// Create a post from a multipart form: `title`, `slug`, `body`, optional `image`.
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> Result<(StatusCode, Json<CreatePostResponse>)> {
    let mut multipart =
        multipart.map_err(|e| AppError::Validation(format!("Invalid form data: {}", e.body_text())))?;

    let mut new_post = NewPost::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => new_post.title = field.text().await.map_err(invalid_form)?,
            "slug" => new_post.slug = field.text().await.map_err(invalid_form)?,
            "body" => new_post.body = field.text().await.map_err(invalid_form)?,
            "image" => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(invalid_form)?;
                image = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            other => debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    let published = state.posts.publish(new_post, image).await?;
    state.metrics.posts_published.inc();

    Ok((
        StatusCode::CREATED,
        Json(CreatePostResponse {
            message: "Post created successfully",
            post: published.post.into(),
            email_sent: published.email_sent,
        }),
    ))
}

/// All posts, newest first.
pub async fn list_posts(State(state): State<Arc<AppState>>) -> Result<Json<PostsResponse>> {
    let posts = state.posts.list().await?;
    Ok(Json(PostsResponse {
        posts: posts.into_iter().map(PostView::from).collect(),
    }))
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<PostView>> {
    Ok(Json(state.posts.get(&slug).await?.into()))
}

/// Add an email address to the newsletter list.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(req) = payload.map_err(invalid_body)?;
    let email = present(req.email)
        .ok_or_else(|| AppError::Validation("Email is required.".to_string()))?;
    if !is_valid_email(&email) {
        return Err(ValidationError::InvalidEmail.into());
    }

    let list = state
        .mailing_list
        .as_ref()
        .ok_or_else(|| AppError::Internal("no mailing list configured".to_string()))?;

    match list.is_member(&email).await {
        Ok(true) => {
            state
                .metrics
                .subscriptions
                .with_label_values(&["already_subscribed"])
                .inc();
            return Ok(Json(MessageResponse {
                message: "You are already subscribed.",
            }));
        }
        Ok(false) => {}
        // A failed lookup should not block the subscription itself.
        Err(e) => warn!(error = ?e, "Mailing list membership check failed"),
    }

    list.add_member(&email)
        .await
        .map_err(|e| AppError::Upstream(format!("mailing list: {e:#}")))?;

    state
        .metrics
        .subscriptions
        .with_label_values(&["subscribed"])
        .inc();
    info!("New subscriber added");

    Ok(Json(MessageResponse {
        message: "You have been subscribed!",
    }))
}

/// Treat empty and whitespace-only strings as missing.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required_slug(query: std::result::Result<Query<SlugQuery>, QueryRejection>) -> Result<String> {
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    present(query.post_slug).ok_or_else(|| ValidationError::MissingParameter("postSlug").into())
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
}

fn invalid_form(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Invalid form data: {}", err.body_text()))
}
