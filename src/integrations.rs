// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Clients for the third-party services around the blog:
//!
//! - image hosting for post images (Cloudinary unsigned uploads)
//! - new-post notification emails (SendGrid marketing single sends)
//! - the newsletter mailing list (Mailgun list members)
//!
//! Each sits behind a small trait so handlers can run without them.

use crate::config::IntegrationsConfig;
use crate::models::Post;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Characters of the post body quoted in notification emails
const EXCERPT_CHARS: usize = 150;

/// Image file received with a new post.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Hosts post images and hands back a public URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: ImageUpload) -> Result<String>;
}

/// Tells subscribers about a newly published post.
#[async_trait]
pub trait PostNotifier: Send + Sync {
    async fn notify_new_post(&self, post: &Post) -> Result<()>;
}

/// Newsletter subscriber list.
#[async_trait]
pub trait MailingList: Send + Sync {
    async fn is_member(&self, email: &str) -> Result<bool>;
    async fn add_member(&self, email: &str) -> Result<()>;
}

/// The configured collaborators. Missing credentials leave a slot empty.
#[derive(Clone, Default)]
pub struct Integrations {
    pub image_host: Option<Arc<dyn ImageHost>>,
    pub notifier: Option<Arc<dyn PostNotifier>>,
    pub mailing_list: Option<Arc<dyn MailingList>>,
}

impl Integrations {
    pub fn from_config(config: &IntegrationsConfig) -> Self {
        let client = reqwest::Client::new();

        let image_host = match (&config.cloudinary_cloud_name, &config.cloudinary_upload_preset) {
            (Some(cloud), Some(preset)) => Some(Arc::new(CloudinaryImageHost {
                base_url: config.cloudinary_api_base.clone(),
                cloud_name: cloud.clone(),
                upload_preset: preset.clone(),
                folder: config.cloudinary_folder.clone(),
                client: client.clone(),
            }) as Arc<dyn ImageHost>),
            _ => None,
        };

        let notifier = match (
            &config.sendgrid_api_key,
            &config.sendgrid_list_id,
            config.sendgrid_sender_id,
        ) {
            (Some(key), Some(list), Some(sender)) => Some(Arc::new(SendGridNotifier {
                base_url: config.sendgrid_api_base.clone(),
                api_key: key.clone(),
                list_id: list.clone(),
                sender_id: sender,
                site_url: config.public_base_url.clone(),
                client: client.clone(),
            }) as Arc<dyn PostNotifier>),
            _ => None,
        };

        let mailing_list = match (&config.mailgun_api_key, &config.mailgun_list) {
            (Some(key), Some(list)) => Some(Arc::new(MailgunList {
                base_url: config.mailgun_api_base.clone(),
                api_key: key.clone(),
                list: list.clone(),
                client,
            }) as Arc<dyn MailingList>),
            _ => None,
        };

        info!(
            image_host = image_host.is_some(),
            notifier = notifier.is_some(),
            mailing_list = mailing_list.is_some(),
            "Integrations configured"
        );

        Self {
            image_host,
            notifier,
            mailing_list,
        }
    }
}

/// Cloudinary upload API client using an unsigned upload preset.
pub struct CloudinaryImageHost {
    base_url: String,
    cloud_name: String,
    upload_preset: String,
    folder: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct CloudinaryUpload {
    secure_url: String,
}

#[async_trait]
impl ImageHost for CloudinaryImageHost {
    async fn upload(&self, image: ImageUpload) -> Result<String> {
        let url = format!("{}/v1_1/{}/image/upload", self.base_url, self.cloud_name);

        let mut part = reqwest::multipart::Part::bytes(image.bytes).file_name(image.file_name);
        if let Some(content_type) = image.content_type.as_deref() {
            part = part.mime_str(content_type)?;
        }
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", self.folder.clone());

        let response = self.client.post(&url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("Cloudinary upload failed: {}", response.status()));
        }

        let uploaded: CloudinaryUpload = response.json().await?;
        debug!(url = %uploaded.secure_url, "Image uploaded");
        Ok(uploaded.secure_url)
    }
}

/// SendGrid marketing client: one single send per post, scheduled immediately.
pub struct SendGridNotifier {
    base_url: String,
    api_key: String,
    list_id: String,
    sender_id: u64,
    site_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SingleSend {
    id: String,
}

#[async_trait]
impl PostNotifier for SendGridNotifier {
    async fn notify_new_post(&self, post: &Post) -> Result<()> {
        let post_url = post_url(&self.site_url, &post.slug)?;

        let response = self
            .client
            .post(format!("{}/v3/marketing/singlesends", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "name": format!("New Post: {}", post.title),
                "send_to": { "list_ids": [self.list_id] },
                "email_config": {
                    "subject": format!("New Blog Post: {}", post.title),
                    "html_content": render_notification(post, &post_url),
                    "sender_id": self.sender_id,
                },
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("SendGrid single send failed: {}", response.status()));
        }
        let single_send: SingleSend = response.json().await?;

        let response = self
            .client
            .put(format!(
                "{}/v3/marketing/singlesends/{}/schedule",
                self.base_url, single_send.id
            ))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "send_at": "now" }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("SendGrid schedule failed: {}", response.status()));
        }

        info!(slug = %post.slug, single_send_id = %single_send.id, "New post notification scheduled");
        Ok(())
    }
}

/// Mailgun mailing list members client.
pub struct MailgunList {
    base_url: String,
    api_key: String,
    list: String,
    client: reqwest::Client,
}

impl MailgunList {
    fn members_url(&self) -> String {
        format!(
            "{}/v3/lists/{}/members",
            self.base_url,
            urlencoding::encode(&self.list)
        )
    }
}

#[async_trait]
impl MailingList for MailgunList {
    async fn is_member(&self, email: &str) -> Result<bool> {
        let url = format!("{}/{}", self.members_url(), urlencoding::encode(email));
        let response = self
            .client
            .get(&url)
            .basic_auth("api", Some(&self.api_key))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(true)
        } else if response.status() == 404 {
            Ok(false)
        } else {
            Err(anyhow!("Mailgun member lookup failed: {}", response.status()))
        }
    }

    async fn add_member(&self, email: &str) -> Result<()> {
        let response = self
            .client
            .post(self.members_url())
            .basic_auth("api", Some(&self.api_key))
            .form(&[("address", email), ("subscribed", "yes")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Mailgun add member failed: {}", response.status()));
        }
        Ok(())
    }
}

/// Public link to a post on the site.
pub fn post_url(site_url: &str, slug: &str) -> Result<String> {
    let mut base = site_url.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let url = url::Url::parse(&base)
        .with_context(|| format!("invalid public base URL: {site_url}"))?
        .join(&format!("posts/{}", urlencoding::encode(slug)))?;
    Ok(url.to_string())
}

/// HTML body of the new-post email.
pub fn render_notification(post: &Post, post_url: &str) -> String {
    let title = html_escape::encode_text(&post.title);
    let excerpt = post.excerpt(EXCERPT_CHARS);
    let excerpt = html_escape::encode_text(&excerpt);
    let href = html_escape::encode_double_quoted_attribute(post_url);

    let image = match post.image_url.as_deref() {
        Some(src) => format!(
            r#"<a href="{href}"><img src="{}" alt="{}" style="width: 100%; height: auto;"/></a>"#,
            html_escape::encode_double_quoted_attribute(src),
            html_escape::encode_double_quoted_attribute(&post.title),
        ),
        None => String::new(),
    };

    format!(
        r#"<div style="font-family: sans-serif; max-width: 600px; margin: auto; border: 1px solid #e0e0e0; border-radius: 8px; overflow: hidden;">
  {image}
  <div style="padding: 24px;">
    <h1 style="font-size: 24px; margin-top: 0;">{title}</h1>
    <p style="font-size: 16px; color: #555;">{excerpt}</p>
    <a href="{href}" style="display: inline-block; padding: 12px 20px; background-color: #13aa52; color: #ffffff; text-decoration: none; border-radius: 5px; font-weight: bold;">Read More</a>
  </div>
  <footer style="background-color: #f7f7f7; padding: 16px; text-align: center; font-size: 12px; color: #888;">
    <p>You are receiving this because you subscribed to my blog.</p>
  </footer>
</div>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_url() {
        assert_eq!(
            post_url("https://blog.example.com", "hello world").unwrap(),
            "https://blog.example.com/posts/hello%20world"
        );
        assert_eq!(
            post_url("https://example.com/blog/", "intro").unwrap(),
            "https://example.com/blog/posts/intro"
        );
        assert!(post_url("not a url", "intro").is_err());
    }

    #[test]
    fn test_notification_escapes_post_fields() {
        let post = Post::new(
            "Tom & Jerry <3".into(),
            "tom".into(),
            "Body text".into(),
            None,
        );
        let html = render_notification(&post, "https://example.com/posts/tom");
        assert!(html.contains("Tom &amp; Jerry &lt;3"));
        assert!(html.contains("Body text..."));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn test_unconfigured_integrations_are_empty() {
        let integrations = Integrations::from_config(&IntegrationsConfig::default());
        assert!(integrations.image_host.is_none());
        assert!(integrations.notifier.is_none());
        assert!(integrations.mailing_list.is_none());
    }
}
