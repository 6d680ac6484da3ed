// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Input sanitization and validation for reader-submitted text.
//!
//! [`sanitize`] is a denylist, not an HTML sanitizer. It removes:
//! - `<script>...</script>` fragments
//! - `javascript:` URLs
//! - `on<event>=` handler attributes
//!
//! and caps the result at [`MAX_INPUT_CHARS`]. Everything else is kept
//! as written; escaping happens where the text is rendered.

use crate::config::ValidationConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Upper bound on any sanitized field, in characters.
pub const MAX_INPUT_CHARS: usize = 1000;

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script>").expect("valid script pattern"));
static JAVASCRIPT_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript:").expect("valid javascript pattern"));
static EVENT_HANDLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)on\w+=").expect("valid handler pattern"));
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required fields")]
    MissingFields,

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Author name must be between {min} and {max} characters")]
    AuthorLength { min: usize, max: usize },

    #[error("Comment must be between {min} and {max} characters")]
    ContentLength { min: usize, max: usize },
}

/// Strip denylisted fragments, trim, and cap at [`MAX_INPUT_CHARS`].
pub fn sanitize(text: &str) -> String {
    let mut cleaned = text.to_string();

    // Removing one fragment can splice together another ("javajavascript:script:"),
    // so repeat until nothing matches.
    loop {
        let next = SCRIPT_BLOCK.replace_all(&cleaned, "");
        let next = JAVASCRIPT_URL.replace_all(&next, "");
        let next = EVENT_HANDLER.replace_all(&next, "").into_owned();
        if next == cleaned {
            break;
        }
        cleaned = next;
    }

    let trimmed = cleaned.trim();
    match trimmed.char_indices().nth(MAX_INPUT_CHARS) {
        Some((cut, _)) => trimmed[..cut].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

/// Loose `local@domain.tld` shape check. Not RFC 5322.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// A comment whose fields passed sanitization and bounds checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanComment {
    pub author: String,
    pub email: String,
    pub content: String,
}

/// Comment field validator.
#[derive(Debug, Clone)]
pub struct CommentValidator {
    config: ValidationConfig,
}

impl CommentValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate the email shape, sanitize every field, then enforce the
    /// length bounds on the sanitized author and content.
    pub fn validate(
        &self,
        author: &str,
        email: &str,
        content: &str,
    ) -> Result<CleanComment, ValidationError> {
        if !is_valid_email(email) {
            debug!("Invalid comment email");
            return Err(ValidationError::InvalidEmail);
        }

        let author = sanitize(author);
        let email = sanitize(email);
        let content = sanitize(content);

        let author_len = author.chars().count();
        if author_len < self.config.author_min_chars || author_len > self.config.author_max_chars {
            debug!(author_len, "Author length out of bounds");
            return Err(ValidationError::AuthorLength {
                min: self.config.author_min_chars,
                max: self.config.author_max_chars,
            });
        }

        let content_len = content.chars().count();
        if content_len < self.config.content_min_chars
            || content_len > self.config.content_max_chars
        {
            debug!(content_len, "Content length out of bounds");
            return Err(ValidationError::ContentLength {
                min: self.config.content_min_chars,
                max: self.config.content_max_chars,
            });
        }

        Ok(CleanComment {
            author,
            email,
            content,
        })
    }
}
