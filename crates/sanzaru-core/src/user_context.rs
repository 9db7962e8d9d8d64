//! Per-request user identity for multi-tenant deployments.
//!
//! When the server runs behind a proxy that injects the caller's email (for
//! example Databricks Apps with `x-forwarded-email`), request-entry code builds
//! a [`UserContext`] from the headers and passes it explicitly down to the
//! storage layer, which namespaces remote paths by the derived user slug.
//! Single-tenant deployments simply pass `None`.

use http::HeaderMap;
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error;

/// Identity header injected by the hosting proxy.
pub const FORWARDED_EMAIL_HEADER: &str = "x-forwarded-email";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserContextError {
    #[error("Invalid email: {0:?}")]
    InvalidEmail(String),

    #[error("Cannot derive user slug from email: {0}")]
    EmptySlug(String),

    #[error("Invalid identity header: {0}")]
    InvalidHeader(String),
}

/// Identity of the user making the current request.
///
/// Immutable once constructed; the email is validated to contain an `@` with
/// a non-empty local part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UserContext {
    email: String,
}

impl UserContext {
    pub fn new(email: impl Into<String>) -> Result<Self, UserContextError> {
        let email = email.into();
        match email.split_once('@') {
            Some((local, _)) if !local.is_empty() => Ok(Self { email }),
            _ => Err(UserContextError::InvalidEmail(email)),
        }
    }

    /// Build a context from the proxy identity header.
    ///
    /// Returns `Ok(None)` when the header is absent or blank, which is the
    /// single-tenant case.
    pub fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, UserContextError> {
        let Some(value) = headers.get(FORWARDED_EMAIL_HEADER) else {
            return Ok(None);
        };
        let email = value
            .to_str()
            .map_err(|e| UserContextError::InvalidHeader(e.to_string()))?
            .trim();
        if email.is_empty() {
            return Ok(None);
        }
        Self::new(email).map(Some)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Path-safe tenant identifier, see [`user_slug`].
    pub fn slug(&self) -> Result<String, UserContextError> {
        user_slug(&self.email)
    }
}

impl Display for UserContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.email)
    }
}

/// Derive a filesystem/URL-safe slug from an email address.
///
/// Lowercases the local part, replaces every character outside `[a-z0-9_]`
/// with `_`, collapses runs of underscores and strips them from both ends.
/// `"Jane.Doe+work@example.com"` becomes `"jane_doe_work"`.
pub fn user_slug(email: &str) -> Result<String, UserContextError> {
    let local = email.split('@').next().unwrap_or_default().to_lowercase();

    let mut slug = String::with_capacity(local.len());
    for c in local.chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            c
        } else {
            '_'
        };
        if c == '_' && slug.ends_with('_') {
            continue;
        }
        slug.push(c);
    }

    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        return Err(UserContextError::EmptySlug(email.to_string()));
    }
    Ok(slug.to_string())
}
