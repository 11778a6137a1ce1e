//! Persisted feedback record types
//!
//! A FeedbackRecord is a durably stored, never-mutated training comment:
//! submitter identity, free-text comment, and an optional stored-object key
//! for an attached image.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A persisted training comment, as read back from the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Server-assigned id
    pub id: Uuid,
    /// Submitter name
    pub name: String,
    /// Submitter email
    pub email: String,
    /// Free-text comment
    pub comment: String,
    /// Object-store key of the attached image, if any
    pub picture_url: Option<String>,
    /// Server-assigned creation time
    pub created_at: DateTime<Utc>,
}

/// Binary attachment carried by a submission
#[derive(Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .finish()
    }
}

/// A submission candidate, before the store assigns id and timestamp
#[derive(Debug, Clone)]
pub struct NewComment {
    pub name: String,
    pub email: String,
    pub comment: String,
    pub attachment: Option<Attachment>,
}

impl NewComment {
    /// Check the required-field contract: name, email, and comment must be
    /// present, and the email must be syntactically plausible.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name is required".to_string()));
        }
        if self.email.trim().is_empty() {
            return Err(Error::Validation("email is required".to_string()));
        }
        if !is_well_formed_email(&self.email) {
            return Err(Error::Validation(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        if self.comment.trim().is_empty() {
            return Err(Error::Validation("comment is required".to_string()));
        }
        Ok(())
    }
}

/// Syntactic email check: one '@', non-empty local part, domain with a dot,
/// no whitespace. Deliverability is not our problem.
pub fn is_well_formed_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.len() >= 3
}
