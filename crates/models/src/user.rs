use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::ValidationResult;

/// Identity record held while a session is authenticated.
///
/// Owned exclusively by the session state; replaced wholesale on re-login,
/// dropped on logout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub email_verified: bool,
    pub has_avatar: bool,
    pub follower_count: u32,
    pub following_count: u32,
    pub listing_count: u32,
    pub created_at: DateTime<Utc>,
}

pub fn validate_email(email: &str) -> ValidationResult {
    let email = email.trim();
    if email.is_empty() {
        return ValidationResult::invalid("email is required");
    }
    if email.chars().any(char::is_whitespace) {
        return ValidationResult::invalid("email must not contain whitespace");
    }
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() {
        return ValidationResult::invalid("email must look like name@domain");
    }
    if domain.contains('@') {
        return ValidationResult::invalid("email must contain exactly one '@'");
    }
    // Require a dot with something on both sides, e.g. "example.com".
    let dot_ok = domain
        .split('.')
        .filter(|seg| !seg.is_empty())
        .count()
        >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.');
    if !dot_ok {
        return ValidationResult::invalid("email domain must contain a dot");
    }
    ValidationResult::Valid
}

pub fn validate_username(username: &str) -> ValidationResult {
    let username = username.trim();
    if username.is_empty() {
        return ValidationResult::invalid("username is required");
    }
    if username.len() < 3 || username.len() > 30 {
        return ValidationResult::invalid("username must be 3-30 characters");
    }
    let mut chars = username.chars();
    let first = chars.next().unwrap_or('_');
    if !first.is_ascii_alphabetic() {
        return ValidationResult::invalid("username must start with a letter");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return ValidationResult::invalid("username may contain letters, digits and underscores only");
    }
    ValidationResult::Valid
}

pub fn validate_display_name(name: &str) -> ValidationResult {
    let name = name.trim();
    if name.is_empty() {
        return ValidationResult::invalid("display name is required");
    }
    if name.chars().count() > 50 {
        return ValidationResult::invalid("display name must be at most 50 characters");
    }
    ValidationResult::Valid
}
