//! Field-level input validation shared by the login and registration flows.
//!
//! Validators are synchronous and cheap; the form-level predicates are meant
//! to be recomputed on every input change.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::credentials::{LoginInput, RegisterInput};
use crate::user;

pub const PASSWORD_MIN_LEN: usize = 8;

/// Form fields that carry validation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Email,
    Username,
    DisplayName,
    Password,
    PasswordConfirmation,
    Terms,
    Privacy,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Field::Email => "email",
            Field::Username => "username",
            Field::DisplayName => "display_name",
            Field::Password => "password",
            Field::PasswordConfirmation => "password_confirmation",
            Field::Terms => "terms",
            Field::Privacy => "privacy",
        };
        f.write_str(s)
    }
}

/// Outcome of a single field check.
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationResult {
    Valid,
    Invalid(String),
}

impl ValidationResult {
    pub fn invalid(reason: &str) -> Self {
        ValidationResult::Invalid(reason.to_string())
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// A field paired with the reason it failed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldError {
    pub field: Field,
    pub reason: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Form-level validation snapshot; `can_submit` is the AND over all fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormStatus {
    pub errors: Vec<FieldError>,
}

impl FormStatus {
    pub fn can_submit(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_for(&self, field: Field) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }
}

pub fn validate_password(password: &str) -> ValidationResult {
    if password.is_empty() {
        return ValidationResult::invalid("password is required");
    }
    if password.chars().count() < PASSWORD_MIN_LEN {
        return ValidationResult::invalid("password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return ValidationResult::invalid("password must contain a letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return ValidationResult::invalid("password must contain a digit");
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return ValidationResult::invalid("password must contain a special character");
    }
    ValidationResult::Valid
}

pub fn validate_password_confirmation(password: &str, confirmation: &str) -> ValidationResult {
    if confirmation.is_empty() {
        return ValidationResult::invalid("password confirmation is required");
    }
    if password != confirmation {
        return ValidationResult::invalid("passwords do not match");
    }
    ValidationResult::Valid
}

pub fn validate_consent(accepted: bool, document: &str) -> ValidationResult {
    if accepted {
        ValidationResult::Valid
    } else {
        ValidationResult::Invalid(format!("{document} must be accepted"))
    }
}

fn collect(errors: &mut Vec<FieldError>, field: Field, result: ValidationResult) {
    if let ValidationResult::Invalid(reason) = result {
        errors.push(FieldError { field, reason });
    }
}

/// Validate the login form. Login only requires a well-formed email and a
/// non-empty password; strength rules apply to registration, not sign-in.
pub fn check_login(input: &LoginInput) -> FormStatus {
    let mut errors = Vec::new();
    collect(&mut errors, Field::Email, user::validate_email(&input.email));
    if input.password.is_empty() {
        collect(
            &mut errors,
            Field::Password,
            ValidationResult::invalid("password is required"),
        );
    }
    FormStatus { errors }
}

/// Validate the registration form. Errors are reported in field declaration
/// order so "first invalid field" is well defined.
pub fn check_register(input: &RegisterInput) -> FormStatus {
    let mut errors = Vec::new();
    collect(&mut errors, Field::Email, user::validate_email(&input.email));
    collect(
        &mut errors,
        Field::Username,
        user::validate_username(&input.username),
    );
    collect(
        &mut errors,
        Field::DisplayName,
        user::validate_display_name(&input.display_name),
    );
    collect(&mut errors, Field::Password, validate_password(&input.password));
    collect(
        &mut errors,
        Field::PasswordConfirmation,
        validate_password_confirmation(&input.password, &input.password_confirmation),
    );
    collect(
        &mut errors,
        Field::Terms,
        validate_consent(input.accepted_terms, "terms of service"),
    );
    collect(
        &mut errors,
        Field::Privacy,
        validate_consent(input.accepted_privacy, "privacy policy"),
    );
    FormStatus { errors }
}

/// First invalid required field of the registration form, if any.
pub fn first_register_error(input: &RegisterInput) -> Option<FieldError> {
    check_register(input).errors.into_iter().next()
}
