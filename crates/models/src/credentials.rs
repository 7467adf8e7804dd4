use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login form input. Transient: never persisted, dropped after the network call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Registration form input, including the required consent acknowledgements.
///
/// `consent_recorded_at` is stamped by the session controller at submission
/// time; forms leave it as `None`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub password_confirmation: String,
    pub accepted_terms: bool,
    pub accepted_privacy: bool,
    #[serde(default)]
    pub consent_recorded_at: Option<DateTime<Utc>>,
}
