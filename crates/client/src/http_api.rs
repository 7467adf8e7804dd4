use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use models::credentials::{LoginInput, RegisterInput};
use models::user::User;
use session::auth::api::AuthApi;
use session::auth::domain::{AuthSession, RegisterOutcome};
use session::auth::errors::AuthError;

/// `AuthApi` implementation over the backend's REST endpoints.
pub struct HttpAuthApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AuthError::Unknown(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Debug, Deserialize)]
struct UserDto {
    id: Uuid,
    username: String,
    display_name: String,
    email: String,
    email_verified: bool,
    has_avatar: bool,
    follower_count: u32,
    following_count: u32,
    listing_count: u32,
    created_at: DateTime<Utc>,
}

impl From<UserDto> for User {
    fn from(dto: UserDto) -> Self {
        User {
            id: dto.id,
            username: dto.username,
            display_name: dto.display_name,
            email: dto.email,
            email_verified: dto.email_verified,
            has_avatar: dto.has_avatar,
            follower_count: dto.follower_count,
            following_count: dto.following_count,
            listing_count: dto.listing_count,
            created_at: dto.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionDto {
    user: UserDto,
    refresh_token: String,
}

impl From<SessionDto> for AuthSession {
    fn from(dto: SessionDto) -> Self {
        AuthSession { user: dto.user.into(), refresh_token: dto.refresh_token }
    }
}

#[derive(Debug, Deserialize)]
struct RegisterDto {
    user: UserDto,
    refresh_token: String,
    #[serde(default)]
    verification_required: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorDto {
    #[serde(default)]
    message: Option<String>,
}

/// Map a non-success status to the error taxonomy.
///
/// `token_call` selects the 401 mapping: token-backed calls surface
/// `SessionExpired`, credential submissions surface `InvalidCredentials`.
fn classify_status(status: StatusCode, message: String, token_call: bool) -> AuthError {
    if status.is_server_error() {
        return AuthError::Server(message);
    }
    match status.as_u16() {
        401 | 403 if token_call => AuthError::SessionExpired,
        401 | 403 => AuthError::InvalidCredentials,
        400 | 409 | 422 => AuthError::RemoteValidation(message),
        _ => AuthError::Unknown(format!("{status}: {message}")),
    }
}

fn transport_error(e: reqwest::Error) -> AuthError {
    if e.is_decode() {
        AuthError::Unknown(format!("malformed response: {e}"))
    } else {
        AuthError::Network(e.to_string())
    }
}

async fn error_from(resp: reqwest::Response, token_call: bool) -> AuthError {
    let status = resp.status();
    let message = resp
        .json::<ErrorDto>()
        .await
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| status.to_string());
    classify_status(status, message, token_call)
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    #[instrument(skip(self, input), fields(email = %input.email))]
    async fn login(&self, input: &LoginInput) -> Result<AuthSession, AuthError> {
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .json(input)
            .send()
            .await
            .map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(error_from(resp, false).await);
        }
        let dto = resp.json::<SessionDto>().await.map_err(transport_error)?;
        Ok(dto.into())
    }

    #[instrument(skip(self, input), fields(email = %input.email, username = %input.username))]
    async fn register(&self, input: &RegisterInput) -> Result<RegisterOutcome, AuthError> {
        let resp = self
            .http
            .post(self.url("/auth/register"))
            .json(input)
            .send()
            .await
            .map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(error_from(resp, false).await);
        }
        let dto = resp.json::<RegisterDto>().await.map_err(transport_error)?;
        let session = AuthSession { user: dto.user.into(), refresh_token: dto.refresh_token };
        Ok(if dto.verification_required {
            RegisterOutcome::VerificationRequired(session)
        } else {
            RegisterOutcome::Active(session)
        })
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let resp = self
            .http
            .post(self.url("/auth/logout"))
            .bearer_auth(refresh_token)
            .send()
            .await
            .map_err(transport_error)?;
        // 401 means the session is already gone server-side; good enough.
        if resp.status().is_success() || resp.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        Err(error_from(resp, true).await)
    }

    async fn fetch_current_user(&self, refresh_token: &str) -> Result<User, AuthError> {
        let resp = self
            .http
            .get(self.url("/auth/me"))
            .bearer_auth(refresh_token)
            .send()
            .await
            .map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(error_from(resp, true).await);
        }
        let dto = resp.json::<UserDto>().await.map_err(transport_error)?;
        Ok(dto.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let api = HttpAuthApi::new("https://api.example.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(api.url("/auth/login"), "https://api.example.com/auth/login");
    }

    #[test]
    fn status_classification_matches_error_taxonomy() {
        let msg = || "nope".to_string();
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, msg(), false),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, msg(), true),
            AuthError::SessionExpired
        );
        assert_eq!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, msg(), false),
            AuthError::RemoteValidation("nope".into())
        );
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, msg(), false),
            AuthError::Server("nope".into())
        );
        assert!(matches!(
            classify_status(StatusCode::IM_A_TEAPOT, msg(), false),
            AuthError::Unknown(_)
        ));
    }

    #[test]
    fn user_dto_deserializes_and_converts() {
        let user: User = serde_json::from_str::<UserDto>(
            r#"{
                "id": "7b9f8d4e-1c9b-4e7a-9f59-3d2b1a0c8e71",
                "username": "ada",
                "display_name": "Ada Lovelace",
                "email": "ada@example.com",
                "email_verified": true,
                "has_avatar": false,
                "follower_count": 12,
                "following_count": 3,
                "listing_count": 5,
                "created_at": "2024-06-01T12:00:00Z"
            }"#,
        )
        .unwrap()
        .into();
        assert_eq!(user.username, "ada");
        assert_eq!(user.follower_count, 12);
        assert!(user.email_verified);
    }
}
