use async_trait::async_trait;
use models::credentials::{LoginInput, RegisterInput};
use models::user::User;

use super::domain::{AuthSession, RegisterOutcome};
use super::errors::AuthError;

/// Boundary to the authentication backend.
///
/// The controller treats implementations as opaque async calls returning a
/// user record or a typed error; request/response schemas are the
/// implementation's business.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, input: &LoginInput) -> Result<AuthSession, AuthError>;
    async fn register(&self, input: &RegisterInput) -> Result<RegisterOutcome, AuthError>;
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError>;
    async fn fetch_current_user(&self, refresh_token: &str) -> Result<User, AuthError>;
}

/// Simple in-memory backend for tests, doc examples and the demo binary.
pub mod mock {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::Utc;
    use uuid::Uuid;

    #[derive(Clone)]
    struct Account {
        user: User,
        password: String,
        refresh_token: String,
    }

    #[derive(Default)]
    pub struct MockAuthApi {
        accounts: Mutex<HashMap<String, Account>>, // key: email
        login_calls: AtomicUsize,
        logout_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
        fail_next_login: Mutex<Option<AuthError>>,
        fail_next_fetch: Mutex<Option<AuthError>>,
        login_delay: Mutex<Option<Duration>>,
        logout_delay: Mutex<Option<Duration>>,
        fetch_delay: Mutex<Option<Duration>>,
        verification_required: AtomicBool,
    }

    impl MockAuthApi {
        /// Create an active account and return its user record.
        pub fn seed_account(&self, email: &str, password: &str, username: &str) -> User {
            let user = User {
                id: Uuid::new_v4(),
                username: username.to_string(),
                display_name: username.to_string(),
                email: email.to_string(),
                email_verified: true,
                has_avatar: false,
                follower_count: 0,
                following_count: 0,
                listing_count: 0,
                created_at: Utc::now(),
            };
            let account = Account {
                user: user.clone(),
                password: password.to_string(),
                refresh_token: format!("tok-{}", Uuid::new_v4()),
            };
            self.accounts.lock().unwrap().insert(email.to_string(), account);
            user
        }

        /// Make subsequent registrations answer "verification required".
        pub fn set_verification_required(&self, required: bool) {
            self.verification_required.store(required, Ordering::SeqCst);
        }

        /// Rotate every refresh token, invalidating all outstanding sessions.
        pub fn revoke_all_sessions(&self) {
            let mut accounts = self.accounts.lock().unwrap();
            for account in accounts.values_mut() {
                account.refresh_token = format!("tok-{}", Uuid::new_v4());
            }
        }

        /// Current refresh token of an account, for pre-seeding stores in tests.
        pub fn token_for(&self, email: &str) -> Option<String> {
            self.accounts
                .lock()
                .unwrap()
                .get(email)
                .map(|a| a.refresh_token.clone())
        }

        pub fn mark_email_verified(&self, email: &str) {
            if let Some(account) = self.accounts.lock().unwrap().get_mut(email) {
                account.user.email_verified = true;
            }
        }

        pub fn fail_next_login(&self, err: AuthError) {
            *self.fail_next_login.lock().unwrap() = Some(err);
        }

        pub fn fail_next_fetch(&self, err: AuthError) {
            *self.fail_next_fetch.lock().unwrap() = Some(err);
        }

        pub fn set_login_delay(&self, delay: Duration) {
            *self.login_delay.lock().unwrap() = Some(delay);
        }

        pub fn set_logout_delay(&self, delay: Duration) {
            *self.logout_delay.lock().unwrap() = Some(delay);
        }

        pub fn set_fetch_delay(&self, delay: Duration) {
            *self.fetch_delay.lock().unwrap() = Some(delay);
        }

        pub fn login_calls(&self) -> usize {
            self.login_calls.load(Ordering::SeqCst)
        }

        pub fn logout_calls(&self) -> usize {
            self.logout_calls.load(Ordering::SeqCst)
        }

        pub fn fetch_calls(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }

        async fn pause(slot: &Mutex<Option<Duration>>) {
            let delay = *slot.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait]
    impl AuthApi for MockAuthApi {
        async fn login(&self, input: &LoginInput) -> Result<AuthSession, AuthError> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            Self::pause(&self.login_delay).await;
            if let Some(err) = self.fail_next_login.lock().unwrap().take() {
                return Err(err);
            }
            let accounts = self.accounts.lock().unwrap();
            let account = accounts
                .get(&input.email)
                .ok_or(AuthError::InvalidCredentials)?;
            if account.password != input.password {
                return Err(AuthError::InvalidCredentials);
            }
            Ok(AuthSession {
                user: account.user.clone(),
                refresh_token: account.refresh_token.clone(),
            })
        }

        async fn register(&self, input: &RegisterInput) -> Result<RegisterOutcome, AuthError> {
            let verification = self.verification_required.load(Ordering::SeqCst);
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(&input.email) {
                return Err(AuthError::RemoteValidation("email already registered".into()));
            }
            let user = User {
                id: Uuid::new_v4(),
                username: input.username.clone(),
                display_name: input.display_name.clone(),
                email: input.email.clone(),
                email_verified: !verification,
                has_avatar: false,
                follower_count: 0,
                following_count: 0,
                listing_count: 0,
                created_at: Utc::now(),
            };
            let account = Account {
                user: user.clone(),
                password: input.password.clone(),
                refresh_token: format!("tok-{}", Uuid::new_v4()),
            };
            let session = AuthSession {
                user,
                refresh_token: account.refresh_token.clone(),
            };
            accounts.insert(input.email.clone(), account);
            if verification {
                Ok(RegisterOutcome::VerificationRequired(session))
            } else {
                Ok(RegisterOutcome::Active(session))
            }
        }

        async fn logout(&self, _refresh_token: &str) -> Result<(), AuthError> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            Self::pause(&self.logout_delay).await;
            // Unknown tokens are treated as already signed out.
            Ok(())
        }

        async fn fetch_current_user(&self, refresh_token: &str) -> Result<User, AuthError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            Self::pause(&self.fetch_delay).await;
            if let Some(err) = self.fail_next_fetch.lock().unwrap().take() {
                return Err(err);
            }
            let accounts = self.accounts.lock().unwrap();
            accounts
                .values()
                .find(|a| a.refresh_token == refresh_token)
                .map(|a| a.user.clone())
                .ok_or(AuthError::SessionExpired)
        }
    }
}
