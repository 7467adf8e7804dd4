use chrono::{DateTime, Utc};
use models::user::User;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current authentication state of the app.
///
/// Exactly one state is active at any time. `Authenticated` is the only state
/// carrying a full user record; entering it replaces any previous user
/// wholesale. Only the controller writes this type.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    /// Initial/unknown, startup session check in flight.
    Loading,
    /// No valid session held.
    Unauthenticated,
    /// Valid session held for this user.
    Authenticated(User),
    /// Registration accepted but the server still wants the email confirmed.
    EmailVerificationPending { user: User },
    /// Logout in flight.
    LoggingOut,
    /// Last operation failed in a way login retry cannot fix.
    Error(String),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user)
            | SessionState::EmailVerificationPending { user } => Some(user),
            _ => None,
        }
    }

    /// Short identifier used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::EmailVerificationPending { .. } => "email_verification_pending",
            SessionState::LoggingOut => "logging_out",
            SessionState::Error(_) => "error",
        }
    }

    /// Whether `next` is a legal transition out of `self`.
    ///
    /// Writing the same state again is treated as a no-op upstream, not a
    /// transition, so it does not appear here.
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Loading, Authenticated(_) | Unauthenticated | Error(_)) => true,
            (Unauthenticated, Authenticated(_) | EmailVerificationPending { .. }) => true,
            (
                EmailVerificationPending { .. },
                Authenticated(_) | Unauthenticated | LoggingOut,
            ) => true,
            // Authenticated -> Authenticated is a user snapshot refresh.
            (Authenticated(_), Authenticated(_) | LoggingOut | Unauthenticated | Error(_)) => true,
            (LoggingOut, Unauthenticated) => true,
            (Error(_), Loading | Unauthenticated) => true,
            _ => false,
        }
    }
}

/// Token persisted by the credential store across restarts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub refresh_token: String,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn new(refresh_token: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            user_id,
            issued_at: Utc::now(),
        }
    }
}

/// Successful login/register payload from the auth backend.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthSession {
    pub user: User,
    pub refresh_token: String,
}

/// Server-declared outcome of a registration.
#[derive(Clone, Debug, PartialEq)]
pub enum RegisterOutcome {
    /// Account is active immediately.
    Active(AuthSession),
    /// Account exists but the email address still needs confirmation.
    VerificationRequired(AuthSession),
}

impl RegisterOutcome {
    pub fn session(&self) -> &AuthSession {
        match self {
            RegisterOutcome::Active(session)
            | RegisterOutcome::VerificationRequired(session) => session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "ada".into(),
            display_name: "Ada".into(),
            email: "ada@example.com".into(),
            email_verified: true,
            has_avatar: false,
            follower_count: 0,
            following_count: 0,
            listing_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn transition_table_matches_design() {
        use SessionState::*;
        let auth = Authenticated(user());

        assert!(Loading.can_transition_to(&Unauthenticated));
        assert!(Loading.can_transition_to(&auth));
        assert!(Unauthenticated.can_transition_to(&auth));
        assert!(auth.can_transition_to(&Authenticated(user()))); // snapshot refresh
        assert!(auth.can_transition_to(&LoggingOut));
        assert!(auth.can_transition_to(&Unauthenticated));
        assert!(LoggingOut.can_transition_to(&Unauthenticated));
        assert!(Error("boom".into()).can_transition_to(&Loading));

        assert!(!Unauthenticated.can_transition_to(&LoggingOut));
        assert!(!LoggingOut.can_transition_to(&auth));
        assert!(!Loading.can_transition_to(&LoggingOut));
    }

    #[test]
    fn only_user_bearing_states_expose_a_user() {
        let u = user();
        assert_eq!(SessionState::Authenticated(u.clone()).user(), Some(&u));
        assert_eq!(SessionState::Unauthenticated.user(), None);
        assert_eq!(SessionState::LoggingOut.user(), None);
    }
}
