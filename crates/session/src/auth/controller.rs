use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use models::credentials::{LoginInput, RegisterInput};
use models::user::User;
use models::validation;

use super::api::AuthApi;
use super::domain::{RegisterOutcome, SessionState, StoredToken};
use super::errors::AuthError;
use super::store::CredentialStore;

/// Controller configuration.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Upper bound for the startup session check; exceeding it falls back
    /// to the unauthenticated flow instead of hanging the splash screen.
    pub startup_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { startup_timeout: Duration::from_secs(5) }
    }
}

struct StateCell {
    epoch: u64,
    state: SessionState,
}

enum LogoutPath {
    /// Signed in; run the full logout sequence.
    Full(u64),
    /// Nothing to do.
    Noop,
    /// Another logout is already draining.
    Draining,
}

/// Single source of truth for whether the user is signed in.
///
/// All screens observe this controller instead of holding their own auth
/// flags; collaborators are injected at construction. Every state write is
/// guarded by an operation epoch: a completion that arrives after the state
/// moved on (e.g. a login result landing after logout) is discarded instead
/// of applied.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use models::credentials::LoginInput;
/// use session::auth::api::mock::MockAuthApi;
/// use session::auth::controller::{AuthConfig, AuthSessionController};
/// use session::auth::store::mock::MemoryCredentialStore;
///
/// let api = Arc::new(MockAuthApi::default());
/// api.seed_account("ada@example.com", "Hyperion#9", "ada");
/// let store = Arc::new(MemoryCredentialStore::default());
/// let ctrl = AuthSessionController::new(api, store, AuthConfig::default());
///
/// tokio_test::block_on(ctrl.check_initial_session());
/// let user = tokio_test::block_on(ctrl.login(&LoginInput {
///     email: "ada@example.com".into(),
///     password: "Hyperion#9".into(),
/// }))
/// .unwrap();
/// assert_eq!(user.email, "ada@example.com");
/// assert!(ctrl.current().is_authenticated());
/// ```
pub struct AuthSessionController<A: AuthApi, S: CredentialStore> {
    api: Arc<A>,
    store: Arc<S>,
    cfg: AuthConfig,
    cell: Mutex<StateCell>,
    events: broadcast::Sender<SessionState>,
    cancel: Mutex<CancellationToken>,
}

impl<A: AuthApi, S: CredentialStore> AuthSessionController<A, S> {
    pub fn new(api: Arc<A>, store: Arc<S>, cfg: AuthConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            api,
            store,
            cfg,
            cell: Mutex::new(StateCell { epoch: 0, state: SessionState::Loading }),
            events,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Current state snapshot.
    pub fn current(&self) -> SessionState {
        self.cell.lock().unwrap().state.clone()
    }

    /// Subscribe to session transitions, delivered in the order they occur.
    ///
    /// A receiver that falls behind the channel capacity observes
    /// `RecvError::Lagged` rather than silently skipping states.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionState> {
        self.events.subscribe()
    }

    /// Cancel any in-flight operation. Called on teardown.
    pub fn shutdown(&self) {
        self.cancel.lock().unwrap().cancel();
    }

    /// Startup session check, run once from `Loading`.
    ///
    /// Degrades to `Unauthenticated` on any failure or on exceeding the
    /// configured timeout; "not signed in" is a normal state, not an error
    /// surface.
    #[instrument(skip(self))]
    pub async fn check_initial_session(&self) {
        let Some(epoch) = self.gate(|s| matches!(s, SessionState::Loading)) else {
            debug!("startup check skipped; session already resolved");
            return;
        };
        let cancel = self.cancel_token();

        let user = tokio::select! {
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(self.cfg.startup_timeout, self.restore_session()) => {
                match result {
                    Ok(Ok(found)) => found,
                    Ok(Err(e)) => {
                        debug!(error = %e, code = e.code(), "startup session check failed; treating as signed out");
                        None
                    }
                    Err(_) => {
                        warn!(
                            timeout_ms = self.cfg.startup_timeout.as_millis() as u64,
                            "startup session check timed out"
                        );
                        None
                    }
                }
            }
        };

        let next = match user {
            Some(user) => SessionState::Authenticated(user),
            None => SessionState::Unauthenticated,
        };
        if !self.apply_if(epoch, next) {
            debug!("startup check result discarded");
        }
    }

    async fn restore_session(&self) -> Result<Option<User>, AuthError> {
        let Some(stored) = self.store.load().await? else {
            return Ok(None);
        };
        match self.api.fetch_current_user(&stored.refresh_token).await {
            Ok(user) => Ok(Some(user)),
            Err(AuthError::SessionExpired) | Err(AuthError::InvalidCredentials) => {
                // Token no longer accepted; drop it so the next start is clean.
                self.store.clear().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Sign in with the given credentials.
    ///
    /// Local validation runs first: on any invalid field this returns
    /// immediately with no network call and no state change. A failure after
    /// the network call leaves the state `Unauthenticated`; failures here are
    /// expected and recoverable, not systemic.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: &LoginInput) -> Result<User, AuthError> {
        let status = validation::check_login(input);
        if !status.can_submit() {
            return Err(AuthError::Validation(status.errors));
        }

        let Some(epoch) = self.gate(|s| matches!(s, SessionState::Unauthenticated)) else {
            return Err(AuthError::Unknown(
                "login is not available in the current session state".into(),
            ));
        };
        let cancel = self.cancel_token();

        let session = tokio::select! {
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            result = self.api.login(input) => result?,
        };

        self.store
            .save(&StoredToken::new(session.refresh_token.clone(), session.user.id))
            .await?;

        if !self.apply_if(epoch, SessionState::Authenticated(session.user.clone())) {
            // Overtaken while in flight (e.g. by logout); never re-authenticate.
            let _ = self.store.clear().await;
            return Err(AuthError::Cancelled);
        }
        info!(user_id = %session.user.id, "login_succeeded");
        Ok(session.user)
    }

    /// Create an account.
    ///
    /// Validates every field fail-fast in declaration order before any
    /// network traffic, and stamps the consent timestamp at submission. The
    /// server decides whether the account is active immediately or the email
    /// must be confirmed first.
    #[instrument(skip(self, input), fields(email = %input.email, username = %input.username))]
    pub async fn register(&self, input: &RegisterInput) -> Result<RegisterOutcome, AuthError> {
        if let Some(err) = validation::first_register_error(input) {
            return Err(AuthError::Validation(vec![err]));
        }

        let Some(epoch) = self.gate(|s| matches!(s, SessionState::Unauthenticated)) else {
            return Err(AuthError::Unknown(
                "registration is not available in the current session state".into(),
            ));
        };
        let cancel = self.cancel_token();

        let mut input = input.clone();
        input.consent_recorded_at = Some(Utc::now());

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            result = self.api.register(&input) => result?,
        };

        let session = outcome.session();
        self.store
            .save(&StoredToken::new(session.refresh_token.clone(), session.user.id))
            .await?;

        let next = match &outcome {
            RegisterOutcome::Active(s) => SessionState::Authenticated(s.user.clone()),
            RegisterOutcome::VerificationRequired(s) => {
                SessionState::EmailVerificationPending { user: s.user.clone() }
            }
        };
        if !self.apply_if(epoch, next) {
            let _ = self.store.clear().await;
            return Err(AuthError::Cancelled);
        }
        info!(
            user_id = %session.user.id,
            outcome = match &outcome {
                RegisterOutcome::Active(_) => "active",
                RegisterOutcome::VerificationRequired(_) => "verification_required",
            },
            "registration_accepted"
        );
        Ok(outcome)
    }

    /// Promote `EmailVerificationPending` to `Authenticated` once the server
    /// reports the address verified. Returns whether the promotion happened.
    #[instrument(skip(self))]
    pub async fn confirm_email_verified(&self) -> Result<bool, AuthError> {
        let Some(epoch) =
            self.gate(|s| matches!(s, SessionState::EmailVerificationPending { .. }))
        else {
            return Err(AuthError::Unknown("no email verification is pending".into()));
        };

        let stored = self.store.load().await?.ok_or(AuthError::SessionExpired)?;
        let user = self.api.fetch_current_user(&stored.refresh_token).await?;
        if !user.email_verified {
            return Ok(false);
        }
        if !self.apply_if(epoch, SessionState::Authenticated(user)) {
            return Err(AuthError::Cancelled);
        }
        info!("email_verified");
        Ok(true)
    }

    /// Sign out. Idempotent: a no-op when not signed in or while another
    /// logout is draining. Always cancels in-flight operations so a stale
    /// login result cannot re-authenticate the user afterwards.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let path = {
            let mut cell = self.cell.lock().unwrap();
            match cell.state {
                SessionState::LoggingOut => LogoutPath::Draining,
                SessionState::Authenticated(_)
                | SessionState::EmailVerificationPending { .. } => {
                    self.apply_locked(&mut cell, SessionState::LoggingOut);
                    LogoutPath::Full(cell.epoch)
                }
                SessionState::Loading | SessionState::Error(_) => {
                    self.apply_locked(&mut cell, SessionState::Unauthenticated);
                    LogoutPath::Noop
                }
                SessionState::Unauthenticated => {
                    // Still bump: an in-flight login must not apply later.
                    cell.epoch += 1;
                    LogoutPath::Noop
                }
            }
        };

        match path {
            LogoutPath::Draining => return,
            LogoutPath::Noop | LogoutPath::Full(_) => {
                let mut cancel = self.cancel.lock().unwrap();
                cancel.cancel();
                *cancel = CancellationToken::new();
            }
        }
        let LogoutPath::Full(epoch) = path else { return };

        if let Ok(Some(stored)) = self.store.load().await {
            // Best effort; the local session is torn down regardless.
            if let Err(e) = self.api.logout(&stored.refresh_token).await {
                debug!(error = %e, code = e.code(), "server logout failed");
            }
        }
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear stored credentials");
        }
        if self.apply_if(epoch, SessionState::Unauthenticated) {
            info!("logged_out");
        }
    }

    /// Opportunistic check that a held session is still valid.
    ///
    /// Replaces the user snapshot on success, forces `Unauthenticated` when
    /// the server no longer accepts the session, and leaves the state
    /// untouched on transient failures.
    #[instrument(skip(self))]
    pub async fn refresh_if_needed(&self) {
        let Some(epoch) = self.gate(SessionState::is_authenticated) else {
            return;
        };

        let stored = match self.store.load().await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                // Signed in without a persisted token; treat as invalidated.
                let _ = self.apply_if(epoch, SessionState::Unauthenticated);
                return;
            }
            Err(e) => {
                warn!(error = %e, "credential store unavailable during refresh");
                let _ = self.apply_if(
                    epoch,
                    SessionState::Error(format!("credential storage failed: {e}")),
                );
                return;
            }
        };

        let cancel = self.cancel_token();
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = self.api.fetch_current_user(&stored.refresh_token) => result,
        };

        match result {
            Ok(user) => {
                // Refresh the snapshot; an unchanged user is a no-op write.
                let _ = self.apply_if(epoch, SessionState::Authenticated(user));
            }
            Err(AuthError::SessionExpired) | Err(AuthError::InvalidCredentials) => {
                if let Err(e) = self.store.clear().await {
                    warn!(error = %e, "failed to clear revoked credentials");
                }
                if self.apply_if(epoch, SessionState::Unauthenticated) {
                    info!("session invalidated by server; signed out");
                }
            }
            Err(e) => {
                debug!(error = %e, code = e.code(), "session refresh skipped on transient failure");
            }
        }
    }

    /// Retry the startup check after an unrecoverable error.
    #[instrument(skip(self))]
    pub async fn retry(&self) {
        let moved = {
            let mut cell = self.cell.lock().unwrap();
            matches!(cell.state, SessionState::Error(_))
                && self.apply_locked(&mut cell, SessionState::Loading)
        };
        if moved {
            self.check_initial_session().await;
        }
    }

    fn gate(&self, allow: impl Fn(&SessionState) -> bool) -> Option<u64> {
        let cell = self.cell.lock().unwrap();
        allow(&cell.state).then_some(cell.epoch)
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel.lock().unwrap().clone()
    }

    /// Apply a transition if the epoch is still current. Returns whether the
    /// write (or same-state no-op) took effect.
    fn apply_if(&self, epoch: u64, next: SessionState) -> bool {
        let mut cell = self.cell.lock().unwrap();
        if cell.epoch != epoch {
            debug!(to = next.label(), "stale transition discarded");
            return false;
        }
        self.apply_locked(&mut cell, next)
    }

    fn apply_locked(&self, cell: &mut StateCell, next: SessionState) -> bool {
        if cell.state == next {
            return true;
        }
        if !cell.state.can_transition_to(&next) {
            warn!(
                from = cell.state.label(),
                to = next.label(),
                "illegal session transition refused"
            );
            return false;
        }
        cell.epoch += 1;
        cell.state = next.clone();
        let _ = self.events.send(next);
        true
    }
}

impl<A: AuthApi, S: CredentialStore> Drop for AuthSessionController<A, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
