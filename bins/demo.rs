use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use tracing::{error, info};
use uuid::Uuid;

use models::credentials::{LoginInput, RegisterInput};
use session::auth::api::mock::MockAuthApi;
use session::auth::api::AuthApi;
use session::auth::controller::{AuthConfig, AuthSessionController};
use session::auth::store::CredentialStore;
use session::file::TokenStore;

fn init_logging() {
    // Load .env early so RUST_LOG and API_BASE_URL take effect
    dotenv().ok();
    common::utils::logging::init_logging_default();
    info!(service = "demo", event = "logger_init", "tracing subscriber initialized");
}

fn main() -> std::process::ExitCode {
    init_logging();

    let service_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new(move |info| {
        error!(
            service = "demo",
            event = "panic",
            %service_id,
            pid,
            message = %info,
            "unhandled panic occurred"
        );
    }));

    let cfg = match configs::AppConfig::load_and_validate() {
        Ok(cfg) => cfg,
        Err(e) => {
            info!(reason = %e, "config.toml not loaded; using built-in defaults");
            let mut cfg = configs::AppConfig::default();
            if let Err(e) = cfg.normalize_and_validate() {
                error!(error = %e, "default configuration failed validation");
                return std::process::ExitCode::FAILURE;
            }
            cfg
        }
    };

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(w) = cfg.worker_threads {
        builder.worker_threads(w);
    }
    let rt = match builder.build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(
                service = "demo",
                event = "runtime_build_failed",
                error = %e,
                "failed to build tokio runtime"
            );
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(service = "demo", version, %service_id, "starting session demo");

    match rt.block_on(run(cfg)) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "demo run failed");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(cfg: configs::AppConfig) -> anyhow::Result<()> {
    let data_dir = std::path::Path::new(&cfg.storage.token_path)
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".to_string());
    common::env::ensure_env("config.toml", &data_dir).await?;

    let store = TokenStore::open(&cfg.storage.token_path)
        .await
        .map_err(|e| anyhow::anyhow!("open token store: {e}"))?;

    if cfg.api.base_url.trim().is_empty() {
        info!("no api.base_url configured; driving the in-memory backend");
        let api = Arc::new(MockAuthApi::default());
        let seeded = api.seed_account("ada@example.com", "Hyperion#9", "ada");
        info!(user_id = %seeded.id, "seeded demo account");
        drive(api, store, &cfg).await
    } else {
        info!(base_url = %cfg.api.base_url, "driving the configured backend");
        let api = client::HttpAuthApi::new(
            cfg.api.base_url.clone(),
            Duration::from_secs(cfg.api.request_timeout_secs),
        )
        .map_err(|e| anyhow::anyhow!("build http client: {e}"))?;
        drive(Arc::new(api), store, &cfg).await
    }
}

/// Walk the full session lifecycle once, logging every observed transition.
async fn drive<A, S>(api: Arc<A>, store: Arc<S>, cfg: &configs::AppConfig) -> anyhow::Result<()>
where
    A: AuthApi + 'static,
    S: CredentialStore + 'static,
{
    let ctrl = Arc::new(AuthSessionController::new(
        api,
        store,
        AuthConfig { startup_timeout: Duration::from_secs(cfg.session.startup_timeout_secs) },
    ));

    let mut rx = ctrl.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(state) = rx.recv().await {
            info!(state = state.label(), "session transition");
        }
    });

    // Opportunistic background revalidation, the way the app shell would
    // schedule it; torn down with the controller below.
    let refresher = {
        let ctrl = Arc::clone(&ctrl);
        let period = Duration::from_secs(cfg.session.refresh_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                ctrl.refresh_if_needed().await;
            }
        })
    };

    ctrl.check_initial_session().await;

    let registration = RegisterInput {
        email: "grace@example.com".into(),
        username: "grace".into(),
        display_name: "Grace Hopper".into(),
        password: "Vector#77".into(),
        password_confirmation: "Vector#77".into(),
        accepted_terms: true,
        accepted_privacy: true,
        consent_recorded_at: None,
    };
    match ctrl.register(&registration).await {
        Ok(outcome) => {
            info!(username = %outcome.session().user.username, "registration accepted");
        }
        Err(e) => info!(error = %e, code = e.code(), "registration not accepted"),
    }
    ctrl.logout().await;

    let login = LoginInput {
        email: "ada@example.com".into(),
        password: "Hyperion#9".into(),
    };
    match ctrl.login(&login).await {
        Ok(user) => info!(username = %user.username, "signed in"),
        Err(e) => {
            info!(error = %e, code = e.code(), recoverable = e.is_recoverable(), "login failed");
        }
    }

    ctrl.refresh_if_needed().await;
    ctrl.logout().await;

    refresher.abort();
    let _ = refresher.await;
    drop(ctrl);
    let _ = watcher.await;
    Ok(())
}
