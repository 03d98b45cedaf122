//! # artmarket_api
//!
//! HTTP admission layer and auth API for Artmarket.
//!
//! Every request passes the same chain, outermost first: error envelope,
//! request trace, CORS, rate limit, authenticate, authorize, handler.
//! Collaborator routes mounted through [`router_with`] sit behind the
//! same chain.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

use std::future::Future;
use std::sync::Arc;

use artmarket_core::auth::AuthError;
use artmarket_core::auth::password::PasswordHasher;
use artmarket_core::auth::token::{KeyStore, TokenCodec};
use artmarket_core::denylist::{Denylist, TimedDenylist};
use artmarket_core::directory::{DirectoryError, UserDirectory};
use artmarket_core::ownership::ResourceOwners;
use artmarket_core::policy::{PolicyError, PolicyTable};
use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::routing::{get, post, put};
use sqlx::PgPool;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ApiConfig;
use crate::error::{AppError, AppResult};
use crate::handlers::{admin, auth, health, users};
use crate::metrics::AdmissionMetrics;
use crate::middleware::rate_limit::AdmissionLimits;

/// Failure assembling [`AppState`]. Fatal at boot.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Keys(#[from] AuthError),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Shared application state passed to all handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub tokens: Arc<TokenCodec>,
    pub passwords: PasswordHasher,
    /// Wrapped in the configured I/O timeout.
    pub denylist: Arc<dyn Denylist>,
    pub directory: Arc<dyn UserDirectory>,
    pub owners: Arc<dyn ResourceOwners>,
    pub policy: Arc<PolicyTable>,
    pub limits: Arc<AdmissionLimits>,
    pub metrics: Arc<AdmissionMetrics>,
}

impl AppState {
    /// Freeze keys, policy and limits from `config` and attach the backends.
    pub fn new(
        config: ApiConfig,
        directory: Arc<dyn UserDirectory>,
        denylist: Arc<dyn Denylist>,
        owners: Arc<dyn ResourceOwners>,
    ) -> Result<Self, StateError> {
        let keys = KeyStore::new(
            config.jwt_secret.as_bytes(),
            config.access_token_ttl_ms,
            config.refresh_token_ttl_ms,
        )?;
        let passwords = PasswordHasher::new(config.bcrypt_cost, config.password_hash_workers)?;
        let limits = AdmissionLimits::new(config.login_rate_limit, config.auth_rate_limit);
        let metrics = Arc::new(AdmissionMetrics::default());
        let denylist = TimedDenylist::new(denylist, config.io_timeout).on_cancelled_revocation({
            let metrics = Arc::clone(&metrics);
            Arc::new(move || {
                metrics.record_revocation_unavailable();
            })
        });

        Ok(Self {
            tokens: Arc::new(TokenCodec::new(keys)),
            passwords,
            denylist: Arc::new(denylist),
            directory,
            owners,
            policy: Arc::new(PolicyTable::marketplace()?),
            limits: Arc::new(limits),
            metrics,
            config: Arc::new(config),
        })
    }

    /// Run a user directory call under the I/O timeout.
    ///
    /// Timeouts and store failures are counted; a duplicate email is not a
    /// failure.
    pub async fn directory_call<T>(
        &self,
        call: impl Future<Output = Result<T, DirectoryError>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.config.io_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(DirectoryError::EmailTaken)) => Err(AppError::EmailTaken),
            Ok(Err(e)) => {
                self.metrics.record_directory_failure();
                warn!(error = %e, "user directory call failed");
                Err(e.into())
            }
            Err(_) => {
                self.metrics.record_directory_failure();
                warn!(timeout = ?self.config.io_timeout, "user directory call timed out");
                Err(AppError::Unavailable("user directory timed out".into()))
            }
        }
    }
}

/// Run embedded database migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    artmarket_core::migrate::migrate(pool).await
}

/// Builds the router serving the auth, user and admin routes.
pub fn router(state: AppState) -> Router {
    router_with(state, Router::new())
}

/// Builds the router with `collaborators` mounted behind the admission chain.
pub fn router_with(state: AppState, collaborators: Router<AppState>) -> Router {
    let cors = cors_layer(&state.config);

    let api = Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/refresh", post(auth::refresh_handler))
        .route("/api/auth/logout", post(auth::logout_handler))
        .route("/api/auth/verify", get(auth::verify_handler))
        .route(
            "/api/users/profile",
            get(users::profile_handler).put(users::update_profile_handler),
        )
        .route("/api/users/password", put(users::change_password_handler))
        .route("/api/admin/users", get(admin::list_users_handler))
        .route("/api/admin/users/{id}/status", put(admin::set_status_handler))
        .route("/api/admin/users/{id}/role", put(admin::set_role_handler))
        .route("/api/admin/access-metrics", get(admin::access_metrics_handler));

    // Last layer added runs first.
    Router::new()
        .merge(api)
        .merge(collaborators)
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::policy::authorize,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::admit,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::errors::error_envelope))
        .with_state(state)
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CACHE_CONTROL,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600))
}
