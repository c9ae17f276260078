//! Application startup and lifecycle management.

use crate::config::CarteraConfig;
use crate::handlers;
use crate::middleware::{auth_middleware, metrics_middleware};
use crate::models::CreateUser;
use crate::services::metrics::init_metrics;
use crate::services::{
    mailer_from_config, ConfirmationTokens, Database, JwtService, LocalStorage, Mailer,
    ReceiptService, Storage,
};
use crate::utils::hash_password;
use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use chrono::{NaiveDate, Utc};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CarteraConfig>,
    pub db: Arc<Database>,
    pub storage: Arc<dyn Storage>,
    pub receipts: ReceiptService,
    pub tokens: ConfirmationTokens,
    pub jwt: JwtService,
}

impl AppState {
    /// Current date in the business' time zone.
    pub fn today(&self) -> NaiveDate {
        Utc::now()
            .with_timezone(&self.config.site.utc_offset)
            .date_naive()
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: CarteraConfig) -> Result<Self, AppError> {
        let mailer = mailer_from_config(&config.smtp)?;
        Self::build_with_mailer(config, mailer, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: CarteraConfig) -> Result<Self, AppError> {
        let mailer = mailer_from_config(&config.smtp)?;
        Self::build_with_mailer(config, mailer, false).await
    }

    /// Build the application with an explicit mail transport.
    pub async fn build_with_mailer(
        config: CarteraConfig,
        mailer: Arc<dyn Mailer>,
        run_migrations: bool,
    ) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        ensure_bootstrap_admin(&db, &config).await?;

        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(&config.media.root).await?);
        let tokens = ConfirmationTokens::new(
            config.confirmation.signing_secret.expose_secret(),
            config.confirmation.max_age_days,
        );
        let receipts = ReceiptService::new(
            mailer,
            storage.clone(),
            tokens.clone(),
            config.site.base_url(),
        );
        let jwt = JwtService::new(&config.auth);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(http_port = port, "Cartera service listener bound");

        let state = AppState {
            config: Arc::new(config),
            db: Arc::new(db),
            storage,
            receipts,
            tokens,
            jwt,
        };

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "cartera-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}

/// Create the configured staff user when it does not exist yet.
async fn ensure_bootstrap_admin(db: &Database, config: &CarteraConfig) -> Result<(), AppError> {
    let Some(admin) = &config.bootstrap else {
        return Ok(());
    };

    if db.get_user_by_username(&admin.username).await?.is_some() {
        return Ok(());
    }

    let password_hash = hash_password(&admin.password).map_err(AppError::InternalError)?;
    let user = db
        .create_user(&CreateUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash,
            is_staff: true,
        })
        .await?;

    tracing::info!(user_id = user.user_id, username = %user.username, "Bootstrap admin created");
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.media.max_upload_bytes + 1024 * 1024;

    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics_handler))
        .route("/auth/login", post(handlers::auth::login))
        .route(
            "/payments/confirm/:token",
            get(handlers::confirmations::confirm_payment),
        )
        .route(
            "/payments/batch/confirm/:token",
            get(handlers::confirmations::confirm_batch),
        );

    let protected = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route(
            "/users",
            get(handlers::admin::list_users).post(handlers::admin::create_user),
        )
        .route(
            "/users/:id/point-of-sale",
            put(handlers::admin::assign_point_of_sale)
                .delete(handlers::admin::unassign_point_of_sale),
        )
        .route(
            "/points-of-sale",
            get(handlers::admin::list_points_of_sale).post(handlers::admin::create_point_of_sale),
        )
        .route(
            "/suppliers",
            get(handlers::suppliers::list_suppliers).post(handlers::suppliers::create_supplier),
        )
        .route(
            "/suppliers/:id",
            get(handlers::suppliers::get_supplier)
                .put(handlers::suppliers::update_supplier)
                .delete(handlers::suppliers::delete_supplier),
        )
        .route(
            "/invoices",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route(
            "/invoices/pending",
            get(handlers::invoices::list_pending_invoices),
        )
        .route(
            "/invoices/:id",
            get(handlers::invoices::get_invoice)
                .put(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        )
        .route(
            "/invoices/:id/payments",
            post(handlers::payments::create_payment),
        )
        .route("/payments", get(handlers::payments::list_payments))
        .route(
            "/payments/payer-options",
            get(handlers::payments::payer_options),
        )
        .route(
            "/payments/batch",
            get(handlers::batches::preview_batch).post(handlers::batches::create_batch),
        )
        .route(
            "/payments/:id/voucher",
            get(handlers::payments::download_voucher).post(handlers::payments::attach_voucher),
        )
        .route(
            "/payments/:id/send-receipt",
            post(handlers::payments::send_receipt),
        )
        .route("/dashboard", get(handlers::dashboard::dashboard))
        .route("/analytics", get(handlers::dashboard::analytics))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    user_id = tracing::field::Empty,
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .with_state(state)
}
