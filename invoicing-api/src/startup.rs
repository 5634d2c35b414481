//! Application wiring: state, router, and server startup.

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use platform_core::error::AppError;
use platform_core::middleware::metrics::metrics_middleware;
use platform_core::middleware::rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware};
use platform_core::middleware::tracing::request_id_middleware;
use secrecy::ExposeSecret;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handlers;
use crate::middleware::auth_middleware;
use crate::services::database::Database;
use crate::services::gateway::GatewayClient;
use crate::services::jwt::JwtService;
use crate::services::mailer::Mailer;
use crate::services::push::PushService;
use crate::services::storage::{self, Storage};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub jwt: JwtService,
    pub gateway: GatewayClient,
    pub mailer: Mailer,
    pub push: PushService,
    pub storage: Arc<dyn Storage>,
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let jwt = JwtService::new(&config.auth);
        let gateway = GatewayClient::new(config.gateway.clone());
        let mailer = Mailer::new(config.smtp.clone())?;
        let push = PushService::new(config.push.clone());
        let storage = storage::from_config(&config.storage).await?;

        let state = AppState {
            config: Arc::new(config.clone()),
            db,
            jwt,
            gateway,
            mailer,
            push,
            storage,
        };

        let app = build_router(state.clone());

        let addr = SocketAddr::from((
            config
                .server
                .host
                .parse::<std::net::IpAddr>()
                .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid host: {}", e)))?,
            config.server.port,
        ));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Listening");

        let server =
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

pub fn build_router(state: AppState) -> Router {
    let login_limiter = create_ip_rate_limiter(
        state.config.auth.login_attempts_per_window,
        state.config.auth.login_window_seconds,
    );

    // Login and refresh share the credential-guessing limiter.
    let auth_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .layer(from_fn_with_state(login_limiter, ip_rate_limit_middleware))
        .route("/api/auth/register", post(handlers::auth::register));

    let webhook_routes =
        Router::new().route("/api/webhooks/gateway", post(handlers::webhooks::gateway_webhook));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/company",
            get(handlers::company::get_company).patch(handlers::company::update_company),
        )
        .route(
            "/api/clients",
            get(handlers::clients::list_clients).post(handlers::clients::create_client),
        )
        .route(
            "/api/clients/:id",
            get(handlers::clients::get_client)
                .patch(handlers::clients::update_client)
                .delete(handlers::clients::delete_client),
        )
        .route(
            "/api/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/api/products/:id",
            get(handlers::products::get_product)
                .patch(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        .route(
            "/api/invoices",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route(
            "/api/invoices/:id",
            get(handlers::invoices::get_invoice)
                .patch(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        )
        .route("/api/invoices/:id/issue", post(handlers::invoices::issue_invoice))
        .route("/api/invoices/:id/send", post(handlers::invoices::send_invoice))
        .route("/api/invoices/:id/void", post(handlers::invoices::void_invoice))
        .route("/api/invoices/:id/pdf", get(handlers::invoices::download_pdf))
        .route(
            "/api/invoices/:id/payments",
            get(handlers::invoices::list_payments).post(handlers::invoices::record_payment),
        )
        .route(
            "/api/uploads",
            get(handlers::uploads::list_uploads),
        )
        .route("/api/uploads/:id", get(handlers::uploads::get_upload))
        .route("/api/uploads/:id/import", post(handlers::uploads::upload))
        .route(
            "/api/devices",
            get(handlers::devices::list_devices).post(handlers::devices::register_device),
        )
        .route(
            "/api/dashboard/summary",
            get(handlers::dashboard::summary),
        )
        .route("/api/dashboard/revenue", get(handlers::dashboard::revenue))
        .route(
            "/api/dashboard/top-clients",
            get(handlers::dashboard::top_clients),
        )
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        .merge(auth_routes)
        .merge(webhook_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(
            state.config.upload.max_file_bytes + 64 * 1024,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
