pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::middleware::from_fn;
use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use secrecy::ExposeSecret;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

use config::Config;
use services::{Database, EventHub};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub events: EventHub,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;

        db.run_migrations().await?;

        let state = AppState {
            db,
            config: config.clone(),
            events: EventHub::new(256),
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics_endpoint))
            // Products
            .route("/products", post(handlers::products::create_product))
            .route("/products", get(handlers::products::list_products))
            .route("/products/:id", get(handlers::products::get_product))
            .route("/products/:id", put(handlers::products::update_product))
            .route("/products/:id", delete(handlers::products::delete_product))
            // Customers
            .route("/customers", post(handlers::customers::create_customer))
            .route("/customers", get(handlers::customers::list_customers))
            .route("/customers/:id", get(handlers::customers::get_customer))
            .route("/customers/:id", put(handlers::customers::update_customer))
            .route(
                "/customers/:id",
                delete(handlers::customers::delete_customer),
            )
            // Invoices
            .route("/invoices", post(handlers::invoices::create_invoice))
            .route("/invoices", get(handlers::invoices::list_invoices))
            .route(
                "/invoices/overdue",
                get(handlers::invoices::list_overdue_invoices),
            )
            .route("/invoices/:id", get(handlers::invoices::get_invoice))
            .route("/invoices/:id", delete(handlers::invoices::delete_invoice))
            .route(
                "/invoices/:id/status",
                patch(handlers::invoices::set_payment_status),
            )
            // Payments
            .route("/payments", post(handlers::payments::record_payment))
            .route("/payments", get(handlers::payments::list_payments))
            .route("/payments/:id", delete(handlers::payments::delete_payment))
            // Settings
            .route(
                "/settings/business",
                get(handlers::settings::get_business_settings),
            )
            .route(
                "/settings/business",
                put(handlers::settings::upsert_business_settings),
            )
            .route("/settings/profile", get(handlers::settings::get_profile))
            .route("/settings/profile", put(handlers::settings::upsert_profile))
            // Analytics
            .route("/analytics/summary", get(handlers::analytics::summary))
            .route(
                "/analytics/revenue-monthly",
                get(handlers::analytics::revenue_monthly),
            )
            .route(
                "/analytics/top-products",
                get(handlers::analytics::top_products),
            )
            .route(
                "/analytics/top-customers",
                get(handlers::analytics::top_customers),
            )
            // Change events
            .route("/events", get(handlers::events::subscribe))
            .layer(from_fn(metrics_middleware))
            .layer(from_fn(request_id_middleware))
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
                        tenant_id = tracing::field::Empty,
                    )
                }),
            )
            .with_state(state);

        Ok(Self {
            port: config.server.port,
            router,
        })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        tracing::info!("Listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;

        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}
