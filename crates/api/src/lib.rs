//! HTTP API server with observability for the library circulation system.
//!
//! Provides REST endpoints for the catalog, checkouts, returns,
//! reservations, and notifications, with structured logging (tracing) and
//! Prometheus metrics. Identity is supplied by the upstream proxy via
//! headers; see [`extractor::Principal`].

pub mod config;
pub mod error;
pub mod extractor;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{
    AccountService, CatalogService, LendingService, NotificationService, ReservationService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::LibraryStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: LibraryStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/accounts", post(routes::accounts::register::<S>))
        .route("/accounts/{id}", get(routes::accounts::get::<S>))
        .route("/accounts/{id}/status", put(routes::accounts::set_status::<S>))
        .route(
            "/accounts/{id}/lendings",
            get(routes::accounts::lendings::<S>),
        )
        .route(
            "/accounts/{id}/recalculate",
            post(routes::accounts::recalculate::<S>),
        )
        .route("/books", post(routes::books::create::<S>))
        .route("/books", get(routes::books::list::<S>))
        .route("/books/{isbn}", get(routes::books::get::<S>))
        .route("/book-items", post(routes::items::create::<S>))
        .route("/book-items", get(routes::items::list::<S>))
        .route("/book-items/{barcode}", get(routes::items::get::<S>))
        .route(
            "/book-items/{barcode}/checkout",
            post(routes::items::checkout::<S>),
        )
        .route(
            "/book-items/{barcode}/return",
            post(routes::items::return_item::<S>),
        )
        .route(
            "/book-items/{barcode}/reserve",
            post(routes::items::reserve::<S>),
        )
        .route(
            "/book-items/{barcode}/release",
            post(routes::items::release::<S>),
        )
        .route(
            "/book-items/{barcode}/lost",
            post(routes::items::mark_lost::<S>),
        )
        .route("/lendings", get(routes::lendings::list::<S>))
        .route("/lendings/{id}", get(routes::lendings::get::<S>))
        .route("/lendings/{id}/fine", get(routes::lendings::fine::<S>))
        .route("/reservations", get(routes::reservations::list::<S>))
        .route("/reservations/{id}", get(routes::reservations::get::<S>))
        .route(
            "/reservations/{id}/cancel",
            post(routes::reservations::cancel::<S>),
        )
        .route("/notifications", get(routes::notifications::list::<S>))
        .route(
            "/notifications/{id}/read",
            post(routes::notifications::mark_read::<S>),
        )
        .route("/config", get(routes::library_config::get::<S>))
        .route("/config", put(routes::library_config::update::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state over the given store.
pub fn create_default_state<S: LibraryStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        accounts: AccountService::new(store.clone()),
        catalog: CatalogService::new(store.clone()),
        lendings: LendingService::new(store.clone()),
        reservations: ReservationService::new(store.clone()),
        notifications: NotificationService::new(store.clone()),
        store,
    })
}
