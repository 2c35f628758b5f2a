//! API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//! Layers (outermost first): CORS, request logging.

use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/catalog",
            get(endpoints::catalog::list).post(endpoints::catalog::create),
        )
        .route(
            "/catalog/:id",
            get(endpoints::catalog::detail)
                .put(endpoints::catalog::update)
                .delete(endpoints::catalog::deactivate),
        )
        .route("/materials", get(endpoints::catalog::materials))
        .route(
            "/lab-exams",
            get(endpoints::lab_exams::list).post(endpoints::lab_exams::create),
        )
        .route("/quotes", post(endpoints::quotes::compute))
        .route(
            "/procedures",
            get(endpoints::procedures::list).post(endpoints::procedures::create),
        )
        .route(
            "/procedures/:id",
            get(endpoints::procedures::detail)
                .put(endpoints::procedures::update)
                .delete(endpoints::procedures::delete),
        )
        .route(
            "/patients",
            get(endpoints::patients::list).post(endpoints::patients::create),
        )
        .route("/patients/search", get(endpoints::patients::search))
        .route("/patients/:id", get(endpoints::patients::detail))
        .route("/reports/summary", get(endpoints::reports::summary))
        .route("/reports/csv", get(endpoints::reports::csv))
        .with_state(ctx)
        .layer(axum::middleware::from_fn(middleware::audit::log_access));

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new().nest("/api", api).layer(cors)
}
