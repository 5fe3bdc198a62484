pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::converter::TextExtractor;
use crate::services::staging::StagingStore;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::ocr::recognize,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            services::outcome::OutcomeRecord,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "ocr", description = "Text recognition endpoints"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub staging: StagingStore,
    pub extractor: Arc<dyn TextExtractor>,
}

pub fn create_app(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/api/v1/ocr", post(api::handlers::ocr::recognize))
        .fallback_service(ServeDir::new(static_dir))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::disable())
        .with_state(state)
}
