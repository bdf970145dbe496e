use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();
    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/analyze-company-news", get(handlers::analyze_company_news))
        .route("/ping", get(handlers::ping))
        .nest_service("/static", static_files)
        .layer(cors)
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use super::{create_app, AppState};
    pub use np_core::{Article, Error, Result};
}
