pub mod dashboard;
pub mod generate_script;
pub mod patterns;

use axum::{routing::post, Router};

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/generate-script", post(generate_script::generate_script))
        .nest("/dashboard", dashboard::router())
        .nest("/patterns", patterns::router())
}
