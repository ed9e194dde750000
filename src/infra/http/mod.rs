//! Standalone server: the PDF endpoint plus the built site.

mod middleware;
mod pdf;
mod state;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri},
    middleware::from_fn,
    response::Response,
    routing::get,
};

pub use state::HttpState;

use crate::infra::site;

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route(
            "/api/pdf/{*route}",
            get(pdf::render_pdf).options(pdf::preflight),
        )
        .route("/_health", get(health))
        .fallback(serve_site)
        .with_state(state)
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn serve_site(State(state): State<HttpState>, uri: Uri) -> Response {
    match state.site.as_ref() {
        Some(site) => site.serve(&uri).await,
        None => site::not_found("infra::http::serve_site", "no site directory configured"),
    }
}
