//! API router.
//!
//! Returns a composable `Router` with all endpoints nested under `/api`.

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::error::{ErrorBody, ErrorDetail};
use crate::api::types::ApiContext;

/// Build the API router.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/patients/register", post(endpoints::patients::register))
        .route("/patients/login", post(endpoints::patients::login))
        .route(
            "/patients/:id",
            get(endpoints::patients::profile).put(endpoints::patients::update),
        )
        .route(
            "/patients/:id/alert",
            post(endpoints::patients::set_alert).delete(endpoints::patients::clear_alert),
        )
        .route(
            "/patients/:id/medications",
            post(endpoints::medications::add).get(endpoints::medications::list),
        )
        .route(
            "/medications/:id",
            axum::routing::put(endpoints::medications::update)
                .delete(endpoints::medications::remove),
        )
        .route("/doses", post(endpoints::doses::record))
        .route("/patients/:id/doses", get(endpoints::doses::list))
        .route("/patients/:id/adherence", get(endpoints::adherence::report))
        .route("/assistant/ask", post(endpoints::assistant::ask))
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .fallback(not_found)
        .layer(CorsLayer::permissive())
}

async fn not_found() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: ErrorDetail {
                code: "NOT_FOUND",
                message: "No such route".to_string(),
            },
        }),
    )
}
