//! API router. All routes live under `/api/` behind bearer auth.
//!
//! Middleware uses `Extension<ApiContext>` (outermost layer); handlers use
//! `State<ApiContext>` via `with_state`.

use axum::routing::{get, post};
use axum::Router;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

pub fn api_router(ctx: ApiContext) -> Router {
    // Layers apply bottom-up: Extension (outermost) → auth → access log →
    // handler.
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/documents",
            post(endpoints::documents::create).get(endpoints::documents::list),
        )
        .route(
            "/documents/:id",
            get(endpoints::documents::detail).delete(endpoints::documents::remove),
        )
        .route(
            "/documents/:id/executions",
            get(endpoints::workflows::executions_for_document),
        )
        .route(
            "/rules",
            post(endpoints::rules::create).get(endpoints::rules::list),
        )
        .route(
            "/rules/:id",
            get(endpoints::rules::detail)
                .put(endpoints::rules::update)
                .delete(endpoints::rules::remove),
        )
        .route("/triggers/run", post(endpoints::triggers::run))
        .route("/learning/observe", post(endpoints::learning::observe_document))
        .route("/learning", get(endpoints::learning::list))
        .route("/pipeline/run", post(endpoints::pipeline::run))
        .route(
            "/workflows",
            post(endpoints::workflows::create).get(endpoints::workflows::list),
        )
        .route(
            "/workflows/:id",
            get(endpoints::workflows::detail)
                .put(endpoints::workflows::update)
                .delete(endpoints::workflows::remove),
        )
        .route("/workflows/execute", post(endpoints::workflows::execute))
        .route("/executions/:id", get(endpoints::workflows::execution_detail))
        .route("/executions/:id/cancel", post(endpoints::workflows::cancel))
        .route("/audit", get(endpoints::audit::list))
        .route("/audit/prune", post(endpoints::audit::prune))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::access::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx));

    Router::new().nest("/api", routes)
}
