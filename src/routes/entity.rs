//! Entity CRUD routes. Uses parameterized paths so handlers resolve the
//! entity by its path segment against the registry; static segments
//! (`page`, `count`, `batch`) take priority over the id parameter.

use crate::handlers::entity::{
    count, create, create_batch, delete as delete_handler, exists, list, page, read, update,
};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:entity", get(list).post(create))
        .route("/:entity/batch", post(create_batch))
        .route("/:entity/page", get(page))
        .route("/:entity/count", get(count))
        .route(
            "/:entity/:id",
            get(read).patch(update).delete(delete_handler),
        )
        .route("/:entity/:id/exists", get(exists))
        .with_state(state)
}
