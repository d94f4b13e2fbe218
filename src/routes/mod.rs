//! Router assembly.

pub mod common;
pub mod entity;

pub use common::common_routes;
pub use entity::entity_routes;

use crate::state::AppState;
use axum::Router;

/// Full application router: common routes plus entity CRUD.
pub fn app_router(state: AppState) -> Router {
    common_routes().merge(entity_routes(state))
}
