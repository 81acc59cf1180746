pub mod dto;
pub mod handlers;
#[cfg(test)]
pub(crate) mod memory;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod validation;

use axum::{middleware, Router};

use crate::{auth::extractors::require_auth, state::AppState};

pub fn router(state: AppState) -> Router<AppState> {
    let protected = handlers::protected_routes()
        .route_layer(middleware::from_fn_with_state(state, require_auth));
    Router::new()
        .merge(handlers::public_routes())
        .merge(protected)
}
