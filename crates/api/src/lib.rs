//! HTTP surface for the dispatch subsystem. Composed from `warp` filters the
//! same way the teacher composes its JSON-RPC routes: a shared state filter
//! threaded into every handler, one `.or()` chain per resource.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use warp::Filter;

pub use state::AppState;

pub fn build_routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
    let health = warp::get()
        .and(warp::path("health"))
        .and(warp::path::end())
        .map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })));

    let api = health
        .or(routes::bookings::routes(state.clone()))
        .or(routes::providers::routes(state.clone()))
        .or(routes::admin::routes(state));

    api.recover(error::handle_rejection)
}
