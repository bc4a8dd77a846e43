use std::sync::Arc;

use dispatch_core::{ArbitrationEngine, Dispatcher, StateMachine};
use dispatch_geocode::GeocodingAdapter;
use dispatch_storage::Store;

/// Shared handler state, threaded through every route via [`with_state`].
/// Mirrors the teacher's `Arc<RwLock<B>>` backend handle, except the store
/// is already `Send + Sync` on its own so no outer lock is needed.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub dispatcher: Arc<Dispatcher>,
    pub arbitration: Arc<ArbitrationEngine>,
    pub state_machine: Arc<StateMachine>,
    pub geocoder: Arc<dyn GeocodingAdapter>,
}

pub fn with_state(
    state: Arc<AppState>,
) -> impl warp::Filter<Extract = (Arc<AppState>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}
