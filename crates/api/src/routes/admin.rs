use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;
use warp::Filter;

use crate::auth::with_user_id;
use crate::error::ApiError;
use crate::state::{with_state, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateCategoryBody {
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceBody {
    category_id: Uuid,
    name: String,
    description: Option<String>,
    base_price: Option<f64>,
}

/// Admin routes trust the caller's bearer token to already carry admin
/// authority; enforcing that claim is the identity collaborator's job
/// (spec section 1, out of scope here).
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let base = warp::path("admin");

    let counters = base
        .and(warp::path("counters"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_user_id())
        .and(with_state(state.clone()))
        .and_then(admin_counters);

    let create_category = base
        .and(warp::path("service-categories"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_user_id())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(create_category);

    let create_service = base
        .and(warp::path("services"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_user_id())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(create_service);

    let list_services = base
        .and(warp::path("services"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_user_id())
        .and(with_state(state.clone()))
        .and_then(list_services);

    let get_booking = base
        .and(warp::path("bookings"))
        .and(warp::path::param())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_user_id())
        .and(with_state(state.clone()))
        .and_then(get_booking);

    let get_provider = base
        .and(warp::path("providers"))
        .and(warp::path::param())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_user_id())
        .and(with_state(state))
        .and_then(get_provider);

    counters
        .or(create_category)
        .or(create_service)
        .or(list_services)
        .or(get_booking)
        .or(get_provider)
}

async fn admin_counters(_user_id: Uuid, state: Arc<AppState>) -> Result<impl warp::Reply, warp::Rejection> {
    let counters = state.store.admin_counters().await.map_err(ApiError::from)?;
    Ok(warp::reply::json(&counters))
}

async fn create_category(
    _user_id: Uuid,
    body: CreateCategoryBody,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let category = state
        .store
        .create_service_category(body.name, body.description)
        .await
        .map_err(ApiError::from)?;
    Ok(warp::reply::json(&category))
}

async fn create_service(
    _user_id: Uuid,
    body: CreateServiceBody,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let service = state
        .store
        .create_service(body.category_id, body.name, body.description, body.base_price)
        .await
        .map_err(ApiError::from)?;
    Ok(warp::reply::json(&service))
}

async fn list_services(_user_id: Uuid, state: Arc<AppState>) -> Result<impl warp::Reply, warp::Rejection> {
    let services = state.store.list_services().await.map_err(ApiError::from)?;
    Ok(warp::reply::json(&services))
}

async fn get_booking(
    booking_id: Uuid,
    _user_id: Uuid,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let booking = state.store.get_booking(booking_id).await.map_err(ApiError::from)?;
    Ok(warp::reply::json(&booking))
}

async fn get_provider(
    provider_id: Uuid,
    _user_id: Uuid,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let provider = state.store.get_provider(provider_id).await.map_err(ApiError::from)?;
    Ok(warp::reply::json(&provider))
}
