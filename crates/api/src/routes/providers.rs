use std::sync::Arc;

use dispatch_types::{NewProvider, ProviderUpdate};
use serde::Deserialize;
use uuid::Uuid;
use warp::Filter;

use crate::auth::{require_provider, with_user_id};
use crate::error::ApiError;
use crate::state::{with_state, AppState};

#[derive(Debug, Deserialize)]
pub struct LinkServiceBody {
    service_id: Uuid,
    custom_price: Option<f64>,
}

pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let base = warp::path("providers");

    let register = base
        .and(warp::path("register"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_user_id())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(register_provider);

    let list_offers = base
        .and(warp::path("offers"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_user_id())
        .and(with_state(state.clone()))
        .and_then(list_pending_offers);

    let accept = base
        .and(warp::path("offers"))
        .and(warp::path::param())
        .and(warp::path("accept"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_user_id())
        .and(with_state(state.clone()))
        .and_then(accept_offer);

    let decline = base
        .and(warp::path("offers"))
        .and(warp::path::param())
        .and(warp::path("decline"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_user_id())
        .and(with_state(state.clone()))
        .and_then(decline_offer);

    let get_profile = base
        .and(warp::path("profile"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_user_id())
        .and(with_state(state.clone()))
        .and_then(get_profile);

    let update_profile = base
        .and(warp::path("profile"))
        .and(warp::path::end())
        .and(warp::patch())
        .and(with_user_id())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(update_profile);

    let assigned_bookings = base
        .and(warp::path("bookings"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_user_id())
        .and(with_state(state.clone()))
        .and_then(assigned_bookings);

    let link_service = base
        .and(warp::path("services"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_user_id())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(link_service);

    let unlink_service = base
        .and(warp::path("services"))
        .and(warp::path::param())
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_user_id())
        .and(with_state(state))
        .and_then(unlink_service);

    register
        .or(list_offers)
        .or(accept)
        .or(decline)
        .or(get_profile)
        .or(update_profile)
        .or(assigned_bookings)
        .or(link_service)
        .or(unlink_service)
}

async fn register_provider(
    user_id: Uuid,
    mut body: NewProvider,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    body.user_id = user_id;
    let provider = state.store.create_provider(body).await.map_err(ApiError::from)?;
    Ok(warp::reply::json(&provider))
}

async fn list_pending_offers(
    user_id: Uuid,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let provider_id = require_provider(state.clone(), user_id).await?;
    let offers = state.arbitration.list_pending(provider_id).await.map_err(ApiError::from)?;
    Ok(warp::reply::json(&offers))
}

async fn accept_offer(
    offer_id: Uuid,
    user_id: Uuid,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let provider_id = require_provider(state.clone(), user_id).await?;
    let outcome = state.arbitration.accept(offer_id, provider_id).await.map_err(ApiError::from)?;
    match outcome {
        Ok(booking) => Ok(warp::reply::json(&serde_json::json!({ "success": true, "booking": booking }))),
        Err(reason) => Ok(warp::reply::json(&serde_json::json!({ "success": false, "error": reason.message() }))),
    }
}

async fn decline_offer(
    offer_id: Uuid,
    user_id: Uuid,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let provider_id = require_provider(state.clone(), user_id).await?;
    let outcome = state.arbitration.decline(offer_id, provider_id).await.map_err(ApiError::from)?;
    match outcome {
        Ok(()) => Ok(warp::reply::json(&serde_json::json!({ "success": true }))),
        Err(reason) => Ok(warp::reply::json(&serde_json::json!({ "success": false, "error": reason.message() }))),
    }
}

async fn get_profile(user_id: Uuid, state: Arc<AppState>) -> Result<impl warp::Reply, warp::Rejection> {
    let provider = state.store.provider_for_user(user_id).await.map_err(ApiError::from)?;
    Ok(warp::reply::json(&provider))
}

async fn update_profile(
    user_id: Uuid,
    body: ProviderUpdate,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let provider_id = require_provider(state.clone(), user_id).await?;
    let updated = state.store.update_provider(provider_id, body).await.map_err(ApiError::from)?;
    Ok(warp::reply::json(&updated))
}

async fn assigned_bookings(
    user_id: Uuid,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let provider_id = require_provider(state.clone(), user_id).await?;
    let bookings = state.store.list_bookings_for_provider(provider_id).await.map_err(ApiError::from)?;
    Ok(warp::reply::json(&bookings))
}

async fn link_service(
    user_id: Uuid,
    body: LinkServiceBody,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let provider_id = require_provider(state.clone(), user_id).await?;
    state
        .store
        .link_provider_service(provider_id, body.service_id, body.custom_price)
        .await
        .map_err(ApiError::from)?;
    Ok(warp::reply::json(&serde_json::json!({ "success": true })))
}

async fn unlink_service(
    service_id: Uuid,
    user_id: Uuid,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let provider_id = require_provider(state.clone(), user_id).await?;
    state
        .store
        .unlink_provider_service(provider_id, service_id)
        .await
        .map_err(ApiError::from)?;
    Ok(warp::reply::json(&serde_json::json!({ "success": true })))
}
