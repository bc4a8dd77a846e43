use std::sync::Arc;

use dispatch_types::{BookingStatus, NewBooking};
use serde::Deserialize;
use uuid::Uuid;
use warp::Filter;

use crate::auth::with_user_id;
use crate::error::ApiError;
use crate::state::{with_state, AppState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    status: Option<String>,
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct RateBody {
    rating: f64,
    review: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    status: String,
}

pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let base = warp::path("bookings");

    let create = base
        .and(warp::path::end())
        .and(warp::post())
        .and(with_user_id())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(create_booking);

    let list = base
        .and(warp::path::end())
        .and(warp::get())
        .and(with_user_id())
        .and(warp::query::<ListQuery>())
        .and(with_state(state.clone()))
        .and_then(list_bookings);

    let get = base
        .and(warp::path::param())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_user_id())
        .and(with_state(state.clone()))
        .and_then(get_booking);

    let update_status = base
        .and(warp::path::param())
        .and(warp::path("status"))
        .and(warp::path::end())
        .and(warp::patch())
        .and(with_user_id())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(update_status);

    let cancel = base
        .and(warp::path::param())
        .and(warp::path("cancel"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_user_id())
        .and(with_state(state.clone()))
        .and_then(cancel_booking);

    let rate = base
        .and(warp::path::param())
        .and(warp::path("rate"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_user_id())
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(rate_booking);

    create.or(list).or(get).or(update_status).or(cancel).or(rate)
}

async fn create_booking(
    user_id: Uuid,
    mut body: NewBooking,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    body.user_id = user_id;

    // Geocoding is best-effort and never blocks booking creation (spec
    // section 6): a miss just leaves latitude/longitude null.
    if body.latitude.is_none() || body.longitude.is_none() {
        if let Some(coords) = state.geocoder.resolve(&body.location).await {
            body.latitude = Some(coords.latitude);
            body.longitude = Some(coords.longitude);
        }
    }

    let booking = state.store.create_booking(body).await.map_err(ApiError::from)?;

    let booking_id = booking.id;
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        if let Err(err) = dispatcher.dispatch(booking_id).await {
            tracing::warn!(%booking_id, error = %err, "initial dispatch failed");
        }
    });

    Ok(warp::reply::json(&booking))
}

async fn list_bookings(
    user_id: Uuid,
    query: ListQuery,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let status = query
        .status
        .map(|s| s.parse::<BookingStatus>())
        .transpose()
        .map_err(ApiError::BadRequest)?;
    let limit = query.limit.clamp(1, 100);
    let bookings = state
        .store
        .list_bookings_for_user(user_id, status, query.skip, limit)
        .await
        .map_err(ApiError::from)?;
    Ok(warp::reply::json(&bookings))
}

async fn get_booking(
    booking_id: Uuid,
    user_id: Uuid,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let booking = state.store.get_booking(booking_id).await.map_err(ApiError::from)?;
    if booking.user_id != user_id {
        return Err(warp::reject::custom(ApiError::NotFound("booking not found".into())));
    }
    Ok(warp::reply::json(&booking))
}

async fn update_status(
    booking_id: Uuid,
    user_id: Uuid,
    body: StatusBody,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let booking = state.store.get_booking(booking_id).await.map_err(ApiError::from)?;
    if booking.user_id != user_id {
        return Err(warp::reject::custom(ApiError::NotFound("booking not found".into())));
    }
    let to = body.status.parse::<BookingStatus>().map_err(ApiError::BadRequest)?;
    let updated = state.state_machine.transition(booking_id, to).await.map_err(ApiError::from)?;
    Ok(warp::reply::json(&updated))
}

async fn cancel_booking(
    booking_id: Uuid,
    user_id: Uuid,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let booking = state.store.get_booking(booking_id).await.map_err(ApiError::from)?;
    if booking.user_id != user_id {
        return Err(warp::reject::custom(ApiError::NotFound("booking not found".into())));
    }
    let cancelled = state.state_machine.cancel(booking_id).await.map_err(ApiError::from)?;
    Ok(warp::reply::json(&cancelled))
}

async fn rate_booking(
    booking_id: Uuid,
    user_id: Uuid,
    body: RateBody,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let booking = state.store.get_booking(booking_id).await.map_err(ApiError::from)?;
    if booking.user_id != user_id {
        return Err(warp::reject::custom(ApiError::NotFound("booking not found".into())));
    }
    state
        .state_machine
        .rate(booking_id, body.rating, body.review)
        .await
        .map_err(ApiError::from)?;
    Ok(warp::reply::json(&serde_json::json!({ "success": true })))
}
