use serde_json::json;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl warp::reject::Reject for ApiError {}

impl From<dispatch_storage::StorageError> for ApiError {
    fn from(err: dispatch_storage::StorageError) -> Self {
        use dispatch_storage::StorageError::*;
        match err {
            BookingNotFound(_) | ProviderNotFound(_) | OfferNotFound(_) | ServiceNotFound(_)
            | NoProviderForUser(_) => ApiError::NotFound(err.to_string()),
            Database(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<dispatch_core::DispatchError> for ApiError {
    fn from(err: dispatch_core::DispatchError) -> Self {
        use dispatch_core::DispatchError::*;
        match err {
            Storage(e) => e.into(),
            InvalidTransition { .. } | BookingNotCompleted(_) | InvalidRating(_) => {
                ApiError::BadRequest(err.to_string())
            }
        }
    }
}

/// Converts a custom rejection into a uniform `{success, error}`-shaped
/// JSON body, matching spec section 7's taxonomy: validation/auth failures
/// become the HTTP 401/403/404 surface, state conflicts become structured
/// bodies on 409.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(api_err) = err.find::<ApiError>() {
        match api_err {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        }
    } else if err.find::<warp::reject::MissingHeader>().is_some() {
        (StatusCode::UNAUTHORIZED, "missing authorization header".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "unhandled rejection".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "success": false, "error": message })),
        status,
    ))
}
