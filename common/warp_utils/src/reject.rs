use eth2::types::ErrorMessage;
use std::convert::Infallible;
use warp::{http::StatusCode, reject::Reject};

#[derive(Debug)]
pub struct CustomNotFound(pub String);

impl Reject for CustomNotFound {}

pub fn custom_not_found(msg: String) -> warp::reject::Rejection {
    warp::reject::custom(CustomNotFound(msg))
}

#[derive(Debug)]
pub struct CustomBadRequest(pub String);

impl Reject for CustomBadRequest {}

pub fn custom_bad_request(msg: String) -> warp::reject::Rejection {
    warp::reject::custom(CustomBadRequest(msg))
}

#[derive(Debug)]
pub struct CustomServerError(pub String);

impl Reject for CustomServerError {}

pub fn custom_server_error(msg: String) -> warp::reject::Rejection {
    warp::reject::custom(CustomServerError(msg))
}

#[derive(Debug)]
pub struct InvalidAuthorization(pub String);

impl Reject for InvalidAuthorization {}

pub fn invalid_auth(msg: String) -> warp::reject::Rejection {
    warp::reject::custom(InvalidAuthorization(msg))
}

/// Map a rejection into a `(status, message)` pair.
fn status_and_message(err: &warp::Rejection) -> (StatusCode, String) {
    if err.is_not_found() {
        (StatusCode::NOT_FOUND, "NOT_FOUND".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            format!("BAD_REQUEST: body deserialize error: {}", e),
        )
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (
            StatusCode::BAD_REQUEST,
            format!("BAD_REQUEST: invalid query: {}", e),
        )
    } else if let Some(e) = err.find::<CustomNotFound>() {
        (StatusCode::NOT_FOUND, format!("NOT_FOUND: {}", e.0))
    } else if let Some(e) = err.find::<CustomBadRequest>() {
        (StatusCode::BAD_REQUEST, format!("BAD_REQUEST: {}", e.0))
    } else if let Some(e) = err.find::<CustomServerError>() {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("INTERNAL_SERVER_ERROR: {}", e.0),
        )
    } else if let Some(e) = err.find::<InvalidAuthorization>() {
        (
            StatusCode::FORBIDDEN,
            format!("FORBIDDEN: Invalid auth token: {}", e.0),
        )
    } else if let Some(e) = err.find::<warp::reject::MissingHeader>() {
        if e.name().eq("Authorization") {
            (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED: missing Authorization header".to_string(),
            )
        } else {
            (
                StatusCode::BAD_REQUEST,
                format!("BAD_REQUEST: missing {} header", e.name()),
            )
        }
    } else if let Some(e) = err.find::<warp::reject::InvalidHeader>() {
        (
            StatusCode::BAD_REQUEST,
            format!("BAD_REQUEST: invalid {} header", e.name()),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "METHOD_NOT_ALLOWED".to_string(),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "UNHANDLED_REJECTION".to_string(),
        )
    }
}

/// This function receives a `Rejection` and tries to return a custom
/// value, otherwise simply passes the rejection along.
pub async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message) = status_and_message(&err);

    let json = warp::reply::json(&ErrorMessage {
        code: code.as_u16(),
        message,
        stacktraces: vec![],
    });

    Ok(warp::reply::with_status(json, code))
}
