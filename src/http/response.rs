//! Response construction for the COPY surface.
//!
//! # Design Decisions
//! - Bodies are plain text reasons, never JSON
//! - A status the framework cannot represent degrades to 500

use axum::body::Body;
use axum::http::header::{ALLOW, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::tpc::LocalResponse;

/// Verbs advertised on OPTIONS.
pub const ALLOWED_METHODS: &str = "HEAD,GET,PUT,PROPFIND,DELETE,OPTIONS,COPY";

impl IntoResponse for LocalResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        if let Some(location) = self.location {
            match HeaderValue::from_str(&location) {
                Ok(value) => {
                    response.headers_mut().insert(LOCATION, value);
                }
                Err(_) => {
                    tracing::error!(%location, "Redirect target is not a valid header value");
                    return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error: invalid redirect").into_response();
                }
            }
        }
        response
    }
}

/// `200` advertising WebDAV class 1 and the supported verbs.
pub fn options_response() -> Response {
    let mut response = Response::new(Body::empty());
    let headers = response.headers_mut();
    headers.append("dav", HeaderValue::from_static("1"));
    headers.append("dav", HeaderValue::from_static("<http://apache.org/dav/propset/fs/1>"));
    headers.insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    response
}

pub fn method_not_allowed() -> Response {
    let mut response = (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static("OPTIONS,COPY"));
    response
}
