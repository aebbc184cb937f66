//! Request handling: request ids and conversion of COPY requests.
//!
//! # Responsibilities
//! - Generate a request ID (UUID v4) when the client sent none
//! - Echo the request ID on the response
//! - Turn an inbound COPY into a `CopyRequest`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Header values that are not valid UTF-8 are dropped, not forwarded
//! - The resource path is percent-decoded before it reaches storage

use axum::http::{HeaderMap, Request};
use percent_encoding::percent_decode_str;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

use crate::storage::Identity;
use crate::tpc::CopyRequest;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer assigning `x-request-id` to requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer copying the request's `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Request id assigned by the set layer, from the raw header, or freshly minted.
pub fn request_id<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .or_else(|| {
            request
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
        })
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Build the orchestrator's view of a COPY request.
pub fn copy_request(path: &str, headers: &HeaderMap, request_id: String) -> CopyRequest {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    CopyRequest {
        resource: percent_decode_str(path).decode_utf8_lossy().into_owned(),
        headers,
        identity: Identity::anonymous(),
        request_id,
    }
}
