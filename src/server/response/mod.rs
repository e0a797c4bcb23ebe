//! HTTP response building from bridge responses and executor errors.

use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http_body_util::Full;
use hyper::{Response, StatusCode};

use crate::executor::ExecutorError;
use crate::sapi;

use super::request::SERVER_SOFTWARE;

mod static_file;

pub use static_file::serve_static_file;

pub type HttpResponse = Response<Full<Bytes>>;

// Pre-allocated static bytes for common responses
pub static EMPTY_BODY: Bytes = Bytes::from_static(b"");
pub static BAD_REQUEST_BODY: Bytes = Bytes::from_static(b"Failed to read request body");

/// Status to send for a bridge status code; anything HTTP cannot carry becomes 500.
pub fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Convert a bridge response into an HTTP response.
///
/// Header lines that are not valid HTTP headers are dropped.
pub fn from_bridge_response(resp: sapi::Response) -> HttpResponse {
    let status = status_code(resp.status());
    let pairs = resp.header_pairs();
    let (_, _, body) = resp.into_parts();

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in pairs {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) else {
            tracing::debug!(header = %name, "dropping invalid response header");
            continue;
        };
        headers.append(name, value);
    }
    if !headers.contains_key(header::SERVER) {
        headers.insert(header::SERVER, HeaderValue::from_static(SERVER_SOFTWARE));
    }

    response
}

/// Plain-text error response.
pub fn error_response(status: StatusCode, message: &str) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(message.to_string())));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::SERVER, HeaderValue::from_static(SERVER_SOFTWARE));
    response
}

/// 503 for a full queue or shutdown, 504 for a timeout, 500 otherwise.
pub fn from_executor_error(err: &ExecutorError) -> HttpResponse {
    if err.is_queue_full() || err.is_shutdown() {
        let mut response = error_response(StatusCode::SERVICE_UNAVAILABLE, "503 Service Unavailable");
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        response
    } else if err.is_timeout() {
        error_response(StatusCode::GATEWAY_TIMEOUT, "504 Gateway Timeout")
    } else {
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
    }
}

pub fn bad_request() -> HttpResponse {
    let mut response = error_response(StatusCode::BAD_REQUEST, "");
    *response.body_mut() = Full::new(BAD_REQUEST_BODY.clone());
    response
}

/// Drop the body but keep the headers (HEAD requests).
pub fn without_body(response: HttpResponse) -> HttpResponse {
    let (parts, _) = response.into_parts();
    Response::from_parts(parts, Full::new(EMPTY_BODY.clone()))
}
