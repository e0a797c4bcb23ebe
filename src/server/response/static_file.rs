//! Static file serving.

use std::path::Path;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http_body_util::Full;
use hyper::{Response, StatusCode};

use super::{error_response, HttpResponse};
use crate::server::request::SERVER_SOFTWARE;

/// Serve a static file from the filesystem.
///
/// `cache_control` is sent as is when set. A file that cannot be read
/// gives a 404.
pub async fn serve_static_file(file_path: &Path, cache_control: Option<&HeaderValue>) -> HttpResponse {
    match tokio::fs::read(file_path).await {
        Ok(contents) => {
            let mime = mime_guess::from_path(file_path).first_or_octet_stream();
            let content_type = HeaderValue::from_str(mime.as_ref())
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

            let mut response = Response::new(Full::new(Bytes::from(contents)));
            *response.status_mut() = StatusCode::OK;
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, content_type);
            headers.insert(header::SERVER, HeaderValue::from_static(SERVER_SOFTWARE));
            if let Some(value) = cache_control {
                headers.insert(header::CACHE_CONTROL, value.clone());
            }
            response
        }
        Err(e) => {
            tracing::error!("Failed to read file {:?}: {}", file_path, e);
            error_response(StatusCode::NOT_FOUND, "404 Not Found")
        }
    }
}
