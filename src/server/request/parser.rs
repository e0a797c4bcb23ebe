//! Header helpers for CGI variable mapping.

use http::HeaderMap;

/// `$_SERVER` key for an HTTP header: `X-Forwarded-For` -> `HTTP_X_FORWARDED_FOR`.
pub fn server_var_name(header: &str) -> String {
    let mut name = String::with_capacity(header.len() + 5);
    name.push_str("HTTP_");
    for c in header.chars() {
        name.push(if c == '-' { '_' } else { c.to_ascii_uppercase() });
    }
    name
}

/// All `Cookie` headers joined with `"; "`, as HTTP/2 may split them.
pub fn join_cookies(headers: &HeaderMap) -> Option<String> {
    let joined = headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join("; ");

    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Values of one header joined with `", "`, lossy for non-UTF-8 bytes.
pub fn joined_value(headers: &HeaderMap, name: &http::HeaderName, separator: &str) -> String {
    headers
        .get_all(name)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect::<Vec<_>>()
        .join(separator)
}
