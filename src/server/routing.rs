//! Static asset lookup.
//!
//! Requests for an existing file with a static extension are answered from
//! the document root. Everything else, including missing files and `.php`
//! paths, runs the entry point.

use std::path::{Component, Path, PathBuf};

/// Extensions served straight from disk.
pub const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "png", "jpg", "jpeg", "gif", "svg", "ico", "woff", "woff2", "ttf", "eot", "map",
    "webp", "avif", "mp4", "webm", "pdf", "txt", "xml", "json",
];

/// Check whether a URI path names a static asset by extension.
#[inline]
pub fn is_static_path(uri_path: &str) -> bool {
    Path::new(uri_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            STATIC_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}

/// Map a URI path to an existing static file under `document_root`.
///
/// The path is percent-decoded first. Parent, root and prefix components
/// are rejected rather than stripped, as are NUL bytes.
pub fn resolve_static_file(document_root: &Path, uri_path: &str) -> Option<PathBuf> {
    let decoded = percent_encoding::percent_decode_str(uri_path)
        .decode_utf8()
        .ok()?;
    if decoded.contains('\0') || !is_static_path(&decoded) {
        return None;
    }

    let mut path = document_root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    path.is_file().then_some(path)
}
