//! Content types for static files, chosen by file extension.

use std::path::Path;

const DEFAULT_TYPE: &str = "application/octet-stream";

/// Returns the MIME type for `path`, falling back to
/// `application/octet-stream` for unknown or missing extensions.
///
/// ```
/// # use picohttpd::http::mime::content_type_for;
/// assert_eq!(content_type_for("index.html"), "text/html");
/// assert_eq!(content_type_for("logo.SVG"), "image/svg+xml");
/// assert_eq!(content_type_for("README"), "application/octet-stream");
/// ```
pub fn content_type_for(path: impl AsRef<Path>) -> &'static str {
    let Some(ext) = path.as_ref().extension().and_then(|e| e.to_str()) else {
        return DEFAULT_TYPE;
    };

    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "txt" => "text/plain",
        "xml" | "xhtml" => "text/xml",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "zip" => "application/zip",
        _ => DEFAULT_TYPE,
    }
}
