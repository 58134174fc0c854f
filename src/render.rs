//! Emitting an image for HTTP transport.
//!
//! [`render`] consumes a handle and returns the encoded bytes together with
//! the response headers a caller should send ahead of them. Writing the
//! response and ending the request is left to the caller.
//!
//! | Header | Value |
//! |---|---|
//! | `Content-Type` | `image/<format>` |
//! | `Content-Disposition` | `inline`, plus `; filename=<name>` when named |
//! | `Last-Modified` | HTTP date of `last_modified` (default: now) |
//! | `Cache-Control` | `maxage=<expires>` |
//! | `Expires` | `last_modified + expires`, only when `expires > 0` |
//! | `Pragma` | `public` |

use crate::imaging::{ImageBackend, ImageError, ImageFormat, ImageHandle, Quality};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

/// Ordered `(name, value)` header pairs.
pub type Headers = Vec<(&'static str, String)>;

/// How an image is presented to the client.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Suggested filename for `Content-Disposition`.
    pub name: Option<String>,
    pub quality: Quality,
    /// Cache lifetime in seconds. Zero omits `Expires`.
    pub expires: u32,
    /// Modification time to advertise. `None` means the time of rendering.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Encoded image plus the headers that describe it.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub headers: Headers,
}

impl Rendered {
    /// Look up a header value by name, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Format a timestamp as an HTTP date (`Tue, 05 Mar 2024 08:04:09 GMT`).
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Build the header set for an image of `format`.
///
/// `now` stands in for a missing `last_modified`.
pub fn build_headers(format: ImageFormat, options: &RenderOptions, now: DateTime<Utc>) -> Headers {
    let modified = options.last_modified.unwrap_or(now);

    let disposition = match options.name.as_deref() {
        Some(name) if !name.is_empty() => format!("inline; filename={name}"),
        _ => "inline".to_string(),
    };

    let mut headers = vec![
        ("Content-Type", format.mime_type()),
        ("Content-Disposition", disposition),
        ("Last-Modified", http_date(modified)),
        ("Cache-Control", format!("maxage={}", options.expires)),
    ];
    if options.expires > 0 {
        let expires = modified + TimeDelta::seconds(i64::from(options.expires));
        headers.push(("Expires", http_date(expires)));
    }
    headers.push(("Pragma", "public".to_string()));
    headers
}

/// Encode `handle` and pair it with its headers.
///
/// The handle is consumed; its bitmap is released on return.
pub fn render<B: ImageBackend>(
    handle: ImageHandle<'_, B>,
    options: &RenderOptions,
) -> Result<Rendered, ImageError> {
    let format = handle.format()?;
    let bytes = handle.encode(options.quality)?;
    let headers = build_headers(format, options, Utc::now());
    debug!(%format, bytes = bytes.len(), "Rendered image");
    Ok(Rendered { bytes, headers })
}
