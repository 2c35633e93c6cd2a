//! Destination filename derivation for downloaded documents.
//!
//! The name comes from the response's `Content-Disposition` header when it
//! carries one, lower-cased and stripped of quotes. Otherwise it is derived
//! from the URL, so a missing header never resolves to the output directory
//! itself.

use std::path::{Component, Path};

use url::Url;

use super::constants::PDF_EXTENSION;

/// Chooses the destination filename for a response.
///
/// Prefers the `Content-Disposition` filename, falling back to
/// [`fallback_filename_from_url`] when the header is absent or unusable.
#[must_use]
pub fn destination_filename(content_disposition: Option<&str>, url: &Url) -> String {
    content_disposition
        .and_then(parse_content_disposition)
        .map(|name| sanitize_filename(&name.to_lowercase()))
        .filter(|name| is_usable(name))
        .unwrap_or_else(|| fallback_filename_from_url(url))
}

/// Parses Content-Disposition header to extract filename.
///
/// Handles:
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf`
/// - `attachment; filename*=UTF-8''example.pdf` (RFC 5987)
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    // RFC 5987 form wins when both are present
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        // Format: charset'language'encoded_value
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded_name = encoded[..end].trim().trim_matches('"');
            if let Ok(decoded) = urlencoding::decode(encoded_name)
                && !decoded.trim().is_empty()
            {
                return Some(decoded.into_owned());
            }
        }
    }

    let pos = header.find("filename=")?;
    let value = header[pos + 9..].trim();

    let filename = if let Some(stripped) = value.strip_prefix('"') {
        // Unterminated quote: take the rest of the header
        let end = stripped.find('"').unwrap_or(stripped.len());
        &stripped[..end]
    } else {
        let end = value.find(';').unwrap_or(value.len());
        value[..end].trim().trim_matches('"')
    };

    let filename = filename.trim();
    (!filename.is_empty()).then(|| filename.to_string())
}

/// Derives a filename from the URL when no header supplies one.
///
/// Uses the last non-empty path segment, percent-decoded and lower-cased,
/// with `.pdf` appended unless already present. `https://host/file/123/`
/// becomes `123.pdf`. A URL without a usable segment falls back to the host
/// name (`www-example-com.pdf`).
#[must_use]
pub fn fallback_filename_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|raw| {
            urlencoding::decode(raw)
                .map_or_else(|_| raw.to_string(), std::borrow::Cow::into_owned)
                .to_lowercase()
        })
        .map(|decoded| sanitize_filename(&decoded))
        .filter(|name| is_usable(name));

    let stem = segment.unwrap_or_else(|| {
        let host = url.host_str().unwrap_or("document").replace('.', "-");
        sanitize_filename(&host.to_lowercase())
    });

    if stem.ends_with(PDF_EXTENSION) {
        stem
    } else {
        format!("{stem}{PDF_EXTENSION}")
    }
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |`) and control characters with `_`, and rewrites
/// dot-only names so the result is always a single plain path component.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// A sanitized name made only of underscores carries no information.
fn is_usable(name: &str) -> bool {
    !name.trim_matches('_').is_empty()
}
