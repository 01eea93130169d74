/// `Accept-Version` negotiation for `/api/v1`
///
/// A missing or blank header resolves to `v1`. Values are lowercased and
/// given a `v` prefix when they lack one, so `1`, `V1` and `v1` are the same
/// version. Anything unsupported is answered with 400
/// `UNSUPPORTED_API_VERSION` before authentication runs. The resolved
/// [`ApiVersion`] is stored in the request extensions.

use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::ApiError;

pub const ACCEPT_VERSION_HEADER: &str = "accept-version";

pub const SUPPORTED_API_VERSIONS: &[&str] = &["v1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersion(pub &'static str);

impl Default for ApiVersion {
    fn default() -> Self {
        Self(SUPPORTED_API_VERSIONS[0])
    }
}

/// Resolves a raw header value; `None` means the header was absent
pub fn negotiate(raw: Option<&[u8]>) -> Result<ApiVersion, ApiError> {
    let Some(raw) = raw else {
        return Ok(ApiVersion::default());
    };

    let requested = std::str::from_utf8(raw).map_err(|_| unsupported("<non-UTF-8>"))?;
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Ok(ApiVersion::default());
    }

    let lowered = trimmed.to_ascii_lowercase();
    let normalized = if lowered.starts_with('v') {
        lowered
    } else {
        format!("v{}", lowered)
    };

    SUPPORTED_API_VERSIONS
        .iter()
        .find(|v| **v == normalized)
        .map(|v| ApiVersion(v))
        .ok_or_else(|| unsupported(trimmed))
}

fn unsupported(requested: &str) -> ApiError {
    ApiError::bad_request(
        "UNSUPPORTED_API_VERSION",
        format!(
            "Unsupported API version '{}'; supported versions: {}",
            requested,
            SUPPORTED_API_VERSIONS.join(", ")
        ),
    )
}

pub async fn api_version_layer(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let version = negotiate(request.headers().get(ACCEPT_VERSION_HEADER).map(|v| v.as_bytes()))?;

    tracing::trace!(api_version = version.0, "API version resolved");

    request.extensions_mut().insert(version);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_header_defaults_to_v1() {
        assert_eq!(negotiate(None).unwrap(), ApiVersion("v1"));
        assert_eq!(negotiate(Some(b"  ")).unwrap(), ApiVersion("v1"));
    }

    #[test]
    fn test_versions_are_normalized() {
        for raw in ["v1", "V1", "1", " v1 "] {
            assert_eq!(negotiate(Some(raw.as_bytes())).unwrap(), ApiVersion("v1"), "{}", raw);
        }
    }

    #[test]
    fn test_unsupported_versions_are_rejected() {
        for raw in [&b"v2"[..], b"2", b"latest", &[0xff, 0xfe]] {
            let err = negotiate(Some(raw)).unwrap_err();
            assert_eq!(err.code(), "UNSUPPORTED_API_VERSION");
            assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        }
    }
}
