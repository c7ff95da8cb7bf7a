//! Bearer token extraction from the `Authorization` header

use http::HeaderMap;
use http::header::AUTHORIZATION;

use crate::error::AuthFailure;

/// Authentication scheme accepted in the `Authorization` header (case-insensitive)
pub const BEARER_SCHEME: &str = "bearer";

/// Extract the bearer token from request headers
///
/// # Errors
///
/// Returns `invalid_header` when the header is missing, is not visible ASCII,
/// or is not exactly `Bearer <token>`.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AuthFailure> {
    match headers.get(AUTHORIZATION) {
        None => parse_authorization(None),
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| AuthFailure::malformed_header())?;
            parse_authorization(Some(value))
        }
    }
}

/// Parse a raw `Authorization` header value
///
/// The value must split into exactly two whitespace-separated parts, the
/// first being the bearer scheme. The token part is returned verbatim.
///
/// # Errors
///
/// Returns `invalid_header` when the value is absent, empty or malformed.
pub fn parse_authorization(value: Option<&str>) -> Result<String, AuthFailure> {
    let value = match value {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AuthFailure::missing_header()),
    };

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case(BEARER_SCHEME) => {
            Ok(token.to_string())
        }
        _ => Err(AuthFailure::malformed_header()),
    }
}
