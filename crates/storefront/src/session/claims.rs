//! Credential payload decoding.
//!
//! Only the payload segment is read. The signature is not checked, so the
//! result is display data and nothing more.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use thiserror::Error;

use tienda_core::IdentityClaims;

/// Why a credential could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not three dot-separated segments, or an empty payload segment.
    #[error("credential must have three dot-separated segments")]
    Segments,

    /// The payload segment is not base64.
    #[error("credential payload is not base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The payload is not the expected JSON object.
    #[error("credential payload is not valid claims JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode the identity claims embedded in a `header.payload.signature` token.
///
/// The payload may use either the URL-safe or the standard base64 alphabet,
/// with or without padding.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the token does not have exactly three
/// segments or the payload does not decode to a claims object.
pub fn decode_claims(token: &str) -> Result<IdentityClaims, DecodeError> {
    let mut segments = token.trim().split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
        _ => return Err(DecodeError::Segments),
    };

    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))?;

    Ok(serde_json::from_slice(&bytes)?)
}
