//! Handling of Base 64-encoded data.
//!
//! Different places use slightly different dialects of Base 64. This module
//! provides a struct per flavor so callers don’t have to remember the exact
//! engine configuration but simply pick the application.

use base64::Engine;
use base64::engine::general_purpose::{GeneralPurpose, STANDARD};

pub use base64::DecodeError;


//------------ Tal -----------------------------------------------------------

/// The flavor used for the key info in Trust Anchor Locators.
///
/// This uses the standard alphabet with padding. White space, including
/// line breaks, is dropped before decoding since RFC 8630 allows the key to
/// be wrapped.
pub struct Tal;

impl Tal {
    const ENGINE: GeneralPurpose = STANDARD;

    pub fn decode_bytes(self, input: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let input: Vec<u8> = input.iter().copied().filter(|ch| {
            !ch.is_ascii_whitespace()
        }).collect();
        Self::ENGINE.decode(input)
    }

    pub fn encode(self, data: &[u8]) -> String {
        Self::ENGINE.encode(data)
    }
}


//============ Tests =========================================================
