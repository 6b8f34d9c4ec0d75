use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;

/// Bytes of entropy in every opaque token (256 bits).
pub const OPAQUE_TOKEN_BYTES: usize = 32;

/// Unguessable URL-safe token used for session ids, reset tokens and federation states.
pub fn opaque_token() -> String {
    let bytes: [u8; OPAQUE_TOKEN_BYTES] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}
