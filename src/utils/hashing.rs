use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

/// Characters of the content hash embedded in file names
pub const HASH_LENGTH: usize = 8;

/// Content hash used in file names and cache revisions: blake3 over the
/// bytes, URL-safe base64, truncated.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = blake3::hash(bytes);
    let mut encoded = URL_SAFE_NO_PAD.encode(digest.as_bytes());
    encoded.truncate(HASH_LENGTH);
    encoded
}
