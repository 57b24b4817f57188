//! Padded standard-alphabet base64 into a caller-provided buffer, backed by the `base64` crate.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Capacity `encode_into` demands for `input_len` bytes: the padded text plus
/// one spare byte.
pub const fn required_capacity(input_len: usize) -> usize {
    input_len.div_ceil(3) * 4 + 1
}

/// Encode `input` into `out`, returning the encoded length.
///
/// Returns `None` when `out` is shorter than [`required_capacity`].
pub fn encode_into(input: &[u8], out: &mut [u8]) -> Option<usize> {
    if out.len() < required_capacity(input.len()) {
        return None;
    }
    STANDARD.encode_slice(input, out).ok()
}
