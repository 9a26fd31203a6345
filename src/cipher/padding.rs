//! Length-byte padding (PKCS#5 style)
//!
//! Every padded message gains between 1 and `block_size` bytes, each
//! holding the pad length, so the pad is always removable.

/// Pad `message` up to the next multiple of `block_size`.
///
/// A message that is already block-aligned gets a full extra block.
pub fn pad(message: &[u8], block_size: usize) -> Vec<u8> {
    let pad_len = block_size - (message.len() % block_size);
    let mut padded = Vec::with_capacity(message.len() + pad_len);
    padded.extend_from_slice(message);
    padded.resize(message.len() + pad_len, pad_len as u8);
    padded
}

/// Strip the padding from a decrypted buffer.
///
/// Only the final length byte is consulted. Returns `None` when it cannot
/// be a pad length for this buffer, or when nothing would be left.
pub fn unpad(buffer: &[u8], block_size: usize) -> Option<&[u8]> {
    let &last = buffer.last()?;
    let pad_len = usize::from(last);
    if pad_len == 0 || pad_len > block_size || pad_len >= buffer.len() {
        return None;
    }
    Some(&buffer[..buffer.len() - pad_len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_partial_block() {
        let padded = pad(b"abc", 8);
        assert_eq!(padded, b"abc\x05\x05\x05\x05\x05");
    }

    #[test]
    fn test_pad_aligned_message_adds_full_block() {
        let padded = pad(b"12345678", 8);
        assert_eq!(padded.len(), 16);
        assert!(padded[8..].iter().all(|&b| b == 8));
    }

    #[test]
    fn test_unpad_valid() {
        let padded = pad(b"hello world", 8);
        assert_eq!(unpad(&padded, 8), Some(&b"hello world"[..]));
    }

    #[test]
    fn test_unpad_rejects_bad_length_byte() {
        assert_eq!(unpad(b"abcdefg\x00", 8), None);
        assert_eq!(unpad(b"abcdefg\x09", 8), None);
        assert_eq!(unpad(b"", 8), None);
    }

    #[test]
    fn test_unpad_rejects_empty_result() {
        // Pad covering the whole buffer leaves nothing to match against
        assert_eq!(unpad(&[8u8; 8], 8), None);
    }
}
