//! Block cipher adapters
//!
//! The search core never looks inside a cipher. It only needs the
//! operations on the [`BlockCipher`] trait: encrypt or decrypt one
//! fixed-size block under an integer key. Multi-block messages are handled
//! block-by-block by the default methods, together with the length-byte
//! padding in [`padding`].

pub mod des;
pub mod padding;
#[cfg(test)]
pub mod testing;

pub use self::des::{DesCipher, KeyEncoding};

use thiserror::Error;

/// Errors raised by a cipher adapter for a single key or block.
///
/// The search treats these as "this key does not decrypt", never as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// The key maps to a weak or semi-weak key and is refused by the key schedule.
    #[error("key {key} is a weak key")]
    WeakKey {
        /// The rejected integer key.
        key: u64,
    },

    /// A block or message length is not a multiple of the block size.
    #[error("expected a multiple of {block_size} bytes, got {actual}")]
    BlockLength {
        /// Block size of the cipher.
        block_size: usize,
        /// Length that was supplied.
        actual: usize,
    },
}

/// Trait for fixed-block-size ciphers keyed by an integer.
pub trait BlockCipher: Send + Sync {
    /// Size of one block in bytes
    fn block_size(&self) -> usize;

    /// Encrypt exactly one block in place
    fn encrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError>;

    /// Decrypt exactly one block in place
    fn decrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError>;

    /// Encrypt a whole message in place, block by block.
    ///
    /// `message` must already be padded to a multiple of the block size.
    fn encrypt_message(&self, key: u64, message: &mut [u8]) -> Result<(), CipherError> {
        check_block_multiple(message.len(), self.block_size())?;
        for block in message.chunks_exact_mut(self.block_size()) {
            self.encrypt_block(key, block)?;
        }
        Ok(())
    }

    /// Decrypt a whole message in place, block by block.
    fn decrypt_message(&self, key: u64, message: &mut [u8]) -> Result<(), CipherError> {
        check_block_multiple(message.len(), self.block_size())?;
        for block in message.chunks_exact_mut(self.block_size()) {
            self.decrypt_block(key, block)?;
        }
        Ok(())
    }
}

/// Reject lengths that are not a whole number of blocks.
pub fn check_block_multiple(len: usize, block_size: usize) -> Result<(), CipherError> {
    if block_size == 0 || len % block_size != 0 {
        return Err(CipherError::BlockLength {
            block_size,
            actual: len,
        });
    }
    Ok(())
}

/// Pad `plaintext` and encrypt it under `key`, returning the ciphertext.
pub fn seal<C: BlockCipher + ?Sized>(
    cipher: &C,
    key: u64,
    plaintext: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let mut buffer = padding::pad(plaintext, cipher.block_size());
    cipher.encrypt_message(key, &mut buffer)?;
    Ok(buffer)
}
