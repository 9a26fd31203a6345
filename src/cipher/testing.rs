//! Deterministic toy ciphers for exercising the search protocol quickly

use super::{BlockCipher, CipherError};
use std::collections::HashMap;
use std::time::Duration;

/// XOR with the little-endian key bytes. Distinct keys give distinct
/// transforms, and it is cheap enough to sweep large key spaces in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct XorCipher;

impl BlockCipher for XorCipher {
    fn block_size(&self) -> usize {
        8
    }

    fn encrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError> {
        if block.len() != 8 {
            return Err(CipherError::BlockLength {
                block_size: 8,
                actual: block.len(),
            });
        }
        for (byte, k) in block.iter_mut().zip(key.to_le_bytes()) {
            *byte ^= k;
        }
        Ok(())
    }

    fn decrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError> {
        self.encrypt_block(key, block)
    }
}

/// Wraps [`XorCipher`] so that some keys behave exactly like others,
/// planting several valid keys in one key space.
#[derive(Debug, Clone, Default)]
pub struct AliasingCipher {
    aliases: HashMap<u64, u64>,
}

impl AliasingCipher {
    pub fn new(aliases: impl IntoIterator<Item = (u64, u64)>) -> Self {
        Self {
            aliases: aliases.into_iter().collect(),
        }
    }

    fn resolve(&self, key: u64) -> u64 {
        self.aliases.get(&key).copied().unwrap_or(key)
    }
}

impl BlockCipher for AliasingCipher {
    fn block_size(&self) -> usize {
        8
    }

    fn encrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError> {
        XorCipher.encrypt_block(self.resolve(key), block)
    }

    fn decrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError> {
        XorCipher.decrypt_block(self.resolve(key), block)
    }
}

/// Rejects every key in a set, otherwise behaves like [`XorCipher`].
#[derive(Debug, Clone, Default)]
pub struct RejectingCipher {
    pub rejected: Vec<u64>,
}

impl BlockCipher for RejectingCipher {
    fn block_size(&self) -> usize {
        8
    }

    fn encrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError> {
        if self.rejected.contains(&key) {
            return Err(CipherError::WeakKey { key });
        }
        XorCipher.encrypt_block(key, block)
    }

    fn decrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError> {
        self.encrypt_block(key, block)
    }
}

/// [`XorCipher`] that sleeps on every block, for deadline tests.
#[derive(Debug, Clone, Copy)]
pub struct SlowCipher {
    delay: Duration,
}

impl SlowCipher {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BlockCipher for SlowCipher {
    fn block_size(&self) -> usize {
        8
    }

    fn encrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError> {
        std::thread::sleep(self.delay);
        XorCipher.encrypt_block(key, block)
    }

    fn decrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError> {
        self.encrypt_block(key, block)
    }
}

/// [`XorCipher`] that panics when asked to use one particular key.
#[derive(Debug, Clone, Copy)]
pub struct PanickingCipher {
    pub poisoned_key: u64,
}

impl BlockCipher for PanickingCipher {
    fn block_size(&self) -> usize {
        8
    }

    fn encrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError> {
        XorCipher.encrypt_block(key, block)
    }

    fn decrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError> {
        if key == self.poisoned_key {
            panic!("cipher failure on key {key}");
        }
        XorCipher.decrypt_block(key, block)
    }
}
