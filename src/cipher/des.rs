//! DES adapter over the RustCrypto `des` crate
//!
//! DES keys are 8 bytes where the low bit of every byte is a parity bit,
//! leaving 56 effective key bits. Integer keys are turned into key bytes by
//! a [`KeyEncoding`], odd parity is forced on every byte and the weak and
//! semi-weak keys are refused, mirroring a checked key schedule.

use super::{BlockCipher, CipherError, check_block_multiple};
use ::des::Des;
use ::des::cipher::generic_array::GenericArray;
use ::des::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

/// DES block size in bytes
pub const DES_BLOCK_SIZE: usize = 8;

/// Number of effective key bits in a DES key
pub const DES_KEY_BITS: u32 = 56;

const KEY_MASK: u64 = (1 << DES_KEY_BITS) - 1;

/// Weak and semi-weak DES keys, with odd parity applied.
const WEAK_KEYS: [[u8; 8]; 16] = [
    [0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01],
    [0xFE, 0xFE, 0xFE, 0xFE, 0xFE, 0xFE, 0xFE, 0xFE],
    [0x1F, 0x1F, 0x1F, 0x1F, 0x0E, 0x0E, 0x0E, 0x0E],
    [0xE0, 0xE0, 0xE0, 0xE0, 0xF1, 0xF1, 0xF1, 0xF1],
    [0x01, 0xFE, 0x01, 0xFE, 0x01, 0xFE, 0x01, 0xFE],
    [0xFE, 0x01, 0xFE, 0x01, 0xFE, 0x01, 0xFE, 0x01],
    [0x1F, 0xE0, 0x1F, 0xE0, 0x0E, 0xF1, 0x0E, 0xF1],
    [0xE0, 0x1F, 0xE0, 0x1F, 0xF1, 0x0E, 0xF1, 0x0E],
    [0x01, 0xE0, 0x01, 0xE0, 0x01, 0xF1, 0x01, 0xF1],
    [0xE0, 0x01, 0xE0, 0x01, 0xF1, 0x01, 0xF1, 0x01],
    [0x1F, 0xFE, 0x1F, 0xFE, 0x0E, 0xFE, 0x0E, 0xFE],
    [0xFE, 0x1F, 0xFE, 0x1F, 0xFE, 0x0E, 0xFE, 0x0E],
    [0x01, 0x1F, 0x01, 0x1F, 0x01, 0x0E, 0x01, 0x0E],
    [0x1F, 0x01, 0x1F, 0x01, 0x0E, 0x01, 0x0E, 0x01],
    [0xE0, 0xFE, 0xE0, 0xFE, 0xF1, 0xFE, 0xF1, 0xFE],
    [0xFE, 0xE0, 0xFE, 0xE0, 0xFE, 0xF1, 0xFE, 0xF1],
];

/// How an integer key is laid out in the 8 DES key bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEncoding {
    /// Seven key bits per byte above the parity bit. Every integer below
    /// 2^56 is a distinct DES key.
    #[default]
    Spread,
    /// Low 56 bits copied little-endian, then parity forced. Integers that
    /// differ only in parity bit positions alias the same DES key.
    Packed,
}

impl std::fmt::Display for KeyEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyEncoding::Spread => write!(f, "spread"),
            KeyEncoding::Packed => write!(f, "packed"),
        }
    }
}

impl std::str::FromStr for KeyEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spread" => Ok(KeyEncoding::Spread),
            "packed" | "raw" => Ok(KeyEncoding::Packed),
            _ => Err(format!(
                "Unknown key encoding: '{}'. Valid options: spread, packed",
                s
            )),
        }
    }
}

/// Single DES, ECB mode, one block at a time
#[derive(Debug, Clone, Copy, Default)]
pub struct DesCipher {
    encoding: KeyEncoding,
}

impl DesCipher {
    pub fn new(encoding: KeyEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> KeyEncoding {
        self.encoding
    }

    /// Build the parity-adjusted 8-byte DES key for an integer key.
    pub fn key_bytes(&self, key: u64) -> [u8; 8] {
        let key = key & KEY_MASK;
        let mut bytes = match self.encoding {
            KeyEncoding::Packed => key.to_le_bytes(),
            KeyEncoding::Spread => {
                let mut bytes = [0u8; 8];
                for (i, byte) in bytes.iter_mut().enumerate() {
                    *byte = (((key >> (7 * i)) & 0x7F) as u8) << 1;
                }
                bytes
            }
        };
        for byte in &mut bytes {
            *byte = with_odd_parity(*byte);
        }
        bytes
    }

    fn schedule(&self, key: u64) -> Result<Des, CipherError> {
        let bytes = self.key_bytes(key);
        if WEAK_KEYS.contains(&bytes) {
            return Err(CipherError::WeakKey { key });
        }
        Ok(Des::new(&GenericArray::from(bytes)))
    }
}

/// Force odd parity into the low bit of a key byte.
fn with_odd_parity(byte: u8) -> u8 {
    let high = byte & 0xFE;
    if high.count_ones() % 2 == 0 {
        high | 1
    } else {
        high
    }
}

fn check_block(block: &[u8]) -> Result<(), CipherError> {
    if block.len() != DES_BLOCK_SIZE {
        return Err(CipherError::BlockLength {
            block_size: DES_BLOCK_SIZE,
            actual: block.len(),
        });
    }
    Ok(())
}

impl BlockCipher for DesCipher {
    fn block_size(&self) -> usize {
        DES_BLOCK_SIZE
    }

    fn encrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError> {
        check_block(block)?;
        self.schedule(key)?
            .encrypt_block(GenericArray::from_mut_slice(block));
        Ok(())
    }

    fn decrypt_block(&self, key: u64, block: &mut [u8]) -> Result<(), CipherError> {
        check_block(block)?;
        self.schedule(key)?
            .decrypt_block(GenericArray::from_mut_slice(block));
        Ok(())
    }

    // The key schedule is built once per message instead of once per block
    fn encrypt_message(&self, key: u64, message: &mut [u8]) -> Result<(), CipherError> {
        check_block_multiple(message.len(), DES_BLOCK_SIZE)?;
        let des = self.schedule(key)?;
        for block in message.chunks_exact_mut(DES_BLOCK_SIZE) {
            des.encrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }

    fn decrypt_message(&self, key: u64, message: &mut [u8]) -> Result<(), CipherError> {
        check_block_multiple(message.len(), DES_BLOCK_SIZE)?;
        let des = self.schedule(key)?;
        for block in message.chunks_exact_mut(DES_BLOCK_SIZE) {
            des.decrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }
}
