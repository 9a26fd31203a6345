//! Per-key decrypt-and-match testing

use crate::cipher::padding::unpad;
use crate::cipher::{BlockCipher, CipherError};
use crate::search::error::SearchError;
use memchr::memmem::Finder;
use std::sync::Arc;

/// Outcome of trying one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trial {
    /// Plaintext contains the marker
    Match,
    /// Decrypted, but no marker (or the padding was not valid)
    Miss,
    /// The cipher refused the key
    Rejected(CipherError),
}

/// Decrypts a fixed ciphertext under candidate keys and checks for a marker.
///
/// Holds only shared read-only state, so clones are cheap and each worker
/// can own one. The ciphertext itself is never written to; every trial
/// works on a copy.
#[derive(Debug)]
pub struct CandidateTester<C: ?Sized> {
    cipher: Arc<C>,
    ciphertext: Arc<[u8]>,
    marker: Finder<'static>,
}

impl<C: ?Sized> Clone for CandidateTester<C> {
    fn clone(&self) -> Self {
        Self {
            cipher: Arc::clone(&self.cipher),
            ciphertext: Arc::clone(&self.ciphertext),
            marker: self.marker.clone(),
        }
    }
}

impl<C: BlockCipher + ?Sized> CandidateTester<C> {
    pub fn new(
        cipher: Arc<C>,
        ciphertext: impl Into<Arc<[u8]>>,
        marker: impl AsRef<[u8]>,
    ) -> Result<Self, SearchError> {
        let ciphertext = ciphertext.into();
        let marker = marker.as_ref();
        let block_size = cipher.block_size();

        if marker.is_empty() {
            return Err(SearchError::config("marker must not be empty"));
        }
        if ciphertext.is_empty() || block_size == 0 || ciphertext.len() % block_size != 0 {
            return Err(SearchError::config(format!(
                "ciphertext of {} bytes is not a whole number of {}-byte blocks",
                ciphertext.len(),
                block_size
            )));
        }

        Ok(Self {
            cipher,
            ciphertext,
            marker: Finder::new(marker).into_owned(),
        })
    }

    #[cfg(test)]
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    #[cfg(test)]
    pub fn marker(&self) -> &[u8] {
        self.marker.needle()
    }

    /// Working buffer sized for this ciphertext
    pub fn scratch(&self) -> Vec<u8> {
        vec![0u8; self.ciphertext.len()]
    }

    /// Try `key`, decrypting into `scratch`.
    ///
    /// `scratch` must come from [`CandidateTester::scratch`].
    pub fn evaluate(&self, key: u64, scratch: &mut [u8]) -> Trial {
        scratch.copy_from_slice(&self.ciphertext);
        if let Err(err) = self.cipher.decrypt_message(key, scratch) {
            return Trial::Rejected(err);
        }
        match unpad(scratch, self.cipher.block_size()) {
            Some(plaintext) if self.marker.find(plaintext).is_some() => Trial::Match,
            _ => Trial::Miss,
        }
    }

    /// Whether `key` decrypts to plaintext containing the marker.
    #[cfg(test)]
    pub fn test(&self, key: u64) -> bool {
        let mut scratch = self.scratch();
        self.evaluate(key, &mut scratch) == Trial::Match
    }

    /// Decrypt with `key` and return the unpadded plaintext if it matches.
    pub fn recover(&self, key: u64) -> Option<Vec<u8>> {
        let mut scratch = self.scratch();
        if self.evaluate(key, &mut scratch) != Trial::Match {
            return None;
        }
        unpad(&scratch, self.cipher.block_size()).map(<[u8]>::to_vec)
    }
}
