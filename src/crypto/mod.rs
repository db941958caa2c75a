//! Blowfish header decryption and key-block derivation for encrypted MIX archives.
//!
//! Key derivation: 80-byte key block → public-key transform → 56-byte key
//! Encryption:     Blowfish, each 8-byte block read as two little-endian words
//!
//! Only whole 8-byte blocks are ever decrypted; there is no streaming mode.
//! Callers decrypt a header in one call and parse the returned bytes.

mod key;

pub use key::{derive_key, KeyDerivation, KEY_BLOCK_LEN, KEY_LEN};

use blowfish::BlowfishLE;
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, KeyInit};
use thiserror::Error;

/// Byte length of one Blowfish block.
pub const BLOCK_LEN: usize = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("key block must be {KEY_BLOCK_LEN} bytes, got {0}")]
    KeyBlockLength(usize),
    #[error("public key is malformed: {0}")]
    PublicKey(String),
    #[error("invalid Blowfish key length {0}")]
    InvalidKeyLength(usize),
    #[error("ciphertext length {0} is not a multiple of {BLOCK_LEN}")]
    PartialBlock(usize),
    #[error("decrypted file count {file_count} does not fit in a {archive_len} byte archive")]
    ImplausibleHeader { file_count: u16, archive_len: u64 },
}

/// Round `len` up to a whole number of cipher blocks.
#[inline]
pub fn round_up_to_block(len: usize) -> usize {
    len.div_ceil(BLOCK_LEN) * BLOCK_LEN
}

/// Blowfish keyed for MIX header decryption.
pub struct BlockCipher {
    inner: BlowfishLE,
}

impl BlockCipher {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let inner = BlowfishLE::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
        Ok(Self { inner })
    }

    /// Derive the key from an 80-byte key block and build the cipher.
    pub fn from_key_block(key_block: &[u8]) -> Result<Self, CryptoError> {
        Self::new(&derive_key(key_block)?)
    }

    /// Decrypt `data` in place.  `data.len()` must be a multiple of 8.
    pub fn decrypt_in_place(&self, data: &mut [u8]) -> Result<(), CryptoError> {
        if data.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::PartialBlock(data.len()));
        }
        for chunk in data.chunks_exact_mut(BLOCK_LEN) {
            self.inner.decrypt_block(GenericArray::from_mut_slice(chunk));
        }
        Ok(())
    }

    /// Decrypt a copy of `data`.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut out = data.to_vec();
        self.decrypt_in_place(&mut out)?;
        Ok(out)
    }
}
