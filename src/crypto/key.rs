//! Key-block → Blowfish key transform.
//!
//! The key block is processed in chunks of `a + 1` bytes, where `a` is derived
//! from the bit length of a fixed public modulus.  Each chunk is read as a
//! little-endian integer `m`, raised to `e = 0x10001` modulo `N`, and the low
//! `a` bytes of the result are appended (little-endian) to the key stream.
//! The first 56 bytes of that stream are the Blowfish key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use num_bigint::BigUint;

use super::CryptoError;

/// Length of the key block stored after the MIX signature.
pub const KEY_BLOCK_LEN: usize = 80;
/// Length of the derived Blowfish key.
pub const KEY_LEN: usize = 56;

/// DER-encoded public modulus, base64.
const PUBLIC_KEY: &str = "AihRvNoIbTn85FZRYNZRcT+i6KpU+maCsEqr3Q5q+LDB5tH7Tz2qQ38V";
const PUBLIC_EXPONENT: u32 = 0x10001;

/// Parsed public key plus the chunking parameters it implies.
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    modulus:  BigUint,
    exponent: BigUint,
    /// Output bytes per chunk; each input chunk is one byte longer.
    chunk_out: usize,
}

impl KeyDerivation {
    /// Build from the built-in public key.
    pub fn new() -> Result<Self, CryptoError> {
        let der = STANDARD.decode(PUBLIC_KEY)
            .map_err(|e| CryptoError::PublicKey(e.to_string()))?;
        let modulus = parse_der_integer(&der)?;

        // len = bitlen(N) - 1; a = (len - 1) / 8
        let bits = modulus.bits() as usize;
        if bits < 10 {
            return Err(CryptoError::PublicKey(format!("modulus too short ({bits} bits)")));
        }
        let chunk_out = (bits - 2) / 8;

        Ok(Self {
            modulus,
            exponent: BigUint::from(PUBLIC_EXPONENT),
            chunk_out,
        })
    }

    /// Bytes of key block consumed per chunk.
    #[inline]
    pub fn chunk_in(&self) -> usize {
        self.chunk_out + 1
    }

    /// Number of key-block bytes consumed to produce a full key.
    pub fn predata_len(&self) -> usize {
        let a = self.chunk_out;
        (55 / a + 1) * (a + 1)
    }

    /// Transform a key block into the 56-byte Blowfish key.
    pub fn derive(&self, key_block: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
        if key_block.len() != KEY_BLOCK_LEN || self.predata_len() > key_block.len() {
            return Err(CryptoError::KeyBlockLength(key_block.len()));
        }

        let mut stream = Vec::with_capacity(self.predata_len());
        for chunk in key_block[..self.predata_len()].chunks_exact(self.chunk_in()) {
            let m = BigUint::from_bytes_le(chunk);
            let c = m.modpow(&self.exponent, &self.modulus);
            let mut bytes = c.to_bytes_le();
            bytes.resize(self.chunk_out.max(bytes.len()), 0);
            stream.extend_from_slice(&bytes[..self.chunk_out]);
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&stream[..KEY_LEN]);
        Ok(key)
    }
}

/// Derive a Blowfish key from an 80-byte key block using the built-in public key.
pub fn derive_key(key_block: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
    KeyDerivation::new()?.derive(key_block)
}

/// Parse `02 <len> <big-endian magnitude>` with short- or long-form length.
fn parse_der_integer(der: &[u8]) -> Result<BigUint, CryptoError> {
    let malformed = |what: &str| CryptoError::PublicKey(what.to_owned());

    if der.first() != Some(&0x02) {
        return Err(malformed("missing INTEGER tag"));
    }
    let first = *der.get(1).ok_or_else(|| malformed("missing length"))?;
    let (len, body) = if first & 0x80 != 0 {
        let n = (first & 0x7F) as usize;
        let len_bytes = der.get(2..2 + n).ok_or_else(|| malformed("truncated length"))?;
        let len = len_bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (len, 2 + n)
    } else {
        (first as usize, 2)
    };

    let magnitude = der.get(body..body + len).ok_or_else(|| malformed("truncated magnitude"))?;
    Ok(BigUint::from_bytes_be(magnitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_parameters() {
        let kd = KeyDerivation::new().unwrap();
        assert_eq!(kd.modulus.bits(), 319);
        assert_eq!(kd.chunk_out, 39);
        assert_eq!(kd.predata_len(), KEY_BLOCK_LEN);
    }

    #[test]
    fn derivation_is_deterministic() {
        let block: Vec<u8> = (0u8..80).collect();
        let a = derive_key(&block).unwrap();
        let b = derive_key(&block).unwrap();
        assert_eq!(a, b);

        let mut other = block.clone();
        other[0] ^= 1;
        assert_ne!(derive_key(&other).unwrap(), a);
    }

    #[test]
    fn zero_block_yields_zero_key() {
        // 0^e mod N == 0
        assert_eq!(derive_key(&[0u8; 80]).unwrap(), [0u8; KEY_LEN]);
    }

    #[test]
    fn small_chunk_is_plain_power() {
        // m = 2 in the first chunk: 2^65537 mod N, low 39 bytes lead the key.
        let mut block = [0u8; 80];
        block[0] = 2;
        let kd = KeyDerivation::new().unwrap();
        let expected = BigUint::from(2u32).modpow(&BigUint::from(0x10001u32), &kd.modulus);
        let mut bytes = expected.to_bytes_le();
        bytes.resize(39.max(bytes.len()), 0);
        let key = kd.derive(&block).unwrap();
        assert_eq!(&key[..39], &bytes[..39]);
        assert_eq!(&key[39..], &[0u8; 17]);
    }

    #[test]
    fn wrong_block_length() {
        assert_eq!(derive_key(&[0u8; 79]), Err(CryptoError::KeyBlockLength(79)));
    }

    #[test]
    fn der_long_form_length() {
        let der = [0x02, 0x81, 0x02, 0x01, 0x00];
        assert_eq!(parse_der_integer(&der).unwrap(), BigUint::from(256u32));
        assert!(parse_der_integer(&[0x30, 0x01, 0x00]).is_err());
    }
}
