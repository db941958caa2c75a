//! MIX header: dialect detection, optional Blowfish-encrypted index, data start.
//!
//! ```text
//! legacy:     [u16 count][u32 size][count × entry][data]
//! extended:   [u32 flags][u16 count][u32 size][count × entry][data][sha1?]
//! encrypted:  [u32 flags][80 B key block][round_up_8(6 + 12·count) B encrypted index][data][sha1?]
//! ```
//!
//! A stream is the extended dialect when its first `u32` has no bits set other
//! than [`FLAG_CHECKSUM`] and [`FLAG_ENCRYPTED`].  Legacy archives always start
//! with a non-zero file count, so their first word never matches.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use crate::crypto::{round_up_to_block, BlockCipher, CryptoError, BLOCK_LEN, KEY_BLOCK_LEN};
use crate::error::{Error, Result};
use crate::index::{table_len, RawIndex};

/// A SHA-1 digest of the body follows the data region.
pub const FLAG_CHECKSUM:  u32 = 0x0001_0000;
/// The index is Blowfish-encrypted behind an 80-byte key block.
pub const FLAG_ENCRYPTED: u32 = 0x0002_0000;

/// Length of the flags word.
pub const SIGNATURE_LEN: u64 = 4;
/// Absolute offset of the encrypted index.
pub const ENCRYPTED_INDEX_OFFSET: u64 = SIGNATURE_LEN + KEY_BLOCK_LEN as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// No flags word; the file opens with the file count.
    Legacy,
    /// Flags word present.
    Extended { flags: u32 },
}

#[derive(Debug, Clone)]
pub struct MixHeader {
    pub dialect:    Dialect,
    pub index:      RawIndex,
    /// Absolute offset of the data region.
    pub data_start: u64,
}

impl MixHeader {
    pub fn is_encrypted(&self) -> bool {
        matches!(self.dialect, Dialect::Extended { flags } if flags & FLAG_ENCRYPTED != 0)
    }

    pub fn has_checksum(&self) -> bool {
        matches!(self.dialect, Dialect::Extended { flags } if flags & FLAG_CHECKSUM != 0)
    }

    /// Parse the header of `archive` from `reader`, whose total length is
    /// `archive_len`.  Every index entry is checked against that length.
    pub fn read<R: Read + Seek>(mut reader: R, archive: &str, archive_len: u64) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let signature = reader.read_u32::<LittleEndian>()
            .map_err(|e| truncated(archive, e))?;

        let header = if signature & !(FLAG_CHECKSUM | FLAG_ENCRYPTED) == 0 {
            let dialect = Dialect::Extended { flags: signature };
            if signature & FLAG_ENCRYPTED != 0 {
                let (index, data_start) = read_encrypted_index(&mut reader, archive, archive_len)?;
                MixHeader { dialect, index, data_start }
            } else {
                let index = RawIndex::read(&mut reader).map_err(|e| truncated(archive, e))?;
                let data_start = SIGNATURE_LEN + index.byte_len() as u64;
                MixHeader { dialect, index, data_start }
            }
        } else {
            reader.seek(SeekFrom::Start(0))?;
            let index = RawIndex::read(&mut reader).map_err(|e| truncated(archive, e))?;
            let data_start = index.byte_len() as u64;
            MixHeader { dialect: Dialect::Legacy, index, data_start }
        };

        header.validate(archive, archive_len)?;
        Ok(header)
    }

    fn validate(&self, archive: &str, archive_len: u64) -> Result<()> {
        if self.data_start > archive_len {
            return Err(Error::malformed(archive, format!(
                "index ends at {} but archive is {archive_len} byte(s)", self.data_start)));
        }
        let data_len = archive_len - self.data_start;
        if let Some(e) = self.index.entries.iter().find(|e| e.end() > data_len) {
            return Err(Error::malformed(archive, format!(
                "entry {:08X} (offset {}, length {}) extends past the {data_len} byte data region",
                e.hash, e.offset, e.length)));
        }
        Ok(())
    }
}

/// Derive the Blowfish key, decrypt the first block to learn the entry count,
/// then decrypt and parse the whole index.  Returns the index and data start.
fn read_encrypted_index<R: Read + Seek>(
    reader:      &mut R,
    archive:     &str,
    archive_len: u64,
) -> Result<(RawIndex, u64)> {
    let cipher_err = |source: CryptoError| Error::CipherKey { archive: archive.to_owned(), source };

    let mut key_block = [0u8; KEY_BLOCK_LEN];
    reader.read_exact(&mut key_block).map_err(|e| truncated(archive, e))?;
    let cipher = BlockCipher::from_key_block(&key_block).map_err(cipher_err)?;

    let mut first = [0u8; BLOCK_LEN];
    reader.read_exact(&mut first).map_err(|e| truncated(archive, e))?;
    cipher.decrypt_in_place(&mut first).map_err(cipher_err)?;
    let file_count = u16::from_le_bytes([first[0], first[1]]);

    let header_len = round_up_to_block(table_len(file_count));
    if ENCRYPTED_INDEX_OFFSET + header_len as u64 > archive_len {
        return Err(cipher_err(CryptoError::ImplausibleHeader { file_count, archive_len }));
    }

    reader.seek(SeekFrom::Start(ENCRYPTED_INDEX_OFFSET))?;
    let mut block = vec![0u8; header_len];
    reader.read_exact(&mut block).map_err(|e| truncated(archive, e))?;
    cipher.decrypt_in_place(&mut block).map_err(cipher_err)?;

    let index = RawIndex::read(Cursor::new(&block)).map_err(|e| truncated(archive, e))?;
    Ok((index, ENCRYPTED_INDEX_OFFSET + header_len as u64))
}

/// Short reads while parsing a header mean the header is malformed; any other
/// I/O failure is passed through.
fn truncated(archive: &str, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::malformed(archive, "truncated header")
    } else {
        Error::Io(e)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::derive_key;
    use blowfish::BlowfishLE;
    use cipher::generic_array::GenericArray;
    use cipher::{BlockEncrypt, KeyInit};

    pub(crate) fn plain_table(entries: &[(u32, u32, u32)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        for (h, o, l) in entries {
            buf.extend_from_slice(&h.to_le_bytes());
            buf.extend_from_slice(&o.to_le_bytes());
            buf.extend_from_slice(&l.to_le_bytes());
        }
        buf
    }

    fn parse(bytes: &[u8]) -> Result<MixHeader> {
        MixHeader::read(Cursor::new(bytes), "test.mix", bytes.len() as u64)
    }

    #[test]
    fn legacy_dialect() {
        let mut bytes = plain_table(&[(0xAABB, 0, 4)]);
        bytes.extend_from_slice(b"DATA");
        let h = parse(&bytes).unwrap();
        assert_eq!(h.dialect, Dialect::Legacy);
        assert_eq!(h.data_start, 18);
        assert!(!h.is_encrypted());
    }

    #[test]
    fn extended_unencrypted_with_checksum() {
        let mut bytes = FLAG_CHECKSUM.to_le_bytes().to_vec();
        bytes.extend(plain_table(&[(1, 0, 2), (2, 2, 2)]));
        bytes.extend_from_slice(b"abcd");
        bytes.extend_from_slice(&[0u8; 20]);
        let h = parse(&bytes).unwrap();
        assert_eq!(h.dialect, Dialect::Extended { flags: FLAG_CHECKSUM });
        assert!(h.has_checksum());
        assert_eq!(h.data_start, 4 + 6 + 24);
        assert_eq!(h.index.entries.len(), 2);
    }

    #[test]
    fn entry_past_end_is_malformed() {
        let mut bytes = plain_table(&[(1, 0, 10)]);
        bytes.extend_from_slice(b"shrt");
        let err = parse(&bytes).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { .. }));
    }

    #[test]
    fn truncated_index_is_malformed() {
        let bytes = plain_table(&[(1, 0, 0), (2, 0, 0)]);
        let err = parse(&bytes[..10]).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { .. }));
    }

    #[test]
    fn empty_stream_is_malformed() {
        assert!(matches!(parse(&[]).unwrap_err(), Error::MalformedHeader { .. }));
    }

    fn encrypt(key: &[u8], data: &mut [u8]) {
        let bf = BlowfishLE::new_from_slice(key).unwrap();
        for chunk in data.chunks_exact_mut(8) {
            bf.encrypt_block(GenericArray::from_mut_slice(chunk));
        }
    }

    pub(crate) fn encrypted_archive(entries: &[(u32, u32, u32)], data: &[u8]) -> Vec<u8> {
        let key_block: Vec<u8> = (0u8..80).map(|b| b.wrapping_mul(37)).collect();
        let key = derive_key(&key_block).unwrap();

        let mut index = plain_table(entries);
        index.resize(round_up_to_block(index.len()), 0);
        encrypt(&key, &mut index);

        let mut bytes = (FLAG_ENCRYPTED | FLAG_CHECKSUM).to_le_bytes().to_vec();
        bytes.extend_from_slice(&key_block);
        bytes.extend_from_slice(&index);
        bytes.extend_from_slice(data);
        bytes.extend_from_slice(&[0u8; 20]);
        bytes
    }

    #[test]
    fn encrypted_dialect() {
        let bytes = encrypted_archive(&[(0x11, 0, 3), (0x22, 3, 5)], b"onetwo..");
        let h = parse(&bytes).unwrap();
        assert!(h.is_encrypted());
        assert!(h.has_checksum());
        // 6 + 24 = 30 → 32 bytes of encrypted index
        assert_eq!(h.data_start, 84 + 32);
        assert_eq!(h.index.entries[1].hash, 0x22);
        assert_eq!(h.index.entries[1].length, 5);
    }

    #[test]
    fn encrypted_header_longer_than_archive() {
        let bytes = encrypted_archive(&[(0x11, 0, 0); 4], b"");
        let err = parse(&bytes[..100]).unwrap_err();
        assert!(matches!(err, Error::CipherKey { .. }));
    }
}
