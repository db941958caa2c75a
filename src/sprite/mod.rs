//! Sprite frame table with inter-frame references.
//!
//! ```text
//! [u16 image_count][u16][u16][u16 width][u16 height][u32]
//! image_count × [u32 offset | format << 24][u16 ref_offset][u16 ref_format]
//! [end-of-file header][zero header]
//! frame data …
//! ```
//!
//! Format80 frames stand alone.  Format20 frames are an XOR diff against the
//! previous frame; Format40 frames against the frame whose data offset equals
//! `ref_offset`.  References are resolved to table indices at parse time and
//! decoded on demand, root first, without recursion.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};

use crate::codec::{format40, format80, CodecError, CodecId};
use crate::error::{Error, Result};

pub const FILE_HEADER_LEN:  usize = 14;
pub const FRAME_HEADER_LEN: usize = 8;

const OFFSET_MASK: u32 = 0x00FF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Absolute offset of the frame data.
    pub offset:     u32,
    pub format:     CodecId,
    pub ref_offset: u16,
    pub ref_format: u16,
    /// Table index of the frame this one is a diff against.
    pub reference:  Option<usize>,
}

pub struct SpriteFrameDecoder {
    name:    String,
    data:    Vec<u8>,
    width:   u16,
    height:  u16,
    headers: Vec<FrameHeader>,
    decoded: Vec<Option<Vec<u8>>>,
}

impl SpriteFrameDecoder {
    /// Parse the frame table of `data`.  `name` is used in error messages.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let mut rdr = Cursor::new(&data[..]);
        let short = |e: io::Error| truncated(&name, e);

        let count = rdr.read_u16::<LittleEndian>().map_err(short)? as usize;
        rdr.read_u16::<LittleEndian>().map_err(short)?;
        rdr.read_u16::<LittleEndian>().map_err(short)?;
        let width  = rdr.read_u16::<LittleEndian>().map_err(short)?;
        let height = rdr.read_u16::<LittleEndian>().map_err(short)?;
        rdr.read_u32::<LittleEndian>().map_err(short)?;

        let mut raw = Vec::with_capacity(count);
        for _ in 0..count {
            let word       = rdr.read_u32::<LittleEndian>().map_err(short)?;
            let ref_offset = rdr.read_u16::<LittleEndian>().map_err(short)?;
            let ref_format = rdr.read_u16::<LittleEndian>().map_err(short)?;
            raw.push((word, ref_offset, ref_format));
        }
        // End-of-file and zero headers.
        let mut trailer = [0u8; 2 * FRAME_HEADER_LEN];
        rdr.read_exact(&mut trailer).map_err(short)?;

        let headers = resolve_references(&name, &raw, data.len())?;
        Ok(Self { name, data, width, height, decoded: vec![None; count], headers })
    }

    pub fn from_reader<R: Read>(name: impl Into<String>, mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::new(name, data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn frame_count(&self) -> usize {
        self.headers.len()
    }

    pub fn headers(&self) -> &[FrameHeader] {
        &self.headers
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Decoded pixels of frame `index`, `width * height` bytes.  Frames are
    /// cached after the first decode.
    pub fn frame(&mut self, index: usize) -> Result<&[u8]> {
        if index >= self.headers.len() {
            return Err(Error::not_found(format!("{} frame {index}", self.name)));
        }
        if self.frame_len() == 0 {
            // Nothing to decode, but a looping table is still corrupt.
            self.walk_chain(index)?;
            return Ok(&[]);
        }
        if self.decoded[index].is_none() {
            self.decode_chain(index)?;
        }
        match &self.decoded[index] {
            Some(buf) => Ok(buf),
            None      => Err(self.cycle(index)),
        }
    }

    pub fn decode_all(&mut self) -> Result<Vec<Vec<u8>>> {
        (0..self.headers.len()).map(|i| self.frame(i).map(<[u8]>::to_vec)).collect()
    }

    /// Frames from `index` back to an already decoded frame or a Format80
    /// root, nearest first.
    fn walk_chain(&self, index: usize) -> Result<Vec<usize>> {
        let limit = self.headers.len();
        let mut visited = vec![false; limit];
        let mut chain = Vec::new();
        let mut cur = index;

        while self.decoded[cur].is_none() {
            if visited[cur] || chain.len() >= limit {
                return Err(self.cycle(index));
            }
            visited[cur] = true;
            chain.push(cur);
            match self.headers[cur].reference {
                Some(next) => cur = next,
                None       => break,
            }
        }
        Ok(chain)
    }

    /// Decode forward along the chain of `index`, root first.
    fn decode_chain(&mut self, index: usize) -> Result<()> {
        let chain = self.walk_chain(index)?;
        for &frame in chain.iter().rev() {
            let header = self.headers[frame];
            let src = &self.data[header.offset as usize..];
            let buf = match header.reference {
                None => {
                    let mut buf = vec![0u8; self.frame_len()];
                    format80::decode_into(src, &mut buf).map_err(|e| self.corrupt(frame, e))?;
                    buf
                }
                Some(r) => {
                    let mut buf = match &self.decoded[r] {
                        Some(base) => base.clone(),
                        None       => return Err(self.cycle(index)),
                    };
                    format40::decode_into(src, &mut buf).map_err(|e| self.corrupt(frame, e))?;
                    buf
                }
            };
            self.decoded[frame] = Some(buf);
        }
        Ok(())
    }

    fn corrupt(&self, frame: usize, source: CodecError) -> Error {
        Error::corrupt(format!("{} frame {frame}", self.name), source)
    }

    fn cycle(&self, frame: usize) -> Error {
        self.corrupt(frame, CodecError::ReferenceCycle { frame, limit: self.headers.len() })
    }
}

impl std::fmt::Debug for SpriteFrameDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpriteFrameDecoder")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frames", &self.headers.len())
            .finish()
    }
}

fn resolve_references(
    name:     &str,
    raw:      &[(u32, u16, u16)],
    data_len: usize,
) -> Result<Vec<FrameHeader>> {
    let mut headers = Vec::with_capacity(raw.len());
    for (i, &(word, ref_offset, ref_format)) in raw.iter().enumerate() {
        let offset = word & OFFSET_MASK;
        let tag = (word >> 24) as u8;
        let format = CodecId::from_tag(tag).ok_or_else(|| {
            Error::malformed(name, format!("frame {i}: unknown format tag 0x{tag:02x}"))
        })?;
        if offset as usize > data_len {
            return Err(Error::malformed(name, format!(
                "frame {i}: data offset {offset} past end of {data_len} byte(s)")));
        }

        let reference = match format {
            CodecId::Format80 => None,
            CodecId::Format20 if i == 0 => {
                return Err(Error::malformed(name, "frame 0 cannot reference a previous frame"));
            }
            CodecId::Format20 => Some(i - 1),
            CodecId::Format40 => {
                let target = raw.iter().position(|&(w, _, _)| w & OFFSET_MASK == ref_offset as u32);
                Some(target.ok_or_else(|| Error::malformed(name, format!(
                    "frame {i}: reference offset {ref_offset} matches no frame")))?)
            }
        };
        headers.push(FrameHeader { offset, format, ref_offset, ref_format, reference });
    }
    Ok(headers)
}

fn truncated(name: &str, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::malformed(name, "truncated frame table")
    } else {
        Error::Io(e)
    }
}
