//! Little-endian NBT wire io over the `quartz_nbt` value model.
//!
//! Bedrock-family disk formats carry NBT with every integer little-endian
//! (plain sizes, no varints). `quartz_nbt`'s own io layer only speaks the
//! big-endian flavor, so the palette and block-entity codecs read and write
//! compounds through this module instead. Compound keys are written in sorted
//! order, which keeps encoding deterministic.

use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use thiserror::Error;

const MAX_DEPTH: usize = 128;

const TAG_END: u8 = 0x00;
const TAG_BYTE: u8 = 0x01;
const TAG_SHORT: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_LONG: u8 = 0x04;
const TAG_FLOAT: u8 = 0x05;
const TAG_DOUBLE: u8 = 0x06;
const TAG_BYTE_ARRAY: u8 = 0x07;
const TAG_STRING: u8 = 0x08;
const TAG_LIST: u8 = 0x09;
const TAG_COMPOUND: u8 = 0x0A;
const TAG_INT_ARRAY: u8 = 0x0B;
const TAG_LONG_ARRAY: u8 = 0x0C;

#[derive(Debug, Error)]
pub enum NbtLeError {
    #[error("unexpected end of NBT data at byte {0}")]
    UnexpectedEof(usize),
    #[error("unknown NBT tag type {tag} at byte {pos}")]
    UnknownTag { tag: u8, pos: usize },
    #[error("expected a compound root, found tag type {0}")]
    NotACompound(u8),
    #[error("negative length in NBT data at byte {0}")]
    NegativeLength(usize),
    #[error("NBT string is not valid UTF-8")]
    InvalidString(#[from] std::string::FromUtf8Error),
    #[error("NBT nesting deeper than {0} levels")]
    TooDeep(usize),
}

// ─── Reading ────────────────────────────────────────────────────────────────

/// Cursor over little-endian NBT bytes. Multiple root compounds can be read
/// back to back, which is how the block-entity sidecar is laid out.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Read one named root compound.
    pub fn read_compound(&mut self) -> Result<(String, NbtCompound), NbtLeError> {
        let tag = self.read_u8()?;
        if tag != TAG_COMPOUND {
            return Err(NbtLeError::NotACompound(tag));
        }
        let name = self.read_string()?;
        let compound = self.read_compound_body(0)?;
        Ok((name, compound))
    }

    fn read_compound_body(&mut self, depth: usize) -> Result<NbtCompound, NbtLeError> {
        if depth > MAX_DEPTH {
            return Err(NbtLeError::TooDeep(MAX_DEPTH));
        }
        let mut compound = NbtCompound::new();
        loop {
            let tag_type = self.read_u8()?;
            if tag_type == TAG_END {
                return Ok(compound);
            }
            let key = self.read_string()?;
            let value = self.read_payload(tag_type, depth + 1)?;
            compound.insert(key, value);
        }
    }

    fn read_payload(&mut self, tag_type: u8, depth: usize) -> Result<NbtTag, NbtLeError> {
        if depth > MAX_DEPTH {
            return Err(NbtLeError::TooDeep(MAX_DEPTH));
        }
        Ok(match tag_type {
            TAG_BYTE => NbtTag::Byte(self.read_u8()? as i8),
            TAG_SHORT => NbtTag::Short(i16::from_le_bytes(self.read_array()?)),
            TAG_INT => NbtTag::Int(i32::from_le_bytes(self.read_array()?)),
            TAG_LONG => NbtTag::Long(i64::from_le_bytes(self.read_array()?)),
            TAG_FLOAT => NbtTag::Float(f32::from_le_bytes(self.read_array()?)),
            TAG_DOUBLE => NbtTag::Double(f64::from_le_bytes(self.read_array()?)),
            TAG_BYTE_ARRAY => {
                let len = self.read_len()?;
                let mut out = Vec::with_capacity(len.min(self.data.len() - self.pos));
                for _ in 0..len {
                    out.push(self.read_u8()? as i8);
                }
                NbtTag::ByteArray(out)
            }
            TAG_STRING => NbtTag::String(self.read_string()?),
            TAG_LIST => {
                let elem_type = self.read_u8()?;
                let len = self.read_len()?;
                let mut tags = Vec::with_capacity(len.min(self.data.len() - self.pos));
                for _ in 0..len {
                    tags.push(self.read_payload(elem_type, depth + 1)?);
                }
                NbtTag::List(NbtList::from(tags))
            }
            TAG_COMPOUND => NbtTag::Compound(self.read_compound_body(depth + 1)?),
            TAG_INT_ARRAY => {
                let len = self.read_len()?;
                let mut out = Vec::with_capacity(len.min((self.data.len() - self.pos) / 4));
                for _ in 0..len {
                    out.push(i32::from_le_bytes(self.read_array()?));
                }
                NbtTag::IntArray(out)
            }
            TAG_LONG_ARRAY => {
                let len = self.read_len()?;
                let mut out = Vec::with_capacity(len.min((self.data.len() - self.pos) / 8));
                for _ in 0..len {
                    out.push(i64::from_le_bytes(self.read_array()?));
                }
                NbtTag::LongArray(out)
            }
            other => {
                return Err(NbtLeError::UnknownTag {
                    tag: other,
                    pos: self.pos.saturating_sub(1),
                })
            }
        })
    }

    fn read_u8(&mut self) -> Result<u8, NbtLeError> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or(NbtLeError::UnexpectedEof(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], NbtLeError> {
        if self.pos + N > self.data.len() {
            return Err(NbtLeError::UnexpectedEof(self.pos));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize, NbtLeError> {
        let at = self.pos;
        let len = i32::from_le_bytes(self.read_array()?);
        if len < 0 {
            return Err(NbtLeError::NegativeLength(at));
        }
        Ok(len as usize)
    }

    fn read_string(&mut self) -> Result<String, NbtLeError> {
        let len = u16::from_le_bytes(self.read_array()?) as usize;
        if self.pos + len > self.data.len() {
            return Err(NbtLeError::UnexpectedEof(self.pos));
        }
        let bytes = self.data[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(String::from_utf8(bytes)?)
    }
}

/// Decode a single named root compound from the front of `data`.
pub fn decode(data: &[u8]) -> Result<(String, NbtCompound), NbtLeError> {
    Reader::new(data).read_compound()
}

// ─── Writing ────────────────────────────────────────────────────────────────

/// Append a named root compound to `out`.
pub fn write_compound(out: &mut Vec<u8>, name: &str, compound: &NbtCompound) {
    out.push(TAG_COMPOUND);
    write_string(out, name);
    write_compound_body(out, compound);
}

/// Encode a single named root compound.
pub fn encode(name: &str, compound: &NbtCompound) -> Vec<u8> {
    let mut out = Vec::new();
    write_compound(&mut out, name, compound);
    out
}

fn write_compound_body(out: &mut Vec<u8>, compound: &NbtCompound) {
    let mut keys: Vec<&String> = compound.inner().keys().collect();
    keys.sort_unstable();
    for key in keys {
        let tag = &compound.inner()[key];
        out.push(tag_type(tag));
        write_string(out, key);
        write_payload(out, tag);
    }
    out.push(TAG_END);
}

fn write_payload(out: &mut Vec<u8>, tag: &NbtTag) {
    match tag {
        NbtTag::Byte(b) => out.push(*b as u8),
        NbtTag::Short(s) => out.extend_from_slice(&s.to_le_bytes()),
        NbtTag::Int(i) => out.extend_from_slice(&i.to_le_bytes()),
        NbtTag::Long(l) => out.extend_from_slice(&l.to_le_bytes()),
        NbtTag::Float(f) => out.extend_from_slice(&f.to_le_bytes()),
        NbtTag::Double(d) => out.extend_from_slice(&d.to_le_bytes()),
        NbtTag::ByteArray(arr) => {
            out.extend_from_slice(&(arr.len() as i32).to_le_bytes());
            out.extend(arr.iter().map(|b| *b as u8));
        }
        NbtTag::String(s) => write_string(out, s),
        NbtTag::List(list) => {
            let elem_type = list.iter().next().map(tag_type).unwrap_or(TAG_END);
            out.push(elem_type);
            out.extend_from_slice(&(list.len() as i32).to_le_bytes());
            for elem in list.iter() {
                write_payload(out, elem);
            }
        }
        NbtTag::Compound(compound) => write_compound_body(out, compound),
        NbtTag::IntArray(arr) => {
            out.extend_from_slice(&(arr.len() as i32).to_le_bytes());
            for i in arr {
                out.extend_from_slice(&i.to_le_bytes());
            }
        }
        NbtTag::LongArray(arr) => {
            out.extend_from_slice(&(arr.len() as i32).to_le_bytes());
            for l in arr {
                out.extend_from_slice(&l.to_le_bytes());
            }
        }
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn tag_type(tag: &NbtTag) -> u8 {
    match tag {
        NbtTag::Byte(_) => TAG_BYTE,
        NbtTag::Short(_) => TAG_SHORT,
        NbtTag::Int(_) => TAG_INT,
        NbtTag::Long(_) => TAG_LONG,
        NbtTag::Float(_) => TAG_FLOAT,
        NbtTag::Double(_) => TAG_DOUBLE,
        NbtTag::ByteArray(_) => TAG_BYTE_ARRAY,
        NbtTag::String(_) => TAG_STRING,
        NbtTag::List(_) => TAG_LIST,
        NbtTag::Compound(_) => TAG_COMPOUND,
        NbtTag::IntArray(_) => TAG_INT_ARRAY,
        NbtTag::LongArray(_) => TAG_LONG_ARRAY,
    }
}
