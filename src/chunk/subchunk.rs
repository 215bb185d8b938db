//! The sub-chunk codec: one or two block-storage layers over a 16×16×16
//! volume, serialized under the disk encoding (NBT palettes, plain
//! little-endian sizes) or the network encoding (zig-zag varint palettes).

use super::palette::Palette;
use super::storage::BlockStorage;
use crate::block_state::BlockState;
use crate::nbt_le::{self, NbtLeError};
use crate::registry::{Registry, AIR_RTID, NEMC_BLOCK_VERSION};
use crate::translator::Translator;
use quartz_nbt::{NbtCompound, NbtTag};
use thiserror::Error;

/// Version byte written for every encoded sub-chunk.
pub const SUB_CHUNK_VERSION: u8 = 8;

/// A single palette entry failed to decode. Continuable failures (an entry
/// that parses but names no known state) degrade that entry to air; the rest
/// abort the sub-chunk.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PaletteEntryError {
    message: String,
    continuable: bool,
}

impl PaletteEntryError {
    fn continuable(message: impl Into<String>) -> Self {
        PaletteEntryError {
            message: message.into(),
            continuable: true,
        }
    }

    fn fatal(message: impl Into<String>) -> Self {
        PaletteEntryError {
            message: message.into(),
            continuable: false,
        }
    }

    pub fn can_continue(&self) -> bool {
        self.continuable
    }
}

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("sub-chunk data truncated at byte {0}")]
    Truncated(usize),
    #[error("unsupported sub-chunk version {0}")]
    UnsupportedVersion(u8),
    #[error("invalid storage count {0}")]
    StorageCount(u8),
    #[error("invalid palette header: {0}")]
    PaletteHeader(String),
    #[error("error decoding block palette entry: {0}")]
    PaletteEntry(PaletteEntryError),
    #[error("block entity nbt: {0}")]
    BlockNbt(#[from] NbtLeError),
}

/// A 16×16×16 sub-volume: layer 0 holds the blocks, the optional layer 1 the
/// waterlog overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubChunk {
    pub y_index: u8,
    storages: Vec<BlockStorage>,
}

impl SubChunk {
    /// A sub-chunk of uniform air with a single storage layer.
    pub fn empty(y_index: u8) -> Self {
        SubChunk {
            y_index,
            storages: vec![BlockStorage::air()],
        }
    }

    pub fn storages(&self) -> &[BlockStorage] {
        &self.storages
    }

    pub fn layer(&self, layer: usize) -> Option<&BlockStorage> {
        self.storages.get(layer)
    }

    /// Mutable access to a layer, materializing layer 1 (as air) on first
    /// touch. Only layers 0 and 1 exist.
    pub fn layer_mut(&mut self, layer: usize) -> Option<&mut BlockStorage> {
        if layer >= 2 {
            return None;
        }
        while self.storages.len() <= layer {
            self.storages.push(BlockStorage::air());
        }
        self.storages.get_mut(layer)
    }

    pub fn block(&self, x: u8, y: u8, z: u8, layer: usize) -> u32 {
        self.storages
            .get(layer)
            .map(|s| s.at(x, y, z))
            .unwrap_or(AIR_RTID)
    }

    pub fn set_block(&mut self, x: u8, y: u8, z: u8, layer: usize, rtid: u32) {
        if let Some(storage) = self.layer_mut(layer) {
            storage.set_at(x, y, z, rtid);
        }
    }
}

// ─── Decoding ───────────────────────────────────────────────────────────────

/// Decode a disk- or network-encoded sub-chunk. NBT palette entries resolve
/// through the translator's exact state match.
pub fn decode_subchunk(data: &[u8], translator: &Translator) -> Result<SubChunk, ChunkError> {
    decode_inner(data, translator, None)
}

/// Like [`decode_subchunk`], additionally mapping network-palette runtime ids
/// through a NEMC→standard translation table.
pub fn decode_subchunk_with_table(
    data: &[u8],
    translator: &Translator,
    table: &[u32],
) -> Result<SubChunk, ChunkError> {
    decode_inner(data, translator, Some(table))
}

fn decode_inner(
    data: &[u8],
    translator: &Translator,
    table: Option<&[u32]>,
) -> Result<SubChunk, ChunkError> {
    let mut cursor = ByteCursor::new(data);
    let version = cursor.read_u8()?;
    let (storage_count, y_index) = match version {
        1 => (1u8, 0u8),
        8 => (cursor.read_u8()?, 0),
        9 => {
            let count = cursor.read_u8()?;
            (count, cursor.read_u8()?)
        }
        other => return Err(ChunkError::UnsupportedVersion(other)),
    };
    if !(1..=2).contains(&storage_count) {
        return Err(ChunkError::StorageCount(storage_count));
    }

    let mut storages = Vec::with_capacity(storage_count as usize);
    for _ in 0..storage_count {
        storages.push(decode_storage(&mut cursor, translator, table)?);
    }
    Ok(SubChunk { y_index, storages })
}

fn decode_storage(
    cursor: &mut ByteCursor<'_>,
    translator: &Translator,
    table: Option<&[u32]>,
) -> Result<BlockStorage, ChunkError> {
    let header = cursor.read_u8()?;
    let bits = header >> 1;
    let network = header & 1 == 1;
    if !Palette::is_legal_bits(bits) {
        return Err(ChunkError::PaletteHeader(format!(
            "bit width {} is not one of {:?}",
            bits,
            super::palette::LEGAL_BITS
        )));
    }

    let palette_count = if bits == 0 {
        1usize
    } else if network {
        let count = cursor.read_zigzag32()?;
        if count <= 0 {
            return Err(ChunkError::PaletteHeader(format!(
                "palette entry count {}",
                count
            )));
        }
        count as usize
    } else {
        let count = cursor.read_u32_le()?;
        if count == 0 {
            return Err(ChunkError::PaletteHeader("palette entry count 0".into()));
        }
        count as usize
    };
    let capacity = if bits == 0 { 1 } else { 1usize << bits };
    if palette_count > capacity {
        return Err(ChunkError::PaletteHeader(format!(
            "{} palette entries exceed {} bits",
            palette_count, bits
        )));
    }

    let mut words = vec![0u32; BlockStorage::word_count(bits)];
    for word in &mut words {
        *word = cursor.read_u32_le()?;
    }

    let mut values = Vec::with_capacity(palette_count);
    for _ in 0..palette_count {
        let rtid = if network {
            let raw = cursor.read_zigzag32()? as u32;
            match table {
                None => raw,
                Some(table) => match table.get(raw as usize) {
                    Some(&mapped) => mapped,
                    None => {
                        log::warn!("network palette id {} outside translation table", raw);
                        AIR_RTID
                    }
                },
            }
        } else {
            match decode_palette_entry(cursor, translator) {
                Ok(rtid) => rtid,
                Err(err) if err.can_continue() => {
                    log::warn!("{}", err);
                    AIR_RTID
                }
                Err(err) => return Err(ChunkError::PaletteEntry(err)),
            }
        };
        values.push(rtid);
    }

    Ok(BlockStorage::from_parts(
        Palette::from_parts(bits, values),
        words,
    ))
}

fn decode_palette_entry(
    cursor: &mut ByteCursor<'_>,
    translator: &Translator,
) -> Result<u32, PaletteEntryError> {
    let mut reader = nbt_le::Reader::new(cursor.remaining());
    let (_, compound) = reader
        .read_compound()
        .map_err(|e| PaletteEntryError::fatal(e.to_string()))?;
    cursor.advance(reader.pos());

    let state = BlockState::from_nbt(&compound).map_err(PaletteEntryError::continuable)?;
    translator
        .precise_match_by_state(&state.name, &state.props)
        .ok_or_else(|| {
            PaletteEntryError::continuable(format!("no runtime id for {}", state.canonical()))
        })
}

// ─── Encoding ───────────────────────────────────────────────────────────────

/// Encode a sub-chunk under the disk encoding: version 8, NBT palettes, the
/// registry supplying each runtime id's state.
pub fn encode_subchunk(sub: &SubChunk, registry: &Registry) -> Result<Vec<u8>, ChunkError> {
    if !(1..=2).contains(&sub.storages.len()) {
        return Err(ChunkError::StorageCount(sub.storages.len() as u8));
    }
    let mut out = vec![SUB_CHUNK_VERSION, sub.storages.len() as u8];
    for storage in &sub.storages {
        let bits = storage.palette().bits();
        out.push(bits << 1);
        if bits != 0 {
            out.extend_from_slice(&(storage.palette().len() as u32).to_le_bytes());
        }
        for word in storage.words() {
            out.extend_from_slice(&word.to_le_bytes());
        }
        for &rtid in storage.palette().values() {
            nbt_le::write_compound(&mut out, "", &palette_entry(rtid, registry));
        }
    }
    Ok(out)
}

/// Encode a sub-chunk under the network encoding: palettes as zig-zag varint
/// runtime ids, no NBT.
pub fn encode_subchunk_network(sub: &SubChunk) -> Vec<u8> {
    let mut out = vec![SUB_CHUNK_VERSION, sub.storages.len() as u8];
    for storage in &sub.storages {
        let bits = storage.palette().bits();
        out.push((bits << 1) | 1);
        if bits != 0 {
            write_zigzag32(&mut out, storage.palette().len() as i32);
        }
        for word in storage.words() {
            out.extend_from_slice(&word.to_le_bytes());
        }
        for &rtid in storage.palette().values() {
            write_zigzag32(&mut out, rtid as i32);
        }
    }
    out
}

fn palette_entry(rtid: u32, registry: &Registry) -> NbtCompound {
    let state = match registry.rtid_to_state(rtid) {
        Some(state) => state.clone(),
        None => {
            log::warn!("runtime id {} missing from the catalog, writing air", rtid);
            BlockState::new("minecraft:air")
        }
    };
    let mut entry = state.to_nbt();
    entry.insert("Version", NbtTag::Int(NEMC_BLOCK_VERSION));
    entry
}

// ─── Byte cursor ────────────────────────────────────────────────────────────

pub(crate) struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, pos: 0 }
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn read_u8(&mut self) -> Result<u8, ChunkError> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or(ChunkError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_u32_le(&mut self) -> Result<u32, ChunkError> {
        if self.pos + 4 > self.data.len() {
            return Err(ChunkError::Truncated(self.pos));
        }
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_zigzag32(&mut self) -> Result<i32, ChunkError> {
        let mut value = 0u32;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok(((value >> 1) as i32) ^ -((value & 1) as i32));
            }
        }
        Err(ChunkError::PaletteHeader("varint longer than 5 bytes".into()))
    }
}

fn write_zigzag32(out: &mut Vec<u8>, value: i32) {
    let mut encoded = ((value << 1) ^ (value >> 31)) as u32;
    loop {
        if encoded & !0x7F == 0 {
            out.push(encoded as u8);
            return;
        }
        out.push((encoded as u8 & 0x7F) | 0x80);
        encoded >>= 7;
    }
}
