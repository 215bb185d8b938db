//! Chunk assembly: a vertical stack of sub-chunks plus the block-entity NBT
//! sidecar, mapped to and from their serialized byte blobs.

pub mod palette;
pub mod storage;
pub mod subchunk;

pub use palette::Palette;
pub use storage::{voxel_index, BlockStorage, STORAGE_VOLUME};
pub use subchunk::{
    decode_subchunk, decode_subchunk_with_table, encode_subchunk, encode_subchunk_network,
    ChunkError, PaletteEntryError, SubChunk, SUB_CHUNK_VERSION,
};

use crate::block_entity::BlockEntity;
use crate::nbt_le;
use crate::registry::Registry;
use crate::translator::Translator;
use quartz_nbt::NbtCompound;

/// A chunk's wire shape: one byte blob per sub-chunk slot (empty for absent
/// sub-chunks) and one concatenated block-entity NBT blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializedChunk {
    pub sub_chunks: Vec<Vec<u8>>,
    pub block_nbt: Vec<u8>,
}

/// A vertical stack of sub-chunks addressed by Y index, plus the chunk's
/// block entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    sub_chunks: Vec<Option<SubChunk>>,
    block_entities: Vec<BlockEntity>,
}

impl Chunk {
    /// An empty chunk with `count` absent sub-chunk slots.
    pub fn new(count: usize) -> Self {
        Chunk {
            sub_chunks: vec![None; count],
            block_entities: Vec::new(),
        }
    }

    pub fn sub_chunk_count(&self) -> usize {
        self.sub_chunks.len()
    }

    pub fn sub_chunk(&self, y_index: usize) -> Option<&SubChunk> {
        self.sub_chunks.get(y_index)?.as_ref()
    }

    /// The sub-chunk at `y_index`, materialized as air if absent. Out-of-range
    /// indices extend the stack.
    pub fn sub_chunk_mut(&mut self, y_index: usize) -> &mut SubChunk {
        if y_index >= self.sub_chunks.len() {
            self.sub_chunks.resize(y_index + 1, None);
        }
        self.sub_chunks[y_index].get_or_insert_with(|| SubChunk::empty(y_index as u8))
    }

    pub fn set_sub_chunk(&mut self, y_index: usize, sub: SubChunk) {
        if y_index >= self.sub_chunks.len() {
            self.sub_chunks.resize(y_index + 1, None);
        }
        self.sub_chunks[y_index] = Some(sub);
    }

    pub fn block_entities(&self) -> &[BlockEntity] {
        &self.block_entities
    }

    pub fn add_block_entity(&mut self, entity: BlockEntity) {
        self.block_entities.push(entity);
    }

    /// Iterate `(position, fields)` for every block entity, the fields
    /// rendered as a full sidecar compound.
    pub fn block_entity_nbt(&self) -> impl Iterator<Item = ((i32, i32, i32), NbtCompound)> + '_ {
        self.block_entities
            .iter()
            .map(|entity| (entity.position, entity.to_nbt()))
    }

    /// Decode serialized sub-chunk blobs and the block-entity sidecar. Empty
    /// blobs stay absent slots.
    pub fn decode(serialized: &SerializedChunk, translator: &Translator) -> Result<Self, ChunkError> {
        let mut sub_chunks = Vec::with_capacity(serialized.sub_chunks.len());
        for (y_index, blob) in serialized.sub_chunks.iter().enumerate() {
            if blob.is_empty() {
                sub_chunks.push(None);
                continue;
            }
            let mut sub = decode_subchunk(blob, translator)?;
            // The slot is authoritative in chunk context; version-8 blobs
            // carry no Y index of their own.
            sub.y_index = y_index as u8;
            sub_chunks.push(Some(sub));
        }
        Ok(Chunk {
            sub_chunks,
            block_entities: decode_block_nbt(&serialized.block_nbt)?,
        })
    }

    /// Encode every present sub-chunk to its disk blob (absent slots become
    /// the zero-length slice) plus the block-entity sidecar.
    pub fn encode(&self, registry: &Registry) -> Result<SerializedChunk, ChunkError> {
        let mut sub_chunks = Vec::with_capacity(self.sub_chunks.len());
        for slot in &self.sub_chunks {
            match slot {
                Some(sub) => sub_chunks.push(encode_subchunk(sub, registry)?),
                None => sub_chunks.push(Vec::new()),
            }
        }
        Ok(SerializedChunk {
            sub_chunks,
            block_nbt: encode_block_nbt(&self.block_entities),
        })
    }
}

/// Decode the block-entity sidecar: root compounds back to back, no length
/// prefix and no list wrapper, until the reader runs dry.
pub fn decode_block_nbt(data: &[u8]) -> Result<Vec<BlockEntity>, ChunkError> {
    let mut entities = Vec::new();
    let mut reader = nbt_le::Reader::new(data);
    while !reader.is_exhausted() {
        let (_, compound) = reader.read_compound()?;
        entities.push(BlockEntity::from_nbt(&compound));
    }
    Ok(entities)
}

pub fn encode_block_nbt(entities: &[BlockEntity]) -> Vec<u8> {
    let mut out = Vec::new();
    for entity in entities {
        nbt_le::write_compound(&mut out, "", &entity.to_nbt());
    }
    out
}
