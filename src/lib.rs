//! Block-state translation and chunk palette codec for Bedrock-family
//! servers with the NEMC runtime-id numbering.
//!
//! The crate keeps bidirectional mappings between a block identity (base
//! name plus typed properties) and its 32-bit runtime id, resolves inexact
//! lookups through a deterministic fuzzy search, and (de)serializes 16³
//! sub-chunk volumes whose voxels are palette indices packed into 32-bit
//! words.
//!
//! ```
//! use voxelbridge::{Registry, Translator};
//!
//! let registry = Registry::from_catalog(
//!     "minecraft:air 0\nminecraft:stone 0\nminecraft:oak_log[axis=\"y\"] 0",
//! )
//! .unwrap();
//! let translator = Translator::new();
//! registry.seed_translator(&translator);
//!
//! let (state, _) = voxelbridge::BlockState::parse("oak_log[axis=\"y\"]");
//! let rtid = translator
//!     .precise_match_by_state(&state.name, &state.props)
//!     .unwrap();
//! assert_eq!(registry.rtid_to_state(rtid).unwrap().base_name(), "oak_log");
//! ```

pub mod block_entity;
pub mod block_state;
pub mod chunk;
pub mod nbt_le;
pub mod registry;
pub mod translator;

pub use block_entity::BlockEntity;
pub use block_state::{BlockState, MatchScore, PropValue, PropsForSearch, StateParseError};
pub use chunk::{
    decode_subchunk, decode_subchunk_with_table, encode_subchunk, encode_subchunk_network,
    BlockStorage, Chunk, ChunkError, Palette, PaletteEntryError, SerializedChunk, SubChunk,
};
pub use registry::{CatalogEntry, CatalogError, Registry, AIR_RTID, NEMC_BLOCK_VERSION};
pub use translator::{
    default_any_to_nemc, schem_to_nemc, AnchorConflict, FuzzyMatch, Translator, UNKNOWN_RTID,
};
