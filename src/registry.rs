//! The static runtime-id catalog: a bidirectional index between block states
//! and their NEMC runtime ids, built once at startup and immutable after.

use crate::block_state::{qualify, BlockState, PropsForSearch, StateParseError};
use crate::translator::Translator;
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::io::Read;
use thiserror::Error;

/// Runtime id of air in the NEMC catalog.
pub const AIR_RTID: u32 = 0;

/// The `Version` int stamped into disk palette entries (1.18.10.0 packed as
/// `major.minor.patch.revision`, one byte each).
pub const NEMC_BLOCK_VERSION: i32 = (1 << 24) | (18 << 16) | (10 << 8);

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog line {line}: {source}")]
    Parse {
        line: usize,
        source: StateParseError,
    },
    #[error("catalog line {line}: legacy value '{value}' out of range")]
    LegacyRange { line: usize, value: String },
    #[error("catalog could not be read: {0}")]
    Io(#[from] std::io::Error),
}

/// One catalog row: a block state plus its optional legacy numeric value.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub state: BlockState,
    pub legacy: Option<u16>,
}

/// Immutable state ⇄ runtime-id index.
///
/// Runtime ids are assigned by position after a stable sort on the canonical
/// state string, so the same catalog yields the same ids on every host.
pub struct Registry {
    states: Vec<BlockState>,
    legacy: Vec<Option<u16>>,
    by_key: HashMap<String, u32>,
}

impl Registry {
    pub fn from_entries(mut entries: Vec<CatalogEntry>) -> Self {
        entries.sort_by_key(|entry| lookup_key(&entry.state.name, &entry.state.props));

        let mut states = Vec::with_capacity(entries.len());
        let mut legacy = Vec::with_capacity(entries.len());
        let mut by_key = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key = lookup_key(&entry.state.name, &entry.state.props);
            if by_key.contains_key(&key) {
                log::warn!("duplicate catalog entry ignored: {}", key);
                continue;
            }
            by_key.insert(key, states.len() as u32);
            states.push(entry.state);
            legacy.push(entry.legacy);
        }
        Registry {
            states,
            legacy,
            by_key,
        }
    }

    /// Parse a text catalog: one state per line, optionally followed by
    /// whitespace and a legacy numeric value. Blank lines and `#` comments
    /// are skipped.
    pub fn from_catalog(text: &str) -> Result<Self, CatalogError> {
        let mut entries = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (state_text, legacy) = split_legacy_suffix(line);
            let legacy = match legacy {
                Some(value) => match value.parse::<u16>() {
                    Ok(v) if v <= 32767 => Some(v),
                    _ => {
                        return Err(CatalogError::LegacyRange {
                            line: i + 1,
                            value: value.to_string(),
                        })
                    }
                },
                None => None,
            };
            let state = BlockState::parse_strict(state_text)
                .map_err(|source| CatalogError::Parse { line: i + 1, source })?;
            entries.push(CatalogEntry { state, legacy });
        }
        Ok(Self::from_entries(entries))
    }

    /// Gunzip a catalog shipped compressed on disk, then parse it.
    pub fn from_catalog_gz(data: &[u8]) -> Result<Self, CatalogError> {
        let mut text = String::new();
        GzDecoder::new(data).read_to_string(&mut text)?;
        Self::from_catalog(&text)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn rtid_to_state(&self, rtid: u32) -> Option<&BlockState> {
        self.states.get(rtid as usize)
    }

    /// Exact match only. Qualified and unqualified names are both accepted.
    pub fn state_to_rtid(&self, name: &str, props: &PropsForSearch) -> Option<u32> {
        self.by_key.get(&lookup_key(name, props)).copied()
    }

    /// Runtime id of `minecraft:air`, when the catalog carries it.
    pub fn air_rtid(&self) -> Option<u32> {
        self.state_to_rtid("minecraft:air", &PropsForSearch::new())
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &BlockState)> {
        self.states
            .iter()
            .enumerate()
            .map(|(i, state)| (i as u32, state))
    }

    /// Register every catalog entry into a translator: always by state, and
    /// by legacy value where the catalog has one. Conflicts inside one
    /// catalog indicate duplicate rows and are logged, not fatal.
    pub fn seed_translator(&self, translator: &Translator) {
        for (rtid, state) in self.iter() {
            if translator
                .add_anchor_by_state(&state.name, state.props.clone(), rtid, false)
                .is_err()
            {
                log::warn!("catalog state anchor conflict for {}", state.canonical());
            }
            if let Some(legacy) = self.legacy[rtid as usize] {
                if translator
                    .add_anchor_by_legacy(&state.name, legacy, rtid)
                    .is_err()
                {
                    log::warn!(
                        "catalog legacy anchor conflict for {} value {}",
                        state.canonical(),
                        legacy
                    );
                }
            }
        }
    }
}

fn lookup_key(name: &str, props: &PropsForSearch) -> String {
    format!("{}{}", qualify(name), props.canonical())
}

/// Split a trailing whitespace-separated legacy value off a catalog line, if
/// the suffix is purely numeric.
fn split_legacy_suffix(line: &str) -> (&str, Option<&str>) {
    if let Some((head, tail)) = line.rsplit_once(char::is_whitespace) {
        if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
            return (head.trim_end(), Some(tail));
        }
    }
    (line, None)
}
