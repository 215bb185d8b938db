//! Anchor tables translating block identities into NEMC runtime ids.
//!
//! A [`Translator`] maps a base name to a group of registered anchors and
//! resolves queries that are exact (canonical property set, legacy numeric
//! value) or inexact, via a deterministic fuzzy search. Registration is
//! accepted from any thread at any time; resolution only ever takes read
//! locks.

use crate::block_state::{qualify, MatchScore, PropsForSearch};
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use thiserror::Error;

/// In-band "unset" marker inside the legacy-value table.
pub const UNKNOWN_RTID: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("conflict runtime id")]
pub struct AnchorConflict;

/// Result of a fuzzy state lookup: the winning anchor's runtime id plus the
/// comparison score that won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyMatch {
    pub rtid: u32,
    pub score: MatchScore,
}

#[derive(Default)]
struct GroupInner {
    /// Dense table indexed by legacy value, gaps filled with [`UNKNOWN_RTID`].
    legacy_map: Vec<u32>,
    /// Anchors in insertion order. Order is the fuzzy-search tiebreaker, and
    /// the list doubles as the fallback table for legacy lookups.
    anchors: Vec<(PropsForSearch, u32)>,
    /// Canonical property rendering to runtime id, for exact lookups.
    quick: HashMap<String, u32>,
}

/// All anchors registered under one base name. The three tables are guarded
/// as a unit so exact and fuzzy views never disagree.
pub struct BaseNameGroup {
    inner: RwLock<GroupInner>,
}

impl BaseNameGroup {
    fn new() -> Self {
        BaseNameGroup {
            inner: RwLock::new(GroupInner::default()),
        }
    }

    fn add_anchor_by_legacy(&self, legacy: u16, rtid: u32) -> Result<bool, AnchorConflict> {
        let idx = legacy as usize;
        {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(&slot) = inner.legacy_map.get(idx) {
                if slot != UNKNOWN_RTID {
                    return if slot == rtid { Ok(true) } else { Err(AnchorConflict) };
                }
            }
        }
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.legacy_map.len() <= idx {
            inner.legacy_map.resize(idx + 1, UNKNOWN_RTID);
        }
        // Re-check: another writer may have claimed the slot in between.
        let slot = inner.legacy_map[idx];
        if slot != UNKNOWN_RTID {
            return if slot == rtid { Ok(true) } else { Err(AnchorConflict) };
        }
        inner.legacy_map[idx] = rtid;
        Ok(false)
    }

    fn add_anchor_by_state(
        &self,
        props: PropsForSearch,
        rtid: u32,
        overwrite: bool,
    ) -> Result<bool, AnchorConflict> {
        let key = props.canonical();
        {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            match inner.quick.get(&key) {
                Some(&current) if current == rtid => return Ok(true),
                Some(_) if !overwrite => return Err(AnchorConflict),
                _ => {}
            }
        }
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match inner.quick.get(&key) {
            Some(&current) if current == rtid => return Ok(true),
            Some(_) if !overwrite => return Err(AnchorConflict),
            _ => {}
        }
        // On overwrite the new anchor shadows the old one for exact lookups;
        // the fuzzy list keeps both.
        inner.anchors.push((props, rtid));
        inner.quick.insert(key, rtid);
        Ok(false)
    }

    fn precise_by_legacy(&self, legacy: u16) -> Option<u32> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match inner.legacy_map.get(legacy as usize) {
            Some(&rtid) if rtid != UNKNOWN_RTID => Some(rtid),
            _ => None,
        }
    }

    fn fuzzy_by_legacy(&self, legacy: u16) -> Option<u32> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(&rtid) = inner.legacy_map.get(legacy as usize) {
            if rtid != UNKNOWN_RTID {
                return Some(rtid);
            }
        }
        if let Some((_, rtid)) = inner.anchors.get(legacy as usize) {
            return Some(*rtid);
        }
        inner.anchors.first().map(|(_, rtid)| *rtid)
    }

    fn precise_by_state(&self, props: &PropsForSearch) -> Option<u32> {
        let key = props.canonical();
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.quick.get(&key).copied()
    }

    fn fuzzy_by_state(&self, props: &PropsForSearch) -> Option<FuzzyMatch> {
        let key = props.canonical();
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(&rtid) = inner.quick.get(&key) {
            return Some(FuzzyMatch {
                rtid,
                score: MatchScore {
                    same: props.len() as u32,
                    ..MatchScore::default()
                },
            });
        }
        let mut best: Option<FuzzyMatch> = None;
        for (anchor, rtid) in &inner.anchors {
            let score = anchor.compare(props);
            let better = match &best {
                None => true,
                Some(current) => score.beats(&current.score),
            };
            if better {
                best = Some(FuzzyMatch { rtid: *rtid, score });
            }
        }
        best
    }

    #[cfg(test)]
    fn anchor_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .anchors
            .len()
    }
}

/// A thread-safe mapping from base names to anchor groups.
pub struct Translator {
    groups: RwLock<HashMap<SmolStr, Arc<BaseNameGroup>>>,
}

impl Translator {
    pub fn new() -> Self {
        Translator {
            groups: RwLock::new(HashMap::new()),
        }
    }

    fn ensure_group(&self, name: &str) -> Arc<BaseNameGroup> {
        let key = qualify(name);
        {
            let groups = self.groups.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(group) = groups.get(&key) {
                return Arc::clone(group);
            }
        }
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            groups
                .entry(key)
                .or_insert_with(|| Arc::new(BaseNameGroup::new())),
        )
    }

    fn group(&self, name: &str) -> Option<Arc<BaseNameGroup>> {
        let key = qualify(name);
        let groups = self.groups.read().unwrap_or_else(PoisonError::into_inner);
        groups.get(&key).map(Arc::clone)
    }

    /// Register a legacy-value anchor. `Ok(false)` stores a fresh mapping,
    /// `Ok(true)` means the identical mapping already existed; a different
    /// runtime id already in the slot is a conflict and the slot keeps its
    /// prior value.
    pub fn add_anchor_by_legacy(
        &self,
        name: &str,
        legacy: u16,
        rtid: u32,
    ) -> Result<bool, AnchorConflict> {
        self.ensure_group(name).add_anchor_by_legacy(legacy, rtid)
    }

    /// Register a property-set anchor. With `overwrite`, a new runtime id for
    /// an already-known property set shadows the old one on exact lookups
    /// while the fuzzy list keeps both anchors.
    pub fn add_anchor_by_state(
        &self,
        name: &str,
        props: PropsForSearch,
        rtid: u32,
        overwrite: bool,
    ) -> Result<bool, AnchorConflict> {
        self.ensure_group(name)
            .add_anchor_by_state(props, rtid, overwrite)
    }

    pub fn precise_match_by_legacy(&self, name: &str, legacy: u16) -> Option<u32> {
        self.group(name)?.precise_by_legacy(legacy)
    }

    pub fn precise_match_by_state(&self, name: &str, props: &PropsForSearch) -> Option<u32> {
        self.group(name)?.precise_by_state(props)
    }

    /// Legacy lookup with fallbacks: the exact slot, else the anchor at index
    /// `legacy` in insertion order, else the first registered anchor.
    pub fn try_best_by_legacy(&self, name: &str, legacy: u16) -> Option<u32> {
        self.group(name)?.fuzzy_by_legacy(legacy)
    }

    /// State lookup that degrades to the closest registered anchor: maximal
    /// `same` count, then minimal mismatch total, earliest anchor on ties.
    pub fn try_best_by_state(&self, name: &str, props: &PropsForSearch) -> Option<FuzzyMatch> {
        self.group(name)?.fuzzy_by_state(props)
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Process-wide instances ─────────────────────────────────────────────────

static DEFAULT_ANY_TO_NEMC: OnceLock<Translator> = OnceLock::new();
static SCHEM_TO_NEMC: OnceLock<Translator> = OnceLock::new();

/// The shared translator used for general decode paths.
pub fn default_any_to_nemc() -> &'static Translator {
    DEFAULT_ANY_TO_NEMC.get_or_init(Translator::new)
}

/// The shared translator used for schematic import. Independent of
/// [`default_any_to_nemc`].
pub fn schem_to_nemc() -> &'static Translator {
    SCHEM_TO_NEMC.get_or_init(Translator::new)
}
