#![forbid(unsafe_code)]

//! Entry identifiers and the id → frame position map.
//!
//! [`PositionMap`] is the value type that flows through every stage of the
//! timeline pipeline: the store holds one, the layout solvers take one and
//! return a new one, and the host renders from a read-only snapshot of one.
//!
//! # Invariants
//!
//! 1. Iteration order is insertion order. Removing an entry preserves the
//!    relative order of the remaining entries.
//! 2. Equality is by value: two maps holding the same id/frame pairs compare
//!    equal regardless of insertion order.
//! 3. Frame uniqueness is *not* enforced here. Transient duplicates are legal
//!    during preview; committed maps are deduplicated by the conflict resolver.

use std::borrow::Borrow;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Integer coordinate on the timeline axis. The unit is opaque.
pub type Frame = i64;

/// Stable identifier for a timeline entry.
///
/// Ids are minted by whatever produces entries; this crate only references
/// them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Wrap an externally owned identifier.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntryId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntryId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl From<String> for EntryId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Insertion-ordered mapping from entry id to frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionMap {
    entries: IndexMap<EntryId, Frame>,
}

impl PositionMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty map with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
        }
    }

    /// Insert or overwrite an entry, returning the previous frame.
    ///
    /// Overwriting keeps the entry's original insertion slot.
    pub fn insert(&mut self, id: impl Into<EntryId>, frame: Frame) -> Option<Frame> {
        self.entries.insert(id.into(), frame)
    }

    /// Remove an entry, preserving the order of the rest.
    pub fn remove(&mut self, id: &str) -> Option<Frame> {
        self.entries.shift_remove(id)
    }

    /// Frame of `id`, if present.
    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Frame> {
        self.entries.get(id).copied()
    }

    /// Whether `id` has a position.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Insertion index of `id`.
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.entries.get_index_of(id)
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(id, frame)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntryId, Frame)> + '_ {
        self.entries.iter().map(|(id, frame)| (id, *frame))
    }

    /// Iterate ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &EntryId> + '_ {
        self.entries.keys()
    }

    /// Entries ordered by frame. Ties keep insertion order.
    #[must_use]
    pub fn sorted_by_frame(&self) -> Vec<(&EntryId, Frame)> {
        let mut sorted: Vec<(&EntryId, Frame)> = self.iter().collect();
        sorted.sort_by_key(|&(_, frame)| frame);
        sorted
    }

    /// First entry (in insertion order) sitting exactly on `frame`.
    #[must_use]
    pub fn entry_at(&self, frame: Frame) -> Option<&EntryId> {
        self.entries
            .iter()
            .find_map(|(id, f)| (*f == frame).then_some(id))
    }

    /// Lowest frame in the map.
    #[must_use]
    pub fn min_frame(&self) -> Option<Frame> {
        self.entries.values().copied().min()
    }

    /// Highest frame in the map.
    #[must_use]
    pub fn max_frame(&self) -> Option<Frame> {
        self.entries.values().copied().max()
    }

    /// Whether any two entries share a frame.
    #[must_use]
    pub fn has_duplicate_frames(&self) -> bool {
        let mut frames: Vec<Frame> = self.entries.values().copied().collect();
        frames.sort_unstable();
        frames.windows(2).any(|pair| pair[0] == pair[1])
    }
}

impl FromIterator<(EntryId, Frame)> for PositionMap {
    fn from_iter<I: IntoIterator<Item = (EntryId, Frame)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, Frame)> for PositionMap {
    fn from_iter<I: IntoIterator<Item = (&'a str, Frame)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(id, frame)| (EntryId::from(id), frame))
            .collect()
    }
}

impl<const N: usize> From<[(&str, Frame); N]> for PositionMap {
    fn from(pairs: [(&str, Frame); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl Extend<(EntryId, Frame)> for PositionMap {
    fn extend<I: IntoIterator<Item = (EntryId, Frame)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl<'a> IntoIterator for &'a PositionMap {
    type Item = (&'a EntryId, &'a Frame);
    type IntoIter = indexmap::map::Iter<'a, EntryId, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
