#![forbid(unsafe_code)]

//! Deterministic duplicate-frame resolution.
//!
//! Entries are grouped by frame. In each group the first entry (insertion
//! order) keeps its frame; every other member is moved to the smallest frame
//! at or above its original value that nothing else occupies.

use cutline_core::{EntryId, Frame, PositionMap};
use rustc_hash::FxHashSet;

/// One entry moved off a duplicate frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassignment {
    pub id: EntryId,
    pub from: Frame,
    pub to: Frame,
}

/// Output of [`resolve_conflicts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictResolution {
    /// Map with zero duplicate frames, in the input's insertion order.
    pub positions: PositionMap,
    /// Entries that were moved, in the order they were processed.
    pub reassigned: Vec<Reassignment>,
}

impl ConflictResolution {
    /// Whether the input was already duplicate-free.
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.reassigned.is_empty()
    }
}

/// Remove every duplicate frame from `positions`.
#[must_use]
pub fn resolve_conflicts(positions: &PositionMap) -> ConflictResolution {
    let mut used: FxHashSet<Frame> = FxHashSet::default();
    used.reserve(positions.len());
    let keepers: Vec<bool> = positions.iter().map(|(_, frame)| used.insert(frame)).collect();

    if keepers.iter().all(|&kept| kept) {
        return ConflictResolution {
            positions: positions.clone(),
            reassigned: Vec::new(),
        };
    }

    let mut resolved = PositionMap::with_capacity(positions.len());
    let mut reassigned = Vec::new();
    for ((id, frame), kept) in positions.iter().zip(keepers) {
        if kept {
            resolved.insert(id.clone(), frame);
            continue;
        }
        let mut candidate = frame;
        while used.contains(&candidate) {
            candidate = candidate.saturating_add(1);
        }
        used.insert(candidate);
        resolved.insert(id.clone(), candidate);
        reassigned.push(Reassignment {
            id: id.clone(),
            from: frame,
            to: candidate,
        });
    }

    ConflictResolution {
        positions: resolved,
        reassigned,
    }
}
