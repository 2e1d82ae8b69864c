#![forbid(unsafe_code)]

//! Merging remote snapshots into the store.
//!
//! A remote snapshot is the backend's view of every entry. It may lag behind
//! local writes (the backend has not caught up yet) or carry changes made
//! elsewhere. [`PositionStore::sync_from_remote`] decides, per entry, which
//! value the committed map should hold.
//!
//! # Decision table
//!
//! | pending write for id | remote value          | result                         |
//! |----------------------|-----------------------|--------------------------------|
//! | none                 | any                   | remote                         |
//! | yes                  | equals pending value  | remote; pending confirmed      |
//! | yes, younger than timeout | differs          | local pending value kept       |
//! | yes, older than timeout   | differs          | remote; pending abandoned      |
//!
//! While a lock is held and not expired the snapshot is ignored entirely.
//! Applying the same snapshot twice leaves the store (and its revision)
//! untouched the second time.

use cutline_core::{EntryId, Frame, Instant, PositionMap};
use cutline_layout::resolve_conflicts;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::store::{PositionStore, log_reassignments};

/// One entry as reported by the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub id: EntryId,
    /// `None` for entries the remote knows about but has not placed.
    pub current_frame: Option<Frame>,
}

impl RemoteEntry {
    #[must_use]
    pub fn placed(id: impl Into<EntryId>, frame: Frame) -> Self {
        Self {
            id: id.into(),
            current_frame: Some(frame),
        }
    }
}

/// What a sync did to the committed map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// A live lock blocked the sync.
    Locked,
    /// The merged map equalled the committed one.
    Unchanged,
    /// The committed map was replaced and the revision bumped.
    Updated,
}

/// Result of [`PositionStore::sync_from_remote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    /// Pending writes the snapshot matched.
    pub confirmed: usize,
    /// Pending writes kept over a diverging remote value.
    pub protected: usize,
    /// Pending writes that timed out and yielded to the remote value.
    pub abandoned: usize,
    /// Entries moved off duplicate frames while merging.
    pub reassigned: usize,
}

impl SyncReport {
    const fn locked() -> Self {
        Self {
            status: SyncStatus::Locked,
            confirmed: 0,
            protected: 0,
            abandoned: 0,
            reassigned: 0,
        }
    }

    #[must_use]
    pub fn changed(&self) -> bool {
        self.status == SyncStatus::Updated
    }
}

enum Verdict {
    Confirmed,
    Protected,
    Abandoned,
}

impl PositionStore {
    /// Merge a remote snapshot into the committed map.
    pub fn sync_from_remote(&mut self, remote: &[RemoteEntry], now: Instant) -> SyncReport {
        if self.is_locked(now) {
            debug!(entries = remote.len(), "remote sync skipped; store locked");
            return SyncReport::locked();
        }
        self.expire_lock(now);

        let pending_timeout = self.timeouts.pending_timeout;
        let mut merged = PositionMap::with_capacity(remote.len());
        let mut report = SyncReport {
            status: SyncStatus::Unchanged,
            ..SyncReport::locked()
        };
        let mut settled: Vec<EntryId> = Vec::new();

        let mut judge = |id: &EntryId, remote_frame: Option<Frame>, merged: &mut PositionMap| {
            let chosen = match self.pending.get(id.as_str()) {
                None => remote_frame,
                Some(pending) => {
                    let verdict = if pending.new_position == remote_frame {
                        Verdict::Confirmed
                    } else if pending.age(now) < pending_timeout {
                        Verdict::Protected
                    } else {
                        Verdict::Abandoned
                    };
                    match verdict {
                        Verdict::Confirmed => {
                            report.confirmed += 1;
                            settled.push(id.clone());
                            remote_frame
                        }
                        Verdict::Protected => {
                            report.protected += 1;
                            debug!(%id, local = ?pending.new_position, remote = ?remote_frame,
                                "pending write shields entry from remote value");
                            pending.new_position
                        }
                        Verdict::Abandoned => {
                            report.abandoned += 1;
                            settled.push(id.clone());
                            warn!(
                                %id,
                                local = ?pending.new_position,
                                remote = ?remote_frame,
                                age_ms = pending.age(now).as_millis() as u64,
                                batch = %pending.batch,
                                "pending write timed out; accepting remote value"
                            );
                            remote_frame
                        }
                    }
                }
            };
            match chosen {
                Some(frame) => {
                    merged.insert(id.clone(), frame);
                }
                None => {
                    merged.remove(id.as_str());
                }
            }
        };

        for entry in remote {
            judge(&entry.id, entry.current_frame, &mut merged);
        }
        let unseen: Vec<EntryId> = self
            .pending
            .keys()
            .filter(|id| !remote.iter().any(|entry| &entry.id == *id))
            .cloned()
            .collect();
        for id in &unseen {
            judge(id, None, &mut merged);
        }

        for id in settled {
            self.pending.remove(id.as_str());
        }

        let resolution = resolve_conflicts(&merged);
        log_reassignments(&resolution.reassigned, "remote sync");
        report.reassigned = resolution.reassigned.len();

        if resolution.positions == self.positions {
            debug!(
                confirmed = report.confirmed,
                protected = report.protected,
                "remote snapshot matches committed positions"
            );
            return report;
        }

        self.positions = resolution.positions;
        self.revision += 1;
        report.status = SyncStatus::Updated;
        info!(
            entries = self.positions.len(),
            confirmed = report.confirmed,
            protected = report.protected,
            abandoned = report.abandoned,
            revision = self.revision,
            "remote snapshot applied"
        );
        report
    }
}
