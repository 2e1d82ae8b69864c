#![forbid(unsafe_code)]

//! Runtime: the authoritative position store and the drag controller.
//!
//! # Role in cutline
//! `cutline-runtime` is the layer a host embeds. It owns the committed
//! [`PositionMap`], reconciles it with remote snapshots, and turns pointer
//! gestures into commits via the solvers in `cutline-layout`.
//!
//! # Primary responsibilities
//! - **PositionStore**: optimistic writes, pending tracking, locks, rollback.
//! - **Reconciliation**: merge remote snapshots without clobbering fresh local
//!   writes.
//! - **DragController**: threshold-gated drag with fluid preview and a settled
//!   commit map on release.
//! - **TimelineEngine**: the facade that ties the above together under one
//!   tracing span.
//!
//! # How it fits in the system
//! The runtime never performs I/O. Writes leave through an outbox of
//! [`PersistBatch`]es that the host drains, or through
//! [`TimelineEngine::flush`] with a [`PositionPersistence`] backend.

pub mod config;
pub mod drag;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod reconcile;
pub mod store;

pub use config::{ConfigError, DEFAULT_LOCK_TIMEOUT, DEFAULT_PENDING_TIMEOUT, EngineConfig};
pub use drag::{DragController, DragEffect, NeighborDistance};
pub use engine::{DRAG_REASON, ReleaseOutcome, TimelineEngine};
pub use error::{PersistError, PositionError};
pub use persistence::{
    BatchId, PendingOperation, PersistBatch, PersistMetadata, PersistUpdate, PositionPersistence,
};
pub use reconcile::{RemoteEntry, SyncReport, SyncStatus};
pub use store::{
    LockReason, PendingUpdate, PositionLock, PositionStore, StoreTimeouts, UpdateOptions,
    UpdateOutcome,
};

pub use cutline_core::{
    DragNoopReason, DragPhase, Duration, EntryId, Frame, Instant, PointerInput, PointerPosition,
    PositionMap, TrackGeometry,
};
