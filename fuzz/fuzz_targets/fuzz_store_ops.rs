#![no_main]

use arbitrary::Arbitrary;
use cutline_layout::is_on_lattice;
use cutline_runtime::{
    Duration, EntryId, Instant, PersistError, PositionMap, PositionStore, RemoteEntry,
    StoreTimeouts, UpdateOptions,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Update(Vec<(u8, i16)>),
    Sync(Vec<(u8, Option<i16>)>),
    Complete { ok: bool },
    Lock,
    Unlock,
    Advance(u16),
}

fn id(raw: u8) -> EntryId {
    EntryId::from(format!("e{}", raw % 16))
}

fuzz_target!(|ops: Vec<Op>| {
    let mut now = Instant::now();
    let mut store = PositionStore::new(StoreTimeouts::default());
    let mut queued = Vec::new();

    for op in ops.into_iter().take(256) {
        let revision = store.revision();
        match op {
            Op::Update(entries) => {
                let next: PositionMap = entries
                    .into_iter()
                    .map(|(raw, frame)| (id(raw), i64::from(frame)))
                    .collect();
                store.update_positions(&next, UpdateOptions::reason("fuzz"), now);
                let batches = store.take_persist_requests();
                assert!(
                    batches
                        .iter()
                        .flat_map(|batch| &batch.updates)
                        .filter_map(|update| update.frame)
                        .all(is_on_lattice),
                    "write left the lattice"
                );
                queued.extend(batches);
            }
            Op::Sync(entries) => {
                let remote: Vec<RemoteEntry> = entries
                    .into_iter()
                    .map(|(raw, frame)| RemoteEntry {
                        id: id(raw),
                        current_frame: frame.map(i64::from),
                    })
                    .collect();
                store.sync_from_remote(&remote, now);
            }
            Op::Complete { ok } => {
                if !queued.is_empty() {
                    let batch = queued.remove(0);
                    let result = if ok {
                        Ok(())
                    } else {
                        Err(PersistError::unavailable("fuzz"))
                    };
                    let _ = store.complete_persist(batch.id, result);
                }
            }
            Op::Lock => store.lock(cutline_runtime::LockReason::Host, now),
            Op::Unlock => {
                store.unlock();
            }
            Op::Advance(ms) => {
                now += Duration::from_millis(u64::from(ms));
                store.tick(now);
            }
        }
        assert!(!store.positions().has_duplicate_frames(), "duplicate frames committed");
        assert!(store.revision() >= revision, "revision went backwards");
    }
});
