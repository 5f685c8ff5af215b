use std::collections::BTreeMap;

use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use pulse_storage::{queue::SqliteQueue, DurableQueue};

#[derive(Debug, Clone)]
enum Action {
    Enqueue { captured_at: u16 },
    PurgeOldest { count: u8 },
    PurgeSame { pick: u8 },
    Reopen,
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => (0u16..5000).prop_map(|captured_at| Action::Enqueue { captured_at }),
        2 => (0u8..6).prop_map(|count| Action::PurgeOldest { count }),
        1 => (0u8..32).prop_map(|pick| Action::PurgeSame { pick }),
        1 => Just(Action::Reopen),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// The store behaves like an ordered map keyed by sequence id: FIFO
    /// order, strictly increasing ids, purge removes exactly what it names.
    #[test]
    fn queue_matches_ordered_map_model(actions in prop::collection::vec(action_strategy(), 1..60)) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.db");
        let mut queue = SqliteQueue::open(&path).unwrap();
        let mut model: BTreeMap<i64, i64> = BTreeMap::new();
        let mut purged: Vec<i64> = Vec::new();
        let mut last_id = 0i64;

        for action in actions {
            match action {
                Action::Enqueue { captured_at } => {
                    let ts = i64::from(captured_at);
                    let id = queue.enqueue(&json!({"ts": ts}), ts).unwrap();
                    prop_assert!(id > last_id);
                    last_id = id;
                    model.insert(id, ts);
                }
                Action::PurgeOldest { count } => {
                    let targets: Vec<i64> = model.keys().take(usize::from(count)).copied().collect();
                    let removed = queue.purge(&targets).unwrap();
                    prop_assert_eq!(removed, targets.len());
                    for id in &targets {
                        model.remove(id);
                    }
                    purged.extend(targets);
                }
                Action::PurgeSame { pick } => {
                    if let Some(id) = purged.get(usize::from(pick) % purged.len().max(1)).copied() {
                        prop_assert_eq!(queue.purge(&[id]).unwrap(), 0);
                    }
                }
                Action::Reopen => {
                    queue.close().unwrap();
                    queue = SqliteQueue::open(&path).unwrap();
                }
            }

            let records = queue.read_all().unwrap();
            let got: Vec<(i64, i64)> = records.iter().map(|r| (r.sequence_id, r.captured_at)).collect();
            let want: Vec<(i64, i64)> = model.iter().map(|(id, ts)| (*id, *ts)).collect();
            prop_assert_eq!(got, want);
        }
    }
}
