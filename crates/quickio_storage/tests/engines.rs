//! The sled and in-memory engines agree on batch results and key order.

use proptest::prelude::*;
use quickio_storage::{KvEngine, MemoryEngine, SledEngine, WriteBatch};
use tempfile::tempdir;

#[derive(Debug, Clone)]
enum Op {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..4, 1..4)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (key_strategy(), prop::collection::vec(any::<u8>(), 0..8))
            .prop_map(|(key, value)| Op::Put(key, value)),
        1 => key_strategy().prop_map(Op::Delete),
    ]
}

fn apply(engine: &dyn KvEngine, batches: &[Vec<Op>]) {
    for ops in batches {
        let mut batch = WriteBatch::new();
        for op in ops {
            match op {
                Op::Put(key, value) => batch.put(key.clone(), value.clone()),
                Op::Delete(key) => batch.delete(key.clone()),
            }
        }
        engine.write(batch).unwrap();
    }
}

fn contents(engine: &dyn KvEngine) -> Vec<(Vec<u8>, Vec<u8>)> {
    engine.iter().unwrap().map(Result::unwrap).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn engines_agree_after_batches(
        batches in prop::collection::vec(prop::collection::vec(op_strategy(), 0..12), 1..6),
    ) {
        let dir = tempdir().unwrap();
        let sled = SledEngine::open(&dir.path().join("db"), 1024 * 1024).unwrap();
        let memory = MemoryEngine::new();

        apply(&sled, &batches);
        apply(&memory, &batches);

        let on_disk = contents(&sled);
        prop_assert_eq!(&on_disk, &contents(&memory));
        prop_assert!(on_disk.windows(2).all(|pair| pair[0].0 < pair[1].0));

        for (key, value) in &on_disk {
            let stored = sled.get(key).unwrap();
            prop_assert_eq!(stored.as_ref(), Some(value));
        }
    }
}
