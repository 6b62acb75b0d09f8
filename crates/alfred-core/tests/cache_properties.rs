//! Property coverage for the dataset cache's merge invariants: at most one
//! entry per key, and LOCAL entries never mutated by a remote push.

use std::collections::HashSet;
use std::time::Duration;

use alfred_core::{DataSource, DatasetCache};
use alfred_proto::MacAddr;
use bytes::Bytes;
use proptest::prelude::*;

const KEY_DOMAIN: u8 = 4;

fn mac(byte: u8) -> MacAddr {
    MacAddr::new([0, 0, 0, 0, 0, byte])
}

#[derive(Debug, Clone)]
enum Op {
    Local { source: u8, record_type: u8, payload: Vec<u8> },
    Remote { source: u8, record_type: u8, payload: Vec<u8>, sender: u8 },
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..KEY_DOMAIN, 0..KEY_DOMAIN, prop::collection::vec(any::<u8>(), 0..8))
            .prop_map(|(source, record_type, payload)| Op::Local { source, record_type, payload }),
        (0..KEY_DOMAIN, 0..KEY_DOMAIN, prop::collection::vec(any::<u8>(), 0..8), 0..KEY_DOMAIN)
            .prop_map(|(source, record_type, payload, sender)| Op::Remote {
                source,
                record_type,
                payload,
                sender
            }),
    ]
}

fn apply(cache: &mut DatasetCache<Duration>, op: &Op) {
    match op {
        Op::Local { source, record_type, payload } => {
            cache.upsert_local(mac(*source), *record_type, 1, Bytes::from(payload.clone()), Duration::ZERO);
        },
        Op::Remote { source, record_type, payload, sender } => {
            cache.upsert_remote(
                mac(*source),
                *record_type,
                1,
                Bytes::from(payload.clone()),
                mac(*sender),
                Duration::ZERO,
            );
        },
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn at_most_one_entry_per_key(ops in prop::collection::vec(arbitrary_op(), 0..50)) {
        let mut cache: DatasetCache<Duration> = DatasetCache::new();
        for op in &ops {
            apply(&mut cache, op);
        }

        let mut seen = HashSet::new();
        for entry in cache.iterate() {
            prop_assert!(seen.insert((entry.source_mac, entry.record_type)), "duplicate key in cache");
        }
        prop_assert!(cache.len() <= usize::from(KEY_DOMAIN) * usize::from(KEY_DOMAIN));
    }

    #[test]
    fn local_entries_are_never_overwritten_by_remote_pushes(
        ops in prop::collection::vec(arbitrary_op(), 0..50)
    ) {
        let mut cache: DatasetCache<Duration> = DatasetCache::new();
        let mut last_local: std::collections::HashMap<(u8, u8), Vec<u8>> = std::collections::HashMap::new();

        for op in &ops {
            apply(&mut cache, op);
            if let Op::Local { source, record_type, payload } = op {
                last_local.insert((*source, *record_type), payload.clone());
            }
        }

        for ((source, record_type), payload) in &last_local {
            let entry = cache
                .get(&(mac(*source), *record_type))
                .expect("a key ever upserted locally must still be present");
            prop_assert_eq!(entry.data_source, DataSource::Local);
            prop_assert_eq!(&entry.payload[..], payload.as_slice());
        }
    }
}
