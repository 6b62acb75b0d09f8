//! Dataset cache: keyed store of `(source_mac, type) -> payload+metadata`
//! with provenance-aware merge rules (§3, §4.2).

use std::collections::HashMap;

use alfred_proto::MacAddr;
use bytes::Bytes;

use crate::provenance::DataSource;

/// Key identifying one dataset: its source hardware address and type.
pub type DatasetKey = (MacAddr, u8);

/// One opaque payload contributed by a specific source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset<Instant> {
    /// Hardware address of the original contributor.
    pub source_mac: MacAddr,
    /// Application-defined dataset type.
    pub record_type: u8,
    /// Application-defined version, set by whichever update last touched it.
    pub version: u8,
    /// Opaque payload bytes.
    pub payload: Bytes,
    /// Provenance of the currently stored value.
    pub data_source: DataSource,
    /// Time this entry was last created or refreshed.
    pub last_seen: Instant,
}

/// Keyed store of datasets with provenance-aware merge rules.
///
/// Invariant: at most one entry exists per [`DatasetKey`].
#[derive(Debug, Clone)]
pub struct DatasetCache<Instant> {
    entries: HashMap<DatasetKey, Dataset<Instant>>,
}

impl<Instant> Default for DatasetCache<Instant> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<Instant: Copy + Ord + std::ops::Sub<Output = std::time::Duration>> DatasetCache<Instant> {
    /// Builds an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a received record (§4.2).
    ///
    /// Returns `true` if the entry changed (created, or payload differs from
    /// what was stored), `false` if the update was ignored (a LOCAL entry
    /// exists for this key) or was a no-op duplicate.
    pub fn upsert_remote(
        &mut self,
        source_mac: MacAddr,
        record_type: u8,
        version: u8,
        payload: Bytes,
        sender_mac: MacAddr,
        now: Instant,
    ) -> bool {
        let key = (source_mac, record_type);
        if let Some(existing) = self.entries.get(&key) {
            if existing.data_source == DataSource::Local {
                return false;
            }
        }

        let data_source = DataSource::from_sender(source_mac, sender_mac);
        let changed = match self.entries.get(&key) {
            None => true,
            Some(existing) => existing.payload != payload,
        };

        self.entries.insert(
            key,
            Dataset { source_mac, record_type, version, payload, data_source, last_seen: now },
        );
        changed
    }

    /// Stores a dataset submitted by a local client (source = LOCAL).
    ///
    /// Local entries always win: they are never overwritten by
    /// [`Self::upsert_remote`].
    pub fn upsert_local(&mut self, source_mac: MacAddr, record_type: u8, version: u8, payload: Bytes, now: Instant) {
        let key = (source_mac, record_type);
        self.entries.insert(
            key,
            Dataset { source_mac, record_type, version, payload, data_source: DataSource::Local, last_seen: now },
        );
    }

    /// Looks up a single entry by key.
    #[must_use]
    pub fn get(&self, key: &DatasetKey) -> Option<&Dataset<Instant>> {
        self.entries.get(key)
    }

    /// Iterates all entries. Ordering is unspecified; callers must not
    /// assume stability across mutations.
    pub fn iterate(&self) -> impl Iterator<Item = &Dataset<Instant>> {
        self.entries.values()
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes non-LOCAL entries whose age exceeds `ttl`.
    pub fn sweep(&mut self, now: Instant, ttl: std::time::Duration) {
        self.entries.retain(|_, entry| {
            entry.data_source == DataSource::Local || now - entry.last_seen <= ttl
        });
    }
}
