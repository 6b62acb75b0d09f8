//! Transaction table: reassembly of multi-packet pushes keyed by
//! `(peer_mac, tx_id)` (§3, §4.4).

use std::collections::HashMap;

use alfred_proto::{DatasetRecord, MacAddr};

use crate::context::OpMode;

/// Opaque token binding a transaction to a local client awaiting its result.
///
/// Assigned by the IPC layer when it calls `register_client_request`;
/// meaningless to the core beyond identity and presence/absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientToken(pub u64);

/// Key identifying one in-flight transaction.
pub type TransactionKey = (MacAddr, u16);

/// An in-progress multi-packet pull or push reassembly.
#[derive(Debug, Clone)]
pub struct Transaction<Instant> {
    /// Hardware address of the peer this transaction is reassembling from.
    pub peer_mac: MacAddr,
    /// 16-bit transaction id, unique per peer.
    pub tx_id: u16,
    /// Dataset type this transaction was requested for, or `NO_FILTER`.
    /// Only meaningful for client-bound (pull) transactions.
    pub requested_type: i16,
    /// Buffered `PUSH_DATA` packets in arrival order: `(seqno, records)`.
    pub packets: Vec<(u16, Vec<DatasetRecord>)>,
    /// Total packet count, set by `STATUS_TXEND`. `0` means still unknown.
    pub expected_packet_count: u16,
    /// Local client awaiting this transaction's result, if any.
    pub client_token: Option<ClientToken>,
    /// Time the last frame for this transaction was processed.
    pub last_rx_time: Instant,
}

impl<Instant> Transaction<Instant> {
    /// Iterates all buffered records in arrival order (the order packets
    /// were received, not sequence-number order — §5 preserves this
    /// intentionally; see DESIGN.md).
    pub fn records_in_arrival_order(&self) -> impl Iterator<Item = &DatasetRecord> {
        self.packets.iter().flat_map(|(_, records)| records.iter())
    }

    fn is_complete(&self) -> bool {
        self.expected_packet_count > 0 && self.packets.len() == usize::from(self.expected_packet_count)
    }
}

/// Outcome of feeding one `PUSH_DATA` frame to the transaction table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Buffered; the transaction is still incomplete.
    Buffered,
    /// A packet with this `seqno` was already buffered; the new one was
    /// dropped silently (§4.4 step 4).
    DuplicateSeqno,
    /// No transaction existed and this node is not a master, so the frame
    /// was dropped (§4.4 step 2, role violation for slaves).
    RoleViolation,
}

/// Outcome of feeding one `STATUS_TXEND` frame to the transaction table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEndOutcome {
    /// The terminator was recorded; the transaction is still incomplete.
    Recorded,
    /// A zero-packet terminator referenced an unknown transaction — a no-op
    /// per §4.4 step 2.
    UnknownZeroPacket,
    /// A non-master received a terminator for a transaction it never
    /// started.
    RoleViolation,
}

/// Reassembly state for all in-flight transactions, keyed by
/// `(peer_mac, tx_id)`.
///
/// Invariant: at most one entry exists per key.
#[derive(Debug, Clone)]
pub struct TransactionTable<Instant> {
    transactions: HashMap<TransactionKey, Transaction<Instant>>,
}

impl<Instant> Default for TransactionTable<Instant> {
    fn default() -> Self {
        Self { transactions: HashMap::new() }
    }
}

impl<Instant: Copy + Ord + std::ops::Sub<Output = std::time::Duration>> TransactionTable<Instant> {
    /// Builds an empty transaction table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transaction a local client is awaiting, created eagerly
    /// at request time (slave pull path, §4.10).
    pub fn register_client_request(
        &mut self,
        peer_mac: MacAddr,
        tx_id: u16,
        requested_type: i16,
        client_token: ClientToken,
        now: Instant,
    ) {
        self.transactions.entry((peer_mac, tx_id)).or_insert(Transaction {
            peer_mac,
            tx_id,
            requested_type,
            packets: Vec::new(),
            expected_packet_count: 0,
            client_token: Some(client_token),
            last_rx_time: now,
        });
    }

    /// Feeds one `PUSH_DATA` frame's records to the matching transaction
    /// (§4.4). Returns the outcome, plus the completed transaction if this
    /// packet was the one that finished it.
    pub fn on_push_data(
        &mut self,
        peer_mac: MacAddr,
        tx_id: u16,
        seqno: u16,
        records: Vec<DatasetRecord>,
        opmode: OpMode,
        now: Instant,
    ) -> (PushOutcome, Option<Transaction<Instant>>) {
        let key = (peer_mac, tx_id);
        if !self.transactions.contains_key(&key) && opmode != OpMode::Master {
            return (PushOutcome::RoleViolation, None);
        }

        let transaction = self.transactions.entry(key).or_insert_with(|| Transaction {
            peer_mac,
            tx_id,
            requested_type: alfred_proto::NO_FILTER,
            packets: Vec::new(),
            expected_packet_count: 0,
            client_token: None,
            last_rx_time: now,
        });
        transaction.last_rx_time = now;

        if transaction.packets.iter().any(|(existing_seqno, _)| *existing_seqno == seqno) {
            return (PushOutcome::DuplicateSeqno, None);
        }
        transaction.packets.push((seqno, records));

        if transaction.is_complete() {
            return (PushOutcome::Buffered, self.transactions.remove(&key));
        }
        (PushOutcome::Buffered, None)
    }

    /// Feeds one `STATUS_TXEND` frame to the matching transaction (§4.4).
    /// Returns the outcome, plus the completed transaction if this
    /// terminator was the one that finished it.
    pub fn on_status_txend(
        &mut self,
        peer_mac: MacAddr,
        tx_id: u16,
        seqno: u16,
        opmode: OpMode,
        now: Instant,
    ) -> (TxEndOutcome, Option<Transaction<Instant>>) {
        let key = (peer_mac, tx_id);
        if !self.transactions.contains_key(&key) {
            if opmode != OpMode::Master {
                return (TxEndOutcome::RoleViolation, None);
            }
            if seqno == 0 {
                return (TxEndOutcome::UnknownZeroPacket, None);
            }
        }

        let transaction = self.transactions.entry(key).or_insert_with(|| Transaction {
            peer_mac,
            tx_id,
            requested_type: alfred_proto::NO_FILTER,
            packets: Vec::new(),
            expected_packet_count: 0,
            client_token: None,
            last_rx_time: now,
        });
        transaction.expected_packet_count = seqno;
        transaction.last_rx_time = now;

        if transaction.is_complete() {
            return (TxEndOutcome::Recorded, self.transactions.remove(&key));
        }
        (TxEndOutcome::Recorded, None)
    }

    /// Looks up an in-flight transaction.
    #[must_use]
    pub fn get(&self, key: &TransactionKey) -> Option<&Transaction<Instant>> {
        self.transactions.get(key)
    }

    /// Number of in-flight transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether no transactions are in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Removes transactions whose `last_rx_time` is older than `ttl`,
    /// freeing their buffered packets. Returns the reaped transactions so a
    /// caller holding a client registry can notify early-closed waiters if
    /// desired (the core itself does not invoke `client_request_finish` for
    /// expired transactions — only for those that complete normally).
    pub fn sweep(&mut self, now: Instant, ttl: std::time::Duration) -> Vec<Transaction<Instant>> {
        let stale: Vec<TransactionKey> = self
            .transactions
            .iter()
            .filter(|(_, transaction)| now - transaction.last_rx_time > ttl)
            .map(|(key, _)| *key)
            .collect();
        stale.into_iter().filter_map(|key| self.transactions.remove(&key)).collect()
    }

    /// Cancels and removes a transaction early (e.g. a client-socket owner
    /// closed before it completed, §5 cancellation rule (c)).
    pub fn cancel(&mut self, key: &TransactionKey) -> Option<Transaction<Instant>> {
        self.transactions.remove(key)
    }
}
