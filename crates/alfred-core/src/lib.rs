//! Protocol engine for the alfred mesh data-announcement daemon.
//!
//! This crate owns every rule in the wire protocol's behavior — dataset
//! merge semantics, peer discovery, transaction reassembly, and dispatch —
//! but touches no socket and spawns no task. Concrete I/O, scheduling, and
//! process wiring live in the daemon crate that embeds this one; see
//! [`transport::FrameTransport`] and [`env::Environment`] for the seams
//! where that happens.

mod context;
mod dataset;
mod dispatcher;
mod env;
mod error;
mod peer;
mod provenance;
mod resolve;
mod transaction;
mod transmit;
mod transport;

pub use alfred_proto::MacAddr;
pub use context::{ChangeListener, ClientFinish, Context, Diagnostics, InterfaceState, OpMode, RetentionTtls};
pub use dataset::{Dataset, DatasetCache, DatasetKey};
pub use dispatcher::on_frame;
pub use env::{sim, Environment, SystemEnvironment};
pub use error::{CoreError, Result};
pub use peer::{Peer, PeerTable};
pub use provenance::DataSource;
pub use resolve::{is_eui64_link_local, mac_from_eui64_link_local, MeshTableResolver, StaticMeshResolver};
pub use transaction::{ClientToken, PushOutcome, Transaction, TransactionKey, TransactionTable, TxEndOutcome};
pub use transmit::{announce_master, push, push_local_data, sync_data};
pub use transport::{FrameTransport, RecordingTransport};
