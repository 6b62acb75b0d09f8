//! Mesh data-announcement daemon: concrete ambient stack wired around the
//! `alfred-core` protocol engine.
//!
//! This crate provides the "outer layers" the distilled specification names
//! only by interface — CLI/config parsing, UDP multicast transport, a mesh
//! resolver, a minimal local-client registry, and a `tokio` scheduler — while
//! every protocol rule itself lives in [`alfred_core`].

pub mod client;
pub mod config;
pub mod error;
pub mod resolver;
pub mod scheduler;
pub mod transport;

pub use client::ClientRegistry;
pub use config::{Args, DaemonConfig, InterfaceSpec, StaticPeerSpec, TickIntervals};
pub use error::DaemonError;
pub use transport::MulticastTransport;
