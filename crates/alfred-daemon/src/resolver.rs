//! Mesh resolver glue (§4.9): the actual mesh link-quality table is an
//! external collaborator this crate does not own, so production wiring is
//! limited to the static entries operators provision on the command line.

use alfred_core::StaticMeshResolver;

use crate::config::StaticPeerSpec;

/// Builds the [`StaticMeshResolver`] the scheduler dispatches through, from
/// the peer mappings given on the command line.
#[must_use]
pub fn build(static_peers: &[StaticPeerSpec]) -> StaticMeshResolver {
    let mut resolver = StaticMeshResolver::new();
    for peer in static_peers {
        resolver.insert(peer.interface.clone(), peer.ip, peer.mac);
    }
    resolver
}
