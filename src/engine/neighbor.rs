use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use log::trace;
use serde::Deserialize;

use crate::contacts::ScheduledContactEntry;
use crate::error::{ContactError, Result};

/// Directly connected neighbor a contact gateway can be reached through
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Neighbor {
    pub address: Ipv4Addr,
    pub interface: String,
}

impl fmt::Display for Neighbor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} via {}", self.address, self.interface)
    }
}

/// Maps a gateway address to a local neighbor
pub trait NeighborResolver {
    fn resolve(&self, gateway: Ipv4Addr) -> Option<Neighbor>;
}

/// Static neighbor table, usually built from the config file
#[derive(Clone, Debug, Default)]
pub struct NeighborTable {
    neighbors: HashMap<Ipv4Addr, Neighbor>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

impl FromIterator<Neighbor> for NeighborTable {
    fn from_iter<I: IntoIterator<Item = Neighbor>>(iter: I) -> Self {
        Self {
            neighbors: iter.into_iter().map(|n| (n.address, n)).collect(),
        }
    }
}

impl NeighborResolver for NeighborTable {
    fn resolve(&self, gateway: Ipv4Addr) -> Option<Neighbor> {
        self.neighbors.get(&gateway).cloned()
    }
}

/// Gateway this router uses to cross the contact
///
/// `gw1` belongs to `asn1`'s side and `gw2` to `asn2`'s side, so the router
/// picks the gateway paired with its own ASN. `None` if it is not an endpoint.
pub fn resolve_gateway(entry: &ScheduledContactEntry, own_asn: u32) -> Option<Ipv4Addr> {
    if own_asn == entry.asn1 {
        Some(entry.gw1)
    } else if own_asn == entry.asn2 {
        Some(entry.gw2)
    } else {
        None
    }
}

/// Resolve the neighbor a route across `entry` should point at
pub fn resolve_next_hop<N: NeighborResolver>(
    entry: &ScheduledContactEntry,
    own_asn: u32,
    resolver: &N,
) -> Result<Neighbor> {
    let gateway = resolve_gateway(entry, own_asn).ok_or(ContactError::NotAnEndpoint {
        own_asn,
        asn1: entry.asn1,
        asn2: entry.asn2,
    })?;
    let neighbor = resolver
        .resolve(gateway)
        .ok_or(ContactError::UnresolvedGateway(gateway))?;
    trace!("Gateway {} resolved to {}", gateway, neighbor);
    Ok(neighbor)
}
