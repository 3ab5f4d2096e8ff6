//! Reacts to contact boundaries by synthesizing or withdrawing routes
pub mod neighbor;
pub mod synthesis;
pub mod withdrawal;

pub use neighbor::{resolve_gateway, resolve_next_hop, Neighbor, NeighborResolver, NeighborTable};
pub use synthesis::Candidate;
pub use withdrawal::should_withdraw;

use std::net::IpAddr;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info, warn};

use crate::contacts::{Boundary, ContactEvent, ScheduledContactEntry};
use crate::error::Result;
use crate::rib::{Entry, EntrySource, RouteIntent, RouteTable};

/// `as_path` with the router's own ASN in front
pub(crate) fn own_path(own_asn: u32, as_path: &[u32]) -> Vec<u32> {
    let mut path = Vec::with_capacity(as_path.len() + 1);
    path.push(own_asn);
    path.extend_from_slice(as_path);
    path
}

/// Are the contact endpoints next to each other anywhere in `path`
pub(crate) fn contains_adjacency(entry: &ScheduledContactEntry, path: &[u32]) -> bool {
    path.iter()
        .tuple_windows()
        .any(|(a, b)| entry.joins(*a, *b))
}

pub struct ContactEngine<N: NeighborResolver> {
    local_as: u32,
    resolver: N,
}

impl<N: NeighborResolver> ContactEngine<N> {
    pub fn new(local_as: u32, resolver: N) -> Self {
        Self { local_as, resolver }
    }

    /// Announcements for every new path `entry` opens up in `table`
    pub fn contact_begin<T: RouteTable>(
        &self,
        entry: &ScheduledContactEntry,
        table: &T,
    ) -> Vec<RouteIntent> {
        let mut intents: Vec<RouteIntent> = vec![];
        for prefix in table.prefixes() {
            let routes = table.routes_for(&prefix);
            for route in &routes {
                for candidate in synthesis::synthesize(entry, route, &routes, self.local_as) {
                    let next_hop = match self.next_hop_for(entry, route, &candidate) {
                        Ok(next_hop) => next_hop,
                        Err(err) => {
                            warn!(
                                "Dropping candidate {:?} for {}: {}",
                                candidate.as_path, prefix, err
                            );
                            continue;
                        }
                    };
                    let attributes = route.attributes.with_path(candidate.attribute, next_hop);
                    if !synthesis::is_unique(&prefix, &attributes, &routes, &intents) {
                        debug!("Already have {} {}", prefix, attributes);
                        continue;
                    }
                    intents.push(RouteIntent::Announce {
                        prefix,
                        attributes: Arc::new(attributes),
                        source: EntrySource::Contact,
                    });
                }
            }
        }
        intents
    }

    /// Withdrawals for every route in `table` that crosses `entry`
    pub fn contact_end<T: RouteTable>(
        &self,
        entry: &ScheduledContactEntry,
        table: &T,
    ) -> Vec<RouteIntent> {
        withdrawal::collect_withdrawals(entry, table, self.local_as)
    }

    /// Run the engine for one timer event and apply the result to `table`
    /// Returns the number of routes added or removed.
    pub fn handle_event<T: RouteTable>(&self, event: &ContactEvent, table: &mut T) -> usize {
        let intents = match event.boundary {
            Boundary::Begin => self.contact_begin(&event.entry, table),
            Boundary::End => self.contact_end(&event.entry, table),
        };
        for intent in &intents {
            debug!("{}: {}", event.boundary, intent);
        }
        let applied = table.apply(intents);
        info!("Contact {}: {} routes changed", event, applied);
        applied
    }

    // Candidates that leave through a different first hop go to the contact gateway
    fn next_hop_for(
        &self,
        entry: &ScheduledContactEntry,
        route: &Entry,
        candidate: &Candidate,
    ) -> Result<Option<IpAddr>> {
        let route_first_hop = route.attributes.as_path_asns().first().copied();
        if candidate.first_hop() == route_first_hop {
            return Ok(route.attributes.next_hop);
        }
        let neighbor = resolve_next_hop(entry, self.local_as, &self.resolver)?;
        Ok(Some(IpAddr::V4(neighbor.address)))
    }
}
