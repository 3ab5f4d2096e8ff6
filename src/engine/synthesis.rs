//! Builds the AS paths a beginning contact makes possible
//!
//! The route's path is prefixed with the router's own ASN. Wherever a contact
//! endpoint appears with a successor, the other endpoint is inserted after it and
//! the now dangling path is completed with the tail of another route towards the
//! same prefix that continues from the inserted ASN.

use std::net::IpAddr;
use std::sync::Arc;

use bgp_rs::ASPath;
use ipnetwork::IpNetwork;
use itertools::Itertools;
use log::trace;

use super::{contains_adjacency, own_path};
use crate::contacts::ScheduledContactEntry;
use crate::rib::{as_sequence, Entry, PathAttributes, RouteIntent};

/// A synthesized AS path, own ASN stripped
#[derive(Debug, Clone)]
pub struct Candidate {
    pub as_path: Vec<u32>,
    /// Wire form of `as_path`
    pub attribute: ASPath,
}

impl Candidate {
    fn new(as_path: Vec<u32>) -> Self {
        let attribute = as_sequence(as_path.clone());
        Self { as_path, attribute }
    }

    pub fn first_hop(&self) -> Option<u32> {
        self.as_path.first().copied()
    }
}

/// Candidate paths for `route_path` given the paths of the other routes to the same prefix
pub fn search_candidates(
    entry: &ScheduledContactEntry,
    route_path: &[u32],
    others: &[Vec<u32>],
    own_asn: u32,
) -> Vec<Candidate> {
    let path = own_path(own_asn, route_path);
    if path.len() < 2 {
        return vec![];
    }
    if contains_adjacency(entry, &path) {
        trace!("Path {:?} already crosses {}", path, entry);
        return vec![];
    }

    let mut spliced: Vec<Vec<u32>> = vec![];
    for i in 0..path.len() - 1 {
        let inserted = match entry.other_endpoint(path[i]) {
            Some(asn) => asn,
            None => continue,
        };
        for other in others {
            for (j, asn) in other.iter().enumerate() {
                // Skip tails that double straight back to path[i]
                if *asn != inserted || other.get(j + 1) == Some(&path[i]) {
                    continue;
                }
                let mut candidate = Vec::with_capacity(i + other.len() - j);
                candidate.extend_from_slice(&path[1..=i]);
                candidate.extend_from_slice(&other[j..]);
                trace!("Spliced {:?} + {:?} -> {:?}", &path[..=i], &other[j..], candidate);
                spliced.push(candidate);
            }
        }
    }
    spliced.into_iter().unique().map(Candidate::new).collect()
}

/// Candidate paths for `route`, completed from the other entries of `routes`
pub fn synthesize(
    entry: &ScheduledContactEntry,
    route: &Entry,
    routes: &[Arc<Entry>],
    own_asn: u32,
) -> Vec<Candidate> {
    let others: Vec<Vec<u32>> = routes
        .iter()
        .filter(|other| other.id != route.id)
        .map(|other| other.attributes.as_path_asns())
        .collect();
    search_candidates(entry, &route.attributes.as_path_asns(), &others, own_asn)
}

fn same_route(attributes: &PathAttributes, next_hop: Option<IpAddr>, as_path: &[u32]) -> bool {
    attributes.next_hop == next_hop && attributes.as_path_asns() == as_path
}

/// Is `(prefix, next hop, AS path)` absent from the table and from the queued announcements
pub fn is_unique(
    prefix: &IpNetwork,
    attributes: &PathAttributes,
    existing: &[Arc<Entry>],
    pending: &[RouteIntent],
) -> bool {
    let as_path = attributes.as_path_asns();
    let in_table = existing.iter().any(|route| {
        route.prefix == *prefix && same_route(&route.attributes, attributes.next_hop, &as_path)
    });
    let queued = pending.iter().any(|intent| match intent {
        RouteIntent::Announce {
            prefix: queued_prefix,
            attributes: queued,
            ..
        } => queued_prefix == prefix && same_route(queued, attributes.next_hop, &as_path),
        RouteIntent::Withdraw { .. } => false,
    });
    !in_table && !queued
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::tests::contact;
    use crate::rib::tests::{attrs, prefix};
    use crate::rib::{EntrySource, RouteTable, RIB};
    use pretty_assertions::assert_eq;

    fn paths(candidates: &[Candidate]) -> Vec<Vec<u32>> {
        candidates.iter().map(|c| c.as_path.clone()).collect()
    }

    #[test]
    fn test_tail_completion() {
        let entry = contact(1000, 10, 20);
        let candidates = search_candidates(&entry, &[10, 30], &[vec![50, 20, 40]], 100);
        assert_eq!(paths(&candidates), vec![vec![10, 20, 40]]);
        assert_eq!(candidates[0].first_hop(), Some(10));
        assert_eq!(
            crate::rib::flatten_as_path(&candidates[0].attribute),
            vec![10, 20, 40]
        );
    }

    #[test]
    fn test_no_endpoint_in_path() {
        let entry = contact(1000, 10, 20);
        let others = vec![vec![50, 20, 40], vec![10, 60]];
        assert!(search_candidates(&entry, &[30, 40], &others, 100).is_empty());
    }

    #[test]
    fn test_already_adjacent() {
        let entry = contact(1000, 10, 20);
        let others = vec![vec![50, 20, 40]];
        assert!(search_candidates(&entry, &[10, 20, 30], &others, 100).is_empty());
        assert!(search_candidates(&entry, &[30, 20, 10], &others, 100).is_empty());
        // Own ASN is part of the adjacency check
        assert!(search_candidates(&entry, &[20, 30], &others, 10).is_empty());
    }

    #[test]
    fn test_short_path() {
        let entry = contact(1000, 10, 20);
        let others = vec![vec![20, 40]];
        assert!(search_candidates(&entry, &[], &others, 10).is_empty());
    }

    #[test]
    fn test_insertion_needs_successor() {
        let entry = contact(1000, 10, 20);
        // 10 is the origin of this path, nothing follows it
        assert!(search_candidates(&entry, &[30, 10], &[vec![20, 40]], 100).is_empty());
    }

    #[test]
    fn test_skip_tail_doubling_back() {
        let entry = contact(1000, 10, 20);
        let others = vec![vec![20, 10, 40], vec![60, 20]];
        let candidates = search_candidates(&entry, &[10, 30], &others, 100);
        assert_eq!(paths(&candidates), vec![vec![10, 20]]);
    }

    #[test]
    fn test_own_asn_endpoint() {
        let entry = contact(1000, 10, 20);
        let candidates = search_candidates(&entry, &[30], &[vec![20, 40]], 10);
        assert_eq!(paths(&candidates), vec![vec![20, 40]]);
    }

    #[test]
    fn test_duplicate_candidates() {
        let entry = contact(1000, 10, 20);
        let others = vec![vec![50, 20, 40], vec![70, 20, 40], vec![20, 40]];
        let candidates = search_candidates(&entry, &[10, 30], &others, 100);
        assert_eq!(paths(&candidates), vec![vec![10, 20, 40]]);
    }

    #[test]
    fn test_synthesize_skips_source_route() {
        let mut rib = RIB::new();
        let net = prefix("10.10.0.0/16");
        let source = rib.insert_from_config(net, attrs("1.1.1.1", vec![10, 20, 40]));
        let entry = contact(1000, 20, 50);
        let routes = rib.routes_for(&net);
        assert!(synthesize(&entry, &source, &routes, 100).is_empty());

        let route = rib.insert_from_config(net, attrs("1.1.1.1", vec![10, 50, 30]));
        let routes = rib.routes_for(&net);
        let candidates = synthesize(&entry, &route, &routes, 100);
        assert_eq!(paths(&candidates), vec![vec![10, 50, 20, 40]]);
    }

    #[test]
    fn test_is_unique() {
        let mut rib = RIB::new();
        let net = prefix("10.10.0.0/16");
        rib.insert_from_config(net, attrs("1.1.1.1", vec![10, 20, 40]));
        let routes = rib.routes_for(&net);

        assert!(!is_unique(&net, &attrs("1.1.1.1", vec![10, 20, 40]), &routes, &[]));
        assert!(is_unique(&net, &attrs("1.1.1.2", vec![10, 20, 40]), &routes, &[]));
        assert!(is_unique(&net, &attrs("1.1.1.1", vec![10, 20]), &routes, &[]));

        let pending = vec![RouteIntent::Announce {
            prefix: net,
            attributes: Arc::new(attrs("1.1.1.2", vec![10, 20, 40])),
            source: EntrySource::Contact,
        }];
        assert!(!is_unique(&net, &attrs("1.1.1.2", vec![10, 20, 40]), &routes, &pending));
        let other_net = prefix("10.20.0.0/16");
        assert!(is_unique(&other_net, &attrs("1.1.1.2", vec![10, 20, 40]), &[], &pending));
    }
}
