use log::debug;

use super::{contains_adjacency, own_path};
use crate::contacts::ScheduledContactEntry;
use crate::rib::{RouteIntent, RouteTable};

/// Does the route depend on the contact: are its endpoints adjacent once the
/// router's own ASN is prepended
pub fn should_withdraw(entry: &ScheduledContactEntry, as_path: &[u32], own_asn: u32) -> bool {
    contains_adjacency(entry, &own_path(own_asn, as_path))
}

/// Withdraw intents for every route in `table` that crosses `entry`
pub fn collect_withdrawals<T: RouteTable>(
    entry: &ScheduledContactEntry,
    table: &T,
    own_asn: u32,
) -> Vec<RouteIntent> {
    let mut intents = vec![];
    for prefix in table.prefixes() {
        for route in table.routes_for(&prefix) {
            if should_withdraw(entry, &route.attributes.as_path_asns(), own_asn) {
                debug!("Route {} depends on {}", route, entry);
                intents.push(RouteIntent::Withdraw {
                    prefix,
                    id: route.id,
                });
            }
        }
    }
    intents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::tests::contact;
    use crate::rib::tests::{attrs, prefix};
    use crate::rib::RIB;

    #[test]
    fn test_should_withdraw() {
        let entry = contact(1000, 10, 20);
        assert!(should_withdraw(&entry, &[10, 20, 40], 100));
        assert!(should_withdraw(&entry, &[30, 20, 10], 100));
        assert!(should_withdraw(&entry, &[20, 40], 10));
        assert!(!should_withdraw(&entry, &[10, 30, 20], 100));
        assert!(!should_withdraw(&entry, &[10], 100));
        assert!(!should_withdraw(&entry, &[], 100));
        assert!(!should_withdraw(&entry, &[20], 30));
    }

    #[test]
    fn test_collect_withdrawals() {
        let mut rib = RIB::new();
        let a = rib.insert_from_config(prefix("10.10.0.0/16"), attrs("1.1.1.1", vec![10, 20, 40]));
        rib.insert_from_config(prefix("10.10.0.0/16"), attrs("1.1.1.1", vec![10, 30, 20]));
        let b = rib.insert_from_config(prefix("10.20.0.0/16"), attrs("1.1.1.2", vec![50, 20, 10]));
        rib.insert_from_config(prefix("10.30.0.0/16"), attrs("1.1.1.2", vec![20]));

        let intents = collect_withdrawals(&contact(1000, 10, 20), &rib, 100);
        let mut ids: Vec<_> = intents
            .iter()
            .map(|intent| match intent {
                RouteIntent::Withdraw { id, .. } => *id,
                other => panic!("Unexpected intent {}", other),
            })
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![a.id(), b.id()]);
        // Nothing changes until the intents are applied
        assert_eq!(rib.len(), 4);
        assert_eq!(rib.apply(intents), 2);
        assert_eq!(rib.len(), 2);
    }
}
