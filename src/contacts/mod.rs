pub mod codec;
pub mod scheduler;
pub mod store;

pub use scheduler::{Boundary, ContactEvent, ContactScheduler, RegisteredTimer};
pub use store::ContactStore;

use std::cmp::Ordering;
use std::collections::{btree_set, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::utils::{format_millis_as_utc, u32_to_dotted};

/// One declared contact: `asn1` and `asn2` can reach each other through
/// `gw1`/`gw2` during `[start_time, start_time + duration)`
///
/// Times are milliseconds since the Unix epoch. `gw1` is the gateway used from
/// `asn1`'s side and `gw2` the one used from `asn2`'s side; swapping an ASN means
/// swapping its gateway with it.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ScheduledContactEntry {
    pub start_time: u64,
    pub duration: u64,
    pub asn1: u32,
    pub gw1: Ipv4Addr,
    pub asn2: u32,
    pub gw2: Ipv4Addr,
}

type ContactKey = (u64, u64, (u32, Ipv4Addr), (u32, Ipv4Addr));

impl ScheduledContactEntry {
    pub fn new(
        start_time: u64,
        duration: u64,
        (asn1, gw1): (u32, Ipv4Addr),
        (asn2, gw2): (u32, Ipv4Addr),
    ) -> Self {
        Self {
            start_time,
            duration,
            asn1,
            gw1,
            asn2,
            gw2,
        }
    }

    /// Entries with any zero field (or a contact of an AS with itself) are inert
    pub fn is_valid(&self) -> bool {
        self.start_time != 0
            && self.duration != 0
            && self.asn1 != 0
            && self.asn2 != 0
            && !self.gw1.is_unspecified()
            && !self.gw2.is_unspecified()
            && self.asn1 != self.asn2
    }

    pub fn end_time(&self) -> u64 {
        self.start_time.saturating_add(self.duration)
    }

    /// Is this contact the adjacency between `a` and `b` (in either order)
    pub fn joins(&self, a: u32, b: u32) -> bool {
        (a == self.asn1 && b == self.asn2) || (a == self.asn2 && b == self.asn1)
    }

    /// The endpoint across the contact from `asn`, if `asn` is an endpoint
    pub fn other_endpoint(&self, asn: u32) -> Option<u32> {
        if asn == self.asn1 {
            Some(self.asn2)
        } else if asn == self.asn2 {
            Some(self.asn1)
        } else {
            None
        }
    }

    // Both (asn, gateway) pairs in a fixed order, so equality ignores which
    // side was declared first but never splits an ASN from its gateway
    fn key(&self) -> ContactKey {
        let first = (self.asn1, self.gw1);
        let second = (self.asn2, self.gw2);
        if first <= second {
            (self.start_time, self.duration, first, second)
        } else {
            (self.start_time, self.duration, second, first)
        }
    }
}

impl PartialEq for ScheduledContactEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ScheduledContactEntry {}

impl Hash for ScheduledContactEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for ScheduledContactEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledContactEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for ScheduledContactEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<Contact AS{} ({}) <-> AS{} ({}) start={} duration={}ms>",
            u32_to_dotted(self.asn1, '.'),
            self.gw1,
            u32_to_dotted(self.asn2, '.'),
            self.gw2,
            format_millis_as_utc(self.start_time),
            self.duration,
        )
    }
}

/// Deduplicated collection of contacts, iterated in a stable order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactSet(BTreeSet<ScheduledContactEntry>);

impl ContactSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns false if an equal contact was already present
    pub fn insert(&mut self, entry: ScheduledContactEntry) -> bool {
        self.0.insert(entry)
    }

    pub fn contains(&self, entry: &ScheduledContactEntry) -> bool {
        self.0.contains(entry)
    }

    pub fn iter(&self) -> btree_set::Iter<ScheduledContactEntry> {
        self.0.iter()
    }

    pub fn valid(&self) -> impl Iterator<Item = &ScheduledContactEntry> {
        self.0.iter().filter(|e| e.is_valid())
    }

    /// Union of both sets
    pub fn merge(&self, other: &ContactSet) -> ContactSet {
        Self(self.0.union(&other.0).copied().collect())
    }

    /// Contacts in `self` with no equal contact in `existing`
    pub fn diff_new(&self, existing: &ContactSet) -> ContactSet {
        Self(self.0.difference(&existing.0).copied().collect())
    }
}

impl FromIterator<ScheduledContactEntry> for ContactSet {
    fn from_iter<I: IntoIterator<Item = ScheduledContactEntry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<ScheduledContactEntry> for ContactSet {
    fn extend<I: IntoIterator<Item = ScheduledContactEntry>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

impl IntoIterator for ContactSet {
    type Item = ScheduledContactEntry;
    type IntoIter = btree_set::IntoIter<ScheduledContactEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ContactSet {
    type Item = &'a ScheduledContactEntry;
    type IntoIter = btree_set::Iter<'a, ScheduledContactEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ContactSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<ContactSet entries={}>", self.0.len())
    }
}
