pub mod attributes;

pub use attributes::{as_sequence, flatten_as_path, PathAttributes};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use log::{debug, trace, warn};

use crate::utils::format_time_as_elapsed;

pub type RouteId = u64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntrySource {
    /// Static route from the config file
    Config,
    /// Synthesized when a scheduled contact began
    Contact,
}

impl fmt::Display for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let display = match self {
            EntrySource::Config => "Config",
            EntrySource::Contact => "Contact",
        };
        write!(f, "{}", display)
    }
}

#[derive(Debug)]
pub struct Entry {
    pub(crate) id: RouteId,
    // Time inserted
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) prefix: IpNetwork,
    pub(crate) attributes: Arc<PathAttributes>,
    pub(crate) source: EntrySource,
}

impl Entry {
    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn prefix(&self) -> IpNetwork {
        self.prefix
    }

    pub fn attributes(&self) -> &PathAttributes {
        &self.attributes
    }

    pub fn source(&self) -> EntrySource {
        self.source
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<Entry id={} prefix={} source={} age={} {}>",
            self.id,
            self.prefix,
            self.source,
            format_time_as_elapsed(self.timestamp),
            self.attributes,
        )
    }
}

/// Route change decided during a table walk, applied once the walk is done
#[derive(Debug, Clone)]
pub enum RouteIntent {
    Announce {
        prefix: IpNetwork,
        attributes: Arc<PathAttributes>,
        source: EntrySource,
    },
    Withdraw {
        prefix: IpNetwork,
        id: RouteId,
    },
}

impl fmt::Display for RouteIntent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RouteIntent::Announce {
                prefix, attributes, ..
            } => write!(f, "announce {} {}", prefix, attributes),
            RouteIntent::Withdraw { prefix, id } => write!(f, "withdraw {} (route {})", prefix, id),
        }
    }
}

/// Routing table as seen by the contact engine
///
/// Walks only need `&self`; changes go through `announce`/`withdraw` (or `apply`)
/// with `&mut self`, so a table can't change under an ongoing walk.
pub trait RouteTable {
    /// Every destination with at least one route
    fn prefixes(&self) -> Vec<IpNetwork>;

    /// All routes towards `prefix`
    fn routes_for(&self, prefix: &IpNetwork) -> Vec<Arc<Entry>>;

    fn announce(
        &mut self,
        prefix: IpNetwork,
        attributes: Arc<PathAttributes>,
        source: EntrySource,
    ) -> Arc<Entry>;

    /// Returns false if there was no such route
    fn withdraw(&mut self, prefix: &IpNetwork, id: RouteId) -> bool;

    /// Apply intents collected by a walk, returns how many changed the table
    fn apply(&mut self, intents: Vec<RouteIntent>) -> usize {
        let mut applied = 0;
        for intent in intents {
            match intent {
                RouteIntent::Announce {
                    prefix,
                    attributes,
                    source,
                } => {
                    self.announce(prefix, attributes, source);
                    applied += 1;
                }
                RouteIntent::Withdraw { prefix, id } => {
                    if self.withdraw(&prefix, id) {
                        applied += 1;
                    } else {
                        warn!("No route {} to withdraw for {}", id, prefix);
                    }
                }
            }
        }
        applied
    }
}

/// In-memory RIB, routes grouped by destination prefix
#[derive(Debug, Default)]
pub struct RIB {
    entries: HashMap<IpNetwork, Vec<Arc<Entry>>>,
    next_id: RouteId,
}

impl RIB {
    pub fn new() -> Self {
        Self {
            entries: HashMap::with_capacity(64),
            next_id: 1,
        }
    }

    /// Total number of routes
    pub fn len(&self) -> usize {
        self.entries.values().map(|routes| routes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_routes(&self) -> Vec<Arc<Entry>> {
        self.entries.values().flatten().cloned().collect()
    }

    pub fn get_routes_from(&self, source: EntrySource) -> Vec<Arc<Entry>> {
        self.entries
            .values()
            .flatten()
            .filter(|e| e.source == source)
            .cloned()
            .collect()
    }

    pub fn insert_from_config(
        &mut self,
        prefix: IpNetwork,
        attributes: PathAttributes,
    ) -> Arc<Entry> {
        self.announce(prefix, Arc::new(attributes), EntrySource::Config)
    }
}

impl RouteTable for RIB {
    fn prefixes(&self) -> Vec<IpNetwork> {
        self.entries.keys().copied().collect()
    }

    fn routes_for(&self, prefix: &IpNetwork) -> Vec<Arc<Entry>> {
        self.entries.get(prefix).cloned().unwrap_or_default()
    }

    fn announce(
        &mut self,
        prefix: IpNetwork,
        attributes: Arc<PathAttributes>,
        source: EntrySource,
    ) -> Arc<Entry> {
        let id = self.next_id;
        self.next_id += 1;
        let entry = Arc::new(Entry {
            id,
            timestamp: Utc::now(),
            prefix,
            attributes,
            source,
        });
        trace!("Adding {}", entry);
        self.entries.entry(prefix).or_default().push(entry.clone());
        entry
    }

    fn withdraw(&mut self, prefix: &IpNetwork, id: RouteId) -> bool {
        let routes = match self.entries.get_mut(prefix) {
            Some(routes) => routes,
            None => return false,
        };
        let before = routes.len();
        routes.retain(|e| e.id != id);
        let removed = routes.len() != before;
        if routes.is_empty() {
            self.entries.remove(prefix);
        }
        if removed {
            debug!("Removed route {} for {}", id, prefix);
        }
        removed
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn prefix(s: &str) -> IpNetwork {
        s.parse().unwrap()
    }

    pub(crate) fn attrs(next_hop: &str, as_path: Vec<u32>) -> PathAttributes {
        PathAttributes::new(Some(next_hop.parse().unwrap()), as_path)
    }

    #[test]
    fn test_announce_withdraw() {
        let mut rib = RIB::new();
        let a = rib.insert_from_config(prefix("10.10.0.0/16"), attrs("1.1.1.1", vec![10, 30]));
        let b = rib.insert_from_config(prefix("10.10.0.0/16"), attrs("1.1.1.2", vec![50, 20]));
        rib.insert_from_config(prefix("10.20.0.0/16"), attrs("1.1.1.1", vec![10]));
        assert_ne!(a.id(), b.id());
        assert_eq!(rib.len(), 3);
        assert_eq!(rib.prefixes().len(), 2);
        assert_eq!(rib.routes_for(&prefix("10.10.0.0/16")).len(), 2);
        assert!(rib.routes_for(&prefix("10.30.0.0/16")).is_empty());

        assert!(rib.withdraw(&prefix("10.10.0.0/16"), a.id()));
        assert!(!rib.withdraw(&prefix("10.10.0.0/16"), a.id()));
        assert!(!rib.withdraw(&prefix("10.30.0.0/16"), b.id()));
        assert_eq!(rib.len(), 2);

        assert!(rib.withdraw(&prefix("10.10.0.0/16"), b.id()));
        assert_eq!(rib.prefixes(), vec![prefix("10.20.0.0/16")]);
    }

    #[test]
    fn test_apply_intents() {
        let mut rib = RIB::new();
        let existing =
            rib.insert_from_config(prefix("10.10.0.0/16"), attrs("1.1.1.1", vec![10, 30]));
        let intents = vec![
            RouteIntent::Announce {
                prefix: prefix("10.10.0.0/16"),
                attributes: Arc::new(attrs("1.1.1.1", vec![10, 20, 40])),
                source: EntrySource::Contact,
            },
            RouteIntent::Withdraw {
                prefix: prefix("10.10.0.0/16"),
                id: existing.id(),
            },
            RouteIntent::Withdraw {
                prefix: prefix("10.10.0.0/16"),
                id: 999,
            },
        ];
        assert_eq!(rib.apply(intents), 2);
        let routes = rib.get_routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].source(), EntrySource::Contact);
        assert_eq!(routes[0].attributes().as_path_asns(), vec![10, 20, 40]);
        assert_eq!(rib.get_routes_from(EntrySource::Config).len(), 0);
    }
}
