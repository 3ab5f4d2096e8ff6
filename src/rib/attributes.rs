use std::fmt;
use std::net::IpAddr;

use bgp_rs::{ASPath, Origin, Segment};

use crate::utils::format_as_path;

#[derive(Debug, Clone)]
pub struct PathAttributes {
    pub next_hop: Option<IpAddr>,
    pub origin: Origin,
    pub as_path: ASPath,
    pub local_pref: Option<u32>,
    pub multi_exit_disc: Option<u32>,
}

impl PathAttributes {
    pub fn new(next_hop: Option<IpAddr>, as_path: Vec<u32>) -> Self {
        Self {
            next_hop,
            origin: Origin::INCOMPLETE,
            as_path: as_sequence(as_path),
            local_pref: None,
            multi_exit_disc: None,
        }
    }

    /// Flattened AS path, oldest hop first
    pub fn as_path_asns(&self) -> Vec<u32> {
        flatten_as_path(&self.as_path)
    }

    /// Copy of these attributes carrying a different AS path and next hop
    pub fn with_path(&self, as_path: ASPath, next_hop: Option<IpAddr>) -> Self {
        Self {
            next_hop,
            origin: self.origin.clone(),
            as_path,
            local_pref: self.local_pref,
            multi_exit_disc: self.multi_exit_disc,
        }
    }
}

impl fmt::Display for PathAttributes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let next_hop = self
            .next_hop
            .map(|nh| nh.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "<PathAttributes next_hop={} as_path=[{}]>",
            next_hop,
            format_as_path(&self.as_path_asns())
        )
    }
}

/// Wire-form AS_PATH holding `asns` as a single AS_SEQUENCE
pub fn as_sequence(asns: Vec<u32>) -> ASPath {
    if asns.is_empty() {
        ASPath { segments: vec![] }
    } else {
        ASPath {
            segments: vec![Segment::AS_SEQUENCE(asns)],
        }
    }
}

/// All ASNs of every segment, in order
pub fn flatten_as_path(as_path: &ASPath) -> Vec<u32> {
    as_path
        .segments
        .iter()
        .flat_map(|segment| match segment {
            Segment::AS_SEQUENCE(asns) => asns.iter(),
            Segment::AS_SET(asns) => asns.iter(),
        })
        .copied()
        .collect()
}
