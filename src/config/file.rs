use std::fs::File;
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr};

use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use serde::Deserialize;

use crate::contacts::store::DEFAULT_STORE_FILE;
use crate::engine::Neighbor;
use crate::error::Result;

struct Defaults {}

impl Defaults {
    fn store_path() -> String {
        DEFAULT_STORE_FILE.to_string()
    }
}

/// Config (toml) representation of a static route
#[derive(Clone, Debug, Deserialize)]
pub(super) struct RouteConfigSpec {
    pub(super) prefix: IpNetwork,
    pub(super) next_hop: IpAddr,
    // ASNs, plain or dotted (E.g. ["100", "65000.100"])
    #[serde(default = "Vec::new")]
    pub(super) as_path: Vec<String>,
    // igp, egp or incomplete (default)
    pub(super) origin: Option<String>,
    pub(super) local_pref: Option<u32>,
    pub(super) med: Option<u32>,
}

/// Config (toml) representation of a scheduled contact
#[derive(Clone, Debug, Deserialize)]
pub(super) struct ContactConfigSpec {
    pub(super) start_time: DateTime<Utc>,
    pub(super) duration_ms: u64,
    pub(super) asn1: u32,
    pub(super) gw1: Ipv4Addr,
    pub(super) asn2: u32,
    pub(super) gw2: Ipv4Addr,
}

#[derive(Debug, Deserialize)]
pub(super) struct ServerConfigSpec {
    pub(super) router_id: IpAddr,
    // ASN of this router, prepended to every path during contact searches
    pub(super) local_as: u32,
    // Flat file holding the scheduled contacts
    #[serde(default = "Defaults::store_path")]
    pub(super) store_path: String,
    // Where `export` writes the CBOR export, if anywhere
    pub(super) export_path: Option<String>,
    // Neighbors contact gateways resolve to
    #[serde(default = "Vec::new")]
    pub(super) neighbors: Vec<Neighbor>,
    #[serde(default = "Vec::new")]
    pub(super) static_routes: Vec<RouteConfigSpec>,
    #[serde(default = "Vec::new")]
    pub(super) contacts: Vec<ContactConfigSpec>,
}

impl ServerConfigSpec {
    pub(super) fn from_file(path: &str) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_toml(&contents)
    }

    pub(super) fn from_toml(contents: &str) -> Result<Self> {
        let config: ServerConfigSpec = toml::from_str(contents)?;
        Ok(config)
    }
}
