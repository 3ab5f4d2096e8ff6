mod file;

use std::net::IpAddr;
use std::path::PathBuf;

use bgp_rs::Origin;
use ipnetwork::IpNetwork;

use crate::contacts::{ContactSet, ScheduledContactEntry};
use crate::engine::{Neighbor, NeighborTable};
use crate::error::{ContactError, Result};
use crate::rib::PathAttributes;
use crate::utils::{asn_from_dotted, datetime_to_millis};

/// Parse a TOML config file and return a ServerConfig
pub fn from_file(path: &str) -> Result<ServerConfig> {
    let spec = file::ServerConfigSpec::from_file(path)?;
    ServerConfig::from_spec(spec)
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub router_id: IpAddr,
    pub local_as: u32,
    pub store_path: PathBuf,
    pub export_path: Option<PathBuf>,
    pub neighbors: Vec<Neighbor>,
    pub static_routes: Vec<StaticRoute>,
    /// Contacts declared in the config, invalid ones included
    pub contacts: ContactSet,
}

/// Route seeded into the RIB at startup
#[derive(Debug, Clone)]
pub struct StaticRoute {
    pub prefix: IpNetwork,
    pub attributes: PathAttributes,
}

impl ServerConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        from_file(path)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Self::from_spec(file::ServerConfigSpec::from_toml(contents)?)
    }

    pub fn neighbor_table(&self) -> NeighborTable {
        self.neighbors.iter().cloned().collect()
    }

    fn from_spec(spec: file::ServerConfigSpec) -> Result<Self> {
        let static_routes = spec
            .static_routes
            .iter()
            .map(|route| {
                let as_path = route
                    .as_path
                    .iter()
                    .map(|asn| asn_from_dotted(asn))
                    .collect::<std::result::Result<Vec<u32>, String>>()
                    .map_err(ContactError::Config)?;
                let origin = route
                    .origin
                    .as_ref()
                    .map(|o| match o.to_lowercase().as_str() {
                        "igp" => Origin::IGP,
                        "egp" => Origin::EGP,
                        _ => Origin::INCOMPLETE,
                    })
                    .unwrap_or(Origin::INCOMPLETE);
                Ok(StaticRoute {
                    prefix: route.prefix,
                    attributes: PathAttributes {
                        origin,
                        local_pref: route.local_pref,
                        multi_exit_disc: route.med,
                        ..PathAttributes::new(Some(route.next_hop), as_path)
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let contacts = spec
            .contacts
            .iter()
            .map(|c| {
                ScheduledContactEntry::new(
                    datetime_to_millis(&c.start_time),
                    c.duration_ms,
                    (c.asn1, c.gw1),
                    (c.asn2, c.gw2),
                )
            })
            .collect();

        Ok(Self {
            router_id: spec.router_id,
            local_as: spec.local_as,
            store_path: PathBuf::from(spec.store_path),
            export_path: spec.export_path.map(PathBuf::from),
            neighbors: spec.neighbors,
            static_routes,
            contacts,
        })
    }
}
