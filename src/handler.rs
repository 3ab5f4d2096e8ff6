use std::fs;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::signal::unix::{signal, SignalKind};

use crate::config::ServerConfig;
use crate::contacts::{codec, ContactEvent, ContactScheduler, ContactSet, ContactStore};
use crate::engine::{ContactEngine, NeighborTable};
use crate::error::Result;
use crate::rib::RIB;
use crate::utils::{datetime_to_millis, u32_to_dotted};

/// Owns the RIB and everything that reacts to scheduled contacts
pub struct Server {
    config: ServerConfig,
    rib: RIB,
    store: ContactStore,
    scheduler: ContactScheduler,
    engine: ContactEngine<NeighborTable>,
}

impl Server {
    /// Seeds the RIB with the configured static routes, nothing is scheduled yet
    pub fn new(config: ServerConfig) -> Self {
        let mut rib = RIB::new();
        for route in &config.static_routes {
            rib.insert_from_config(route.prefix, route.attributes.clone());
        }
        debug!("Seeded RIB with {} static routes", rib.len());
        Self {
            store: ContactStore::new(&config.store_path),
            engine: ContactEngine::new(config.local_as, config.neighbor_table()),
            scheduler: ContactScheduler::new(),
            rib,
            config,
        }
    }

    pub fn rib(&self) -> &RIB {
        &self.rib
    }

    pub fn scheduler(&self) -> &ContactScheduler {
        &self.scheduler
    }

    /// Merge `incoming` into the store and schedule the contacts it did not have yet
    pub fn ingest(&mut self, incoming: &ContactSet) -> Result<ContactSet> {
        let new = self.store.ingest(incoming)?;
        for timer in self.scheduler.register(&new, Utc::now()) {
            debug!(
                "{} timer for {} fires in {:?}",
                timer.boundary, timer.entry, timer.delay
            );
        }
        Ok(new)
    }

    /// Schedule stored contacts that have not ended yet, returns how many
    pub fn resume(&mut self) -> Result<usize> {
        let stored = match self.store.load()? {
            Some(stored) => stored,
            None => return Ok(0),
        };
        let now = Utc::now();
        let now_ms = datetime_to_millis(&now);
        let upcoming: ContactSet = stored
            .into_iter()
            .filter(|entry| entry.end_time() > now_ms)
            .collect();
        let registered = self.scheduler.register(&upcoming, now).len() / 2;
        info!("Resumed {} stored contacts", registered);
        Ok(registered)
    }

    /// CBOR export of every stored contact, also written to `export_path` if configured
    pub fn export(&self) -> Result<Vec<u8>> {
        let stored = self.store.load()?.unwrap_or_default();
        let bytes = codec::export(&stored)?;
        if let Some(path) = &self.config.export_path {
            fs::write(path, &bytes)?;
            info!(
                "Exported {} contacts ({} bytes) to {}",
                stored.len(),
                bytes.len(),
                path.display()
            );
        }
        Ok(bytes)
    }

    /// Wait for the next contact boundary and update the RIB for it
    /// Returns `None` once nothing is scheduled.
    pub async fn process_next_event(&mut self) -> Option<(ContactEvent, usize)> {
        let event = self.scheduler.next_event().await?;
        let applied = self.engine.handle_event(&event, &mut self.rib);
        Some((event, applied))
    }
}

enum Wake {
    Event(Option<(ContactEvent, usize)>),
    Reload,
    Stop,
}

/// Run the contact daemon until Ctrl-C
///
/// SIGHUP re-reads `config_path` and ingests its contacts.
pub async fn serve(config_path: &str) -> Result<()> {
    let config = ServerConfig::from_file(config_path)?;
    let contacts = config.contacts.clone();
    let mut server = Server::new(config);
    server.resume()?;
    let new = server.ingest(&contacts)?;
    info!(
        "Router {} (AS{}) serving {} routes, {} new contacts from {}",
        server.config.router_id,
        u32_to_dotted(server.config.local_as, '.'),
        server.rib.len(),
        new.len(),
        config_path
    );

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        let scheduled = !server.scheduler.is_idle();
        let wake = tokio::select! {
            handled = server.process_next_event(), if scheduled => Wake::Event(handled),
            _ = hangup.recv() => Wake::Reload,
            _ = tokio::signal::ctrl_c() => Wake::Stop,
        };
        match wake {
            Wake::Event(Some((event, applied))) => {
                debug!("Handled {} ({} routes changed)", event, applied)
            }
            Wake::Event(None) => debug!("No contacts scheduled"),
            Wake::Reload => match ServerConfig::from_file(config_path) {
                Ok(config) => match server.ingest(&config.contacts) {
                    Ok(new) => info!("Reloaded {}: {} new contacts", config_path, new.len()),
                    Err(err) => warn!("Error ingesting contacts from {}: {}", config_path, err),
                },
                Err(err) => warn!("Error reloading {}: {}", config_path, err),
            },
            Wake::Stop => {
                info!("Stopping with {} contacts pending", server.scheduler.pending());
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::{Boundary, ScheduledContactEntry};
    use crate::rib::EntrySource;
    use std::net::Ipv4Addr;

    fn config(dir: &tempfile::TempDir) -> ServerConfig {
        let contents = format!(
            r#"
router_id = "1.1.1.1"
local_as = 100
store_path = "{}"
export_path = "{}"

[[neighbors]]
address = "1.1.1.11"
interface = "sat0"

[[static_routes]]
prefix = "10.10.0.0/16"
next_hop = "192.168.0.1"
as_path = ["10", "30"]

[[static_routes]]
prefix = "10.10.0.0/16"
next_hop = "192.168.0.2"
as_path = ["50", "20"]
"#,
            dir.path().join("sces.bin").display(),
            dir.path().join("sces.cbor").display(),
        );
        ServerConfig::from_toml(&contents).unwrap()
    }

    fn upcoming_contact(delay_ms: u64) -> ScheduledContactEntry {
        ScheduledContactEntry::new(
            datetime_to_millis(&Utc::now()) + delay_ms,
            500,
            (10, Ipv4Addr::new(1, 1, 1, 11)),
            (20, Ipv4Addr::new(2, 2, 2, 21)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_contact_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = Server::new(config(&dir));
        assert_eq!(server.rib().len(), 2);

        let entry = upcoming_contact(60_000);
        let incoming: ContactSet = vec![entry].into_iter().collect();
        assert_eq!(server.ingest(&incoming).unwrap().len(), 1);
        assert!(server.ingest(&incoming).unwrap().is_empty());
        assert_eq!(server.scheduler().pending(), 1);

        let (event, applied) = server.process_next_event().await.unwrap();
        assert_eq!(event.boundary, Boundary::Begin);
        assert_eq!(applied, 1);
        let synthesized = server.rib().get_routes_from(EntrySource::Contact);
        assert_eq!(synthesized.len(), 1);
        assert_eq!(synthesized[0].attributes().as_path_asns(), vec![10, 20]);

        let (event, applied) = server.process_next_event().await.unwrap();
        assert_eq!(event.boundary, Boundary::End);
        assert_eq!(applied, 1);
        assert!(server.rib().get_routes_from(EntrySource::Contact).is_empty());
        assert_eq!(server.rib().len(), 2);
        assert!(server.process_next_event().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_stored_contacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut ended = upcoming_contact(0);
        ended.start_time = 1000;
        let incoming: ContactSet = vec![upcoming_contact(60_000), ended].into_iter().collect();
        Server::new(config(&dir)).ingest(&incoming).unwrap();

        let mut server = Server::new(config(&dir));
        assert_eq!(server.resume().unwrap(), 1);
        assert_eq!(server.scheduler().pending(), 1);
    }

    #[test]
    fn test_export() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::new(config(&dir));
        assert_eq!(server.export().unwrap(), vec![0x80]);

        let entry = upcoming_contact(60_000);
        let incoming: ContactSet = vec![entry].into_iter().collect();
        server.store.ingest(&incoming).unwrap();
        let bytes = server.export().unwrap();
        assert_eq!(codec::decode(&bytes).unwrap(), vec![entry]);
        assert_eq!(fs::read(dir.path().join("sces.cbor")).unwrap(), bytes);
    }
}
