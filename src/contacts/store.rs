use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info, warn};

use super::{ContactSet, ScheduledContactEntry};
use crate::error::Result;

pub const DEFAULT_STORE_FILE: &str = "sces.bin";

/// start_time:u64, duration:u64, asn1:u32, gw1:u32, asn2:u32, gw2:u32
pub const RECORD_SIZE: usize = 32;

/// Flat file of fixed-size contact records (big-endian, no header)
///
/// The record count is derived from the file size alone. There is a single
/// writer; `save` overwrites the whole file and is not atomic across crashes.
#[derive(Debug, Clone)]
pub struct ContactStore {
    path: PathBuf,
}

impl ContactStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every whole record from the store, `None` if there is no store yet
    pub fn load(&self) -> Result<Option<ContactSet>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let whole = bytes.len() / RECORD_SIZE;
        let trailing = bytes.len() % RECORD_SIZE;
        if trailing != 0 {
            warn!(
                "{} has {} trailing bytes (not a whole record), ignoring them",
                self.path.display(),
                trailing
            );
        }
        let set = bytes[..whole * RECORD_SIZE]
            .chunks_exact(RECORD_SIZE)
            .map(|mut record| read_record(&mut record))
            .collect::<io::Result<ContactSet>>()?;
        debug!(
            "Loaded {} contacts ({} records) from {}",
            set.len(),
            whole,
            self.path.display()
        );
        Ok(Some(set))
    }

    /// Overwrite the store with every valid contact in `set`
    /// Returns the number of records written
    pub fn save(&self, set: &ContactSet) -> Result<usize> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        let mut written = 0;
        for entry in set.iter() {
            if !entry.is_valid() {
                debug!("Not storing invalid contact {}", entry);
                continue;
            }
            write_record(&mut writer, entry)?;
            written += 1;
        }
        writer.flush()?;
        debug!("Stored {} contacts in {}", written, self.path.display());
        Ok(written)
    }

    /// Merge `incoming` into the stored contacts
    /// Returns the valid contacts that were not stored before
    pub fn ingest(&self, incoming: &ContactSet) -> Result<ContactSet> {
        let existing = self.load()?.unwrap_or_default();
        let incoming: ContactSet = incoming.valid().copied().collect();
        let new = incoming.diff_new(&existing);
        self.save(&existing.merge(&incoming))?;
        info!(
            "Ingested {} contacts: {} new, {} already stored",
            incoming.len(),
            new.len(),
            incoming.len() - new.len()
        );
        Ok(new)
    }
}

fn write_record<W: Write>(writer: &mut W, entry: &ScheduledContactEntry) -> io::Result<()> {
    writer.write_u64::<NetworkEndian>(entry.start_time)?;
    writer.write_u64::<NetworkEndian>(entry.duration)?;
    writer.write_u32::<NetworkEndian>(entry.asn1)?;
    writer.write_u32::<NetworkEndian>(u32::from(entry.gw1))?;
    writer.write_u32::<NetworkEndian>(entry.asn2)?;
    writer.write_u32::<NetworkEndian>(u32::from(entry.gw2))?;
    Ok(())
}

fn read_record<R: Read>(reader: &mut R) -> io::Result<ScheduledContactEntry> {
    Ok(ScheduledContactEntry {
        start_time: reader.read_u64::<NetworkEndian>()?,
        duration: reader.read_u64::<NetworkEndian>()?,
        asn1: reader.read_u32::<NetworkEndian>()?,
        gw1: Ipv4Addr::from(reader.read_u32::<NetworkEndian>()?),
        asn2: reader.read_u32::<NetworkEndian>()?,
        gw2: Ipv4Addr::from(reader.read_u32::<NetworkEndian>()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::tests::{contact, reversed};
    use pretty_assertions::assert_eq;

    fn temp_store() -> (tempfile::TempDir, ContactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContactStore::new(dir.path().join(DEFAULT_STORE_FILE));
        (dir, store)
    }

    #[test]
    fn test_record_layout() {
        let entry = ScheduledContactEntry::new(
            1000,
            500,
            (10, Ipv4Addr::new(1, 1, 1, 1)),
            (20, Ipv4Addr::new(2, 2, 2, 2)),
        );
        let mut buf = vec![];
        write_record(&mut buf, &entry).unwrap();
        assert_eq!(buf.len(), RECORD_SIZE);
        assert_eq!(&buf[..8], &[0, 0, 0, 0, 0, 0, 0x03, 0xe8]);
        assert_eq!(&buf[8..16], &[0, 0, 0, 0, 0, 0, 0x01, 0xf4]);
        assert_eq!(&buf[16..20], &[0, 0, 0, 10]);
        assert_eq!(&buf[20..24], &[1, 1, 1, 1]);
        assert_eq!(&buf[24..28], &[0, 0, 0, 20]);
        assert_eq!(&buf[28..32], &[2, 2, 2, 2]);
        let decoded = read_record(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.asn1, 10);
    }

    #[test]
    fn test_load_missing_store() {
        let (_dir, store) = temp_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_load_merged() {
        let (_dir, store) = temp_store();
        let existing: ContactSet = vec![contact(1000, 10, 20), contact(2000, 30, 40)]
            .into_iter()
            .collect();
        let incoming: ContactSet = vec![
            reversed(&contact(2000, 30, 40)),
            contact(3000, 10, 50),
            // Inert, never persisted
            contact(0, 10, 60),
        ]
        .into_iter()
        .collect();
        let merged = existing.merge(&incoming);
        assert_eq!(store.save(&merged).unwrap(), 3);
        let loaded = store.load().unwrap().unwrap();
        let expected: ContactSet = merged.valid().copied().collect();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_truncated_store() {
        let (_dir, store) = temp_store();
        let set: ContactSet = vec![contact(1000, 10, 20), contact(2000, 30, 40)]
            .into_iter()
            .collect();
        store.save(&set).unwrap();
        let mut bytes = fs::read(store.path()).unwrap();
        bytes.truncate(RECORD_SIZE + 20);
        fs::write(store.path(), &bytes).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains(&contact(1000, 10, 20)));

        fs::write(store.path(), &bytes[..RECORD_SIZE - 1]).unwrap();
        assert!(store.load().unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_ingest_into_empty_store() {
        let (_dir, store) = temp_store();
        let entry = ScheduledContactEntry::new(
            1000,
            500,
            (10, Ipv4Addr::new(1, 1, 1, 1)),
            (20, Ipv4Addr::new(2, 2, 2, 2)),
        );
        let incoming: ContactSet = vec![entry].into_iter().collect();
        let new = store.ingest(&incoming).unwrap();
        assert_eq!(new, incoming);
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        let stored = loaded.iter().next().unwrap();
        assert_eq!(stored.start_time, 1000);
        assert_eq!(stored.duration, 500);
        assert_eq!(stored.gw1, Ipv4Addr::new(1, 1, 1, 1));
        assert_eq!(stored.gw2, Ipv4Addr::new(2, 2, 2, 2));
    }

    #[test]
    fn test_ingest_reversed_contact() {
        let (_dir, store) = temp_store();
        let gw_a = Ipv4Addr::new(1, 1, 1, 1);
        let gw_b = Ipv4Addr::new(2, 2, 2, 2);
        let first: ContactSet = vec![ScheduledContactEntry::new(1000, 500, (10, gw_a), (20, gw_b))]
            .into_iter()
            .collect();
        let second: ContactSet = vec![ScheduledContactEntry::new(1000, 500, (20, gw_b), (10, gw_a))]
            .into_iter()
            .collect();
        assert_eq!(store.ingest(&first).unwrap().len(), 1);
        assert!(store.ingest(&second).unwrap().is_empty());
        assert_eq!(store.load().unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_ingest_skips_invalid() {
        let (_dir, store) = temp_store();
        let incoming: ContactSet = vec![contact(1000, 10, 20), contact(1000, 0, 20)]
            .into_iter()
            .collect();
        let new = store.ingest(&incoming).unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(store.load().unwrap().unwrap().len(), 1);
    }
}
