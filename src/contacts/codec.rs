//! CBOR export of the stored contacts
//!
//! The export is a definite-length array with one 6-element array per contact:
//! `[start_time, duration, asn1, gw1, asn2, gw2]`. Gateways are written as their
//! 32-bit integer value and every integer uses its shortest encoding.

use std::fmt;
use std::io;
use std::net::Ipv4Addr;

use ciborium::{de, ser};
use log::trace;
use serde::de::{Error as _, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use super::{ContactSet, ScheduledContactEntry};
use crate::error::CodecError;

// Largest encodings: array header with a u64 length (9), u64 item (9), u32 item (5)
const MAX_ARRAY_HEADER: usize = 9;
const MAX_RECORD_LEN: usize = 1 + 2 * 9 + 4 * 5;

const RECORD_FIELDS: usize = 6;

#[derive(Debug, Serialize)]
struct ContactRecord(u64, u64, u32, u32, u32, u32);

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = ContactRecord;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an array of {} integers", RECORD_FIELDS)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let record = ContactRecord(
            seq.next_element()?
                .ok_or_else(|| A::Error::invalid_length(0, &self))?,
            seq.next_element()?
                .ok_or_else(|| A::Error::invalid_length(1, &self))?,
            seq.next_element()?
                .ok_or_else(|| A::Error::invalid_length(2, &self))?,
            seq.next_element()?
                .ok_or_else(|| A::Error::invalid_length(3, &self))?,
            seq.next_element()?
                .ok_or_else(|| A::Error::invalid_length(4, &self))?,
            seq.next_element()?
                .ok_or_else(|| A::Error::invalid_length(5, &self))?,
        );
        // Extra fields are a shape error, not trailing garbage
        if seq.next_element::<IgnoredAny>()?.is_some() {
            return Err(A::Error::invalid_length(RECORD_FIELDS + 1, &self));
        }
        Ok(record)
    }
}

impl<'de> Deserialize<'de> for ContactRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_tuple(RECORD_FIELDS, RecordVisitor)
    }
}

impl From<&ScheduledContactEntry> for ContactRecord {
    fn from(entry: &ScheduledContactEntry) -> Self {
        ContactRecord(
            entry.start_time,
            entry.duration,
            entry.asn1,
            u32::from(entry.gw1),
            entry.asn2,
            u32::from(entry.gw2),
        )
    }
}

impl From<ContactRecord> for ScheduledContactEntry {
    fn from(record: ContactRecord) -> Self {
        let ContactRecord(start_time, duration, asn1, gw1, asn2, gw2) = record;
        ScheduledContactEntry {
            start_time,
            duration,
            asn1,
            gw1: Ipv4Addr::from(gw1),
            asn2,
            gw2: Ipv4Addr::from(gw2),
        }
    }
}

/// Upper bound of the encoded size of `entries` contacts
pub fn max_encoded_len(entries: usize) -> usize {
    MAX_ARRAY_HEADER + entries * MAX_RECORD_LEN
}

/// Encode `set` into `buf`, returning the number of bytes written
///
/// Fails with `InsufficientCapacity` rather than writing past the end of `buf`.
pub fn encode_into(set: &ContactSet, buf: &mut [u8]) -> Result<usize, CodecError> {
    let records: Vec<ContactRecord> = set.iter().map(ContactRecord::from).collect();
    let capacity = buf.len();
    let mut cursor: &mut [u8] = buf;
    match ser::into_writer(&records, &mut cursor) {
        Ok(()) => {
            let written = capacity - cursor.len();
            trace!("Encoded {} contacts in {} bytes", records.len(), written);
            Ok(written)
        }
        Err(ser::Error::Io(err)) if err.kind() == io::ErrorKind::WriteZero => {
            Err(CodecError::InsufficientCapacity(capacity))
        }
        Err(err) => Err(CodecError::Encode(format!("{:?}", err))),
    }
}

/// Encode `set` into a buffer sized from `max_encoded_len`
pub fn export(set: &ContactSet) -> Result<Vec<u8>, CodecError> {
    let mut buf = vec![0u8; max_encoded_len(set.len())];
    let len = encode_into(set, &mut buf)?;
    buf.truncate(len);
    Ok(buf)
}

/// Decode an export back into its contacts, in encoded order
///
/// Input ending early is `Truncated`, bytes that are not CBOR (or follow the
/// top-level item) are `Malformed`, and CBOR of any other shape is `UnexpectedShape`.
pub fn decode(bytes: &[u8]) -> Result<Vec<ScheduledContactEntry>, CodecError> {
    let mut reader = bytes;
    let records: Vec<ContactRecord> = de::from_reader(&mut reader).map_err(|err| match err {
        de::Error::Io(_) => CodecError::Truncated,
        de::Error::Syntax(offset) => CodecError::Malformed(offset),
        de::Error::Semantic(_, reason) => CodecError::UnexpectedShape(reason),
        de::Error::RecursionLimitExceeded => {
            CodecError::UnexpectedShape("nesting too deep".to_string())
        }
    })?;
    if !reader.is_empty() {
        return Err(CodecError::Malformed(bytes.len() - reader.len()));
    }
    Ok(records.into_iter().map(ScheduledContactEntry::from).collect())
}
