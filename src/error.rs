use std::io;
use std::net::Ipv4Addr;

pub type Result<T> = std::result::Result<T, ContactError>;

#[derive(thiserror::Error, Debug)]
pub enum ContactError {
    /// Reading or writing the contact store failed
    #[error("contact store error: {0}")]
    Store(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("export error: {0}")]
    Codec(#[from] CodecError),

    /// No local neighbor answers for the contact gateway
    #[error("no neighbor for gateway {0}")]
    UnresolvedGateway(Ipv4Addr),

    /// The router is not an endpoint of the contact, so no gateway applies
    #[error("AS{own_asn} is not an endpoint of contact AS{asn1} <-> AS{asn2}")]
    NotAnEndpoint { own_asn: u32, asn1: u32, asn2: u32 },
}

impl From<toml::de::Error> for ContactError {
    fn from(error: toml::de::Error) -> Self {
        ContactError::Config(error.to_string())
    }
}

/// Failures of the CBOR export codec
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// Output would not fit in the supplied buffer
    #[error("insufficient capacity: encoding needs more than {0} bytes")]
    InsufficientCapacity(usize),

    #[error("encoding failed: {0}")]
    Encode(String),

    /// Input ended before a complete item was read
    #[error("truncated input")]
    Truncated,

    /// Input is not well-formed CBOR
    #[error("malformed input at offset {0}")]
    Malformed(usize),

    /// Well-formed CBOR that is not an array of contact records
    #[error("unexpected shape: {0}")]
    UnexpectedShape(String),
}
