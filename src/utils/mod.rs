mod display;
pub use display::*;

pub fn transform_u32_to_bytes(x: u32) -> [u8; 4] {
    let b1: u8 = ((x >> 24) & 0xff) as u8;
    let b2: u8 = ((x >> 16) & 0xff) as u8;
    let b3: u8 = ((x >> 8) & 0xff) as u8;
    let b4: u8 = (x & 0xff) as u8;
    [b1, b2, b3, b4]
}

pub fn as_u16_be(array: [u8; 2]) -> u16 {
    (u16::from(array[0]) << 8) + u16::from(array[1])
}

/// Parse an ASN in plain ("4259840100") or dotted ("65000.100") notation
pub fn asn_from_dotted(value: &str) -> Result<u32, String> {
    match value.split_once('.') {
        Some((high, low)) => {
            let high: u16 = high
                .parse()
                .map_err(|_| format!("Invalid ASN: '{}'", value))?;
            let low: u16 = low.parse().map_err(|_| format!("Invalid ASN: '{}'", value))?;
            Ok((u32::from(high) << 16) + u32::from(low))
        }
        None => value
            .parse()
            .map_err(|_| format!("Invalid ASN: '{}'", value)),
    }
}
