use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use itertools::Itertools;

use super::*;

/// Convert an ASN (4 byte) as dotted if it exceeds the 2-byte limit
/// E.g. 42598400100 -> "65000.100"
pub fn u32_to_dotted(asn: u32, sep: char) -> String {
    if asn < std::u16::MAX as u32 {
        format!("{}", asn)
    } else {
        let bytes = transform_u32_to_bytes(asn);
        format!(
            "{}{}{}",
            as_u16_be([bytes[0], bytes[1]]),
            sep,
            as_u16_be([bytes[2], bytes[3]])
        )
    }
}

/// Space delimited ASNs, E.g. "100 65000.100"
pub fn format_as_path(asns: &[u32]) -> String {
    asns.iter().map(|asn| u32_to_dotted(*asn, '.')).join(" ")
}

/// Milliseconds since the Unix epoch as an RFC 3339 UTC timestamp
pub fn format_millis_as_utc(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .map(|time| time.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| format!("{}ms", millis))
}

/// Milliseconds since the Unix epoch for `time`, zero for instants before the epoch
pub fn datetime_to_millis<Tz>(time: &DateTime<Tz>) -> u64
where
    Tz: TimeZone,
{
    u64::try_from(time.timestamp_millis()).unwrap_or(0)
}

fn fit_with_remainder(dividend: u64, divisor: u64) -> (u64, u64) {
    let fit = dividend / divisor;
    let remainder = dividend % divisor;
    (fit, remainder)
}

pub fn get_elapsed_time<Tz>(time: DateTime<Tz>) -> Duration
where
    Tz: TimeZone,
{
    Utc::now().signed_duration_since(time)
}

/// Given a duration, format like "00:00:00"
pub fn format_elapsed_time(elapsed: Duration) -> String {
    let elapsed = elapsed.num_seconds().unsigned_abs();
    let (hours, remainder) = fit_with_remainder(elapsed, 3600);
    let (minutes, seconds) = fit_with_remainder(remainder, 60);
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Given a timestamp, get the elapsed time and return formatted string
pub fn format_time_as_elapsed<Tz>(time: DateTime<Tz>) -> String
where
    Tz: TimeZone,
{
    format_elapsed_time(get_elapsed_time(time))
}
