use prettytable::{cell, row, Row};

use super::table::ToRow;
use crate::contacts::ScheduledContactEntry;
use crate::utils::{format_millis_as_utc, u32_to_dotted};

impl ToRow for ScheduledContactEntry {
    fn columns() -> Row {
        row!["Start", "End", "Duration (ms)", "AS 1", "Gateway 1", "AS 2", "Gateway 2", "Valid"]
    }

    fn to_row(&self) -> Row {
        row![
            format_millis_as_utc(self.start_time),
            format_millis_as_utc(self.end_time()),
            self.duration.to_string(),
            u32_to_dotted(self.asn1, '.'),
            self.gw1.to_string(),
            u32_to_dotted(self.asn2, '.'),
            self.gw2.to_string(),
            if self.is_valid() { "yes" } else { "no" },
        ]
    }
}
