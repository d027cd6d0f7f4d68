//! Date helpers shared by contexts, ETags and the XML document format.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Wire format used inside resource XML documents, always rendered in UTC.
///
/// Example: `2026/01/07 08:52:52.000 GMT`
const XML_DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:3] GMT"
);

/// Truncate a timestamp to whole milliseconds.
///
/// Context dates are stored with millisecond precision so that a timestamp
/// survives an XML round trip bit for bit.
pub fn truncate_to_millis(date: OffsetDateTime) -> OffsetDateTime {
    let nanos = date.nanosecond();
    date.replace_nanosecond(nanos - nanos % 1_000_000)
        .unwrap_or(date)
}

/// Milliseconds since the Unix epoch, the basis for resource ETags.
pub fn unix_millis(date: OffsetDateTime) -> i128 {
    date.unix_timestamp_nanos() / 1_000_000
}

/// Format a timestamp for a resource XML document.
pub fn format_xml_date(date: OffsetDateTime) -> String {
    truncate_to_millis(date.to_offset(UtcOffset::UTC))
        .format(&XML_DATE_FORMAT)
        .unwrap_or_else(|_| String::from("1970/01/01 00:00:00.000 GMT"))
}

/// Parse a timestamp produced by [`format_xml_date`].
pub fn parse_xml_date(value: &str) -> Result<OffsetDateTime, time::error::Parse> {
    time::PrimitiveDateTime::parse(value.trim(), &XML_DATE_FORMAT).map(|dt| dt.assume_utc())
}
