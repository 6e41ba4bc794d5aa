use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Layouts older builds used when writing `DATETIME` columns.
const STORED_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"];
const NAIVE_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Render a timestamp in the wire format: RFC 3339, UTC, whole seconds, `Z`.
pub fn to_wire(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn now_wire() -> String {
    to_wire(&Utc::now())
}

/// Strict parse of a wire timestamp. Any RFC 3339 offset is accepted and
/// normalised to UTC.
pub fn parse_wire(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Lenient parse of a timestamp read back from the store. Offset-less
/// values are taken as UTC.
pub fn parse_stored(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = parse_wire(raw) {
        return Some(dt);
    }
    for layout in STORED_LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(raw, layout) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Re-render a stored timestamp in the wire format. Values that cannot be
/// parsed are passed through untouched rather than dropped.
pub fn stored_to_wire(raw: &str) -> String {
    parse_stored(raw)
        .map(|dt| to_wire(&dt))
        .unwrap_or_else(|| raw.to_string())
}
