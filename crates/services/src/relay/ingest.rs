//! Defensive normalization of incoming notification records. Feed
//! documents come from a store shared with older writers, so timestamps
//! arrive as native datetimes, epoch millis, or RFC 3339 strings, and
//! the occasional record is missing identity altogether. Repair what is
//! coercible; drop what is not.

use bson::{Bson, DateTime, Document};
use cofoundry_db::models::Notification;
use tracing::warn;

/// Coerces a BSON value into a datetime. Accepts native datetimes,
/// integer epoch milliseconds, and RFC 3339 strings.
pub fn coerce_datetime(value: &Bson) -> Option<DateTime> {
    match value {
        Bson::DateTime(dt) => Some(*dt),
        Bson::Int64(ms) => Some(DateTime::from_millis(*ms)),
        Bson::Int32(ms) => Some(DateTime::from_millis(i64::from(*ms))),
        Bson::Double(ms) if ms.is_finite() => Some(DateTime::from_millis(*ms as i64)),
        Bson::String(s) => DateTime::parse_rfc3339_str(s).ok(),
        _ => None,
    }
}

/// Normalizes one raw feed document into a `Notification`.
///
/// Dropped: records with no `_id`, or whose primary `timestamp` is
/// missing or uncoercible. Repaired in place: coercible `timestamp`,
/// `created_at` (falls back to the primary timestamp), and
/// `data.responded_at` (removed when uncoercible — the record itself
/// survives). Anything else that still fails to decode is skipped so a
/// single bad record cannot blank the whole list.
pub fn normalize(mut doc: Document) -> Option<Notification> {
    if doc.get_object_id("_id").is_err() {
        warn!("dropping notification record without id");
        return None;
    }

    let timestamp = match doc.get("timestamp").and_then(coerce_datetime) {
        Some(ts) => ts,
        None => {
            warn!("dropping notification record with unusable timestamp");
            return None;
        }
    };
    doc.insert("timestamp", timestamp);

    let created_at = doc
        .get("created_at")
        .and_then(coerce_datetime)
        .unwrap_or(timestamp);
    doc.insert("created_at", created_at);

    if let Some(Bson::Document(data)) = doc.get_mut("data") {
        match data.get("responded_at").map(coerce_datetime) {
            None => {}
            Some(Some(at)) => {
                data.insert("responded_at", at);
            }
            Some(None) => {
                data.remove("responded_at");
            }
        }
    }

    match bson::from_document(doc) {
        Ok(notification) => Some(notification),
        Err(e) => {
            warn!(%e, "skipping undecodable notification record");
            None
        }
    }
}
