//! Notification Normalizer.
//!
//! Queue bodies arrive as JSON strings whose fields may themselves be
//! JSON-encoded strings (a storage event wrapped by a topic envelope wrapped
//! by the queue). `deep_parse` unwraps every such layer; `summarize` reads the
//! first event record of the result into a one-line summary.

use crate::models::{message::QueueMessage, notification::NotificationEntry};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Nesting levels walked before values are returned untouched.
pub const MAX_PARSE_DEPTH: usize = 32;

/// Rendered in the summary when an expected field is absent.
pub const MISSING_FIELD: &str = "undefined";

/// Recursively re-parse string values as JSON until nothing nested is left.
///
/// Strings that are not JSON come back unchanged, so the walk is idempotent
/// on already-flat input.
pub fn deep_parse(value: Value) -> Value {
    walk(value, MAX_PARSE_DEPTH)
}

fn walk(value: Value, depth_left: usize) -> Value {
    if depth_left == 0 {
        return value;
    }
    match value {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => walk(parsed, depth_left - 1),
            Err(_) => Value::String(text),
        },
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| walk(item, depth_left - 1))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, walk(item, depth_left - 1)))
                .collect(),
        ),
        scalar => scalar,
    }
}

/// `Event: <name> | Bucket: <bucket> | Object: <key>` from the first record.
///
/// When the payload carries a `Message` envelope the records are read from
/// inside it, otherwise from the top level.
pub fn summarize(parsed: &Value) -> String {
    let inner = match parsed.get("Message") {
        Some(message @ (Value::Object(_) | Value::Array(_))) => message,
        _ => parsed,
    };
    let record = &inner["Records"][0];

    format!(
        "Event: {} | Bucket: {} | Object: {}",
        field(&record["eventName"]),
        field(&record["s3"]["bucket"]["name"]),
        field(&record["s3"]["object"]["key"]),
    )
}

fn field(value: &Value) -> String {
    match value {
        Value::Null => MISSING_FIELD.to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Turn a drained message into a feed entry carrying the parsed payload.
///
/// The entry is stamped with the envelope's `Timestamp` when it has a valid
/// one, otherwise with the time of the drain.
pub fn normalize(message: &QueueMessage) -> NotificationEntry {
    let parsed = deep_parse(Value::String(message.body.clone()));
    let summary = summarize(&parsed);
    let timestamp = parsed
        .get("Timestamp")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    NotificationEntry::from_queue(message.id.clone(), summary, timestamp, parsed)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use serde_json::json;

    fn s3_event(event: &str, bucket: &str, key: &str) -> Value {
        json!({
            "Records": [{
                "eventName": event,
                "s3": { "bucket": { "name": bucket }, "object": { "key": key, "size": 10 } }
            }]
        })
    }

    /// Topic envelope as delivered through a queue subscription.
    fn envelope(event: &Value) -> String {
        json!({
            "Type": "Notification",
            "MessageId": "abc",
            "Timestamp": "2024-05-01T12:00:00.000Z",
            "Message": event.to_string(),
        })
        .to_string()
    }

    #[test]
    fn deep_parse__should_unwrap_triple_encoded_json() {
        // Given
        let inner = json!({ "a": [1, 2, { "b": "c" }] });
        let once = Value::String(inner.to_string()).to_string();
        let twice = Value::String(once).to_string();

        // When
        let parsed = deep_parse(Value::String(twice));

        // Then
        assert_eq!(parsed, inner);
    }

    #[test]
    fn deep_parse__should_return_plain_strings_unchanged() {
        let plain = Value::String("hello world".into());

        let parsed = deep_parse(plain.clone());

        assert_eq!(parsed, plain);
        assert_eq!(deep_parse(parsed.clone()), parsed);
    }

    #[test]
    fn deep_parse__should_recurse_into_arrays_and_objects() {
        let value = json!({
            "list": ["{\"x\":1}", "not json"],
            "nested": { "inner": "[true, null]" },
            "n": 3
        });

        let parsed = deep_parse(value);

        assert_eq!(
            parsed,
            json!({
                "list": [{ "x": 1 }, "not json"],
                "nested": { "inner": [true, null] },
                "n": 3
            })
        );
    }

    #[test]
    fn deep_parse__should_stop_at_depth_bound() {
        // The leaf would parse if the walk ever reached it.
        let mut value = json!("{\"deep\":true}");
        for _ in 0..(MAX_PARSE_DEPTH + 5) {
            value = json!([value]);
        }

        let parsed = deep_parse(value.clone());

        assert_eq!(parsed, value);
    }

    #[test]
    fn summarize__should_read_first_record_inside_envelope() {
        let raw = envelope(&s3_event("ObjectCreated:Put", "photos", "a.txt"));
        let parsed = deep_parse(Value::String(raw));

        assert_eq!(
            summarize(&parsed),
            "Event: ObjectCreated:Put | Bucket: photos | Object: a.txt"
        );
    }

    #[test]
    fn summarize__should_read_bare_storage_event() {
        let parsed = s3_event("ObjectRemoved:Delete", "photos", "b.txt");

        assert_eq!(
            summarize(&parsed),
            "Event: ObjectRemoved:Delete | Bucket: photos | Object: b.txt"
        );
    }

    #[test]
    fn summarize__should_fall_back_to_undefined_fields() {
        let parsed = deep_parse(json!({ "Event": "s3:TestEvent" }));

        assert_eq!(
            summarize(&parsed),
            "Event: undefined | Bucket: undefined | Object: undefined"
        );
        assert_eq!(
            summarize(&Value::String("garbage".into())),
            "Event: undefined | Bucket: undefined | Object: undefined"
        );
    }

    #[test]
    fn normalize__should_keep_id_parsed_payload_and_envelope_time() {
        let body = envelope(&s3_event("ObjectCreated:Put", "photos", "a.txt"));
        let message = QueueMessage {
            id: "m-1".into(),
            body,
            receipt_handle: "r-1".into(),
        };

        let entry = normalize(&message);

        assert_eq!(entry.id, "m-1");
        assert!(!entry.read);
        assert_eq!(entry.timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");
        let raw = entry.raw_data.expect("raw data");
        assert_eq!(raw["Message"]["Records"][0]["s3"]["object"]["key"], "a.txt");
    }
}
