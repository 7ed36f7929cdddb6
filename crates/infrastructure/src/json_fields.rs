use chrono::{DateTime, Utc};
use serde_json::Value;

/// Returns a non-empty string field.
pub(crate) fn str_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// Parses an RFC 3339 string or an epoch-seconds number.
pub(crate) fn timestamp_field(value: &Value, field: &str) -> Option<DateTime<Utc>> {
    match value.get(field)? {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|timestamp| timestamp.with_timezone(&Utc)),
        Value::Number(number) => {
            let seconds = number.as_f64()?;
            if !seconds.is_finite() {
                return None;
            }
            let whole = seconds.floor();
            let nanos = ((seconds - whole) * 1_000_000_000.0).round() as u32;
            DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
        }
        _ => None,
    }
}

/// Returns the array stored under a required top-level field.
pub(crate) fn array_field<'a>(value: &'a Value, field: &str) -> Option<&'a Vec<Value>> {
    value.get(field).and_then(Value::as_array)
}

/// Formats a timestamp the way upstream filters expect it.
pub(crate) fn filter_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{filter_timestamp, str_field, timestamp_field};

    #[test]
    fn timestamps_parse_from_strings_and_numbers() {
        let expected = Utc
            .with_ymd_and_hms(2024, 3, 14, 13, 30, 0)
            .single()
            .unwrap_or_else(|| unreachable!());
        let record = json!({
            "iso": "2024-03-14T13:30:00.000000+00:00",
            "zulu": "2024-03-14T13:30:00Z",
            "epoch": 1_710_423_000.0,
            "bad": "yesterday",
        });

        assert_eq!(timestamp_field(&record, "iso"), Some(expected));
        assert_eq!(timestamp_field(&record, "zulu"), Some(expected));
        assert_eq!(timestamp_field(&record, "epoch"), Some(expected));
        assert_eq!(timestamp_field(&record, "bad"), None);
        assert_eq!(timestamp_field(&record, "missing"), None);
    }

    #[test]
    fn blank_strings_are_missing() {
        let record = json!({"name": "  ", "path": ".github/workflows/nightly.yml"});
        assert_eq!(str_field(&record, "name"), None);
        assert_eq!(str_field(&record, "path"), Some(".github/workflows/nightly.yml"));
    }

    #[test]
    fn filter_timestamps_use_zulu_seconds() {
        let timestamp = Utc
            .with_ymd_and_hms(2024, 3, 13, 13, 0, 0)
            .single()
            .unwrap_or_else(|| unreachable!());
        assert_eq!(filter_timestamp(timestamp), "2024-03-13T13:00:00Z");
    }
}
