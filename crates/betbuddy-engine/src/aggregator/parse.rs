// Lenient accessors over upstream JSON payloads.
//
// The stats API reports most numbers as strings (".275", "4.12") and uses
// placeholders such as "-.--" when a rate is undefined. Those placeholders
// read as 0.0; a field that is absent altogether is a `MissingField`.

use serde_json::Value;

use betbuddy_core::model::EmptyReason;

/// Parse a numeric value that may be encoded as a JSON number or a string.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if !s.chars().any(|c| c.is_ascii_digit()) {
                return Some(0.0);
            }
            s.parse::<f64>().ok()
        }
        _ => None,
    }
}

/// Required floating-point field of a stat object.
pub fn field_f64(stat: &Value, name: &str) -> Result<f64, EmptyReason> {
    stat.get(name)
        .and_then(number)
        .ok_or_else(|| EmptyReason::MissingField(name.to_string()))
}

/// Required count field of a stat object.
pub fn field_u32(stat: &Value, name: &str) -> Result<u32, EmptyReason> {
    let value = field_f64(stat, name)?;
    if value < 0.0 {
        return Err(EmptyReason::MissingField(name.to_string()));
    }
    Ok(value.round() as u32)
}

/// Optional count field; absent or unparseable reads as 0.
pub fn count_or_zero(stat: &Value, name: &str) -> u32 {
    field_u32(stat, name).unwrap_or(0)
}

pub fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    at(value, path)?.as_str()
}

pub fn u64_at(value: &Value, path: &[&str]) -> Option<u64> {
    let v = at(value, path)?;
    v.as_u64().or_else(|| number(v).map(|n| n as u64))
}

/// Id or count that must fit in 32 bits; anything larger reads as absent.
pub fn u32_at(value: &Value, path: &[&str]) -> Option<u32> {
    u64_at(value, path).and_then(|n| u32::try_from(n).ok())
}

/// Walk nested object keys.
pub fn at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

/// `people[0]` of a person lookup.
pub fn first_person(body: &Value) -> Option<&Value> {
    body.get("people")?.as_array()?.first()
}

/// `stats[0].splits` of a stats block, empty when absent.
pub fn first_group_splits(holder: &Value) -> &[Value] {
    holder
        .get("stats")
        .and_then(Value::as_array)
        .and_then(|groups| groups.first())
        .and_then(|group| group.get("splits"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_accept_strings_and_placeholders() {
        assert_eq!(number(&json!(".275")), Some(0.275));
        assert_eq!(number(&json!("4.12")), Some(4.12));
        assert_eq!(number(&json!(12)), Some(12.0));
        assert_eq!(number(&json!("-.--")), Some(0.0));
        assert_eq!(number(&json!(".---")), Some(0.0));
        assert_eq!(number(&json!("abc1")), None);
        assert_eq!(number(&json!(null)), None);
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let stat = json!({ "era": "3.10" });
        assert_eq!(field_f64(&stat, "era"), Ok(3.10));
        assert_eq!(
            field_f64(&stat, "whip"),
            Err(EmptyReason::MissingField("whip".into()))
        );
        assert_eq!(count_or_zero(&stat, "gamesStarted"), 0);
    }

    #[test]
    fn nested_lookup() {
        let body = json!({ "people": [ { "stats": [ { "splits": [ { "stat": {} } ] } ] } ] });
        let person = first_person(&body).unwrap();
        assert_eq!(first_group_splits(person).len(), 1);
        assert!(first_group_splits(&json!({})).is_empty());
        assert_eq!(str_at(&json!({ "a": { "b": "x" } }), &["a", "b"]), Some("x"));
        assert_eq!(u64_at(&json!({ "a": "17" }), &["a"]), Some(17));
    }

    #[test]
    fn oversized_ids_are_absent() {
        assert_eq!(u32_at(&json!({ "id": 660271 }), &["id"]), Some(660271));
        assert_eq!(u32_at(&json!({ "id": 4294967296u64 }), &["id"]), None);
        assert_eq!(u64_at(&json!({ "id": 4294967296u64 }), &["id"]), Some(4294967296));
    }
}
