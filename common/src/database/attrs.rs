//! Hand-rolled attribute marshalling helpers. Repositories build item maps
//! with the `av_*` constructors and read them back with the `extract_*`
//! accessors; missing required attributes surface as unmarshal errors at the
//! repository layer.

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};

pub fn av_s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

pub fn av_n(value: impl ToString) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

pub fn av_time(value: DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(value.to_rfc3339())
}

pub fn av_i64_map(map: &BTreeMap<String, i64>) -> AttributeValue {
    let inner = map
        .iter()
        .map(|(k, v)| (k.clone(), av_n(*v)))
        .collect::<HashMap<_, _>>();
    AttributeValue::M(inner)
}

pub fn extract_string(item: &HashMap<String, AttributeValue>, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).cloned()
}

pub fn extract_i64(item: &HashMap<String, AttributeValue>, key: &str) -> Option<i64> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse::<i64>().ok())
}

pub fn extract_time(item: &HashMap<String, AttributeValue>, key: &str) -> Option<DateTime<Utc>> {
    extract_string(item, key)
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn extract_i64_map(
    item: &HashMap<String, AttributeValue>,
    key: &str,
) -> Option<BTreeMap<String, i64>> {
    let raw = item.get(key).and_then(|v| v.as_m().ok())?;
    let mut map = BTreeMap::new();
    for (k, v) in raw {
        let n = v.as_n().ok().and_then(|s| s.parse::<i64>().ok())?;
        map.insert(k.clone(), n);
    }
    Some(map)
}
