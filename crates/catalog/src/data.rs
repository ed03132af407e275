//! The descriptor data tree and the merge rules applied to it.
//!
//! Every booster carries an ordered mapping of free-form descriptor
//! data. Inheritance (`common.yaml` ancestors) and environment
//! overlays both go through [`merge_maps`], so the merge behavior is
//! identical for the two.

use serde_json::Value;

/// Ordered string-keyed mapping used for all descriptor data.
pub type DataMap = serde_json::Map<String, Value>;

/// Merges `from` into `to`, key by key.
///
/// - nested mappings on both sides merge recursively
/// - a list on the overlay side replaces the base list wholesale
/// - an explicit `null` on the overlay side removes the key
/// - any other value overwrites the base value
pub fn merge_maps(to: &mut DataMap, from: &DataMap) {
    for (key, item) in from {
        match item {
            Value::Object(from_child) => {
                let mut child = match to.get(key) {
                    Some(Value::Object(existing)) => existing.clone(),
                    _ => DataMap::new(),
                };
                merge_maps(&mut child, from_child);
                to.insert(key.clone(), Value::Object(child));
            }
            Value::Array(items) => {
                to.insert(key.clone(), Value::Array(items.clone()));
            }
            Value::Null => {
                to.remove(key);
            }
            other => {
                to.insert(key.clone(), other.clone());
            }
        }
    }
}

/// Looks up a value by a `/`-separated key path, descending through
/// nested mappings. Returns `None` when any intermediate segment is
/// missing or not a mapping.
pub fn data_value<'a>(data: &'a DataMap, key: &str) -> Option<&'a Value> {
    match key.split_once('/') {
        Some((head, rest)) => match data.get(head) {
            Some(Value::Object(child)) => data_value(child, rest),
            _ => None,
        },
        None => data.get(key),
    }
}

/// Sets a value at a `/`-separated key path, creating (or replacing
/// non-mapping) intermediate mappings as needed.
pub fn set_data_value(data: &mut DataMap, key: &str, value: Value) {
    match key.split_once('/') {
        Some((head, rest)) => {
            let child = match data.get_mut(head) {
                Some(Value::Object(child)) => child,
                _ => {
                    data.insert(head.to_string(), Value::Object(DataMap::new()));
                    match data.get_mut(head) {
                        Some(Value::Object(child)) => child,
                        _ => unreachable!("just inserted an object"),
                    }
                }
            };
            set_data_value(child, rest, value);
        }
        None => {
            data.insert(key.to_string(), value);
        }
    }
}

/// Renders a scalar value as a string; mappings, lists and `null`
/// have no scalar rendering and yield `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalizes a value that is either absent, a single scalar or a
/// list into a list of strings.
pub fn to_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(scalar_to_string)
            .collect(),
        Some(other) => match scalar_to_string(other) {
            Some(s) if !s.is_empty() => vec![s],
            _ => Vec::new(),
        },
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn map(value: Value) -> DataMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn merges_nested_mappings() {
        let mut to = map(json!({"a": 1, "b": {"x": 1}}));
        let from = map(json!({"b": {"y": 2}, "c": 3}));

        merge_maps(&mut to, &from);

        assert_eq!(Value::Object(to), json!({"a": 1, "b": {"x": 1, "y": 2}, "c": 3}));
    }

    #[test]
    fn overlay_list_replaces_base_list() {
        let mut to = map(json!({"l": [1, 2]}));
        let from = map(json!({"l": [3]}));

        merge_maps(&mut to, &from);

        assert_eq!(Value::Object(to), json!({"l": [3]}));
    }

    #[test]
    fn overlay_null_removes_key() {
        let mut to = map(json!({"a": 1}));
        let from = map(json!({"a": null}));

        merge_maps(&mut to, &from);

        assert_eq!(Value::Object(to), json!({}));
    }

    #[test]
    fn overlay_scalar_overwrites() {
        let mut to = map(json!({"a": 1, "b": "old"}));
        let from = map(json!({"b": "new"}));

        merge_maps(&mut to, &from);

        assert_eq!(Value::Object(to), json!({"a": 1, "b": "new"}));
    }

    #[test]
    fn merge_is_sequential_over_three_layers() {
        let common = map(json!({"a": 1, "b": {"x": 1}}));
        let own = map(json!({"b": {"y": 2}}));
        let overlay = map(json!({"c": 3}));

        let mut step_wise = common.clone();
        merge_maps(&mut step_wise, &own);
        merge_maps(&mut step_wise, &overlay);

        let mut all_at_once = map(json!({}));
        for layer in [&common, &own, &overlay] {
            merge_maps(&mut all_at_once, layer);
        }

        assert_eq!(step_wise, all_at_once);
    }

    #[test]
    fn data_value_walks_nested_paths() {
        let data = map(json!({"source": {"git": {"url": "https://example.com/repo.git"}}}));

        assert_eq!(
            data_value(&data, "source/git/url"),
            Some(&json!("https://example.com/repo.git"))
        );
        assert_eq!(data_value(&data, "source/git/ref"), None);
        assert_eq!(data_value(&data, "source/git/url/deeper"), None);
    }

    #[test]
    fn set_data_value_creates_intermediate_mappings() {
        let mut data = map(json!({}));

        set_data_value(&mut data, "metadata/app/enabled", json!(true));

        assert_eq!(Value::Object(data), json!({"metadata": {"app": {"enabled": true}}}));
    }

    #[test]
    fn to_string_list_handles_scalar_and_list() {
        assert_eq!(to_string_list(None), Vec::<String>::new());
        assert_eq!(to_string_list(Some(&json!(""))), Vec::<String>::new());
        assert_eq!(to_string_list(Some(&json!("all"))), vec!["all"]);
        assert_eq!(
            to_string_list(Some(&json!(["a", "!b"]))),
            vec!["a", "!b"]
        );
    }
}
