use serde_json::Value;
use std::collections::BTreeMap;

/// Fill in whatever a partially specified configuration leaves unset.
///
/// Implementations only ever write into unset (`None`) slots: values the
/// caller supplied are left alone. Plain values are cloned out of the
/// defaults, so two trees resolved from the same defaults never share mutable
/// state; callbacks live behind `Arc` and are shared.
pub trait Resolve {
    fn resolve_from(&mut self, defaults: &Self);
}

/// Resolve an optional user configuration against `defaults`
pub fn resolve<T: Resolve + Clone>(user: Option<T>, defaults: &T) -> T {
    match user {
        Some(mut resolved) => {
            resolved.resolve_from(defaults);
            resolved
        }
        None => defaults.clone(),
    }
}

/// Copy the default into an unset slot
pub(crate) fn fill<T: Clone>(slot: &mut Option<T>, default: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(default);
    }
}

/// Copy the default into an unset slot, or resolve a set slot one level down
pub(crate) fn fill_nested<T: Resolve + Clone>(slot: &mut Option<T>, default: &Option<T>) {
    match (slot.as_mut(), default) {
        (Some(current), Some(default)) => current.resolve_from(default),
        (None, _) => slot.clone_from(default),
        (Some(_), None) => {}
    }
}

impl<V: Clone> Resolve for BTreeMap<String, V> {
    fn resolve_from(&mut self, defaults: &Self) {
        for (key, value) in defaults {
            if !self.contains_key(key) {
                self.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Layers without options
impl Resolve for () {
    fn resolve_from(&mut self, _defaults: &Self) {}
}

/// Shallow, key-wise defaulting of JSON objects. A `null` member counts as
/// unset and receives the default; a `null` root takes the whole default.
impl Resolve for Value {
    fn resolve_from(&mut self, defaults: &Self) {
        if self.is_null() {
            self.clone_from(defaults);
            return;
        }
        if let (Value::Object(current), Value::Object(defaults)) = (self, defaults) {
            for (key, value) in defaults {
                let unset = current.get(key).is_none_or(Value::is_null);
                if unset {
                    current.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_keeps_present_keys() {
        let mut user = json!({"fill": "#000", "radius": 4});
        user.resolve_from(&json!({"fill": "#fff", "opacity": 0.5}));
        assert_eq!(user, json!({"fill": "#000", "radius": 4, "opacity": 0.5}));
    }

    #[test]
    fn test_value_null_member_takes_default() {
        let mut user = json!({"fill": null});
        user.resolve_from(&json!({"fill": "#fff"}));
        assert_eq!(user["fill"], "#fff");
    }

    #[test]
    fn test_value_null_root_takes_everything() {
        let mut user = Value::Null;
        user.resolve_from(&json!({"a": 1}));
        assert_eq!(user, json!({"a": 1}));
    }

    #[test]
    fn test_value_resolution_is_idempotent() {
        let defaults = json!({"a": 1, "b": [1, 2], "c": {"d": true}});
        let mut once = json!({"a": 5});
        once.resolve_from(&defaults);
        let mut twice = once.clone();
        twice.resolve_from(&defaults);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_value_defaults_are_not_aliased() {
        let defaults = json!({"list": [1, 2]});
        let mut a = json!({});
        let mut b = json!({});
        a.resolve_from(&defaults);
        b.resolve_from(&defaults);
        a["list"].as_array_mut().unwrap().push(json!(3));
        assert_eq!(b["list"], json!([1, 2]));
        assert_eq!(defaults["list"], json!([1, 2]));
    }

    #[test]
    fn test_map_inserts_missing_only() {
        let mut fills = BTreeMap::from([("A".to_string(), "#f00".to_string())]);
        let defaults = BTreeMap::from([
            ("A".to_string(), "#000".to_string()),
            ("defaultFill".to_string(), "#ABDDA4".to_string()),
        ]);
        fills.resolve_from(&defaults);
        assert_eq!(fills["A"], "#f00");
        assert_eq!(fills["defaultFill"], "#ABDDA4");
    }
}
