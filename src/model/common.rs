use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type Id = String;

/// Ordered JSON object used for every persisted payload.
pub type DataMap = serde_json::Map<String, Value>;

/// Marker stored under `"id"` of every persisted instance.
pub const INSTANCE_ID_MARKER: &str = "pyblish.avalon.instance";

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// A `null` value is treated the same as a missing one.
pub fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Old and new value of a single key. `None` means the key is not set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl ValueChange {
    pub fn new(old: Option<Value>, new: Option<Value>) -> Self {
        Self { old, new }
    }

    /// Build a change only when the two sides differ.
    pub fn between(old: Option<&Value>, new: Option<&Value>) -> Option<Self> {
        let old = non_null(old);
        let new = non_null(new);
        if old == new {
            return None;
        }
        Some(Self {
            old: old.cloned(),
            new: new.cloned(),
        })
    }

    pub fn is_removal(&self) -> bool {
        self.new.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_between_ignores_null_vs_missing() {
        assert_eq!(ValueChange::between(None, Some(&Value::Null)), None);
        assert_eq!(ValueChange::between(Some(&json!(1)), Some(&json!(1))), None);

        let change = ValueChange::between(None, Some(&json!("v1"))).unwrap();
        assert_eq!(change, ValueChange::new(None, Some(json!("v1"))));
        assert!(!change.is_removal());

        let removal = ValueChange::between(Some(&json!(true)), None).unwrap();
        assert!(removal.is_removal());
    }

    #[test]
    fn test_generate_id_is_uuid() {
        let id = generate_id();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_ne!(id, generate_id());
    }
}
