use serde::{Deserialize, Serialize};

use crate::model::{generate_id, Id};

/// Item representing a convertor plugin that found legacy instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertorItem {
    pub id: Id,
    pub identifier: String,
    pub label: String,
}

impl ConvertorItem {
    pub fn new(identifier: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            identifier: identifier.into(),
            label: label.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_item_gets_new_id() {
        let item = ConvertorItem::new("legacy.model", "Legacy models");
        let other = ConvertorItem::new("legacy.model", "Legacy models");
        assert_eq!(item.identifier, other.identifier);
        assert_ne!(item.id, other.id);
    }
}
