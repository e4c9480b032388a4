use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed, labeled descriptor of one configurable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrDef {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(default)]
    pub default: Value,
    #[serde(flatten)]
    pub kind: AttrKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumItem {
    pub value: Value,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttrKind {
    Boolean,
    Number {
        minimum: f64,
        maximum: f64,
        decimals: u32,
    },
    Text {
        #[serde(default)]
        multiline: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
    Enum {
        items: Vec<EnumItem>,
        #[serde(default)]
        multiselection: bool,
    },
    File {
        #[serde(default)]
        extensions: Vec<String>,
        #[serde(default)]
        folders: bool,
        #[serde(default)]
        single_item: bool,
        #[serde(default)]
        allow_sequences: bool,
    },
    Hidden,
    Label,
    Separator,
    /// Created for stored values that no definition describes anymore
    Unknown,
}

impl AttrDef {
    fn with_kind(key: impl Into<String>, default: Value, kind: AttrKind) -> Self {
        Self {
            key: key.into(),
            label: None,
            tooltip: None,
            default,
            kind,
        }
    }

    pub fn boolean(key: impl Into<String>, default: bool) -> Self {
        Self::with_kind(key, Value::Bool(default), AttrKind::Boolean)
    }

    pub fn number(key: impl Into<String>, minimum: f64, maximum: f64, default: f64) -> Self {
        let default = serde_json::Number::from_f64(default)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        Self::with_kind(
            key,
            default,
            AttrKind::Number {
                minimum,
                maximum,
                decimals: 0,
            },
        )
    }

    pub fn text(key: impl Into<String>, default: impl Into<String>) -> Self {
        Self::with_kind(
            key,
            Value::String(default.into()),
            AttrKind::Text {
                multiline: false,
                placeholder: None,
            },
        )
    }

    pub fn enumeration(key: impl Into<String>, items: Vec<EnumItem>, default: Value) -> Self {
        Self::with_kind(
            key,
            default,
            AttrKind::Enum {
                items,
                multiselection: false,
            },
        )
    }

    pub fn file(key: impl Into<String>, extensions: Vec<String>) -> Self {
        Self::with_kind(
            key,
            Value::Array(Vec::new()),
            AttrKind::File {
                extensions,
                folders: false,
                single_item: false,
                allow_sequences: false,
            },
        )
    }

    pub fn hidden(key: impl Into<String>, default: Value) -> Self {
        Self::with_kind(key, default, AttrKind::Hidden)
    }

    pub fn label_def(key: impl Into<String>, text: impl Into<String>) -> Self {
        let mut def = Self::with_kind(key, Value::Null, AttrKind::Label);
        def.label = Some(text.into());
        def
    }

    pub fn separator(key: impl Into<String>) -> Self {
        Self::with_kind(key, Value::Null, AttrKind::Separator)
    }

    pub fn unknown(key: impl Into<String>, default: Value) -> Self {
        let key = key.into();
        let mut def = Self::with_kind(key.clone(), default, AttrKind::Unknown);
        def.label = Some(key);
        def
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn with_decimals(mut self, value: u32) -> Self {
        if let AttrKind::Number { decimals, .. } = &mut self.kind {
            *decimals = value;
        }
        self
    }

    pub fn with_multiselection(mut self) -> Self {
        if let AttrKind::Enum { multiselection, .. } = &mut self.kind {
            *multiselection = true;
        }
        self
    }

    /// File definition options, ignored for other kinds.
    pub fn with_file_options(mut self, sequences: bool, single: bool) -> Self {
        if let AttrKind::File {
            allow_sequences,
            single_item,
            ..
        } = &mut self.kind
        {
            *allow_sequences = sequences;
            *single_item = single;
        }
        self
    }

    /// Definitions that only decorate UI do not hold a value.
    pub fn is_value_def(&self) -> bool {
        !matches!(self.kind, AttrKind::Label | AttrKind::Separator)
    }

    /// Coerce a stored value into the type this definition expects.
    ///
    /// Values that can't be converted fall back to the default.
    pub fn convert_value(&self, value: &Value) -> Value {
        match &self.kind {
            AttrKind::Boolean => match value {
                Value::Bool(_) => value.clone(),
                Value::Number(number) => Value::Bool(number.as_f64().unwrap_or(0.0) != 0.0),
                Value::String(text) => match text.to_lowercase().as_str() {
                    "true" | "1" | "yes" => Value::Bool(true),
                    "false" | "0" | "no" => Value::Bool(false),
                    _ => self.default.clone(),
                },
                _ => self.default.clone(),
            },
            AttrKind::Number { decimals, .. } => {
                let number = match value {
                    Value::Number(number) => number.as_f64(),
                    Value::String(text) => text.trim().parse::<f64>().ok(),
                    _ => None,
                };
                match number {
                    Some(number) if *decimals == 0 => Value::from(number.round() as i64),
                    Some(number) => {
                        let factor = 10f64.powi(*decimals as i32);
                        serde_json::Number::from_f64((number * factor).round() / factor)
                            .map(Value::Number)
                            .unwrap_or_else(|| self.default.clone())
                    }
                    None => self.default.clone(),
                }
            }
            AttrKind::Text { .. } => match value {
                Value::String(_) => value.clone(),
                Value::Number(number) => Value::String(number.to_string()),
                Value::Bool(flag) => Value::String(flag.to_string()),
                _ => self.default.clone(),
            },
            AttrKind::Enum {
                items,
                multiselection,
            } => {
                let allowed = |candidate: &Value| items.iter().any(|item| &item.value == candidate);
                if *multiselection {
                    let selected = match value {
                        Value::Array(values) => values.iter().filter(|v| allowed(v)).cloned().collect(),
                        other if allowed(other) => vec![other.clone()],
                        _ => Vec::new(),
                    };
                    Value::Array(selected)
                } else if allowed(value) {
                    value.clone()
                } else {
                    self.default.clone()
                }
            }
            AttrKind::File { .. } => match value {
                Value::Array(_) | Value::Object(_) => value.clone(),
                _ => self.default.clone(),
            },
            AttrKind::Hidden | AttrKind::Unknown => value.clone(),
            AttrKind::Label | AttrKind::Separator => Value::Null,
        }
    }
}
