//! Normalization of action input/output payloads into bound parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key used when a whole input payload is a single value.
pub const INPUTS_KEY: &str = "Inputs";
/// Key used when a whole output payload is a single value.
pub const OUTPUTS_KEY: &str = "Outputs";

/// Value of a bound parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Text(String),
    /// Any structured or non-text JSON value, kept opaque.
    Json(Value),
}

impl ParameterValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(text) => Some(text),
            ParameterValue::Json(Value::String(text)) => Some(text),
            ParameterValue::Json(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParameterValue::Text(text) => Value::String(text.clone()),
            ParameterValue::Json(value) => value.clone(),
        }
    }
}

impl From<Value> for ParameterValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ParameterValue::Text(text),
            other => ParameterValue::Json(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundParameter {
    pub display_name: String,
    pub value: ParameterValue,
}

/// Parameter name to bound value, ordered by key.
pub type BoundParameters = BTreeMap<String, BoundParameter>;

/// Normalize a raw payload into [`BoundParameters`].
///
/// Falsy payloads (`None`, `null`, `""`, `0`, `false`) yield `None`. Objects
/// are taken as already keyed; any other value, arrays included, is wrapped
/// whole under `"Inputs"` or `"Outputs"` rather than keyed by index.
/// Every key maps to `{ displayName: key, value }`.
pub fn parse_action_link(response: Option<&Value>, is_input: bool) -> Option<BoundParameters> {
    let response = response.filter(|value| !is_falsy(value))?;

    let bound: BoundParameters = match response {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), bind(key, value.clone())))
            .collect(),
        other => {
            let key = if is_input { INPUTS_KEY } else { OUTPUTS_KEY };
            BTreeMap::from([(key.to_string(), bind(key, other.clone()))])
        }
    };
    Some(bound)
}

fn bind(key: &str, value: Value) -> BoundParameter {
    BoundParameter {
        display_name: key.to_string(),
        value: value.into(),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        _ => false,
    }
}
