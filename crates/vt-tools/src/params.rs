//! Scalar parameter maps and their round-trip through typed structs.
//!
//! Parameter structs are serde structs with PascalCase keys and
//! `#[serde(default)]`, so a map may omit keys (they keep their default or
//! current value) and may carry unknown keys (ignored).

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::result::DataValue;

pub type Parameters = BTreeMap<String, DataValue>;

fn to_json(value: &DataValue) -> Value {
    match value {
        DataValue::Bool(v) => Value::Bool(*v),
        DataValue::Int(v) => Value::from(*v),
        // Integral floats decode into integer fields too.
        DataValue::Float(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Value::from(*v as i64),
        DataValue::Float(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
        DataValue::Text(v) => Value::String(v.clone()),
    }
}

fn from_json(value: Value) -> Option<DataValue> {
    match value {
        Value::Bool(v) => Some(DataValue::Bool(v)),
        Value::Number(n) => n
            .as_i64()
            .map(DataValue::Int)
            .or_else(|| n.as_f64().map(DataValue::Float)),
        Value::String(s) => Some(DataValue::Text(s)),
        _ => None,
    }
}

/// Flattens a parameter struct into a scalar map.
pub fn to_parameters<P: Serialize>(params: &P) -> Parameters {
    match serde_json::to_value(params) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(k, v)| from_json(v).map(|v| (k, v)))
            .collect(),
        _ => Parameters::new(),
    }
}

/// Overlays `updates` on `current` and decodes the result.
pub fn merge_parameters<P>(current: &P, updates: &Parameters) -> Result<P, ToolError>
where
    P: Serialize + DeserializeOwned,
{
    let mut map = match serde_json::to_value(current) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for (k, v) in updates {
        map.insert(k.clone(), to_json(v));
    }
    decode(map)
}

/// Decodes a map on top of the type's defaults.
pub fn from_parameters<P: DeserializeOwned>(params: &Parameters) -> Result<P, ToolError> {
    decode(
        params
            .iter()
            .map(|(k, v)| (k.clone(), to_json(v)))
            .collect(),
    )
}

fn decode<P: DeserializeOwned>(map: Map<String, Value>) -> Result<P, ToolError> {
    serde_json::from_value(Value::Object(map)).map_err(|e| ToolError::InvalidParameter {
        name: "parameters".to_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::{Parameters, from_parameters, merge_parameters, to_parameters};
    use crate::result::DataValue;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Mode {
        Fast,
        Exact,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase", default)]
    struct Demo {
        kernel_size: usize,
        sigma: f32,
        mode: Mode,
        enabled: bool,
    }

    impl Default for Demo {
        fn default() -> Self {
            Self {
                kernel_size: 3,
                sigma: 0.5,
                mode: Mode::Fast,
                enabled: true,
            }
        }
    }

    #[test]
    fn struct_to_map_uses_pascal_case_scalars() {
        let map = to_parameters(&Demo::default());
        assert_eq!(map["KernelSize"], DataValue::Int(3));
        assert_eq!(map["Sigma"], DataValue::Float(0.5));
        assert_eq!(map["Mode"], DataValue::Text("Fast".into()));
        assert_eq!(map["Enabled"], DataValue::Bool(true));
    }

    #[test]
    fn missing_keys_default_and_unknown_keys_are_ignored() {
        let mut map = Parameters::new();
        map.insert("Mode".into(), DataValue::Text("Exact".into()));
        map.insert("Bogus".into(), DataValue::Int(1));
        let d: Demo = from_parameters(&map).expect("decode");
        assert_eq!(d.mode, Mode::Exact);
        assert_eq!(d.kernel_size, 3);
    }

    #[test]
    fn merge_keeps_current_values() {
        let current = Demo {
            kernel_size: 9,
            ..Demo::default()
        };
        let mut updates = Parameters::new();
        updates.insert("Sigma".into(), DataValue::Int(2));
        let merged = merge_parameters(&current, &updates).expect("merge");
        assert_eq!(merged.kernel_size, 9);
        assert_eq!(merged.sigma, 2.0);
    }

    #[test]
    fn bad_value_is_reported() {
        let mut map = Parameters::new();
        map.insert("Mode".into(), DataValue::Text("Sloppy".into()));
        assert!(from_parameters::<Demo>(&map).is_err());

        let mut map = Parameters::new();
        map.insert("KernelSize".into(), DataValue::Float(2.5));
        assert!(from_parameters::<Demo>(&map).is_err());

        map.insert("KernelSize".into(), DataValue::Float(5.0));
        let d: Demo = from_parameters(&map).expect("integral float");
        assert_eq!(d.kernel_size, 5);
    }
}
