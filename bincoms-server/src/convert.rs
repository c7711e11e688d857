//! JSON to device value conversions

use crate::protocol::Fault;
use bincoms_core::Value;
use serde_json::{Number, Value as Json};

/// Convert one positional parameter
///
/// Numbers keep their JSON kind (unsigned, signed or float); the argument
/// layout decides the final width when the value is packed.
pub fn json_to_value(index: usize, json: &Json) -> Result<Value, Fault> {
    match json {
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => {
            if let Some(v) = n.as_u64() {
                Ok(Value::U64(v))
            } else if let Some(v) = n.as_i64() {
                Ok(Value::I64(v))
            } else {
                n.as_f64().map(Value::F64).ok_or_else(|| {
                    Fault::invalid_params(format!("Argument {} is not a number", index))
                })
            }
        }
        Json::String(s) => Ok(Value::Text(s.clone())),
        Json::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(Value::Bytes)
            .ok_or_else(|| {
                Fault::invalid_params(format!("Argument {} must be an array of bytes", index))
            }),
        Json::Null | Json::Object(_) => Err(Fault::invalid_params(format!(
            "Argument {} has unsupported type",
            index
        ))),
    }
}

pub fn params_to_values(params: &[Json]) -> Result<Vec<Value>, Fault> {
    params
        .iter()
        .enumerate()
        .map(|(index, json)| json_to_value(index, json))
        .collect()
}

/// Convert a device result to JSON
///
/// Unit becomes `null`, tuples become arrays, characters one-letter strings.
/// Non-finite floats have no JSON form and become `null`.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Unit => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Char(c) => Json::String((*c as char).to_string()),
        Value::I8(v) => Json::from(*v),
        Value::U8(v) => Json::from(*v),
        Value::I16(v) => Json::from(*v),
        Value::U16(v) => Json::from(*v),
        Value::I32(v) => Json::from(*v),
        Value::U32(v) => Json::from(*v),
        Value::I64(v) => Json::from(*v),
        Value::U64(v) => Json::from(*v),
        Value::F32(v) => float(*v as f64),
        Value::F64(v) => float(*v),
        Value::Text(s) => Json::String(s.clone()),
        Value::Bytes(b) => Json::Array(b.iter().map(|v| Json::from(*v)).collect()),
        Value::Tuple(items) => Json::Array(items.iter().map(value_to_json).collect()),
    }
}

fn float(v: f64) -> Json {
    Number::from_f64(v).map(Json::Number).unwrap_or(Json::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params() {
        let values =
            params_to_values(&[json!(3), json!(-2), json!(0.5), json!("r"), json!(true)]).unwrap();
        assert_eq!(
            values,
            vec![
                Value::U64(3),
                Value::I64(-2),
                Value::F64(0.5),
                Value::Text("r".into()),
                Value::Bool(true)
            ]
        );
    }

    #[test]
    fn test_byte_arrays() {
        assert_eq!(
            json_to_value(0, &json!([1, 2, 255])).unwrap(),
            Value::Bytes(vec![1, 2, 255])
        );
        assert!(json_to_value(0, &json!([1, 300])).is_err());
        assert!(json_to_value(1, &json!({"a": 1})).is_err());
        assert!(json_to_value(1, &Json::Null).is_err());
    }

    #[test]
    fn test_results() {
        assert_eq!(value_to_json(&Value::Unit), Json::Null);
        assert_eq!(value_to_json(&Value::Char(b'r')), json!("r"));
        assert_eq!(
            value_to_json(&Value::Tuple(vec![Value::U32(12), Value::U8(1)])),
            json!([12, 1])
        );
        assert_eq!(value_to_json(&Value::F32(0.5)), json!(0.5));
        assert_eq!(value_to_json(&Value::F64(f64::NAN)), Json::Null);
    }
}
