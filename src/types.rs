// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The dynamic value model of the codec.
//!
//! Every decoded datum is a [`Value`]; every encoded datum starts as one.
//! Values are owned by the caller and flow through the compiled codecs
//! without aliasing.

use crate::decimal::Decimal;
use crate::error::Details;
use crate::schema::{
    DecimalRepr, DecimalSchema, EnumSchema, FixedSchema, MapSchema, Name, Names, RecordSchema,
    Schema,
};
use crate::{AvroResult, schema::ArraySchema};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use strum::EnumDiscriminants;
use uuid::Uuid;

/// A datum conforming to some Avro schema.
///
/// Unions have no dedicated decoded shape: decoding yields the branch's value
/// directly. [`Value::Union`] exists for encoding callers that want to pin a
/// specific branch index instead of letting the encoder infer one.
#[derive(Clone, Debug, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(ValueKind), derive(Hash, Ord, PartialOrd))]
pub enum Value {
    /// A `null` Avro value.
    Null,
    /// A `boolean` Avro value.
    Boolean(bool),
    /// An `int` Avro value.
    Int(i32),
    /// A `long` Avro value.
    Long(i64),
    /// A `float` Avro value.
    Float(f32),
    /// A `double` Avro value.
    Double(f64),
    /// A `bytes` Avro value.
    Bytes(Vec<u8>),
    /// A `string` Avro value.
    String(String),
    /// A `fixed` Avro value: declared size and bytes.
    Fixed(usize, Vec<u8>),
    /// An `enum` Avro value: symbol index and symbol.
    Enum(u32, String),
    /// A union value pinned to a specific branch.
    Union(u32, Box<Value>),
    /// An `array` Avro value.
    Array(Vec<Value>),
    /// A `map` Avro value. Ordered so that encoding is canonical.
    Map(BTreeMap<String, Value>),
    /// A `record` Avro value: `(field name, value)` in declaration order.
    Record(Vec<(String, Value)>),
    /// A `decimal` logical value.
    Decimal(Decimal),
    /// A `uuid` logical value.
    Uuid(Uuid),
    /// A `date` logical value: days since the unix epoch.
    Date(i32),
    /// A `time-millis` logical value: milliseconds after midnight.
    TimeMillis(i32),
    /// A `time-micros` logical value: microseconds after midnight.
    TimeMicros(i64),
    /// A `timestamp-millis` logical value: milliseconds since the unix epoch.
    TimestampMillis(i64),
    /// A `timestamp-micros` logical value: microseconds since the unix epoch.
    TimestampMicros(i64),
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Long(i)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Double(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl Value {
    /// Shallow conformance test: could this value be encoded under `schema`?
    ///
    /// Checks the kind and top-level shape only; array elements and map
    /// values are not recursed into. This is exactly the test the encoder
    /// applies to pick a union branch, so the first branch for which this
    /// returns true is the branch that will be written.
    pub fn conforms_to(&self, schema: &Schema, names: &Names) -> bool {
        match schema {
            Schema::Ref { name } => match names.get(name) {
                Some(Schema::Ref { .. }) | None => true,
                Some(resolved) => self.conforms_to(resolved, names),
            },
            Schema::Null => matches!(self, Value::Null),
            Schema::Boolean => matches!(self, Value::Boolean(_)),
            Schema::Int => match self {
                Value::Int(_) => true,
                Value::Long(i) => i32::try_from(*i).is_ok(),
                _ => false,
            },
            Schema::Long => matches!(self, Value::Int(_) | Value::Long(_)),
            Schema::Float | Schema::Double => matches!(
                self,
                Value::Float(_) | Value::Double(_) | Value::Int(_) | Value::Long(_)
            ),
            Schema::Bytes => matches!(self, Value::Bytes(_)),
            Schema::String => matches!(self, Value::String(_)),
            Schema::Fixed(FixedSchema { size, .. }) => match self {
                Value::Fixed(n, _) => n == size,
                Value::Bytes(b) => b.len() == *size,
                _ => false,
            },
            Schema::Enum(EnumSchema { symbols, .. }) => match self {
                Value::Enum(_, s) | Value::String(s) => symbols.iter().any(|sym| sym == s),
                _ => false,
            },
            Schema::Array(_) => matches!(self, Value::Array(_)),
            Schema::Map(_) => matches!(self, Value::Map(_)),
            Schema::Record(record) => {
                let keys: Vec<&String> = match self {
                    Value::Record(fields) => fields.iter().map(|(k, _)| k).collect(),
                    Value::Map(map) => map.keys().collect(),
                    _ => return false,
                };
                let known = keys
                    .iter()
                    .all(|k| record.fields.iter().any(|f| f.answers_to(k)));
                let required_present = record
                    .fields
                    .iter()
                    .filter(|f| f.default.is_none())
                    .all(|f| keys.iter().any(|k| f.answers_to(k)));
                known && required_present
            }
            Schema::Union(union) => union
                .variants()
                .iter()
                .any(|branch| self.conforms_to(branch, names)),
            Schema::Decimal(DecimalSchema { inner, .. }) => match (self, inner) {
                (Value::Decimal(_), _) => true,
                (Value::Bytes(_), DecimalRepr::Bytes) => true,
                (Value::Bytes(b), DecimalRepr::Fixed(f)) => b.len() == f.size,
                (Value::Fixed(n, _), DecimalRepr::Fixed(f)) => *n == f.size,
                _ => false,
            },
            Schema::Uuid => matches!(self, Value::Uuid(_) | Value::String(_)),
            Schema::Date => matches!(self, Value::Date(_) | Value::Int(_)),
            Schema::TimeMillis => matches!(self, Value::TimeMillis(_) | Value::Int(_)),
            Schema::TimeMicros => {
                matches!(self, Value::TimeMicros(_) | Value::Long(_) | Value::Int(_))
            }
            Schema::TimestampMillis => matches!(
                self,
                Value::TimestampMillis(_) | Value::Long(_) | Value::Int(_)
            ),
            Schema::TimestampMicros => matches!(
                self,
                Value::TimestampMicros(_) | Value::Long(_) | Value::Int(_)
            ),
        }
    }

    /// Type a JSON value (typically a schema default) against `schema`.
    ///
    /// Bytes and fixed defaults use the Avro JSON convention of a string
    /// whose code points are the byte values.
    pub(crate) fn from_json(
        json: &JsonValue,
        schema: &Schema,
        names: &Names,
    ) -> AvroResult<Value> {
        let bad = || Details::DefaultValueJson(json.clone()).into();
        match schema {
            Schema::Ref { name } => match names.get(name) {
                // A placeholder entry means the referenced type is still
                // being parsed; type the value without a schema.
                Some(Schema::Ref { .. }) | None => Ok(Self::from_json_bare(json)),
                Some(resolved) => {
                    let resolved = resolved.clone();
                    Self::from_json(json, &resolved, names)
                }
            },
            Schema::Null => match json {
                JsonValue::Null => Ok(Value::Null),
                _ => Err(bad()),
            },
            Schema::Boolean => match json {
                JsonValue::Bool(b) => Ok(Value::Boolean(*b)),
                _ => Err(bad()),
            },
            Schema::Int => json
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::Int)
                .ok_or_else(bad),
            Schema::Long => json.as_i64().map(Value::Long).ok_or_else(bad),
            Schema::Float => json.as_f64().map(|f| Value::Float(f as f32)).ok_or_else(bad),
            Schema::Double => json.as_f64().map(Value::Double).ok_or_else(bad),
            Schema::Bytes => json
                .as_str()
                .and_then(json_string_to_bytes)
                .map(Value::Bytes)
                .ok_or_else(bad),
            Schema::String => json
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(bad),
            Schema::Fixed(FixedSchema { size, .. }) => {
                let bytes = json.as_str().and_then(json_string_to_bytes).ok_or_else(bad)?;
                if bytes.len() == *size {
                    Ok(Value::Fixed(*size, bytes))
                } else {
                    Err(bad())
                }
            }
            Schema::Enum(EnumSchema { symbols, .. }) => {
                let symbol = json.as_str().ok_or_else(bad)?;
                match symbols.iter().position(|s| s == symbol) {
                    Some(index) => Ok(Value::Enum(index as u32, symbol.to_string())),
                    None => Err(bad()),
                }
            }
            Schema::Array(ArraySchema { items }) => match json {
                JsonValue::Array(values) => values
                    .iter()
                    .map(|v| Self::from_json(v, items, names))
                    .collect::<AvroResult<Vec<_>>>()
                    .map(Value::Array),
                _ => Err(bad()),
            },
            Schema::Map(MapSchema { values }) => match json {
                JsonValue::Object(entries) => {
                    let mut map = BTreeMap::new();
                    for (k, v) in entries {
                        map.insert(k.clone(), Self::from_json(v, values, names)?);
                    }
                    Ok(Value::Map(map))
                }
                _ => Err(bad()),
            },
            Schema::Record(RecordSchema { fields, .. }) => match json {
                JsonValue::Object(entries) => {
                    let mut record = Vec::with_capacity(fields.len());
                    for field in fields {
                        let value = match entries.get(&field.name) {
                            Some(v) => Self::from_json(v, &field.schema, names)?,
                            None => match &field.default {
                                Some(d) => Self::from_json(d, &field.schema, names)?,
                                None => return Err(bad()),
                            },
                        };
                        record.push((field.name.clone(), value));
                    }
                    Ok(Value::Record(record))
                }
                _ => Err(bad()),
            },
            Schema::Union(union) => union
                .variants()
                .iter()
                .find_map(|branch| Self::from_json(json, branch, names).ok())
                .ok_or_else(bad),
            Schema::Decimal(DecimalSchema { scale, .. }) => json
                .as_str()
                .and_then(json_string_to_bytes)
                .map(|bytes| Value::Decimal(Decimal::from_signed_bytes_be(&bytes, *scale)))
                .ok_or_else(bad),
            Schema::Uuid => json
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(Value::Uuid)
                .ok_or_else(bad),
            Schema::Date => json
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::Date)
                .ok_or_else(bad),
            Schema::TimeMillis => json
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::TimeMillis)
                .ok_or_else(bad),
            Schema::TimeMicros => json.as_i64().map(Value::TimeMicros).ok_or_else(bad),
            Schema::TimestampMillis => json.as_i64().map(Value::TimestampMillis).ok_or_else(bad),
            Schema::TimestampMicros => json.as_i64().map(Value::TimestampMicros).ok_or_else(bad),
        }
    }

    /// Best-effort typing of JSON without a schema, for defaults of types
    /// whose definition is not available yet.
    fn from_json_bare(json: &JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Long(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(values) => {
                Value::Array(values.iter().map(Self::from_json_bare).collect())
            }
            JsonValue::Object(entries) => Value::Record(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_json_bare(v)))
                    .collect(),
            ),
        }
    }
}

/// The Avro JSON convention for bytes: a string whose code points are the
/// byte values. Returns `None` if any code point is above U+00FF.
fn json_string_to_bytes(s: &str) -> Option<Vec<u8>> {
    s.chars()
        .map(|c| {
            let cp = c as u32;
            u8::try_from(cp).ok()
        })
        .collect()
}

/// Convenience for building record values in the field order of a schema.
pub fn record_from(fields: Vec<(&str, Value)>) -> Value {
    Value::Record(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

/// Look up a named schema, following one level of reference.
pub(crate) fn deref_schema<'a>(schema: &'a Schema, names: &'a Names) -> &'a Schema {
    match schema {
        Schema::Ref { name } => deref_name(name, names).unwrap_or(schema),
        _ => schema,
    }
}

pub(crate) fn deref_name<'a>(name: &Name, names: &'a Names) -> Option<&'a Schema> {
    match names.get(name) {
        Some(Schema::Ref { .. }) | None => None,
        Some(schema) => Some(schema),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Schema;
    use serde_json::json;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn empty_names() -> Names {
        Names::new()
    }

    #[test]
    fn test_shallow_conformance_primitives() -> TestResult {
        let names = empty_names();
        assert!(Value::Null.conforms_to(&Schema::Null, &names));
        assert!(Value::Boolean(true).conforms_to(&Schema::Boolean, &names));
        assert!(Value::Int(7).conforms_to(&Schema::Int, &names));
        assert!(Value::Long(7).conforms_to(&Schema::Int, &names));
        assert!(!Value::Long(i64::MAX).conforms_to(&Schema::Int, &names));
        assert!(Value::Int(7).conforms_to(&Schema::Double, &names));
        assert!(!Value::String("x".into()).conforms_to(&Schema::Int, &names));
        Ok(())
    }

    #[test]
    fn test_record_conformance_requires_exact_keys() -> TestResult {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "U",
                "fields": [
                    {"name": "name", "type": "string"},
                    {"name": "fav", "type": "int", "default": 3}
                ]
            }"#,
        )?;
        let names = empty_names();

        let full = record_from(vec![("name", "x".into()), ("fav", Value::Int(1))]);
        assert!(full.conforms_to(&schema, &names));

        // A field with a default may be absent.
        let partial = record_from(vec![("name", "x".into())]);
        assert!(partial.conforms_to(&schema, &names));

        // A required field may not.
        let missing = record_from(vec![("fav", Value::Int(1))]);
        assert!(!missing.conforms_to(&schema, &names));

        // Unknown keys disqualify the record.
        let extra = record_from(vec![("name", "x".into()), ("other", Value::Int(1))]);
        assert!(!extra.conforms_to(&schema, &names));
        Ok(())
    }

    #[test]
    fn test_union_first_match_is_stable() -> TestResult {
        let schema = Schema::parse_str(r#"["null", "long", "double"]"#)?;
        let names = empty_names();
        // Int conforms to both long and double; long is first.
        match &schema {
            Schema::Union(union) => {
                let first = union
                    .variants()
                    .iter()
                    .position(|b| Value::Int(3).conforms_to(b, &names));
                assert_eq!(first, Some(1));
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    #[test]
    fn test_default_typing() -> TestResult {
        let names = empty_names();
        assert_eq!(
            Value::from_json(&json!(42), &Schema::Int, &names)?,
            Value::Int(42)
        );
        assert_eq!(
            Value::from_json(&json!("x"), &Schema::String, &names)?,
            Value::String("x".into())
        );
        assert!(Value::from_json(&json!("x"), &Schema::Int, &names).is_err());

        // Bytes use the code-point convention.
        assert_eq!(
            Value::from_json(&json!("\u{0}\u{1}\u{ff}"), &Schema::Bytes, &names)?,
            Value::Bytes(vec![0, 1, 255])
        );
        Ok(())
    }

    #[test]
    fn test_default_typing_enum_and_array() -> TestResult {
        let names = empty_names();
        let enum_schema = Schema::parse_str(
            r#"{"type": "enum", "name": "E", "symbols": ["a", "b"]}"#,
        )?;
        assert_eq!(
            Value::from_json(&json!("b"), &enum_schema, &names)?,
            Value::Enum(1, "b".into())
        );
        assert!(Value::from_json(&json!("c"), &enum_schema, &names).is_err());

        let array_schema = Schema::array(Schema::Long);
        assert_eq!(
            Value::from_json(&json!([1, 2]), &array_schema, &names)?,
            Value::Array(vec![Value::Long(1), Value::Long(2)])
        );
        Ok(())
    }
}
