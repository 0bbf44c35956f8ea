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

//! The JSON schema parser and its name table.
//!
//! The parser walks the schema JSON depth-first, keeping a table of the named
//! types declared so far. References by name resolve against that table only,
//! so a named type must be defined before it is referenced; the single
//! exception is a type referring to itself (directly or through its own
//! fields), which is supported by registering the name before the body is
//! parsed.

use crate::AvroResult;
use crate::error::Details;
use crate::schema::name::{Alias, Aliases, Name, Names};
use crate::schema::record::{RecordField, RecordFieldOrder, RecordSchema};
use crate::schema::union::UnionSchema;
use crate::schema::{ArraySchema, DecimalRepr, DecimalSchema, EnumSchema, FixedSchema, MapSchema, Schema};
use crate::types::Value;
use crate::util::MapHelper;
use crate::validator::validate_enum_symbol_name;
use log::warn;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;

#[derive(Default)]
pub(crate) struct Parser {
    /// Named types declared so far, keyed by fullname. While a record's body
    /// is being parsed its entry is a `Schema::Ref` placeholder so that the
    /// record can refer to itself.
    names: Names,
}

impl Parser {
    /// Create a `Schema` from a `serde_json::Value` representing a JSON Avro
    /// schema.
    pub(crate) fn parse(
        &mut self,
        value: &JsonValue,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        match value {
            JsonValue::String(t) => self.parse_known_schema(t.as_str(), enclosing_namespace),
            JsonValue::Object(data) => self.parse_complex(data, enclosing_namespace),
            JsonValue::Array(data) => self.parse_union(data, enclosing_namespace),
            _ => Err(Details::ParseSchemaFromValidJson.into()),
        }
    }

    /// Parse a string as a primitive type or a reference to an already
    /// declared named type.
    fn parse_known_schema(
        &mut self,
        name: &str,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        match name {
            "null" => Ok(Schema::Null),
            "boolean" => Ok(Schema::Boolean),
            "int" => Ok(Schema::Int),
            "long" => Ok(Schema::Long),
            "double" => Ok(Schema::Double),
            "float" => Ok(Schema::Float),
            "bytes" => Ok(Schema::Bytes),
            "string" => Ok(Schema::String),
            _ => self.fetch_schema_ref(name, enclosing_namespace),
        }
    }

    /// Resolve a name against the table of previously declared types.
    fn fetch_schema_ref(
        &mut self,
        name: &str,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        let fully_qualified_name = Name::new_with_enclosing_namespace(name, enclosing_namespace)?;
        if self.names.contains_key(&fully_qualified_name) {
            Ok(Schema::Ref {
                name: fully_qualified_name,
            })
        } else {
            Err(Details::UnknownNamedType(fully_qualified_name.fullname().to_string()).into())
        }
    }

    fn parse_union(
        &mut self,
        items: &[JsonValue],
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        let mut branches = Vec::with_capacity(items.len());
        for item in items {
            branches.push(self.parse(item, enclosing_namespace)?);
        }
        Ok(Schema::Union(UnionSchema::new(branches)?))
    }

    /// Parse a JSON object as a complex Avro type.
    fn parse_complex(
        &mut self,
        complex: &Map<String, JsonValue>,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        if let Some(JsonValue::String(logical_type)) = complex.get("logicalType") {
            return self.parse_logical(logical_type.clone(), complex, enclosing_namespace);
        }

        match complex.get("type") {
            None => Err(Details::GetTypeField.into()),
            Some(JsonValue::String(t)) => match t.as_str() {
                "record" => self.parse_record(complex, enclosing_namespace),
                "enum" => self.parse_enum(complex, enclosing_namespace),
                "fixed" => self.parse_fixed(complex, enclosing_namespace),
                "array" => self.parse_array(complex, enclosing_namespace),
                "map" => self.parse_map(complex, enclosing_namespace),
                other => self.parse_known_schema(other, enclosing_namespace),
            },
            // Avro supports nesting: {"type": {"type": "string"}}
            Some(value) => self.parse(value, enclosing_namespace),
        }
    }

    /// Parse an object carrying a `logicalType` attribute.
    ///
    /// Unrecognized or invalid logical annotations degrade to the underlying
    /// base type.
    fn parse_logical(
        &mut self,
        logical_type: String,
        complex: &Map<String, JsonValue>,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        let base = match complex.get("type") {
            None => return Err(Details::GetTypeField.into()),
            Some(JsonValue::String(t)) if t == "fixed" => {
                self.parse_fixed(complex, enclosing_namespace)?
            }
            Some(value) => self.parse(value, enclosing_namespace)?,
        };

        match logical_type.as_str() {
            "decimal" => match base {
                Schema::Bytes => self.parse_decimal(complex, DecimalRepr::Bytes),
                Schema::Fixed(fixed) => self.parse_decimal(complex, DecimalRepr::Fixed(fixed)),
                _ => {
                    warn!("Ignoring decimal logical type for schema: {base:?}");
                    Ok(base)
                }
            },
            "uuid" => match base {
                Schema::String => Ok(Schema::Uuid),
                _ => {
                    warn!("Ignoring uuid logical type for schema: {base:?}");
                    Ok(base)
                }
            },
            "date" => match base {
                Schema::Int => Ok(Schema::Date),
                _ => {
                    warn!("Ignoring date logical type for schema: {base:?}");
                    Ok(base)
                }
            },
            "time-millis" => match base {
                Schema::Int => Ok(Schema::TimeMillis),
                _ => {
                    warn!("Ignoring time-millis logical type for schema: {base:?}");
                    Ok(base)
                }
            },
            "time-micros" => match base {
                Schema::Long => Ok(Schema::TimeMicros),
                _ => {
                    warn!("Ignoring time-micros logical type for schema: {base:?}");
                    Ok(base)
                }
            },
            "timestamp-millis" => match base {
                Schema::Long => Ok(Schema::TimestampMillis),
                _ => {
                    warn!("Ignoring timestamp-millis logical type for schema: {base:?}");
                    Ok(base)
                }
            },
            "timestamp-micros" => match base {
                Schema::Long => Ok(Schema::TimestampMicros),
                _ => {
                    warn!("Ignoring timestamp-micros logical type for schema: {base:?}");
                    Ok(base)
                }
            },
            other => {
                warn!("Ignoring unknown logicalType '{other}'");
                Ok(base)
            }
        }
    }

    fn parse_decimal(
        &mut self,
        complex: &Map<String, JsonValue>,
        inner: DecimalRepr,
    ) -> AvroResult<Schema> {
        let precision = complex.get("precision").and_then(|v| v.as_u64());
        let scale = complex.get("scale").and_then(|v| v.as_u64()).or(Some(0));
        match (precision, scale) {
            (Some(precision), Some(scale)) if precision >= 1 && scale <= precision => {
                Ok(Schema::Decimal(DecimalSchema {
                    precision: precision as usize,
                    scale: scale as usize,
                    inner,
                }))
            }
            _ => {
                warn!("Ignoring decimal logical type with invalid precision/scale");
                Ok(match inner {
                    DecimalRepr::Bytes => Schema::Bytes,
                    DecimalRepr::Fixed(fixed) => Schema::Fixed(fixed),
                })
            }
        }
    }

    fn parse_array(
        &mut self,
        complex: &Map<String, JsonValue>,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        let items = complex.get("items").ok_or(Details::GetArrayItemsField)?;
        Ok(Schema::Array(ArraySchema {
            items: Box::new(self.parse(items, enclosing_namespace)?),
        }))
    }

    fn parse_map(
        &mut self,
        complex: &Map<String, JsonValue>,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        let values = complex.get("values").ok_or(Details::GetMapValuesField)?;
        Ok(Schema::Map(MapSchema {
            values: Box::new(self.parse(values, enclosing_namespace)?),
        }))
    }

    fn parse_record(
        &mut self,
        complex: &Map<String, JsonValue>,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        let name = Name::parse(complex, enclosing_namespace)?;
        self.declare_name(&name)?;

        let aliases = parse_aliases(complex)?;
        let record_namespace = name.namespace().map(str::to_string);

        let fields_json = complex
            .get("fields")
            .and_then(|v| v.as_array())
            .ok_or(Details::GetRecordFieldsJson)?;

        let mut fields = Vec::with_capacity(fields_json.len());
        for (position, field) in fields_json.iter().enumerate() {
            let field = field
                .as_object()
                .ok_or(Details::ParseSchemaFromValidJson)?;
            fields.push(self.parse_field(field, &name, record_namespace.as_deref(), position)?);
        }
        let lookup = RecordSchema::build_lookup(&fields)?;

        let schema = Schema::Record(RecordSchema {
            name: name.clone(),
            aliases,
            doc: complex.doc(),
            fields,
            lookup,
        });
        self.names.insert(name, schema.clone());
        Ok(schema)
    }

    fn parse_field(
        &mut self,
        field: &Map<String, JsonValue>,
        record_name: &Name,
        record_namespace: Option<&str>,
        position: usize,
    ) -> AvroResult<RecordField> {
        let name = field.name().ok_or(Details::GetNameField)?;
        crate::validator::validate_record_field_name(&name)?;

        let ty = field.get("type").ok_or(Details::GetRecordFieldTypeField)?;
        let schema = self.parse(ty, record_namespace)?;

        if let Some(logical_type) = field.get("logicalType") {
            warn!(
                "Ignored the {record_name}.{name} logicalType property (`{logical_type}`). It should be nested inside the `type` of the field"
            );
        }

        let default = field.get("default").cloned();
        self.check_field_default(&schema, &name, record_name, &default)?;

        Ok(RecordField {
            name,
            doc: field.doc(),
            aliases: RecordField::parse_aliases(field),
            default,
            schema,
            order: RecordFieldOrder::from_attribute(field.get("order")),
            position,
        })
    }

    /// Validate a field default against the field's schema.
    ///
    /// For a union-typed field the default may match *any* branch; this is
    /// deliberately more permissive than the Avro specification's
    /// first-branch rule.
    fn check_field_default(
        &self,
        field_schema: &Schema,
        field_name: &str,
        record_name: &Name,
        default: &Option<JsonValue>,
    ) -> AvroResult<()> {
        let value = match default {
            Some(value) => value,
            None => return Ok(()),
        };
        match field_schema {
            Schema::Union(union) => {
                let matched = union
                    .variants()
                    .iter()
                    .any(|branch| Value::from_json(value, branch, &self.names).is_ok());
                if matched {
                    Ok(())
                } else {
                    Err(Details::GetDefaultUnion(field_name.to_string()).into())
                }
            }
            _ => match Value::from_json(value, field_schema, &self.names) {
                Ok(_) => Ok(()),
                Err(_) => Err(Details::GetDefaultRecordField {
                    field: field_name.to_string(),
                    record: record_name.fullname().to_string(),
                    value: value.clone(),
                }
                .into()),
            },
        }
    }

    fn parse_enum(
        &mut self,
        complex: &Map<String, JsonValue>,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        let name = Name::parse(complex, enclosing_namespace)?;

        let symbols_json = complex
            .get("symbols")
            .and_then(|v| v.as_array())
            .ok_or(Details::GetEnumSymbolsField)?;

        let mut symbols = Vec::with_capacity(symbols_json.len());
        let mut seen: HashSet<&str> = HashSet::with_capacity(symbols_json.len());
        for symbol in symbols_json {
            let symbol = symbol.as_str().ok_or(Details::GetEnumSymbolsField)?;
            validate_enum_symbol_name(symbol)?;
            if !seen.insert(symbol) {
                return Err(Details::DuplicateEnumSymbol(symbol.to_string()).into());
            }
            symbols.push(symbol.to_string());
        }

        let default = complex.string("default");
        if let Some(ref default) = default {
            if !symbols.iter().any(|s| s == default) {
                return Err(Details::GetEnumDefault(default.clone()).into());
            }
        }

        self.declare_name(&name)?;
        let schema = Schema::Enum(EnumSchema {
            name: name.clone(),
            aliases: parse_aliases(complex)?,
            doc: complex.doc(),
            symbols,
            default,
        });
        self.names.insert(name, schema.clone());
        Ok(schema)
    }

    fn parse_fixed(
        &mut self,
        complex: &Map<String, JsonValue>,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Schema> {
        let name = Name::parse(complex, enclosing_namespace)?;

        let size = complex
            .get("size")
            .and_then(|v| v.as_u64())
            .ok_or(Details::GetFixedSizeField)?;

        self.declare_name(&name)?;
        let schema = Schema::Fixed(FixedSchema {
            name: name.clone(),
            aliases: parse_aliases(complex)?,
            doc: complex.doc(),
            size: size as usize,
        });
        self.names.insert(name, schema.clone());
        Ok(schema)
    }

    /// Reserve a fullname in the table, rejecting redefinitions.
    fn declare_name(&mut self, name: &Name) -> AvroResult<()> {
        if self.names.contains_key(name) {
            return Err(Details::NameCollision(name.fullname().to_string()).into());
        }
        self.names
            .insert(name.clone(), Schema::Ref { name: name.clone() });
        Ok(())
    }
}

fn parse_aliases(complex: &Map<String, JsonValue>) -> AvroResult<Aliases> {
    match complex.aliases() {
        None => Ok(None),
        Some(raw) => {
            let mut aliases = Vec::with_capacity(raw.len());
            for alias in raw {
                aliases.push(Alias::new(&alias)?);
            }
            Ok(Some(aliases))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Schema;
    use crate::error::Details;
    use crate::schema::{DecimalRepr, DecimalSchema, EnumSchema, RecordSchema};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_forward_reference_rejected() {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "A",
                "fields": [{"name": "b", "type": "B"}]
            }"#,
        );
        match schema.map_err(crate::Error::into_details) {
            Err(Details::UnknownNamedType(name)) => assert_eq!(name, "B"),
            other => panic!("Expected UnknownNamedType, got {other:?}"),
        }
    }

    #[test]
    fn test_self_reference_allowed() -> TestResult {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "LongList",
                "fields": [
                    {"name": "value", "type": "long"},
                    {"name": "next", "type": ["null", "LongList"]}
                ]
            }"#,
        )?;
        match schema {
            Schema::Record(RecordSchema { fields, .. }) => {
                let next = &fields[1].schema;
                match next {
                    Schema::Union(union) => {
                        assert!(matches!(union.variants()[1], Schema::Ref { .. }));
                    }
                    other => panic!("Expected a union, got {other:?}"),
                }
            }
            other => panic!("Expected a record, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_name_reuse_rejected() {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "A",
                "fields": [
                    {"name": "x", "type": {"type": "fixed", "name": "A", "size": 4}}
                ]
            }"#,
        );
        assert!(matches!(
            schema.map_err(crate::Error::into_details),
            Err(Details::NameCollision(_))
        ));
    }

    #[test]
    fn test_duplicate_field_names_rejected() {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "A",
                "fields": [
                    {"name": "x", "type": "int"},
                    {"name": "x", "type": "string"}
                ]
            }"#,
        );
        assert!(matches!(
            schema.map_err(crate::Error::into_details),
            Err(Details::DuplicateFieldName(_))
        ));
    }

    #[test]
    fn test_duplicate_enum_symbols_rejected() {
        let schema =
            Schema::parse_str(r#"{"type": "enum", "name": "E", "symbols": ["a", "b", "a"]}"#);
        assert!(matches!(
            schema.map_err(crate::Error::into_details),
            Err(Details::DuplicateEnumSymbol(_))
        ));
    }

    #[test]
    fn test_enum_default_must_be_symbol() {
        let schema = Schema::parse_str(
            r#"{"type": "enum", "name": "E", "symbols": ["a", "b"], "default": "c"}"#,
        );
        assert!(matches!(
            schema.map_err(crate::Error::into_details),
            Err(Details::GetEnumDefault(_))
        ));
    }

    #[test]
    fn test_namespace_inheritance() -> TestResult {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "Outer",
                "namespace": "com.example",
                "fields": [
                    {"name": "inner", "type": {
                        "type": "record",
                        "name": "Inner",
                        "fields": [{"name": "z", "type": "int"}]
                    }},
                    {"name": "again", "type": "Inner"}
                ]
            }"#,
        )?;
        let names = schema.named_types();
        let inner: crate::schema::Name = "com.example.Inner".parse()?;
        assert!(names.contains_key(&inner));
        match schema {
            Schema::Record(RecordSchema { fields, .. }) => match &fields[1].schema {
                Schema::Ref { name } => assert_eq!(name.fullname(), "com.example.Inner"),
                other => panic!("Expected a reference, got {other:?}"),
            },
            _ => unreachable!(),
        }
        Ok(())
    }

    #[test]
    fn test_bad_field_default_rejected() {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "A",
                "fields": [{"name": "x", "type": "int", "default": "nope"}]
            }"#,
        );
        assert!(matches!(
            schema.map_err(crate::Error::into_details),
            Err(Details::GetDefaultRecordField { .. })
        ));
    }

    #[test]
    fn test_union_default_matches_any_branch() -> TestResult {
        // 42 matches the second branch; the Avro spec would demand it match
        // the first.
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "A",
                "fields": [{"name": "x", "type": ["null", "int"], "default": 42}]
            }"#,
        )?;
        assert!(matches!(schema, Schema::Record(_)));
        Ok(())
    }

    #[test]
    fn test_unknown_logical_type_degrades() -> TestResult {
        let schema =
            Schema::parse_str(r#"{"type": "string", "logicalType": "sparkle"}"#)?;
        assert_eq!(schema, Schema::String);
        Ok(())
    }

    #[test]
    fn test_invalid_decimal_degrades_to_bytes() -> TestResult {
        let schema = Schema::parse_str(
            r#"{"type": "bytes", "logicalType": "decimal", "precision": 2, "scale": 5}"#,
        )?;
        assert_eq!(schema, Schema::Bytes);
        Ok(())
    }

    #[test]
    fn test_decimal_over_fixed() -> TestResult {
        let schema = Schema::parse_str(
            r#"{"type": "fixed", "name": "Num", "size": 8, "logicalType": "decimal", "precision": 10, "scale": 2}"#,
        )?;
        match schema {
            Schema::Decimal(DecimalSchema {
                precision: 10,
                scale: 2,
                inner: DecimalRepr::Fixed(_),
            }) => Ok(()),
            other => panic!("Expected a decimal over fixed, got {other:?}"),
        }
    }

    #[test]
    fn test_enum_parses() -> TestResult {
        let schema = Schema::parse_str(
            r#"{"type": "enum", "name": "suit", "symbols": ["diamonds", "spades", "clubs", "hearts"]}"#,
        )?;
        match schema {
            Schema::Enum(EnumSchema { symbols, .. }) => {
                assert_eq!(symbols, vec!["diamonds", "spades", "clubs", "hearts"]);
                Ok(())
            }
            other => panic!("Expected an enum, got {other:?}"),
        }
    }
}
