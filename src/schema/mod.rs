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

//! Parsing and interacting with schemas in Avro format.

mod name;
mod parser;
mod record;
mod union;

pub use crate::schema::{
    name::{Alias, Aliases, Name, Names, Namespace},
    record::{RecordField, RecordFieldOrder, RecordSchema},
    union::UnionSchema,
};
use crate::{AvroResult, Error, error::Details, schema::parser::Parser};
use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeSeq},
};
use serde_json::Value as JsonValue;
use std::io::Read;
use strum::{Display, EnumDiscriminants};

/// Documentation attached to complex Avro schemas.
pub type Documentation = Option<String>;

/// Represents any valid Avro schema.
///
/// More information about Avro schemas can be found in the
/// [Avro Specification](https://avro.apache.org/docs/1.10.2/spec.html#schemas)
#[derive(Clone, Debug, PartialEq, EnumDiscriminants, Display)]
#[strum_discriminants(name(SchemaKind), derive(Hash, Ord, PartialOrd, Display))]
pub enum Schema {
    /// A `null` Avro schema.
    Null,
    /// A `boolean` Avro schema.
    Boolean,
    /// An `int` Avro schema.
    Int,
    /// A `long` Avro schema.
    Long,
    /// A `float` Avro schema.
    Float,
    /// A `double` Avro schema.
    Double,
    /// A `bytes` Avro schema.
    Bytes,
    /// A `string` Avro schema.
    String,
    /// An `array` Avro schema. All items have the same schema.
    Array(ArraySchema),
    /// A `map` Avro schema. Keys are strings and all values have the same
    /// schema.
    Map(MapSchema),
    /// A `union` Avro schema.
    Union(UnionSchema),
    /// A `record` Avro schema.
    Record(RecordSchema),
    /// An `enum` Avro schema.
    Enum(EnumSchema),
    /// A `fixed` Avro schema.
    Fixed(FixedSchema),
    /// Logical type for arbitrary-precision decimals over `bytes` or
    /// `fixed`.
    Decimal(DecimalSchema),
    /// Logical type for universally unique identifiers, over `string`.
    Uuid,
    /// Logical type counting days since the unix epoch, over `int`.
    Date,
    /// Time of day in milliseconds after midnight, over `int`.
    TimeMillis,
    /// Time of day in microseconds after midnight, over `long`.
    TimeMicros,
    /// An instant in milliseconds after the unix epoch, over `long`.
    TimestampMillis,
    /// An instant in microseconds after the unix epoch, over `long`.
    TimestampMicros,
    /// A reference to a previously defined named schema.
    Ref { name: Name },
}

/// An `array` Avro schema.
#[derive(Clone, Debug, PartialEq)]
pub struct ArraySchema {
    pub items: Box<Schema>,
}

/// A `map` Avro schema.
#[derive(Clone, Debug, PartialEq)]
pub struct MapSchema {
    pub values: Box<Schema>,
}

/// An `enum` Avro schema.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumSchema {
    /// The name of the enum.
    pub name: Name,
    /// The aliases of the enum, fully qualified.
    pub aliases: Aliases,
    /// The documentation of the enum.
    pub doc: Documentation,
    /// The symbols of the enum, in index order.
    pub symbols: Vec<String>,
    /// Optional default symbol, used during schema resolution when a writer
    /// symbol is unknown to the reader.
    pub default: Option<String>,
}

/// A `fixed` Avro schema.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedSchema {
    /// The name of the fixed.
    pub name: Name,
    /// The aliases of the fixed, fully qualified.
    pub aliases: Aliases,
    /// The documentation of the fixed.
    pub doc: Documentation,
    /// The exact number of bytes of every value.
    pub size: usize,
}

/// A `decimal` logical schema.
///
/// `precision` is a positive integer and `scale` is an integer between 0 and
/// `precision`.
#[derive(Clone, Debug, PartialEq)]
pub struct DecimalSchema {
    /// The number of digits in the unscaled value.
    pub precision: usize,
    /// The number of digits to the right of the decimal point.
    pub scale: usize,
    /// The underlying wire representation.
    pub inner: DecimalRepr,
}

/// The wire representation of a `decimal` logical schema.
#[derive(Clone, Debug, PartialEq)]
pub enum DecimalRepr {
    Bytes,
    Fixed(FixedSchema),
}

impl SchemaKind {
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            SchemaKind::Null
                | SchemaKind::Boolean
                | SchemaKind::Int
                | SchemaKind::Long
                | SchemaKind::Double
                | SchemaKind::Float
                | SchemaKind::Bytes
                | SchemaKind::String,
        )
    }
}

impl Schema {
    /// Create a `Schema` from a string representing a JSON Avro schema.
    pub fn parse_str(input: &str) -> AvroResult<Schema> {
        let value = serde_json::from_str(input).map_err(Details::ParseSchemaJson)?;
        Self::parse(&value)
    }

    /// Create a `Schema` from a reader which implements [`Read`].
    pub fn parse_reader(reader: &mut (impl Read + ?Sized)) -> AvroResult<Schema> {
        let mut buf = String::new();
        reader
            .read_to_string(&mut buf)
            .map_err(|e| Error::new(Details::ReadBytes(e)))?;
        Self::parse_str(&buf)
    }

    /// Parses an Avro schema from JSON.
    pub fn parse(value: &JsonValue) -> AvroResult<Schema> {
        let mut parser = Parser::default();
        parser.parse(value, None)
    }

    /// An `array` schema with the given item schema.
    pub fn array(items: Schema) -> Schema {
        Schema::Array(ArraySchema {
            items: Box::new(items),
        })
    }

    /// A `map` schema with the given value schema.
    pub fn map(values: Schema) -> Schema {
        Schema::Map(MapSchema {
            values: Box::new(values),
        })
    }

    /// Returns whether the schema is a named type (or a reference to one).
    pub fn is_named(&self) -> bool {
        matches!(
            self,
            Schema::Ref { .. }
                | Schema::Record(_)
                | Schema::Enum(_)
                | Schema::Fixed(_)
                | Schema::Decimal(DecimalSchema {
                    inner: DecimalRepr::Fixed(_),
                    ..
                })
        )
    }

    /// Returns the name of the schema, if it has one.
    pub fn name(&self) -> Option<&Name> {
        match self {
            Schema::Ref { name }
            | Schema::Record(RecordSchema { name, .. })
            | Schema::Enum(EnumSchema { name, .. })
            | Schema::Fixed(FixedSchema { name, .. })
            | Schema::Decimal(DecimalSchema {
                inner: DecimalRepr::Fixed(FixedSchema { name, .. }),
                ..
            }) => Some(name),
            _ => None,
        }
    }

    /// Returns the namespace of the schema, if it has one.
    pub fn namespace(&self) -> Option<&str> {
        self.name().and_then(|n| n.namespace())
    }

    /// Returns the aliases of the schema, if it has any.
    pub fn aliases(&self) -> Option<&Vec<Alias>> {
        match self {
            Schema::Record(RecordSchema { aliases, .. })
            | Schema::Enum(EnumSchema { aliases, .. })
            | Schema::Fixed(FixedSchema { aliases, .. })
            | Schema::Decimal(DecimalSchema {
                inner: DecimalRepr::Fixed(FixedSchema { aliases, .. }),
                ..
            }) => aliases.as_ref(),
            _ => None,
        }
    }

    /// Collect the definitions of all named types in this schema, keyed by
    /// fullname. Codec compilation resolves [`Schema::Ref`] nodes through
    /// this table.
    pub(crate) fn named_types(&self) -> Names {
        let mut names = Names::new();
        self.gather_named_types(&mut names);
        names
    }

    fn gather_named_types(&self, names: &mut Names) {
        match self {
            Schema::Record(record) => {
                if names.insert(record.name.clone(), self.clone()).is_some() {
                    return;
                }
                for field in &record.fields {
                    field.schema.gather_named_types(names);
                }
            }
            Schema::Enum(EnumSchema { name, .. }) => {
                names.insert(name.clone(), self.clone());
            }
            Schema::Fixed(FixedSchema { name, .. }) => {
                names.insert(name.clone(), self.clone());
            }
            Schema::Decimal(DecimalSchema {
                inner: DecimalRepr::Fixed(FixedSchema { name, .. }),
                ..
            }) => {
                names.insert(name.clone(), self.clone());
            }
            Schema::Array(ArraySchema { items }) => items.gather_named_types(names),
            Schema::Map(MapSchema { values }) => values.gather_named_types(names),
            Schema::Union(union) => {
                for branch in union.variants() {
                    branch.gather_named_types(names);
                }
            }
            _ => (),
        }
    }
}

fn serialize_named_header<S>(
    map: &mut S::SerializeMap,
    kind: &str,
    name: &Name,
    aliases: &Aliases,
    doc: &Documentation,
) -> Result<(), S::Error>
where
    S: Serializer,
{
    map.serialize_entry("type", kind)?;
    if let Some(n) = name.namespace() {
        map.serialize_entry("namespace", n)?;
    }
    map.serialize_entry("name", name.name())?;
    if let Some(docstr) = doc {
        map.serialize_entry("doc", docstr)?;
    }
    if let Some(aliases) = aliases {
        map.serialize_entry("aliases", aliases)?;
    }
    Ok(())
}

impl Serialize for Schema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Schema::Ref { name } => serializer.serialize_str(name.fullname()),
            Schema::Null => serializer.serialize_str("null"),
            Schema::Boolean => serializer.serialize_str("boolean"),
            Schema::Int => serializer.serialize_str("int"),
            Schema::Long => serializer.serialize_str("long"),
            Schema::Float => serializer.serialize_str("float"),
            Schema::Double => serializer.serialize_str("double"),
            Schema::Bytes => serializer.serialize_str("bytes"),
            Schema::String => serializer.serialize_str("string"),
            Schema::Array(ArraySchema { items }) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "array")?;
                map.serialize_entry("items", items)?;
                map.end()
            }
            Schema::Map(MapSchema { values }) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "map")?;
                map.serialize_entry("values", values)?;
                map.end()
            }
            Schema::Union(inner) => {
                let variants = inner.variants();
                let mut seq = serializer.serialize_seq(Some(variants.len()))?;
                for v in variants {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Schema::Record(RecordSchema {
                name,
                aliases,
                doc,
                fields,
                lookup: _lookup,
            }) => {
                let mut map = serializer.serialize_map(None)?;
                serialize_named_header::<S>(&mut map, "record", name, aliases, doc)?;
                map.serialize_entry("fields", fields)?;
                map.end()
            }
            Schema::Enum(EnumSchema {
                name,
                aliases,
                doc,
                symbols,
                default,
            }) => {
                let mut map = serializer.serialize_map(None)?;
                serialize_named_header::<S>(&mut map, "enum", name, aliases, doc)?;
                map.serialize_entry("symbols", symbols)?;
                if let Some(default) = default {
                    map.serialize_entry("default", default)?;
                }
                map.end()
            }
            Schema::Fixed(fixed) => {
                let mut map = serializer.serialize_map(None)?;
                serialize_named_header::<S>(&mut map, "fixed", &fixed.name, &fixed.aliases, &fixed.doc)?;
                map.serialize_entry("size", &fixed.size)?;
                map.end()
            }
            Schema::Decimal(DecimalSchema {
                precision,
                scale,
                inner,
            }) => {
                let mut map = serializer.serialize_map(None)?;
                match inner {
                    DecimalRepr::Bytes => map.serialize_entry("type", "bytes")?,
                    DecimalRepr::Fixed(fixed) => {
                        serialize_named_header::<S>(
                            &mut map,
                            "fixed",
                            &fixed.name,
                            &fixed.aliases,
                            &fixed.doc,
                        )?;
                        map.serialize_entry("size", &fixed.size)?;
                    }
                }
                map.serialize_entry("logicalType", "decimal")?;
                map.serialize_entry("precision", precision)?;
                map.serialize_entry("scale", scale)?;
                map.end()
            }
            Schema::Uuid => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "string")?;
                map.serialize_entry("logicalType", "uuid")?;
                map.end()
            }
            Schema::Date => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "int")?;
                map.serialize_entry("logicalType", "date")?;
                map.end()
            }
            Schema::TimeMillis => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "int")?;
                map.serialize_entry("logicalType", "time-millis")?;
                map.end()
            }
            Schema::TimeMicros => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "long")?;
                map.serialize_entry("logicalType", "time-micros")?;
                map.end()
            }
            Schema::TimestampMillis => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "long")?;
                map.serialize_entry("logicalType", "timestamp-millis")?;
                map.end()
            }
            Schema::TimestampMicros => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "long")?;
                map.serialize_entry("logicalType", "timestamp-micros")?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_invalid_schema() {
        assert!(Schema::parse_str("invalid").is_err());
    }

    #[test]
    fn test_primitive_schema() -> TestResult {
        assert_eq!(Schema::Null, Schema::parse_str(r#""null""#)?);
        assert_eq!(Schema::Int, Schema::parse_str(r#""int""#)?);
        assert_eq!(Schema::Double, Schema::parse_str(r#""double""#)?);
        Ok(())
    }

    #[test]
    fn test_array_schema() -> TestResult {
        let schema = Schema::parse_str(r#"{"type": "array", "items": "string"}"#)?;
        assert_eq!(Schema::array(Schema::String), schema);
        Ok(())
    }

    #[test]
    fn test_map_schema() -> TestResult {
        let schema = Schema::parse_str(r#"{"type": "map", "values": "double"}"#)?;
        assert_eq!(Schema::map(Schema::Double), schema);
        Ok(())
    }

    #[test]
    fn test_union_schema() -> TestResult {
        let schema = Schema::parse_str(r#"["null", "int"]"#)?;
        assert_eq!(
            Schema::Union(UnionSchema::new(vec![Schema::Null, Schema::Int])?),
            schema
        );
        Ok(())
    }

    #[test]
    fn test_nested_union_schema_rejected() {
        let schema = Schema::parse_str(r#"["null", ["null", "int"], "string"]"#);
        assert!(schema.is_err());
    }

    #[test]
    fn test_parse_serialize_parse_round_trip() -> TestResult {
        for raw in [
            r#""long""#,
            r#"{"type": "array", "items": "string"}"#,
            r#"["null", "int", "string"]"#,
            r#"{"type": "fixed", "name": "md5", "size": 16}"#,
            r#"{"type": "enum", "name": "suit", "symbols": ["spades", "clubs"], "default": "clubs"}"#,
            r#"{
                "type": "record",
                "name": "LongList",
                "namespace": "com.example",
                "aliases": ["LinkedLongs"],
                "fields": [
                    {"name": "value", "type": "long"},
                    {"name": "next", "type": ["null", "LongList"], "default": null}
                ]
            }"#,
            r#"{"type": "bytes", "logicalType": "decimal", "precision": 4, "scale": 2}"#,
            r#"{"type": "string", "logicalType": "uuid"}"#,
            r#"{"type": "long", "logicalType": "timestamp-micros"}"#,
        ] {
            let parsed = Schema::parse_str(raw)?;
            let serialized = serde_json::to_string(&parsed)?;
            assert_eq!(parsed, Schema::parse_str(&serialized)?);
        }
        Ok(())
    }

    #[test]
    fn test_named_types_table() -> TestResult {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "Node",
                "fields": [
                    {"name": "label", "type": "string"},
                    {"name": "children", "type": {"type": "array", "items": "Node"}}
                ]
            }"#,
        )?;
        let names = schema.named_types();
        assert_eq!(names.len(), 1);
        assert!(names.contains_key(&Name::new("Node")?));
        Ok(())
    }
}
