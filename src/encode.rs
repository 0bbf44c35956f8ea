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

//! The encoder half of the codec specializer.
//!
//! [`Encoder::new`] traverses a schema once and emits a tree of write
//! instructions with every name resolved, every enum symbol indexed and every
//! union branch paired with a pre-compiled shape test. Encoding a value walks
//! that tree only; the schema is never consulted again.

use crate::AvroResult;
use crate::error::Details;
use crate::schema::{
    ArraySchema, DecimalRepr, DecimalSchema, EnumSchema, FixedSchema, MapSchema, Name, Names,
    RecordSchema, Schema,
};
use crate::types::{Value, ValueKind, deref_schema};
use crate::util::{zig_i32, zig_i64};
use log::error;
use std::collections::{HashMap, HashSet};
use std::io::Write;

/// Options for [`Encoder`] construction.
#[derive(bon::Builder, Clone, Debug)]
pub struct EncoderConfig {
    /// When true, a record field whose value is missing is an error even if
    /// the field is a nullable union. The default (false) silently encodes
    /// such a field as `null`.
    #[builder(default = false)]
    pub strict_union_match: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A compiled encoder for one schema: `Value` in, Avro binary out.
///
/// Construction is referentially transparent over the schema; the encoder
/// itself is immutable and can be shared across threads.
pub struct Encoder {
    root: WriteInstr,
    programs: Vec<WriteInstr>,
    config: EncoderConfig,
}

pub(crate) enum WriteInstr {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Fixed(usize),
    Enum {
        index_of: HashMap<String, u32>,
    },
    Array(Box<WriteInstr>),
    Map(Box<WriteInstr>),
    Record {
        name: String,
        fields: Vec<FieldWriter>,
    },
    Union {
        branches: Vec<(BranchTest, WriteInstr)>,
    },
    /// Invoke the compiled program of a named type.
    Call(usize),
    DecimalBytes,
    DecimalFixed(usize),
    Uuid,
    Date,
    TimeMillis,
    TimeMicros,
    TimestampMillis,
    TimestampMicros,
}

pub(crate) struct FieldWriter {
    name: String,
    aliases: Vec<String>,
    default: Option<Value>,
    /// The field is a union with a `null` branch; a missing value may be
    /// encoded as `null` unless `strict_union_match` is set.
    nullable: bool,
    instr: WriteInstr,
}

/// The shallow shape test of one union branch, pre-compiled from the branch
/// schema. Mirrors [`Value::conforms_to`].
pub(crate) enum BranchTest {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Fixed(usize),
    Enum(HashSet<String>),
    Array,
    Map,
    Record {
        /// Every name (or field alias) the record accepts.
        accepted: HashSet<String>,
        /// Accepted-name sets of the fields without defaults.
        required: Vec<HashSet<String>>,
    },
    Decimal(Option<usize>),
    Uuid,
    Date,
    TimeMillis,
    TimeMicros,
    TimestampMillis,
    TimestampMicros,
}

impl BranchTest {
    fn matches(&self, value: &Value) -> bool {
        match self {
            BranchTest::Null => matches!(value, Value::Null),
            BranchTest::Boolean => matches!(value, Value::Boolean(_)),
            BranchTest::Int => match value {
                Value::Int(_) => true,
                Value::Long(i) => i32::try_from(*i).is_ok(),
                _ => false,
            },
            BranchTest::Long => matches!(value, Value::Int(_) | Value::Long(_)),
            BranchTest::Float | BranchTest::Double => matches!(
                value,
                Value::Float(_) | Value::Double(_) | Value::Int(_) | Value::Long(_)
            ),
            BranchTest::Bytes => matches!(value, Value::Bytes(_)),
            BranchTest::String => matches!(value, Value::String(_)),
            BranchTest::Fixed(size) => match value {
                Value::Fixed(n, _) => n == size,
                Value::Bytes(b) => b.len() == *size,
                _ => false,
            },
            BranchTest::Enum(symbols) => match value {
                Value::Enum(_, s) | Value::String(s) => symbols.contains(s),
                _ => false,
            },
            BranchTest::Array => matches!(value, Value::Array(_)),
            BranchTest::Map => matches!(value, Value::Map(_)),
            BranchTest::Record { accepted, required } => {
                let keys: Vec<&String> = match value {
                    Value::Record(fields) => fields.iter().map(|(k, _)| k).collect(),
                    Value::Map(map) => map.keys().collect(),
                    _ => return false,
                };
                keys.iter().all(|k| accepted.contains(*k))
                    && required
                        .iter()
                        .all(|names| keys.iter().any(|k| names.contains(*k)))
            }
            BranchTest::Decimal(size) => match (value, size) {
                (Value::Decimal(_), _) => true,
                (Value::Bytes(_), None) => true,
                (Value::Bytes(b), Some(size)) => b.len() == *size,
                (Value::Fixed(n, _), Some(size)) => n == size,
                _ => false,
            },
            BranchTest::Uuid => matches!(value, Value::Uuid(_) | Value::String(_)),
            BranchTest::Date => matches!(value, Value::Date(_) | Value::Int(_)),
            BranchTest::TimeMillis => matches!(value, Value::TimeMillis(_) | Value::Int(_)),
            BranchTest::TimeMicros => {
                matches!(value, Value::TimeMicros(_) | Value::Long(_) | Value::Int(_))
            }
            BranchTest::TimestampMillis => matches!(
                value,
                Value::TimestampMillis(_) | Value::Long(_) | Value::Int(_)
            ),
            BranchTest::TimestampMicros => matches!(
                value,
                Value::TimestampMicros(_) | Value::Long(_) | Value::Int(_)
            ),
        }
    }
}

struct EncodeCompiler {
    names: Names,
    table: HashMap<Name, usize>,
    programs: Vec<Option<WriteInstr>>,
}

impl EncodeCompiler {
    fn compile(&mut self, schema: &Schema) -> AvroResult<WriteInstr> {
        Ok(match schema {
            Schema::Null => WriteInstr::Null,
            Schema::Boolean => WriteInstr::Boolean,
            Schema::Int => WriteInstr::Int,
            Schema::Long => WriteInstr::Long,
            Schema::Float => WriteInstr::Float,
            Schema::Double => WriteInstr::Double,
            Schema::Bytes => WriteInstr::Bytes,
            Schema::String => WriteInstr::String,
            Schema::Fixed(FixedSchema { size, .. }) => WriteInstr::Fixed(*size),
            Schema::Enum(EnumSchema { symbols, .. }) => WriteInstr::Enum {
                index_of: symbols
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (s.clone(), i as u32))
                    .collect(),
            },
            Schema::Array(ArraySchema { items }) => {
                WriteInstr::Array(Box::new(self.compile(items)?))
            }
            Schema::Map(MapSchema { values }) => WriteInstr::Map(Box::new(self.compile(values)?)),
            Schema::Record(record) => self.compile_record(record)?,
            Schema::Union(union) => {
                let mut branches = Vec::with_capacity(union.variants().len());
                for branch in union.variants() {
                    branches.push((self.branch_test(branch)?, self.compile(branch)?));
                }
                WriteInstr::Union { branches }
            }
            Schema::Ref { name } => WriteInstr::Call(self.program_index(name)?),
            Schema::Decimal(DecimalSchema { inner, .. }) => match inner {
                DecimalRepr::Bytes => WriteInstr::DecimalBytes,
                DecimalRepr::Fixed(fixed) => WriteInstr::DecimalFixed(fixed.size),
            },
            Schema::Uuid => WriteInstr::Uuid,
            Schema::Date => WriteInstr::Date,
            Schema::TimeMillis => WriteInstr::TimeMillis,
            Schema::TimeMicros => WriteInstr::TimeMicros,
            Schema::TimestampMillis => WriteInstr::TimestampMillis,
            Schema::TimestampMicros => WriteInstr::TimestampMicros,
        })
    }

    fn compile_record(&mut self, record: &RecordSchema) -> AvroResult<WriteInstr> {
        let mut fields = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            let default = match &field.default {
                Some(json) => Some(Value::from_json(json, &field.schema, &self.names)?),
                None => None,
            };
            let nullable = match &field.schema {
                Schema::Union(union) => union.is_nullable(),
                _ => false,
            };
            fields.push(FieldWriter {
                name: field.name.clone(),
                aliases: field.aliases.clone(),
                default,
                nullable,
                instr: self.compile(&field.schema)?,
            });
        }
        Ok(WriteInstr::Record {
            name: record.name.fullname().to_string(),
            fields,
        })
    }

    fn program_index(&mut self, name: &Name) -> AvroResult<usize> {
        if let Some(&index) = self.table.get(name) {
            return Ok(index);
        }
        let definition = self
            .names
            .get(name)
            .cloned()
            .ok_or_else(|| Details::UnknownNamedType(name.fullname().to_string()))?;
        let index = self.programs.len();
        self.programs.push(None);
        self.table.insert(name.clone(), index);
        let instr = self.compile(&definition)?;
        self.programs[index] = Some(instr);
        Ok(index)
    }

    fn branch_test(&self, schema: &Schema) -> AvroResult<BranchTest> {
        let schema = deref_schema(schema, &self.names);
        Ok(match schema {
            Schema::Null => BranchTest::Null,
            Schema::Boolean => BranchTest::Boolean,
            Schema::Int => BranchTest::Int,
            Schema::Long => BranchTest::Long,
            Schema::Float => BranchTest::Float,
            Schema::Double => BranchTest::Double,
            Schema::Bytes => BranchTest::Bytes,
            Schema::String => BranchTest::String,
            Schema::Fixed(FixedSchema { size, .. }) => BranchTest::Fixed(*size),
            Schema::Enum(EnumSchema { symbols, .. }) => {
                BranchTest::Enum(symbols.iter().cloned().collect())
            }
            Schema::Array(_) => BranchTest::Array,
            Schema::Map(_) => BranchTest::Map,
            Schema::Record(record) => {
                let mut accepted = HashSet::new();
                let mut required = Vec::new();
                for field in &record.fields {
                    let mut names: HashSet<String> = HashSet::with_capacity(1);
                    names.insert(field.name.clone());
                    names.extend(field.aliases.iter().cloned());
                    accepted.extend(names.iter().cloned());
                    if field.default.is_none() {
                        required.push(names);
                    }
                }
                BranchTest::Record { accepted, required }
            }
            Schema::Decimal(DecimalSchema { inner, .. }) => BranchTest::Decimal(match inner {
                DecimalRepr::Bytes => None,
                DecimalRepr::Fixed(fixed) => Some(fixed.size),
            }),
            Schema::Uuid => BranchTest::Uuid,
            Schema::Date => BranchTest::Date,
            Schema::TimeMillis => BranchTest::TimeMillis,
            Schema::TimeMicros => BranchTest::TimeMicros,
            Schema::TimestampMillis => BranchTest::TimestampMillis,
            Schema::TimestampMicros => BranchTest::TimestampMicros,
            Schema::Union(_) | Schema::Ref { .. } => {
                // Unions cannot nest and refs were dereferenced above.
                error!("invalid union branch: {schema:?}");
                return Err(Details::GetNestedUnion.into());
            }
        })
    }
}

impl Encoder {
    /// Compile an encoder for `schema` with default options.
    pub fn new(schema: &Schema) -> AvroResult<Self> {
        Self::with_config(schema, EncoderConfig::default())
    }

    /// Compile an encoder for `schema`.
    pub fn with_config(schema: &Schema, config: EncoderConfig) -> AvroResult<Self> {
        let mut compiler = EncodeCompiler {
            names: schema.named_types(),
            table: HashMap::new(),
            programs: Vec::new(),
        };
        let root = compiler.compile(schema)?;
        let programs = compiler
            .programs
            .into_iter()
            .map(|p| p.expect("Named program left uncompiled"))
            .collect();
        Ok(Self {
            root,
            programs,
            config,
        })
    }

    /// Encode a value to a fresh buffer.
    pub fn encode(&self, value: &Value) -> AvroResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.encode_to(value, &mut buffer)?;
        Ok(buffer)
    }

    /// Encode a value into `writer`.
    pub fn encode_to<W: Write>(&self, value: &Value, writer: &mut W) -> AvroResult<()> {
        self.write_value(&self.root, value, writer)
    }

    fn write_value<W: Write>(
        &self,
        instr: &WriteInstr,
        value: &Value,
        out: &mut W,
    ) -> AvroResult<()> {
        match instr {
            WriteInstr::Null => match value {
                Value::Null => Ok(()),
                other => Err(wrong_value(other, "null")),
            },
            WriteInstr::Boolean => match value {
                Value::Boolean(b) => out
                    .write_all(&[u8::from(*b)])
                    .map_err(|e| Details::WriteBytes(e).into()),
                other => Err(wrong_value(other, "boolean")),
            },
            WriteInstr::Int | WriteInstr::Date | WriteInstr::TimeMillis => {
                let n = match (instr, value) {
                    (_, Value::Int(i)) => *i,
                    (WriteInstr::Date, Value::Date(i)) => *i,
                    (WriteInstr::TimeMillis, Value::TimeMillis(i)) => *i,
                    (_, Value::Long(i)) => i32::try_from(*i)
                        .map_err(|_| Details::EncodeIntegerOutOfRange(*i))?,
                    (_, other) => return Err(wrong_value(other, "int")),
                };
                zig_i32(n, out)
            }
            WriteInstr::Long
            | WriteInstr::TimeMicros
            | WriteInstr::TimestampMillis
            | WriteInstr::TimestampMicros => {
                let n = match (instr, value) {
                    (_, Value::Long(i)) => *i,
                    (_, Value::Int(i)) => *i as i64,
                    (WriteInstr::TimeMicros, Value::TimeMicros(i)) => *i,
                    (WriteInstr::TimestampMillis, Value::TimestampMillis(i)) => *i,
                    (WriteInstr::TimestampMicros, Value::TimestampMicros(i)) => *i,
                    (_, other) => return Err(wrong_value(other, "long")),
                };
                zig_i64(n, out)
            }
            WriteInstr::Float => {
                let x = match value {
                    Value::Float(x) => *x,
                    Value::Int(i) => *i as f32,
                    Value::Long(i) => *i as f32,
                    other => return Err(wrong_value(other, "float")),
                };
                out.write_all(&x.to_le_bytes())
                    .map_err(|e| Details::WriteBytes(e).into())
            }
            WriteInstr::Double => {
                let x = match value {
                    Value::Double(x) => *x,
                    Value::Float(x) => *x as f64,
                    Value::Int(i) => *i as f64,
                    Value::Long(i) => *i as f64,
                    other => return Err(wrong_value(other, "double")),
                };
                out.write_all(&x.to_le_bytes())
                    .map_err(|e| Details::WriteBytes(e).into())
            }
            WriteInstr::Bytes => match value {
                Value::Bytes(b) => write_len_prefixed(b, out),
                other => Err(wrong_value(other, "bytes")),
            },
            WriteInstr::String => match value {
                Value::String(s) => write_len_prefixed(s.as_bytes(), out),
                Value::Bytes(b) => {
                    let s = String::from_utf8(b.clone()).map_err(Details::ConvertToUtf8)?;
                    write_len_prefixed(s.as_bytes(), out)
                }
                other => Err(wrong_value(other, "string")),
            },
            WriteInstr::Fixed(size) => {
                let bytes = match value {
                    Value::Fixed(_, b) | Value::Bytes(b) => b,
                    other => return Err(wrong_value(other, "fixed")),
                };
                if bytes.len() != *size {
                    return Err(Details::EncodeFixedLengthMismatch {
                        expected: *size,
                        got: bytes.len(),
                    }
                    .into());
                }
                out.write_all(bytes).map_err(|e| Details::WriteBytes(e).into())
            }
            WriteInstr::Enum { index_of } => {
                let symbol = match value {
                    Value::Enum(_, s) | Value::String(s) => s,
                    other => return Err(wrong_value(other, "enum")),
                };
                match index_of.get(symbol) {
                    Some(index) => zig_i32(*index as i32, out),
                    None => Err(Details::EncodeUnknownEnumSymbol(symbol.clone()).into()),
                }
            }
            WriteInstr::Array(items) => match value {
                Value::Array(elements) => {
                    if !elements.is_empty() {
                        zig_i64(elements.len() as i64, out)?;
                        for element in elements {
                            self.write_value(items, element, out)?;
                        }
                    }
                    zig_i64(0, out)
                }
                other => Err(wrong_value(other, "array")),
            },
            WriteInstr::Map(values) => match value {
                Value::Map(entries) => {
                    if !entries.is_empty() {
                        zig_i64(entries.len() as i64, out)?;
                        for (key, entry) in entries {
                            write_len_prefixed(key.as_bytes(), out)?;
                            self.write_value(values, entry, out)?;
                        }
                    }
                    zig_i64(0, out)
                }
                other => Err(wrong_value(other, "map")),
            },
            WriteInstr::Record { name, fields } => {
                let lookup: HashMap<&str, &Value> = match value {
                    Value::Record(entries) => {
                        entries.iter().map(|(k, v)| (k.as_str(), v)).collect()
                    }
                    Value::Map(entries) => {
                        entries.iter().map(|(k, v)| (k.as_str(), v)).collect()
                    }
                    other => return Err(wrong_value(other, "record")),
                };
                for field in fields {
                    let found = lookup.get(field.name.as_str()).copied().or_else(|| {
                        field
                            .aliases
                            .iter()
                            .find_map(|alias| lookup.get(alias.as_str()).copied())
                    });
                    match found {
                        Some(v) => self.write_value(&field.instr, v, out)?,
                        None => match &field.default {
                            Some(default) => self.write_value(&field.instr, default, out)?,
                            None if field.nullable && !self.config.strict_union_match => {
                                self.write_value(&field.instr, &Value::Null, out)?
                            }
                            None => {
                                return Err(Details::EncodeMissingField {
                                    record: name.clone(),
                                    field: field.name.clone(),
                                }
                                .into());
                            }
                        },
                    }
                }
                Ok(())
            }
            WriteInstr::Union { branches } => match value {
                Value::Union(index, inner) => {
                    let branch = branches.get(*index as usize).ok_or(
                        Details::EncodeUnionIndexOutOfRange {
                            index: *index,
                            num_variants: branches.len(),
                        },
                    )?;
                    zig_i64(*index as i64, out)?;
                    self.write_value(&branch.1, inner, out)
                }
                value => {
                    for (index, (test, branch)) in branches.iter().enumerate() {
                        if test.matches(value) {
                            zig_i64(index as i64, out)?;
                            return self.write_value(branch, value, out);
                        }
                    }
                    Err(Details::EncodeNoUnionBranch(ValueKind::from(value)).into())
                }
            },
            WriteInstr::Call(index) => self.write_value(&self.programs[*index], value, out),
            WriteInstr::DecimalBytes => match value {
                Value::Decimal(d) => write_len_prefixed(&d.to_signed_bytes_be(), out),
                Value::Bytes(b) => write_len_prefixed(b, out),
                other => Err(wrong_value(other, "decimal")),
            },
            WriteInstr::DecimalFixed(size) => {
                let bytes = match value {
                    Value::Decimal(d) => d.to_sign_extended_bytes_be(*size)?,
                    Value::Fixed(_, b) | Value::Bytes(b) => b.clone(),
                    other => return Err(wrong_value(other, "decimal")),
                };
                if bytes.len() != *size {
                    return Err(Details::EncodeFixedLengthMismatch {
                        expected: *size,
                        got: bytes.len(),
                    }
                    .into());
                }
                out.write_all(&bytes).map_err(|e| Details::WriteBytes(e).into())
            }
            WriteInstr::Uuid => match value {
                Value::Uuid(u) => write_len_prefixed(u.to_string().as_bytes(), out),
                Value::String(s) => write_len_prefixed(s.as_bytes(), out),
                other => Err(wrong_value(other, "uuid")),
            },
        }
    }
}

fn wrong_value(value: &Value, schema: &'static str) -> crate::Error {
    Details::EncodeWrongValue {
        value_kind: ValueKind::from(value),
        schema,
    }
    .into()
}

pub(crate) fn write_len_prefixed<W: Write>(bytes: &[u8], out: &mut W) -> AvroResult<()> {
    zig_i64(bytes.len() as i64, out)?;
    out.write_all(bytes).map_err(|e| Details::WriteBytes(e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record_from;
    use pretty_assertions::assert_eq;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_encode_long() -> TestResult {
        let schema = Schema::parse_str(r#""long""#)?;
        let encoder = Encoder::new(&schema)?;
        assert_eq!(
            encoder.encode(&Value::Long(1234567890123))?,
            vec![0x86, 0xEA, 0xB0, 0xDC, 0xCC, 0x8C, 0x48]
        );
        Ok(())
    }

    #[test]
    fn test_encode_record_with_nullable_union() -> TestResult {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "U",
                "fields": [
                    {"name": "name", "type": "string"},
                    {"name": "fav", "type": ["null", "int"]}
                ]
            }"#,
        )?;
        let encoder = Encoder::new(&schema)?;

        let with_fav = record_from(vec![("name", "Alice".into()), ("fav", Value::Int(42))]);
        assert_eq!(
            encoder.encode(&with_fav)?,
            vec![0x0A, 0x41, 0x6C, 0x69, 0x63, 0x65, 0x02, 0x54]
        );

        // Missing nullable union field encodes as null.
        let without_fav = record_from(vec![("name", "Alice".into())]);
        assert_eq!(
            encoder.encode(&without_fav)?,
            vec![0x0A, 0x41, 0x6C, 0x69, 0x63, 0x65, 0x00]
        );

        // Which is byte-identical to an explicit null.
        let explicit_null = record_from(vec![("name", "Alice".into()), ("fav", Value::Null)]);
        assert_eq!(encoder.encode(&without_fav)?, encoder.encode(&explicit_null)?);
        Ok(())
    }

    #[test]
    fn test_strict_union_match_refuses_missing_field() -> TestResult {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "U",
                "fields": [{"name": "fav", "type": ["null", "int"]}]
            }"#,
        )?;
        let config = EncoderConfig::builder().strict_union_match(true).build();
        let encoder = Encoder::with_config(&schema, config)?;
        let err = encoder.encode(&record_from(vec![])).unwrap_err();
        assert!(matches!(
            err.into_details(),
            Details::EncodeMissingField { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_missing_field_with_default_encodes_default() -> TestResult {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "R",
                "fields": [
                    {"name": "a", "type": "int"},
                    {"name": "b", "type": "string", "default": "x"}
                ]
            }"#,
        )?;
        let encoder = Encoder::new(&schema)?;
        let implicit = encoder.encode(&record_from(vec![("a", Value::Int(1))]))?;
        let explicit = encoder.encode(&record_from(vec![
            ("a", Value::Int(1)),
            ("b", "x".into()),
        ]))?;
        assert_eq!(implicit, explicit);
        Ok(())
    }

    #[test]
    fn test_missing_required_field_errors() -> TestResult {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "R",
                "fields": [{"name": "a", "type": "int"}]
            }"#,
        )?;
        let encoder = Encoder::new(&schema)?;
        let err = encoder.encode(&record_from(vec![])).unwrap_err();
        assert!(matches!(
            err.into_details(),
            Details::EncodeMissingField { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_union_record_disambiguation_first_match_wins() -> TestResult {
        // Two record branches with identical field names: the first one is
        // selected.
        let schema = Schema::parse_str(
            r#"[
                {
                    "type": "record",
                    "name": "CelsiusTemperature",
                    "fields": [
                        {"name": "temperature", "type": "double"},
                        {"name": "measurement_error", "type": "double"}
                    ]
                },
                {
                    "type": "record",
                    "name": "FahrenheitTemperature",
                    "fields": [
                        {"name": "temperature", "type": "double"},
                        {"name": "measurement_error", "type": "double"}
                    ]
                }
            ]"#,
        )?;
        let encoder = Encoder::new(&schema)?;
        let value = record_from(vec![
            ("temperature", Value::Double(21.5)),
            ("measurement_error", Value::Double(0.4)),
        ]);
        let encoded = encoder.encode(&value)?;
        // Branch index 0 on the wire.
        assert_eq!(encoded[0], 0x00);
        Ok(())
    }

    #[test]
    fn test_unknown_enum_symbol() -> TestResult {
        let schema =
            Schema::parse_str(r#"{"type": "enum", "name": "E", "symbols": ["a", "b"]}"#)?;
        let encoder = Encoder::new(&schema)?;
        assert_eq!(encoder.encode(&Value::String("b".into()))?, vec![0x02]);
        let err = encoder.encode(&Value::String("c".into())).unwrap_err();
        assert!(matches!(
            err.into_details(),
            Details::EncodeUnknownEnumSymbol(_)
        ));
        Ok(())
    }

    #[test]
    fn test_no_union_branch() -> TestResult {
        let schema = Schema::parse_str(r#"["null", "int"]"#)?;
        let encoder = Encoder::new(&schema)?;
        let err = encoder.encode(&Value::String("nope".into())).unwrap_err();
        assert!(matches!(
            err.into_details(),
            Details::EncodeNoUnionBranch(_)
        ));
        Ok(())
    }

    #[test]
    fn test_fixed_length_mismatch() -> TestResult {
        let schema = Schema::parse_str(r#"{"type": "fixed", "name": "F", "size": 4}"#)?;
        let encoder = Encoder::new(&schema)?;
        assert!(encoder.encode(&Value::Bytes(vec![1, 2, 3, 4])).is_ok());
        let err = encoder.encode(&Value::Bytes(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(
            err.into_details(),
            Details::EncodeFixedLengthMismatch { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_recursive_record() -> TestResult {
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
        let encoder = Encoder::new(&schema)?;
        let inner = record_from(vec![("value", Value::Long(2)), ("next", Value::Null)]);
        let outer = record_from(vec![("value", Value::Long(1)), ("next", inner)]);
        // value 1, branch 1, value 2, branch 0
        assert_eq!(encoder.encode(&outer)?, vec![0x02, 0x02, 0x04, 0x00]);
        Ok(())
    }

    #[test]
    fn test_encoding_is_deterministic() -> TestResult {
        let schema = Schema::parse_str(r#"{"type": "map", "values": "int"}"#)?;
        let encoder = Encoder::new(&schema)?;
        let mut entries = std::collections::BTreeMap::new();
        entries.insert("b".to_string(), Value::Int(2));
        entries.insert("a".to_string(), Value::Int(1));
        let value = Value::Map(entries);
        assert_eq!(encoder.encode(&value)?, encoder.encode(&value)?);
        Ok(())
    }
}
