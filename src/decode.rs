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

//! The decoder half of the codec specializer.
//!
//! [`Decoder::new`] compiles a schema into a tree of read instructions with
//! all names resolved up front; decoding a datum interprets that tree against
//! a byte source without ever walking the schema again. Per-message cost is
//! linear in the size of the decoded value.

use crate::AvroResult;
use crate::decimal::Decimal;
use crate::error::Details;
use crate::schema::{
    ArraySchema, DecimalRepr, DecimalSchema, EnumSchema, FixedSchema, MapSchema, Name, Names,
    RecordSchema, Schema,
};
use crate::types::Value;
use crate::util::{self, DEFAULT_MAX_BLOCK_BYTES, read_exact, safe_len};
use log::warn;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use uuid::Uuid;

/// Options for [`Decoder`] and [`crate::ResolvedDecoder`] construction.
#[derive(bon::Builder, Clone, Debug)]
pub struct DecoderConfig {
    /// Ceiling for any single wire-declared length. Hostile input can
    /// declare lengths of many exabytes; anything above this limit is
    /// rejected instead of allocated.
    #[builder(default = DEFAULT_MAX_BLOCK_BYTES)]
    pub max_block_bytes: usize,
    /// When a logical type fails to lift (e.g. a `uuid` string that does not
    /// parse), return the base value instead of erroring. Default true.
    #[builder(default = true)]
    pub logical_type_fallback: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A compiled decoder for one schema: byte source in, [`Value`] out.
///
/// Decoded unions are flattened: the caller sees the branch's value, not a
/// wrapper carrying the branch index.
#[derive(Debug)]
pub struct Decoder {
    root: ReadInstr,
    programs: Vec<ReadInstr>,
    config: DecoderConfig,
}

#[derive(Debug)]
pub(crate) enum ReadInstr {
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
        symbols: Vec<String>,
    },
    Array(Box<ReadInstr>),
    Map(Box<ReadInstr>),
    Union(Vec<ReadInstr>),
    Record {
        fields: Vec<(String, ReadInstr)>,
    },
    /// Invoke the compiled program of a named type.
    Call(usize),
    DecimalBytes {
        scale: usize,
    },
    DecimalFixed {
        size: usize,
        scale: usize,
    },
    Uuid,
    Date,
    TimeMillis,
    TimeMicros,
    TimestampMillis,
    TimestampMicros,
}

pub(crate) struct DecodeCompiler {
    names: Names,
    table: HashMap<Name, usize>,
    programs: Vec<Option<ReadInstr>>,
}

impl DecodeCompiler {
    pub(crate) fn new(names: Names) -> Self {
        Self {
            names,
            table: HashMap::new(),
            programs: Vec::new(),
        }
    }

    pub(crate) fn into_programs(self) -> Vec<ReadInstr> {
        self.programs
            .into_iter()
            .map(|p| p.expect("Named program left uncompiled"))
            .collect()
    }

    pub(crate) fn compile(&mut self, schema: &Schema) -> AvroResult<ReadInstr> {
        Ok(match schema {
            Schema::Null => ReadInstr::Null,
            Schema::Boolean => ReadInstr::Boolean,
            Schema::Int => ReadInstr::Int,
            Schema::Long => ReadInstr::Long,
            Schema::Float => ReadInstr::Float,
            Schema::Double => ReadInstr::Double,
            Schema::Bytes => ReadInstr::Bytes,
            Schema::String => ReadInstr::String,
            Schema::Fixed(FixedSchema { size, .. }) => ReadInstr::Fixed(*size),
            Schema::Enum(EnumSchema { symbols, .. }) => ReadInstr::Enum {
                symbols: symbols.clone(),
            },
            Schema::Array(ArraySchema { items }) => {
                ReadInstr::Array(Box::new(self.compile(items)?))
            }
            Schema::Map(MapSchema { values }) => ReadInstr::Map(Box::new(self.compile(values)?)),
            Schema::Union(union) => {
                let mut branches = Vec::with_capacity(union.variants().len());
                for branch in union.variants() {
                    branches.push(self.compile(branch)?);
                }
                ReadInstr::Union(branches)
            }
            Schema::Record(RecordSchema { fields, .. }) => {
                let mut compiled = Vec::with_capacity(fields.len());
                for field in fields {
                    compiled.push((field.name.clone(), self.compile(&field.schema)?));
                }
                ReadInstr::Record { fields: compiled }
            }
            Schema::Ref { name } => ReadInstr::Call(self.program_index(name)?),
            Schema::Decimal(DecimalSchema { scale, inner, .. }) => match inner {
                DecimalRepr::Bytes => ReadInstr::DecimalBytes { scale: *scale },
                DecimalRepr::Fixed(fixed) => ReadInstr::DecimalFixed {
                    size: fixed.size,
                    scale: *scale,
                },
            },
            Schema::Uuid => ReadInstr::Uuid,
            Schema::Date => ReadInstr::Date,
            Schema::TimeMillis => ReadInstr::TimeMillis,
            Schema::TimeMicros => ReadInstr::TimeMicros,
            Schema::TimestampMillis => ReadInstr::TimestampMillis,
            Schema::TimestampMicros => ReadInstr::TimestampMicros,
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
}

impl Decoder {
    /// Compile a decoder for `schema` with default options.
    pub fn new(schema: &Schema) -> AvroResult<Self> {
        Self::with_config(schema, DecoderConfig::default())
    }

    /// Compile a decoder for `schema`.
    pub fn with_config(schema: &Schema, config: DecoderConfig) -> AvroResult<Self> {
        let mut compiler = DecodeCompiler::new(schema.named_types());
        let root = compiler.compile(schema)?;
        Ok(Self {
            root,
            programs: compiler.into_programs(),
            config,
        })
    }

    /// Decode one datum from `reader`.
    pub fn decode<R: Read>(&self, reader: &mut R) -> AvroResult<Value> {
        read_value(&self.root, &self.programs, &self.config, reader)
    }
}

pub(crate) fn read_value<R: Read>(
    instr: &ReadInstr,
    programs: &[ReadInstr],
    config: &DecoderConfig,
    reader: &mut R,
) -> AvroResult<Value> {
    match instr {
        ReadInstr::Null => Ok(Value::Null),
        ReadInstr::Boolean => Ok(Value::Boolean(read_bool(reader)?)),
        ReadInstr::Int => Ok(Value::Int(util::zag_i32(reader)?)),
        ReadInstr::Long => Ok(Value::Long(util::zag_i64(reader)?)),
        ReadInstr::Float => Ok(Value::Float(read_f32(reader)?)),
        ReadInstr::Double => Ok(Value::Double(read_f64(reader)?)),
        ReadInstr::Bytes => Ok(Value::Bytes(read_bytes(reader, config.max_block_bytes)?)),
        ReadInstr::String => Ok(Value::String(read_string(reader, config.max_block_bytes)?)),
        ReadInstr::Fixed(size) => Ok(Value::Fixed(*size, read_raw(reader, *size)?)),
        ReadInstr::Enum { symbols } => {
            let index = util::zag_i64(reader)?;
            match usize::try_from(index).ok().and_then(|i| symbols.get(i)) {
                Some(symbol) => Ok(Value::Enum(index as u32, symbol.clone())),
                None => Err(Details::EnumIndexOutOfRange {
                    index,
                    num_symbols: symbols.len(),
                }
                .into()),
            }
        }
        ReadInstr::Array(items) => {
            let mut elements = Vec::new();
            for_each_block_item(reader, |r| {
                elements.push(read_value(items, programs, config, r)?);
                Ok(())
            })?;
            Ok(Value::Array(elements))
        }
        ReadInstr::Map(values) => {
            let mut entries = BTreeMap::new();
            for_each_block_item(reader, |r| {
                let key = read_string(r, config.max_block_bytes)?;
                entries.insert(key, read_value(values, programs, config, r)?);
                Ok(())
            })?;
            Ok(Value::Map(entries))
        }
        ReadInstr::Union(branches) => {
            let index = util::zag_i64(reader)?;
            let branch = usize::try_from(index)
                .ok()
                .and_then(|i| branches.get(i))
                .ok_or(Details::UnionIndexOutOfRange {
                    index,
                    num_variants: branches.len(),
                })?;
            // Unions flatten: the caller sees the branch's value.
            read_value(branch, programs, config, reader)
        }
        ReadInstr::Record { fields } => {
            let mut entries = Vec::with_capacity(fields.len());
            for (name, field) in fields {
                entries.push((name.clone(), read_value(field, programs, config, reader)?));
            }
            Ok(Value::Record(entries))
        }
        ReadInstr::Call(index) => read_value(&programs[*index], programs, config, reader),
        ReadInstr::DecimalBytes { scale } => {
            let bytes = read_bytes(reader, config.max_block_bytes)?;
            Ok(Value::Decimal(Decimal::from_signed_bytes_be(&bytes, *scale)))
        }
        ReadInstr::DecimalFixed { size, scale } => {
            let bytes = read_raw(reader, *size)?;
            Ok(Value::Decimal(Decimal::from_signed_bytes_be(&bytes, *scale)))
        }
        ReadInstr::Uuid => {
            let s = read_string(reader, config.max_block_bytes)?;
            match Uuid::parse_str(&s) {
                Ok(uuid) => Ok(Value::Uuid(uuid)),
                Err(e) if config.logical_type_fallback => {
                    warn!("Returning an unparseable uuid as a plain string: {e}");
                    Ok(Value::String(s))
                }
                Err(e) => Err(Details::InvalidUuid(e).into()),
            }
        }
        ReadInstr::Date => Ok(Value::Date(util::zag_i32(reader)?)),
        ReadInstr::TimeMillis => Ok(Value::TimeMillis(util::zag_i32(reader)?)),
        ReadInstr::TimeMicros => Ok(Value::TimeMicros(util::zag_i64(reader)?)),
        ReadInstr::TimestampMillis => Ok(Value::TimestampMillis(util::zag_i64(reader)?)),
        ReadInstr::TimestampMicros => Ok(Value::TimestampMicros(util::zag_i64(reader)?)),
    }
}

/// Drive `f` once per item across the block structure of an array or map.
///
/// Accepts both framings: a sequence of positive-count blocks, and the
/// negative-count form where the count is followed by the block's byte size.
/// A zero count terminates.
pub(crate) fn for_each_block_item<R: Read, F>(reader: &mut R, mut f: F) -> AvroResult<()>
where
    F: FnMut(&mut R) -> AvroResult<()>,
{
    loop {
        let mut count = util::zag_i64(reader)?;
        if count == 0 {
            break;
        }
        if count < 0 {
            count = count
                .checked_neg()
                .ok_or(Details::NegativeLength(count))?;
            let byte_size = util::zag_i64(reader)?;
            if byte_size < 0 {
                return Err(Details::NegativeLength(byte_size).into());
            }
        }
        for _ in 0..count {
            f(reader)?;
        }
    }
    Ok(())
}

pub(crate) fn read_bool<R: Read>(reader: &mut R) -> AvroResult<bool> {
    let mut byte = [0u8; 1];
    read_exact(reader, &mut byte)?;
    match byte[0] {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Details::BoolValue(other).into()),
    }
}

pub(crate) fn read_f32<R: Read>(reader: &mut R) -> AvroResult<f32> {
    let mut bytes = [0u8; 4];
    read_exact(reader, &mut bytes)?;
    Ok(f32::from_le_bytes(bytes))
}

pub(crate) fn read_f64<R: Read>(reader: &mut R) -> AvroResult<f64> {
    let mut bytes = [0u8; 8];
    read_exact(reader, &mut bytes)?;
    Ok(f64::from_le_bytes(bytes))
}

/// Read a `long` length prefix, guarded by the allocation ceiling.
pub(crate) fn read_len<R: Read>(reader: &mut R, max: usize) -> AvroResult<usize> {
    let len = util::zag_i64(reader)?;
    if len < 0 {
        return Err(Details::NegativeLength(len).into());
    }
    safe_len(len as usize, max)
}

pub(crate) fn read_raw<R: Read>(reader: &mut R, len: usize) -> AvroResult<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    read_exact(reader, &mut bytes)?;
    Ok(bytes)
}

pub(crate) fn read_bytes<R: Read>(reader: &mut R, max: usize) -> AvroResult<Vec<u8>> {
    let len = read_len(reader, max)?;
    read_raw(reader, len)
}

pub(crate) fn read_string<R: Read>(reader: &mut R, max: usize) -> AvroResult<String> {
    let bytes = read_bytes(reader, max)?;
    String::from_utf8(bytes).map_err(|e| Details::ConvertToUtf8(e).into())
}
