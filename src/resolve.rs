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

//! The schema resolution planner.
//!
//! Given a writer schema W and a reader schema R, [`ResolvedDecoder::new`]
//! walks the two in parallel and compiles a program that reads bytes written
//! under W and yields values conforming to R. Whatever can be judged from the
//! schemas alone (a field with no default missing from the writer, two fixeds
//! of different sizes) fails here, at plan time; failures that depend on the
//! actual wire data (a writer union branch the reader cannot represent, an
//! enum symbol unknown to a reader without a default) are compiled into
//! instructions that error during decode.
//!
//! Writer fields dropped by the reader compile to skip programs that discard
//! bytes without materializing values; block-framed arrays and maps written
//! with byte sizes are skipped wholesale.

use crate::AvroResult;
use crate::decode::{self, DecoderConfig, ReadInstr};
use crate::error::Details;
use crate::schema::{
    Alias, ArraySchema, DecimalRepr, DecimalSchema, EnumSchema, FixedSchema, MapSchema, Name,
    Names, RecordSchema, Schema, SchemaKind,
};
use crate::types::Value;
use crate::util::{self, skip_bytes};
use std::collections::HashMap;
use std::io::Read;

/// A compiled resolved decoder: reads bytes written under the writer schema,
/// yields values conforming to the reader schema.
#[derive(Debug)]
pub struct ResolvedDecoder {
    root: ResolveInstr,
    pairs: Vec<ResolveInstr>,
    skips: Vec<SkipInstr>,
    config: DecoderConfig,
}

#[derive(Debug)]
pub(crate) enum ResolveInstr {
    /// The subtree needs no resolution; read it directly. Only leaf reads
    /// are wrapped here, so the instruction never references a program
    /// table.
    Read(ReadInstr),
    Promote(Promotion),
    Enum {
        /// Per writer index: the reader's `(index, symbol)` for that symbol,
        /// or the reader's default; `None` errors at decode time.
        mapping: Vec<Option<(u32, String)>>,
        writer_symbols: Vec<String>,
    },
    Array(Box<ResolveInstr>),
    Map(Box<ResolveInstr>),
    Record {
        /// One action per writer field, in wire order.
        actions: Vec<FieldAction>,
        /// One row per reader field, in the reader's declared order.
        layout: Vec<(String, FieldSource)>,
    },
    /// Dispatch on the writer's union branch index.
    WriterUnion(Vec<ResolveInstr>),
    /// Invoke the compiled program of a named (writer, reader) pair.
    Call(usize),
    /// Data written with this branch cannot be represented by the reader.
    Incompatible(String),
}

#[derive(Debug)]
pub(crate) enum FieldAction {
    Read(ResolveInstr),
    Skip(SkipInstr),
}

#[derive(Debug)]
pub(crate) enum FieldSource {
    /// Value of the n-th `FieldAction::Read`.
    Reader(usize),
    /// The reader field's default.
    Default(Value),
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum Promotion {
    IntToLong,
    IntToFloat,
    IntToDouble,
    LongToFloat,
    LongToDouble,
    FloatToDouble,
    StringToBytes,
    BytesToString,
}

/// A program that discards the bytes of one value written under a writer
/// schema.
#[derive(Debug)]
pub(crate) enum SkipInstr {
    Nothing,
    Boolean,
    VarInt,
    Float,
    Double,
    LenPrefixed,
    Fixed(usize),
    Array(Box<SkipInstr>),
    Map(Box<SkipInstr>),
    Union(Vec<SkipInstr>),
    Record(Vec<SkipInstr>),
    /// Invoke the compiled skip program of a named type.
    Call(usize),
}

struct ResolveCompiler {
    w_names: Names,
    r_names: Names,
    pair_table: HashMap<(Name, Name), usize>,
    pairs: Vec<Option<ResolveInstr>>,
    failed_pairs: HashMap<(Name, Name), String>,
    skip_table: HashMap<Name, usize>,
    skips: Vec<Option<SkipInstr>>,
}

impl ResolvedDecoder {
    /// Plan the resolution of `writer` and `reader` with default options.
    pub fn new(writer: &Schema, reader: &Schema) -> AvroResult<Self> {
        Self::with_config(writer, reader, DecoderConfig::default())
    }

    /// Plan the resolution of `writer` and `reader`.
    ///
    /// The planner is pure: structurally identical inputs always produce the
    /// same plan.
    pub fn with_config(
        writer: &Schema,
        reader: &Schema,
        config: DecoderConfig,
    ) -> AvroResult<Self> {
        let mut compiler = ResolveCompiler {
            w_names: writer.named_types(),
            r_names: reader.named_types(),
            pair_table: HashMap::new(),
            pairs: Vec::new(),
            failed_pairs: HashMap::new(),
            skip_table: HashMap::new(),
            skips: Vec::new(),
        };
        let root = compiler.resolve(writer, reader)?;
        Ok(Self {
            root,
            pairs: compiler
                .pairs
                .into_iter()
                .map(|p| p.expect("Resolved pair left uncompiled"))
                .collect(),
            skips: compiler
                .skips
                .into_iter()
                .map(|p| p.expect("Skip program left uncompiled"))
                .collect(),
            config,
        })
    }

    /// Decode one datum written under the writer schema.
    pub fn decode<R: Read>(&self, reader: &mut R) -> AvroResult<Value> {
        self.read_resolved(&self.root, reader)
    }

    fn read_resolved<R: Read>(&self, instr: &ResolveInstr, reader: &mut R) -> AvroResult<Value> {
        match instr {
            ResolveInstr::Read(leaf) => decode::read_value(leaf, &[], &self.config, reader),
            ResolveInstr::Promote(promotion) => self.read_promoted(*promotion, reader),
            ResolveInstr::Enum {
                mapping,
                writer_symbols,
            } => {
                let index = util::zag_i64(reader)?;
                match usize::try_from(index).ok().and_then(|i| mapping.get(i)) {
                    Some(Some((reader_index, symbol))) => {
                        Ok(Value::Enum(*reader_index, symbol.clone()))
                    }
                    Some(None) => Err(Details::ReadUnknownEnumSymbol(
                        writer_symbols[index as usize].clone(),
                    )
                    .into()),
                    None => Err(Details::EnumIndexOutOfRange {
                        index,
                        num_symbols: mapping.len(),
                    }
                    .into()),
                }
            }
            ResolveInstr::Array(items) => {
                let mut elements = Vec::new();
                decode::for_each_block_item(reader, |r| {
                    elements.push(self.read_resolved(items, r)?);
                    Ok(())
                })?;
                Ok(Value::Array(elements))
            }
            ResolveInstr::Map(values) => {
                let mut entries = std::collections::BTreeMap::new();
                decode::for_each_block_item(reader, |r| {
                    let key = decode::read_string(r, self.config.max_block_bytes)?;
                    entries.insert(key, self.read_resolved(values, r)?);
                    Ok(())
                })?;
                Ok(Value::Map(entries))
            }
            ResolveInstr::Record { actions, layout } => {
                let mut read = Vec::new();
                for action in actions {
                    match action {
                        FieldAction::Read(instr) => read.push(self.read_resolved(instr, reader)?),
                        FieldAction::Skip(skip) => self.skip_value(skip, reader)?,
                    }
                }
                let mut entries = Vec::with_capacity(layout.len());
                for (name, source) in layout {
                    let value = match source {
                        FieldSource::Reader(index) => read[*index].clone(),
                        FieldSource::Default(default) => default.clone(),
                    };
                    entries.push((name.clone(), value));
                }
                Ok(Value::Record(entries))
            }
            ResolveInstr::WriterUnion(branches) => {
                let index = util::zag_i64(reader)?;
                let branch = usize::try_from(index)
                    .ok()
                    .and_then(|i| branches.get(i))
                    .ok_or(Details::UnionIndexOutOfRange {
                        index,
                        num_variants: branches.len(),
                    })?;
                self.read_resolved(branch, reader)
            }
            ResolveInstr::Call(index) => self.read_resolved(&self.pairs[*index], reader),
            ResolveInstr::Incompatible(label) => {
                Err(Details::ReadIncompatibleWriterBranch(label.clone()).into())
            }
        }
    }

    fn read_promoted<R: Read>(&self, promotion: Promotion, reader: &mut R) -> AvroResult<Value> {
        Ok(match promotion {
            Promotion::IntToLong => Value::Long(util::zag_i64(reader)?),
            Promotion::IntToFloat => Value::Float(util::zag_i32(reader)? as f32),
            Promotion::IntToDouble => Value::Double(util::zag_i32(reader)? as f64),
            Promotion::LongToFloat => Value::Float(util::zag_i64(reader)? as f32),
            Promotion::LongToDouble => Value::Double(util::zag_i64(reader)? as f64),
            Promotion::FloatToDouble => Value::Double(decode::read_f32(reader)? as f64),
            Promotion::StringToBytes => {
                Value::Bytes(decode::read_bytes(reader, self.config.max_block_bytes)?)
            }
            Promotion::BytesToString => {
                Value::String(decode::read_string(reader, self.config.max_block_bytes)?)
            }
        })
    }

    fn skip_value<R: Read>(&self, instr: &SkipInstr, reader: &mut R) -> AvroResult<()> {
        match instr {
            SkipInstr::Nothing => Ok(()),
            SkipInstr::Boolean => skip_bytes(reader, 1),
            SkipInstr::VarInt => util::decode_variable(reader).map(|_| ()),
            SkipInstr::Float => skip_bytes(reader, 4),
            SkipInstr::Double => skip_bytes(reader, 8),
            SkipInstr::LenPrefixed => {
                let len = decode::read_len(reader, self.config.max_block_bytes)?;
                skip_bytes(reader, len)
            }
            SkipInstr::Fixed(size) => skip_bytes(reader, *size),
            SkipInstr::Array(items) => self.skip_blocks(reader, |this, r| this.skip_value(items, r)),
            SkipInstr::Map(values) => self.skip_blocks(reader, |this, r| {
                this.skip_value(&SkipInstr::LenPrefixed, r)?;
                this.skip_value(values, r)
            }),
            SkipInstr::Union(branches) => {
                let index = util::zag_i64(reader)?;
                let branch = usize::try_from(index)
                    .ok()
                    .and_then(|i| branches.get(i))
                    .ok_or(Details::UnionIndexOutOfRange {
                        index,
                        num_variants: branches.len(),
                    })?;
                self.skip_value(branch, reader)
            }
            SkipInstr::Record(fields) => {
                for field in fields {
                    self.skip_value(field, reader)?;
                }
                Ok(())
            }
            SkipInstr::Call(index) => self.skip_value(&self.skips[*index], reader),
        }
    }

    /// Skip the block structure of an array or map. Blocks written in the
    /// negative-count form carry their byte size and are skipped without
    /// per-item work.
    fn skip_blocks<R: Read, F>(&self, reader: &mut R, mut per_item: F) -> AvroResult<()>
    where
        F: FnMut(&Self, &mut R) -> AvroResult<()>,
    {
        loop {
            let count = util::zag_i64(reader)?;
            if count == 0 {
                break;
            }
            if count < 0 {
                let byte_size = decode::read_len(reader, self.config.max_block_bytes)?;
                skip_bytes(reader, byte_size)?;
            } else {
                for _ in 0..count {
                    per_item(self, reader)?;
                }
            }
        }
        Ok(())
    }
}

impl ResolveCompiler {
    fn resolve(&mut self, writer: &Schema, reader: &Schema) -> AvroResult<ResolveInstr> {
        // The reader's logical type governs the produced value.
        if is_logical(reader) {
            return self.resolve_logical(writer, reader);
        }
        // A writer logical type with a plain reader decodes as the base type.
        let writer = strip_logical(writer);
        let writer = &writer;

        // Writer unions dispatch per wire branch index.
        if let Schema::Union(w_union) = writer {
            let mut branches = Vec::with_capacity(w_union.variants().len());
            let mut any_ok = false;
            for branch in w_union.variants() {
                match self.resolve(branch, reader) {
                    Ok(instr) => {
                        any_ok = true;
                        branches.push(instr);
                    }
                    Err(e) if e.details().is_schema_incompatible() => {
                        branches.push(ResolveInstr::Incompatible(
                            SchemaKind::from(branch).to_string(),
                        ));
                    }
                    Err(e) => return Err(e),
                }
            }
            if !any_ok {
                return Err(Details::ResolveEmptyWriterUnion.into());
            }
            return Ok(ResolveInstr::WriterUnion(branches));
        }

        // Reader-only union: the first branch that matches the writer wins.
        if let Schema::Union(r_union) = reader {
            let branch = r_union
                .variants()
                .iter()
                .find(|branch| self.schemas_match(writer, branch));
            return match branch {
                Some(branch) => {
                    let branch = branch.clone();
                    self.resolve(writer, &branch)
                }
                None => Err(Details::ResolveNoReaderBranch {
                    writer: SchemaKind::from(writer).to_string(),
                }
                .into()),
            };
        }

        // A writer reference starts (or joins) a compiled (writer, reader)
        // pair, which is how recursive types terminate.
        if let Schema::Ref { name } = writer {
            return self.pair_program(name, reader);
        }
        if let Schema::Ref { name } = reader {
            let r_def = self
                .r_names
                .get(name)
                .cloned()
                .ok_or_else(|| Details::UnknownNamedType(name.fullname().to_string()))?;
            return self.resolve(writer, &r_def);
        }

        match (writer, reader) {
            (Schema::Null, Schema::Null) => Ok(ResolveInstr::Read(ReadInstr::Null)),
            (Schema::Boolean, Schema::Boolean) => Ok(ResolveInstr::Read(ReadInstr::Boolean)),
            (Schema::Int, Schema::Int) => Ok(ResolveInstr::Read(ReadInstr::Int)),
            (Schema::Long, Schema::Long) => Ok(ResolveInstr::Read(ReadInstr::Long)),
            (Schema::Float, Schema::Float) => Ok(ResolveInstr::Read(ReadInstr::Float)),
            (Schema::Double, Schema::Double) => Ok(ResolveInstr::Read(ReadInstr::Double)),
            (Schema::Bytes, Schema::Bytes) => Ok(ResolveInstr::Read(ReadInstr::Bytes)),
            (Schema::String, Schema::String) => Ok(ResolveInstr::Read(ReadInstr::String)),
            (Schema::Int, Schema::Long) => Ok(ResolveInstr::Promote(Promotion::IntToLong)),
            (Schema::Int, Schema::Float) => Ok(ResolveInstr::Promote(Promotion::IntToFloat)),
            (Schema::Int, Schema::Double) => Ok(ResolveInstr::Promote(Promotion::IntToDouble)),
            (Schema::Long, Schema::Float) => Ok(ResolveInstr::Promote(Promotion::LongToFloat)),
            (Schema::Long, Schema::Double) => Ok(ResolveInstr::Promote(Promotion::LongToDouble)),
            (Schema::Float, Schema::Double) => Ok(ResolveInstr::Promote(Promotion::FloatToDouble)),
            (Schema::String, Schema::Bytes) => Ok(ResolveInstr::Promote(Promotion::StringToBytes)),
            (Schema::Bytes, Schema::String) => Ok(ResolveInstr::Promote(Promotion::BytesToString)),
            (Schema::Array(w), Schema::Array(r)) => Ok(ResolveInstr::Array(Box::new(
                self.resolve(&w.items.clone(), &r.items.clone())?,
            ))),
            (Schema::Map(w), Schema::Map(r)) => Ok(ResolveInstr::Map(Box::new(
                self.resolve(&w.values.clone(), &r.values.clone())?,
            ))),
            (Schema::Enum(w), Schema::Enum(r)) => self.resolve_enum(w, r),
            (Schema::Fixed(w), Schema::Fixed(r)) => resolve_fixed(w, r),
            (Schema::Record(w), Schema::Record(r)) => {
                let (w, r) = (w.clone(), r.clone());
                self.resolve_record(&w, &r)
            }
            (writer, reader) => Err(Details::ResolveKindMismatch {
                writer: SchemaKind::from(writer).to_string(),
                reader: SchemaKind::from(reader).to_string(),
            }
            .into()),
        }
    }

    fn pair_program(&mut self, w_name: &Name, reader: &Schema) -> AvroResult<ResolveInstr> {
        let w_def = self
            .w_names
            .get(w_name)
            .cloned()
            .ok_or_else(|| Details::UnknownNamedType(w_name.fullname().to_string()))?;

        let r_def = match reader {
            Schema::Ref { name } => self
                .r_names
                .get(name)
                .cloned()
                .ok_or_else(|| Details::UnknownNamedType(name.fullname().to_string()))?,
            other => other.clone(),
        };

        // An unnamed reader cannot recurse, so it needs no pair entry.
        let r_name = match r_def.name() {
            Some(name) => name.clone(),
            None => return self.resolve(&w_def, &r_def),
        };

        let key = (w_name.clone(), r_name);
        if let Some(reason) = self.failed_pairs.get(&key) {
            return Err(Details::ResolveIncompatiblePair {
                writer: key.0.fullname().to_string(),
                reader: key.1.fullname().to_string(),
                reason: reason.clone(),
            }
            .into());
        }
        if let Some(&index) = self.pair_table.get(&key) {
            return Ok(ResolveInstr::Call(index));
        }
        let index = self.pairs.len();
        self.pairs.push(None);
        self.pair_table.insert(key.clone(), index);
        match self.resolve(&w_def, &r_def) {
            Ok(instr) => {
                self.pairs[index] = Some(instr);
                Ok(ResolveInstr::Call(index))
            }
            Err(e) => {
                // Leave a decode-time error in the reserved slot so anything
                // already pointing at it stays sound, and remember the
                // failure so the pair is not retried.
                self.pairs[index] = Some(ResolveInstr::Incompatible(
                    key.0.fullname().to_string(),
                ));
                self.pair_table.remove(&key);
                self.failed_pairs
                    .insert(key, e.details().to_string());
                Err(e)
            }
        }
    }

    fn resolve_enum(&mut self, writer: &EnumSchema, reader: &EnumSchema) -> AvroResult<ResolveInstr> {
        if !names_match(&writer.name, &reader.name, reader.aliases.as_ref()) {
            return Err(Details::ResolveNameMismatch {
                writer: writer.name.fullname().to_string(),
                reader: reader.name.fullname().to_string(),
            }
            .into());
        }
        let reader_default = reader.default.as_ref().and_then(|default| {
            reader
                .symbols
                .iter()
                .position(|s| s == default)
                .map(|i| (i as u32, default.clone()))
        });
        let mapping = writer
            .symbols
            .iter()
            .map(|symbol| {
                reader
                    .symbols
                    .iter()
                    .position(|s| s == symbol)
                    .map(|i| (i as u32, symbol.clone()))
                    .or_else(|| reader_default.clone())
            })
            .collect();
        Ok(ResolveInstr::Enum {
            mapping,
            writer_symbols: writer.symbols.clone(),
        })
    }

    fn resolve_record(
        &mut self,
        writer: &RecordSchema,
        reader: &RecordSchema,
    ) -> AvroResult<ResolveInstr> {
        if !names_match(&writer.name, &reader.name, reader.aliases.as_ref()) {
            return Err(Details::ResolveNameMismatch {
                writer: writer.name.fullname().to_string(),
                reader: reader.name.fullname().to_string(),
            }
            .into());
        }

        // Writer wire order drives the actions; reader positions map to the
        // ordinal of the matching read.
        let mut actions = Vec::with_capacity(writer.fields.len());
        let mut reader_source: HashMap<usize, usize> = HashMap::new();
        let mut num_reads = 0;
        for w_field in &writer.fields {
            let matched = reader
                .fields
                .iter()
                .find(|r_field| r_field.answers_to(&w_field.name));
            match matched {
                Some(r_field) => {
                    let instr = self.resolve(&w_field.schema, &r_field.schema)?;
                    actions.push(FieldAction::Read(instr));
                    reader_source.insert(r_field.position, num_reads);
                    num_reads += 1;
                }
                None => actions.push(FieldAction::Skip(self.skip_plan(&w_field.schema)?)),
            }
        }

        // The produced record materializes in the reader's declared order.
        let mut layout = Vec::with_capacity(reader.fields.len());
        for r_field in &reader.fields {
            let source = match reader_source.get(&r_field.position) {
                Some(&ordinal) => FieldSource::Reader(ordinal),
                None => match &r_field.default {
                    Some(default) => FieldSource::Default(Value::from_json(
                        default,
                        &r_field.schema,
                        &self.r_names,
                    )?),
                    None => {
                        return Err(Details::ResolveMissingDefault {
                            record: reader.name.fullname().to_string(),
                            field: r_field.name.clone(),
                        }
                        .into());
                    }
                },
            };
            layout.push((r_field.name.clone(), source));
        }

        Ok(ResolveInstr::Record { actions, layout })
    }

    fn resolve_logical(&mut self, writer: &Schema, reader: &Schema) -> AvroResult<ResolveInstr> {
        let mismatch = |writer: &Schema, reader: &Schema| -> AvroResult<ResolveInstr> {
            Err(Details::ResolveKindMismatch {
                writer: SchemaKind::from(writer).to_string(),
                reader: SchemaKind::from(reader).to_string(),
            }
            .into())
        };
        // Resolve writer references so that e.g. a named decimal-over-fixed
        // matches.
        let writer = match writer {
            Schema::Ref { name } => self
                .w_names
                .get(name)
                .cloned()
                .ok_or_else(|| Details::UnknownNamedType(name.fullname().to_string()))?,
            other => other.clone(),
        };

        match reader {
            Schema::Decimal(r) => match &writer {
                Schema::Decimal(w) => {
                    if w.precision != r.precision || w.scale != r.scale {
                        return Err(Details::ResolveDecimalMismatch {
                            w_precision: w.precision,
                            w_scale: w.scale,
                            r_precision: r.precision,
                            r_scale: r.scale,
                        }
                        .into());
                    }
                    Ok(ResolveInstr::Read(decimal_read(&w.inner, r.scale)))
                }
                Schema::Bytes => Ok(ResolveInstr::Read(ReadInstr::DecimalBytes {
                    scale: r.scale,
                })),
                Schema::Fixed(fixed) => Ok(ResolveInstr::Read(ReadInstr::DecimalFixed {
                    size: fixed.size,
                    scale: r.scale,
                })),
                other => mismatch(other, reader),
            },
            Schema::Uuid => match &writer {
                Schema::Uuid | Schema::String => Ok(ResolveInstr::Read(ReadInstr::Uuid)),
                other => mismatch(other, reader),
            },
            Schema::Date => match &writer {
                Schema::Date | Schema::Int => Ok(ResolveInstr::Read(ReadInstr::Date)),
                other => mismatch(other, reader),
            },
            Schema::TimeMillis => match &writer {
                Schema::TimeMillis | Schema::Int => Ok(ResolveInstr::Read(ReadInstr::TimeMillis)),
                other => mismatch(other, reader),
            },
            Schema::TimeMicros => match &writer {
                Schema::TimeMicros | Schema::Long => Ok(ResolveInstr::Read(ReadInstr::TimeMicros)),
                other => mismatch(other, reader),
            },
            Schema::TimestampMillis => match &writer {
                Schema::TimestampMillis | Schema::Long => {
                    Ok(ResolveInstr::Read(ReadInstr::TimestampMillis))
                }
                other => mismatch(other, reader),
            },
            Schema::TimestampMicros => match &writer {
                Schema::TimestampMicros | Schema::Long => {
                    Ok(ResolveInstr::Read(ReadInstr::TimestampMicros))
                }
                other => mismatch(other, reader),
            },
            _ => unreachable!("resolve_logical is only called with a logical reader"),
        }
    }

    /// Cheap compatibility predicate used to select a reader union branch.
    ///
    /// Named types match by name, primitives by identity or promotion,
    /// arrays and maps recursively. Records are not compared field by field;
    /// a name match is enough, exactly like the resolution rules proper.
    fn schemas_match(&self, writer: &Schema, reader: &Schema) -> bool {
        let writer = strip_logical(writer);
        let writer = match &writer {
            Schema::Ref { name } => match self.w_names.get(name) {
                Some(def) => def.clone(),
                None => return false,
            },
            other => other.clone(),
        };
        let reader_resolved;
        let reader = match reader {
            Schema::Ref { name } => match self.r_names.get(name) {
                Some(def) => {
                    reader_resolved = def.clone();
                    &reader_resolved
                }
                None => return false,
            },
            other => other,
        };

        match (&writer, reader) {
            (Schema::Union(w_union), _) => w_union
                .variants()
                .iter()
                .any(|branch| self.schemas_match(branch, reader)),
            (_, Schema::Union(r_union)) => r_union
                .variants()
                .iter()
                .any(|branch| self.schemas_match(&writer, branch)),
            (Schema::Null, Schema::Null)
            | (Schema::Boolean, Schema::Boolean)
            | (Schema::Int, Schema::Int | Schema::Long | Schema::Float | Schema::Double)
            | (Schema::Long, Schema::Long | Schema::Float | Schema::Double)
            | (Schema::Float, Schema::Float | Schema::Double)
            | (Schema::Double, Schema::Double)
            | (Schema::Bytes, Schema::Bytes | Schema::String)
            | (Schema::String, Schema::String | Schema::Bytes) => true,
            (Schema::Array(w), Schema::Array(r)) => self.schemas_match(&w.items, &r.items),
            (Schema::Map(w), Schema::Map(r)) => self.schemas_match(&w.values, &r.values),
            (Schema::Record(w), Schema::Record(r)) => {
                names_match(&w.name, &r.name, r.aliases.as_ref())
            }
            (Schema::Enum(w), Schema::Enum(r)) => {
                names_match(&w.name, &r.name, r.aliases.as_ref())
            }
            (Schema::Fixed(w), Schema::Fixed(r)) => {
                w.size == r.size && names_match(&w.name, &r.name, r.aliases.as_ref())
            }
            (w, Schema::Decimal(_) | Schema::Uuid | Schema::Date | Schema::TimeMillis
                | Schema::TimeMicros | Schema::TimestampMillis | Schema::TimestampMicros) => {
                self.schemas_match(w, &strip_logical(reader))
            }
            _ => false,
        }
    }

    fn skip_plan(&mut self, schema: &Schema) -> AvroResult<SkipInstr> {
        Ok(match schema {
            Schema::Null => SkipInstr::Nothing,
            Schema::Boolean => SkipInstr::Boolean,
            Schema::Int
            | Schema::Long
            | Schema::Date
            | Schema::TimeMillis
            | Schema::TimeMicros
            | Schema::TimestampMillis
            | Schema::TimestampMicros => SkipInstr::VarInt,
            Schema::Float => SkipInstr::Float,
            Schema::Double => SkipInstr::Double,
            Schema::Bytes | Schema::String | Schema::Uuid => SkipInstr::LenPrefixed,
            Schema::Fixed(FixedSchema { size, .. }) => SkipInstr::Fixed(*size),
            Schema::Enum(_) => SkipInstr::VarInt,
            Schema::Decimal(DecimalSchema { inner, .. }) => match inner {
                DecimalRepr::Bytes => SkipInstr::LenPrefixed,
                DecimalRepr::Fixed(fixed) => SkipInstr::Fixed(fixed.size),
            },
            Schema::Array(ArraySchema { items }) => {
                SkipInstr::Array(Box::new(self.skip_plan(&items.clone())?))
            }
            Schema::Map(MapSchema { values }) => {
                SkipInstr::Map(Box::new(self.skip_plan(&values.clone())?))
            }
            Schema::Union(union) => {
                let mut branches = Vec::with_capacity(union.variants().len());
                for branch in union.variants().to_vec() {
                    branches.push(self.skip_plan(&branch)?);
                }
                SkipInstr::Union(branches)
            }
            Schema::Record(record) => {
                let fields = record.fields.clone();
                let mut skips = Vec::with_capacity(fields.len());
                for field in &fields {
                    skips.push(self.skip_plan(&field.schema)?);
                }
                SkipInstr::Record(skips)
            }
            Schema::Ref { name } => SkipInstr::Call(self.skip_index(&name.clone())?),
        })
    }

    fn skip_index(&mut self, name: &Name) -> AvroResult<usize> {
        if let Some(&index) = self.skip_table.get(name) {
            return Ok(index);
        }
        let definition = self
            .w_names
            .get(name)
            .cloned()
            .ok_or_else(|| Details::UnknownNamedType(name.fullname().to_string()))?;
        let index = self.skips.len();
        self.skips.push(None);
        self.skip_table.insert(name.clone(), index);
        let instr = self.skip_plan(&definition)?;
        self.skips[index] = Some(instr);
        Ok(index)
    }
}

fn resolve_fixed(writer: &FixedSchema, reader: &FixedSchema) -> AvroResult<ResolveInstr> {
    if !names_match(&writer.name, &reader.name, reader.aliases.as_ref()) {
        return Err(Details::ResolveNameMismatch {
            writer: writer.name.fullname().to_string(),
            reader: reader.name.fullname().to_string(),
        }
        .into());
    }
    if writer.size != reader.size {
        return Err(Details::ResolveFixedSizeMismatch {
            name: reader.name.fullname().to_string(),
            writer: writer.size,
            reader: reader.size,
        }
        .into());
    }
    Ok(ResolveInstr::Read(ReadInstr::Fixed(reader.size)))
}

fn decimal_read(inner: &DecimalRepr, scale: usize) -> ReadInstr {
    match inner {
        DecimalRepr::Bytes => ReadInstr::DecimalBytes { scale },
        DecimalRepr::Fixed(fixed) => ReadInstr::DecimalFixed {
            size: fixed.size,
            scale,
        },
    }
}

/// Writer and reader named types match when their names agree, directly,
/// unqualified, or through one of the reader's aliases.
fn names_match(writer: &Name, reader: &Name, reader_aliases: Option<&Vec<Alias>>) -> bool {
    if writer.fullname() == reader.fullname() || writer.name() == reader.name() {
        return true;
    }
    match reader_aliases {
        Some(aliases) => aliases.iter().any(|alias| {
            let qualified = alias.fully_qualified_name(reader.namespace());
            qualified.fullname() == writer.fullname() || alias.name() == writer.name()
        }),
        None => false,
    }
}

fn is_logical(schema: &Schema) -> bool {
    matches!(
        schema,
        Schema::Decimal(_)
            | Schema::Uuid
            | Schema::Date
            | Schema::TimeMillis
            | Schema::TimeMicros
            | Schema::TimestampMillis
            | Schema::TimestampMicros
    )
}

/// The wire representation of a logical type.
fn strip_logical(schema: &Schema) -> Schema {
    match schema {
        Schema::Decimal(DecimalSchema {
            inner: DecimalRepr::Bytes,
            ..
        }) => Schema::Bytes,
        Schema::Decimal(DecimalSchema {
            inner: DecimalRepr::Fixed(fixed),
            ..
        }) => Schema::Fixed(fixed.clone()),
        Schema::Uuid => Schema::String,
        Schema::Date | Schema::TimeMillis => Schema::Int,
        Schema::TimeMicros | Schema::TimestampMillis | Schema::TimestampMicros => Schema::Long,
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Decoder;
    use crate::encode::Encoder;
    use crate::types::record_from;
    use pretty_assertions::assert_eq;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn resolve_round_trip(
        writer_json: &str,
        reader_json: &str,
        value: Value,
    ) -> AvroResult<Value> {
        let writer = Schema::parse_str(writer_json).unwrap();
        let reader = Schema::parse_str(reader_json).unwrap();
        let encoder = Encoder::new(&writer).unwrap();
        let resolved = ResolvedDecoder::new(&writer, &reader)?;
        let bytes = encoder.encode(&value).unwrap();
        resolved.decode(&mut &bytes[..])
    }

    #[test]
    fn test_identity_resolution_matches_plain_decoder() -> TestResult {
        let schema_json = r#"{
            "type": "record",
            "name": "R",
            "fields": [
                {"name": "a", "type": "int"},
                {"name": "b", "type": ["null", "string"]},
                {"name": "c", "type": {"type": "array", "items": "long"}}
            ]
        }"#;
        let schema = Schema::parse_str(schema_json)?;
        let encoder = Encoder::new(&schema)?;
        let plain = Decoder::new(&schema)?;
        let resolved = ResolvedDecoder::new(&schema, &schema)?;

        let value = record_from(vec![
            ("a", Value::Int(5)),
            ("b", "hi".into()),
            ("c", Value::Array(vec![Value::Long(1), Value::Long(2)])),
        ]);
        let bytes = encoder.encode(&value)?;
        assert_eq!(
            plain.decode(&mut &bytes[..])?,
            resolved.decode(&mut &bytes[..])?
        );
        Ok(())
    }

    #[test]
    fn test_int_promotes_to_double() -> TestResult {
        assert_eq!(
            resolve_round_trip(r#""int""#, r#""double""#, Value::Int(42))?,
            Value::Double(42.0)
        );
        Ok(())
    }

    #[test]
    fn test_all_primitive_promotions() -> TestResult {
        assert_eq!(
            resolve_round_trip(r#""int""#, r#""long""#, Value::Int(-7))?,
            Value::Long(-7)
        );
        assert_eq!(
            resolve_round_trip(r#""int""#, r#""float""#, Value::Int(3))?,
            Value::Float(3.0)
        );
        assert_eq!(
            resolve_round_trip(r#""long""#, r#""float""#, Value::Long(8))?,
            Value::Float(8.0)
        );
        assert_eq!(
            resolve_round_trip(r#""long""#, r#""double""#, Value::Long(-9))?,
            Value::Double(-9.0)
        );
        assert_eq!(
            resolve_round_trip(r#""float""#, r#""double""#, Value::Float(1.5))?,
            Value::Double(1.5)
        );
        assert_eq!(
            resolve_round_trip(r#""string""#, r#""bytes""#, Value::String("ab".into()))?,
            Value::Bytes(vec![b'a', b'b'])
        );
        assert_eq!(
            resolve_round_trip(r#""bytes""#, r#""string""#, Value::Bytes(vec![b'a', b'b']))?,
            Value::String("ab".into())
        );
        Ok(())
    }

    #[test]
    fn test_added_field_takes_default() -> TestResult {
        let writer = r#"{
            "type": "record",
            "name": "R",
            "fields": [{"name": "a", "type": "int"}]
        }"#;
        let reader = r#"{
            "type": "record",
            "name": "R",
            "fields": [
                {"name": "a", "type": "int"},
                {"name": "b", "type": "string", "default": "x"}
            ]
        }"#;
        assert_eq!(
            resolve_round_trip(writer, reader, record_from(vec![("a", Value::Int(1))]))?,
            record_from(vec![("a", Value::Int(1)), ("b", "x".into())])
        );
        Ok(())
    }

    #[test]
    fn test_added_field_without_default_is_plan_error() -> TestResult {
        let writer = Schema::parse_str(
            r#"{"type": "record", "name": "R", "fields": [{"name": "a", "type": "int"}]}"#,
        )?;
        let reader = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "R",
                "fields": [
                    {"name": "a", "type": "int"},
                    {"name": "b", "type": "string"}
                ]
            }"#,
        )?;
        let err = ResolvedDecoder::new(&writer, &reader).unwrap_err();
        let details = err.into_details();
        assert!(details.is_schema_incompatible());
        assert!(matches!(details, Details::ResolveMissingDefault { .. }));
        Ok(())
    }

    #[test]
    fn test_dropped_field_is_skipped() -> TestResult {
        let writer = r#"{
            "type": "record",
            "name": "R",
            "fields": [
                {"name": "a", "type": "int"},
                {"name": "junk", "type": {"type": "array", "items": "string"}},
                {"name": "z", "type": "string"}
            ]
        }"#;
        let reader = r#"{
            "type": "record",
            "name": "R",
            "fields": [
                {"name": "a", "type": "int"},
                {"name": "z", "type": "string"}
            ]
        }"#;
        let value = record_from(vec![
            ("a", Value::Int(7)),
            (
                "junk",
                Value::Array(vec!["x".into(), "y".into(), "z".into()]),
            ),
            ("z", "keep".into()),
        ]);
        assert_eq!(
            resolve_round_trip(writer, reader, value)?,
            record_from(vec![("a", Value::Int(7)), ("z", "keep".into())])
        );
        Ok(())
    }

    #[test]
    fn test_field_matched_by_reader_alias() -> TestResult {
        let writer = r#"{
            "type": "record",
            "name": "R",
            "fields": [{"name": "old_name", "type": "int"}]
        }"#;
        let reader = r#"{
            "type": "record",
            "name": "R",
            "fields": [{"name": "new_name", "type": "int", "aliases": ["old_name"]}]
        }"#;
        assert_eq!(
            resolve_round_trip(writer, reader, record_from(vec![("old_name", Value::Int(3))]))?,
            record_from(vec![("new_name", Value::Int(3))])
        );
        Ok(())
    }

    #[test]
    fn test_record_matched_by_reader_alias() -> TestResult {
        let writer = r#"{
            "type": "record",
            "name": "OldRecord",
            "fields": [{"name": "a", "type": "int"}]
        }"#;
        let reader = r#"{
            "type": "record",
            "name": "NewRecord",
            "aliases": ["OldRecord"],
            "fields": [{"name": "a", "type": "int"}]
        }"#;
        assert_eq!(
            resolve_round_trip(writer, reader, record_from(vec![("a", Value::Int(3))]))?,
            record_from(vec![("a", Value::Int(3))])
        );
        Ok(())
    }

    #[test]
    fn test_enum_resolution_with_default() -> TestResult {
        let writer = r#"{"type": "enum", "name": "E", "symbols": ["A", "B", "C"]}"#;
        let reader = r#"{"type": "enum", "name": "E", "symbols": ["A", "B"], "default": "A"}"#;
        // Wire index 2 is "C", unknown to the reader: falls back to "A".
        assert_eq!(
            resolve_round_trip(writer, reader, Value::Enum(2, "C".into()))?,
            Value::Enum(0, "A".into())
        );
        // Known symbols keep their identity.
        assert_eq!(
            resolve_round_trip(writer, reader, Value::Enum(1, "B".into()))?,
            Value::Enum(1, "B".into())
        );
        Ok(())
    }

    #[test]
    fn test_enum_unknown_symbol_without_default_errors_at_decode() -> TestResult {
        let writer = r#"{"type": "enum", "name": "E", "symbols": ["A", "B", "C"]}"#;
        let reader = r#"{"type": "enum", "name": "E", "symbols": ["A", "B"]}"#;
        // Planning succeeds; only the actual wire value trips the error.
        let err = resolve_round_trip(writer, reader, Value::Enum(2, "C".into())).unwrap_err();
        assert!(matches!(
            err.into_details(),
            Details::ReadUnknownEnumSymbol(_)
        ));
        assert_eq!(
            resolve_round_trip(writer, reader, Value::Enum(0, "A".into()))?,
            Value::Enum(0, "A".into())
        );
        Ok(())
    }

    #[test]
    fn test_writer_union_against_plain_reader() -> TestResult {
        let writer = r#"["null", "int", "string"]"#;
        let reader = r#""long""#;
        // The int branch resolves with promotion.
        assert_eq!(
            resolve_round_trip(writer, reader, Value::Int(11))?,
            Value::Long(11)
        );
        // The string branch is unreadable, but only when actually taken.
        let err = resolve_round_trip(writer, reader, Value::String("x".into())).unwrap_err();
        assert!(matches!(
            err.into_details(),
            Details::ReadIncompatibleWriterBranch(_)
        ));
        Ok(())
    }

    #[test]
    fn test_plain_writer_against_reader_union() -> TestResult {
        let writer = r#""int""#;
        let reader = r#"["null", "double"]"#;
        assert_eq!(
            resolve_round_trip(writer, reader, Value::Int(4))?,
            Value::Double(4.0)
        );
        Ok(())
    }

    #[test]
    fn test_union_to_union_resolution() -> TestResult {
        let writer = r#"["null", "int"]"#;
        let reader = r#"["null", "long", "string"]"#;
        assert_eq!(
            resolve_round_trip(writer, reader, Value::Int(6))?,
            Value::Long(6)
        );
        assert_eq!(resolve_round_trip(writer, reader, Value::Null)?, Value::Null);
        Ok(())
    }

    #[test]
    fn test_no_usable_writer_union_branch_is_plan_error() -> TestResult {
        let writer = Schema::parse_str(r#"["string", "bytes"]"#)?;
        let reader = Schema::parse_str(r#""int""#)?;
        let err = ResolvedDecoder::new(&writer, &reader).unwrap_err();
        assert!(matches!(
            err.into_details(),
            Details::ResolveEmptyWriterUnion
        ));
        Ok(())
    }

    #[test]
    fn test_fixed_resolution_checks_name_and_size() -> TestResult {
        let writer = Schema::parse_str(r#"{"type": "fixed", "name": "F", "size": 4}"#)?;
        let same = Schema::parse_str(r#"{"type": "fixed", "name": "F", "size": 4}"#)?;
        assert!(ResolvedDecoder::new(&writer, &same).is_ok());

        let bigger = Schema::parse_str(r#"{"type": "fixed", "name": "F", "size": 8}"#)?;
        let err = ResolvedDecoder::new(&writer, &bigger).unwrap_err();
        assert!(matches!(
            err.into_details(),
            Details::ResolveFixedSizeMismatch { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_kind_mismatch_is_plan_error() -> TestResult {
        let writer = Schema::parse_str(r#""string""#)?;
        let reader = Schema::parse_str(r#""int""#)?;
        let err = ResolvedDecoder::new(&writer, &reader).unwrap_err();
        let details = err.into_details();
        assert!(details.is_schema_incompatible());
        assert!(matches!(details, Details::ResolveKindMismatch { .. }));
        Ok(())
    }

    #[test]
    fn test_recursive_schema_resolution() -> TestResult {
        let writer = r#"{
            "type": "record",
            "name": "LongList",
            "fields": [
                {"name": "value", "type": "long"},
                {"name": "next", "type": ["null", "LongList"]}
            ]
        }"#;
        let reader = r#"{
            "type": "record",
            "name": "LongList",
            "fields": [
                {"name": "value", "type": "long"},
                {"name": "next", "type": ["null", "LongList"]},
                {"name": "tag", "type": "string", "default": "t"}
            ]
        }"#;
        let inner = record_from(vec![("value", Value::Long(2)), ("next", Value::Null)]);
        let outer = record_from(vec![("value", Value::Long(1)), ("next", inner)]);

        let expected_inner = record_from(vec![
            ("value", Value::Long(2)),
            ("next", Value::Null),
            ("tag", "t".into()),
        ]);
        let expected = record_from(vec![
            ("value", Value::Long(1)),
            ("next", expected_inner),
            ("tag", "t".into()),
        ]);
        assert_eq!(resolve_round_trip(writer, reader, outer)?, expected);
        Ok(())
    }

    #[test]
    fn test_misaligned_nested_record_is_plan_error() -> TestResult {
        // The nested record names disagree and no union shields the
        // mismatch, so planning fails outright.
        let writer = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "Outer",
                "fields": [{"name": "x", "type": {
                    "type": "record",
                    "name": "B",
                    "fields": [{"name": "v", "type": "int"}]
                }}]
            }"#,
        )?;
        let reader = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "Outer",
                "fields": [{"name": "x", "type": {
                    "type": "record",
                    "name": "C",
                    "fields": [{"name": "v", "type": "int"}]
                }}]
            }"#,
        )?;
        let err = ResolvedDecoder::new(&writer, &reader).unwrap_err();
        assert!(matches!(
            err.into_details(),
            Details::ResolveNameMismatch { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_misaligned_recursion_fails_on_recursive_branch() -> TestResult {
        // The writer's cycle is A -> A; the reader inserts a B in between.
        // The union shields the mismatch until data actually takes the
        // recursive branch.
        let writer = r#"{
            "type": "record",
            "name": "A",
            "fields": [
                {"name": "v", "type": "int"},
                {"name": "next", "type": ["null", "A"]}
            ]
        }"#;
        let reader = r#"{
            "type": "record",
            "name": "A",
            "fields": [
                {"name": "v", "type": "int"},
                {"name": "next", "type": ["null", {
                    "type": "record",
                    "name": "B",
                    "fields": [
                        {"name": "v", "type": "int"},
                        {"name": "next", "type": ["null", "A"]}
                    ]
                }]}
            ]
        }"#;

        // A null-terminated head decodes fine.
        let flat = record_from(vec![("v", Value::Int(1)), ("next", Value::Null)]);
        assert_eq!(resolve_round_trip(writer, reader, flat.clone())?, flat);

        // A value that recurses hits the incompatible branch.
        let nested = record_from(vec![
            ("v", Value::Int(1)),
            (
                "next",
                record_from(vec![("v", Value::Int(2)), ("next", Value::Null)]),
            ),
        ]);
        let err = resolve_round_trip(writer, reader, nested).unwrap_err();
        assert!(matches!(
            err.into_details(),
            Details::ReadIncompatibleWriterBranch(_)
        ));
        Ok(())
    }

    #[test]
    fn test_writer_logical_reads_as_plain_base() -> TestResult {
        // Writer says timestamp-micros, reader just wants a long.
        assert_eq!(
            resolve_round_trip(
                r#"{"type": "long", "logicalType": "timestamp-micros"}"#,
                r#""long""#,
                Value::TimestampMicros(123_456)
            )?,
            Value::Long(123_456)
        );
        Ok(())
    }

    #[test]
    fn test_reader_logical_lifts_plain_writer() -> TestResult {
        assert_eq!(
            resolve_round_trip(
                r#""int""#,
                r#"{"type": "int", "logicalType": "date"}"#,
                Value::Int(18262)
            )?,
            Value::Date(18262)
        );
        Ok(())
    }

    #[test]
    fn test_map_value_resolution() -> TestResult {
        let mut entries = std::collections::BTreeMap::new();
        entries.insert("k".to_string(), Value::Int(5));
        assert_eq!(
            resolve_round_trip(
                r#"{"type": "map", "values": "int"}"#,
                r#"{"type": "map", "values": "long"}"#,
                Value::Map(entries.clone())
            )?,
            Value::Map(
                entries
                    .into_iter()
                    .map(|(k, _)| (k, Value::Long(5)))
                    .collect()
            )
        );
        Ok(())
    }
}
