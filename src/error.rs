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

//! Error types for schema parsing, codec compilation, resolution planning and
//! the wire codecs themselves.

use crate::types::ValueKind;

/// Error returned by all fallible operations of this crate.
///
/// The error is a thin wrapper around a boxed [`Details`], which carries the
/// precise failure. Use [`details`](Self::details) or
/// [`into_details`](Self::into_details) to inspect it.
#[derive(thiserror::Error, Debug)]
#[repr(transparent)]
#[error(transparent)]
pub struct Error {
    details: Box<Details>,
}

impl Error {
    pub fn new(details: Details) -> Self {
        Self {
            details: Box::new(details),
        }
    }

    pub fn details(&self) -> &Details {
        &self.details
    }

    pub fn into_details(self) -> Details {
        *self.details
    }
}

impl From<Details> for Error {
    fn from(details: Details) -> Self {
        Self::new(details)
    }
}

/// All failure conditions, grouped by the phase that can produce them.
///
/// Variants starting with `Resolve` are detected while planning the
/// resolution of a writer/reader schema pair, without looking at any wire
/// data. Failures that depend on the actual bytes being decoded surface as
/// decode-time variants instead.
#[derive(thiserror::Error, Debug)]
pub enum Details {
    // ---- schema parsing ----
    #[error("Failed to parse schema from JSON")]
    ParseSchemaJson(#[source] serde_json::Error),

    #[error("Must be a JSON string, object or array")]
    ParseSchemaFromValidJson,

    #[error("Unknown named type: {0}. Named types must be defined before they are referenced")]
    UnknownNamedType(String),

    #[error("Invalid schema name {0}. It must match the regex {1}")]
    InvalidSchemaName(String, &'static str),

    #[error("Invalid namespace {0}. It must match the regex {1}")]
    InvalidNamespace(String, &'static str),

    #[error("Invalid enum symbol name {0}")]
    EnumSymbolName(String),

    #[error("Invalid record field name {0}")]
    FieldName(String),

    #[error("Duplicate enum symbol {0}")]
    DuplicateEnumSymbol(String),

    #[error("Duplicate field name {0}")]
    DuplicateFieldName(String),

    #[error("Two named schemas with the same fullname: {0}")]
    NameCollision(String),

    #[error("No `name` field")]
    GetNameField,

    #[error("No `type` field")]
    GetTypeField,

    #[error("No `fields` in record")]
    GetRecordFieldsJson,

    #[error("No `type` in record field")]
    GetRecordFieldTypeField,

    #[error("No `symbols` field in enum")]
    GetEnumSymbolsField,

    #[error("No `items` field in array")]
    GetArrayItemsField,

    #[error("No `values` field in map")]
    GetMapValuesField,

    #[error("No `size` field in fixed")]
    GetFixedSizeField,

    #[error("Unions cannot be empty")]
    EmptyUnion,

    #[error("Unions may not directly contain a union")]
    GetNestedUnion,

    #[error("Unions cannot contain duplicate types")]
    GetUnionDuplicate,

    #[error("Enum default {0} is not among the symbols")]
    GetEnumDefault(String),

    #[error("Default value {value} for field {field} of record {record} does not match its schema")]
    GetDefaultRecordField {
        field: String,
        record: String,
        value: serde_json::Value,
    },

    #[error("Default value for union field {0} does not match any branch")]
    GetDefaultUnion(String),

    #[error("Invalid JSON default value: {0}")]
    DefaultValueJson(serde_json::Value),

    // ---- resolution planning ----
    #[error("Writer schema {writer} cannot be read with reader schema {reader}")]
    ResolveKindMismatch { writer: String, reader: String },

    #[error("Writer type {writer} and reader type {reader} have different names")]
    ResolveNameMismatch { writer: String, reader: String },

    #[error("Fixed {name}: writer size {writer} differs from reader size {reader}")]
    ResolveFixedSizeMismatch {
        name: String,
        writer: usize,
        reader: usize,
    },

    #[error(
        "Reader field {field} of record {record} is missing from the writer schema and has no default"
    )]
    ResolveMissingDefault { record: String, field: String },

    #[error("No branch of the writer union can be read with the reader schema")]
    ResolveEmptyWriterUnion,

    #[error("No branch of the reader union matches the writer schema {writer}")]
    ResolveNoReaderBranch { writer: String },

    #[error(
        "Decimal parameters differ between writer (precision {w_precision}, scale {w_scale}) and reader (precision {r_precision}, scale {r_scale})"
    )]
    ResolveDecimalMismatch {
        w_precision: usize,
        w_scale: usize,
        r_precision: usize,
        r_scale: usize,
    },

    #[error("Named types {writer} and {reader} cannot be resolved: {reason}")]
    ResolveIncompatiblePair {
        writer: String,
        reader: String,
        reason: String,
    },

    // ---- encoding ----
    #[error("Field {field} of record {record} has no value and no default")]
    EncodeMissingField { record: String, field: String },

    #[error("Enum symbol {0} is not in the schema's symbols")]
    EncodeUnknownEnumSymbol(String),

    #[error("No union branch accepts a value of kind {0:?}")]
    EncodeNoUnionBranch(ValueKind),

    #[error("Union index {index} is out of range (must be less than {num_variants})")]
    EncodeUnionIndexOutOfRange { index: u32, num_variants: usize },

    #[error("Value {0} is out of range for an int")]
    EncodeIntegerOutOfRange(i64),

    #[error("Fixed value has {got} bytes but the schema requires exactly {expected}")]
    EncodeFixedLengthMismatch { expected: usize, got: usize },

    #[error("Cannot encode a value of kind {value_kind:?} with a schema of kind {schema}")]
    EncodeWrongValue {
        value_kind: ValueKind,
        schema: &'static str,
    },

    #[error("Decimal with unscaled value {0} does not fit in {1} bytes")]
    EncodeDecimalTooLarge(String, usize),

    #[error("Value is not valid UTF-8")]
    ConvertToUtf8(#[source] std::string::FromUtf8Error),

    #[error("Failed to write bytes")]
    WriteBytes(#[source] std::io::Error),

    #[error("Failed to flush the writer")]
    FlushWriter(#[source] std::io::Error),

    // ---- decoding ----
    #[error("Unexpected end of input")]
    UnexpectedEof,

    #[error("Failed to read bytes")]
    ReadBytes(#[source] std::io::Error),

    #[error("Variable-length integer does not terminate within 10 bytes")]
    InvalidVarInt,

    #[error("Decoded value {0} is out of range for an int")]
    IntegerRange(i64),

    #[error("Invalid boolean byte {0:#04x}")]
    BoolValue(u8),

    #[error("Negative length on the wire: {0}")]
    NegativeLength(i64),

    #[error("Wire declares a length of {desired} bytes, over the limit of {maximum}")]
    LengthLimit { desired: usize, maximum: usize },

    #[error("Enum index {index} is out of range (must be less than {num_symbols})")]
    EnumIndexOutOfRange { index: i64, num_symbols: usize },

    #[error("Union index {index} is out of range (must be less than {num_variants})")]
    UnionIndexOutOfRange { index: i64, num_variants: usize },

    #[error("Invalid uuid string: {0}")]
    InvalidUuid(#[source] uuid::Error),

    #[error("Data written as {0} cannot be read with the reader schema")]
    ReadIncompatibleWriterBranch(String),

    #[error("Writer enum symbol {0} is not in the reader's symbols and the reader has no default")]
    ReadUnknownEnumSymbol(String),

    // ---- object-container files ----
    #[error("Invalid header magic; this is not an Avro object-container file")]
    HeaderMagic,

    #[error("The file metadata carries no avro.schema entry")]
    GetHeaderSchema,

    #[error("avro.schema metadata is not valid UTF-8")]
    HeaderSchemaUtf8(#[source] std::string::FromUtf8Error),

    #[error("Unknown compression codec: {0}")]
    UnknownCodec(String),

    #[error("A block's sync marker does not match the file header")]
    SyncMarkerMismatch,

    #[error("User metadata keys must not start with 'avro.': {0}")]
    InvalidMetadataKey(String),

    #[error("The file header has already been written")]
    FileHeaderAlreadyWritten,

    #[error("Failed to serialize the schema to JSON")]
    ConvertJsonToString(#[source] serde_json::Error),

    // ---- compression codecs ----
    #[error("Failed to decompress with deflate")]
    DeflateDecompress(String),

    #[cfg(feature = "snappy")]
    #[error("Failed to compress with snappy")]
    SnappyCompress(#[source] snap::Error),

    #[cfg(feature = "snappy")]
    #[error("Failed to decompress with snappy")]
    SnappyDecompress(#[source] snap::Error),

    #[cfg(feature = "snappy")]
    #[error("Bad snappy CRC32; expected {expected:x} but got {actual:x}")]
    SnappyCrc32 { expected: u32, actual: u32 },

    #[cfg(feature = "zstandard")]
    #[error("Failed to compress with zstandard")]
    ZstdCompress(#[source] std::io::Error),

    #[cfg(feature = "zstandard")]
    #[error("Failed to decompress with zstandard")]
    ZstdDecompress(#[source] std::io::Error),

    #[cfg(feature = "bzip")]
    #[error("Failed to decompress with bzip2")]
    Bzip2Decompress(#[source] std::io::Error),

    #[cfg(feature = "xz")]
    #[error("Failed to decompress with xz")]
    XzDecompress(#[source] std::io::Error),
}

impl Details {
    /// True for failures the resolution planner reports without looking at
    /// wire data.
    pub fn is_schema_incompatible(&self) -> bool {
        matches!(
            self,
            Details::ResolveKindMismatch { .. }
                | Details::ResolveNameMismatch { .. }
                | Details::ResolveFixedSizeMismatch { .. }
                | Details::ResolveMissingDefault { .. }
                | Details::ResolveEmptyWriterUnion
                | Details::ResolveNoReaderBranch { .. }
                | Details::ResolveDecimalMismatch { .. }
                | Details::ResolveIncompatiblePair { .. }
        )
    }
}

