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

//! Writing Avro object-container files and raw datums.

use crate::AvroResult;
use crate::codec::Codec;
use crate::encode::{Encoder, EncoderConfig, write_len_prefixed};
use crate::error::Details;
use crate::schema::Schema;
use crate::types::Value;
use crate::util::zig_i64;
use std::collections::BTreeMap;
use std::io::Write;

const DEFAULT_BLOCK_SIZE: usize = 16000;
const OBJECT_HEADER_MAGIC: &[u8] = b"Obj\x01";

/// Writes values to an Avro object-container file.
///
/// Values are buffered into blocks and flushed once the buffer exceeds the
/// block size. Call [`flush`](Writer::flush) or
/// [`into_inner`](Writer::into_inner) before discarding the writer, or the
/// tail of the data is lost.
pub struct Writer<'a, W: Write> {
    schema: &'a Schema,
    inner: W,
    encoder: Encoder,
    codec: Codec,
    block_size: usize,
    buffer: Vec<u8>,
    num_values: usize,
    marker: [u8; 16],
    has_header: bool,
    user_metadata: BTreeMap<String, Vec<u8>>,
}

impl<'a, W: Write> Writer<'a, W> {
    /// Create a `Writer` for `schema` with no compression.
    pub fn new(schema: &'a Schema, inner: W) -> AvroResult<Self> {
        Self::with_codec(schema, inner, Codec::Null)
    }

    /// Create a `Writer` for `schema` with a specific compression codec.
    pub fn with_codec(schema: &'a Schema, inner: W, codec: Codec) -> AvroResult<Self> {
        Self::with_config(schema, inner, codec, EncoderConfig::default())
    }

    /// Create a `Writer` with explicit encoder options.
    pub fn with_config(
        schema: &'a Schema,
        inner: W,
        codec: Codec,
        config: EncoderConfig,
    ) -> AvroResult<Self> {
        Ok(Self {
            schema,
            inner,
            encoder: Encoder::with_config(schema, config)?,
            codec,
            block_size: DEFAULT_BLOCK_SIZE,
            buffer: Vec::with_capacity(DEFAULT_BLOCK_SIZE),
            num_values: 0,
            marker: generate_sync_marker(),
            has_header: false,
            user_metadata: BTreeMap::new(),
        })
    }

    /// The schema this writer encodes with.
    pub fn schema(&self) -> &Schema {
        self.schema
    }

    /// Override the byte threshold at which a block is flushed.
    pub fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size;
    }

    /// Add a metadata entry to the file header.
    ///
    /// Only possible before the first value is appended; the `avro.`
    /// namespace is reserved.
    pub fn add_user_metadata<T: AsRef<[u8]>>(&mut self, key: String, value: T) -> AvroResult<()> {
        if self.has_header {
            return Err(Details::FileHeaderAlreadyWritten.into());
        }
        if key.starts_with("avro.") {
            return Err(Details::InvalidMetadataKey(key).into());
        }
        self.user_metadata.insert(key, value.as_ref().to_vec());
        Ok(())
    }

    /// Append one value to the file, flushing a block if the buffer is full.
    pub fn append(&mut self, value: &Value) -> AvroResult<()> {
        self.maybe_write_header()?;
        self.encoder.encode_to(value, &mut self.buffer)?;
        self.num_values += 1;
        if self.buffer.len() >= self.block_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Flush the buffered values as one block. Returns the number of bytes
    /// written to the underlying writer.
    pub fn flush(&mut self) -> AvroResult<usize> {
        let mut num_bytes = self.maybe_write_header()?;
        if self.num_values == 0 {
            return Ok(num_bytes);
        }

        self.codec.compress(&mut self.buffer)?;

        let mut framing = Vec::new();
        zig_i64(self.num_values as i64, &mut framing)?;
        zig_i64(self.buffer.len() as i64, &mut framing)?;

        self.inner
            .write_all(&framing)
            .map_err(Details::WriteBytes)?;
        self.inner
            .write_all(&self.buffer)
            .map_err(Details::WriteBytes)?;
        self.inner
            .write_all(&self.marker)
            .map_err(Details::WriteBytes)?;
        num_bytes += framing.len() + self.buffer.len() + self.marker.len();

        self.buffer.clear();
        self.num_values = 0;

        self.inner.flush().map_err(Details::FlushWriter)?;
        Ok(num_bytes)
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> AvroResult<W> {
        self.maybe_write_header()?;
        self.flush()?;
        Ok(self.inner)
    }

    fn maybe_write_header(&mut self) -> AvroResult<usize> {
        if self.has_header {
            return Ok(0);
        }
        let header = self.header()?;
        self.inner
            .write_all(&header)
            .map_err(Details::WriteBytes)?;
        self.has_header = true;
        Ok(header.len())
    }

    /// The container header: magic, metadata map, sync marker.
    fn header(&self) -> AvroResult<Vec<u8>> {
        let schema_json = serde_json::to_string(self.schema)
            .map_err(Details::ConvertJsonToString)?;

        let mut metadata: BTreeMap<&str, &[u8]> = BTreeMap::new();
        metadata.insert("avro.schema", schema_json.as_bytes());
        let codec_name = self.codec.name().as_bytes();
        metadata.insert("avro.codec", codec_name);
        for (key, value) in &self.user_metadata {
            metadata.insert(key, value);
        }

        let mut header = Vec::new();
        header.extend_from_slice(OBJECT_HEADER_MAGIC);
        zig_i64(metadata.len() as i64, &mut header)?;
        for (key, value) in &metadata {
            write_len_prefixed(key.as_bytes(), &mut header)?;
            write_len_prefixed(value, &mut header)?;
        }
        zig_i64(0, &mut header)?;
        header.extend_from_slice(&self.marker);
        Ok(header)
    }
}

/// Encode a single raw datum under `schema`.
///
/// For encoding many datums, compile an [`Encoder`] once and reuse it.
pub fn to_avro_datum(schema: &Schema, value: &Value) -> AvroResult<Vec<u8>> {
    Encoder::new(schema)?.encode(value)
}

fn generate_sync_marker() -> [u8; 16] {
    rand::random()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record_from;
    use pretty_assertions::assert_eq;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_to_avro_datum() -> TestResult {
        let schema = Schema::parse_str(r#""long""#)?;
        assert_eq!(
            to_avro_datum(&schema, &Value::Long(1234567890123))?,
            vec![0x86, 0xEA, 0xB0, 0xDC, 0xCC, 0x8C, 0x48]
        );
        Ok(())
    }

    #[test]
    fn test_header_magic_and_marker() -> TestResult {
        let schema = Schema::parse_str(r#""int""#)?;
        let mut writer = Writer::new(&schema, Vec::new())?;
        writer.append(&Value::Int(1))?;
        let bytes = writer.into_inner()?;
        assert_eq!(&bytes[..4], b"Obj\x01");
        Ok(())
    }

    #[test]
    fn test_user_metadata_rules() -> TestResult {
        let schema = Schema::parse_str(r#""int""#)?;
        let mut writer = Writer::new(&schema, Vec::new())?;
        let err = writer
            .add_user_metadata("avro.something".to_string(), b"x")
            .unwrap_err();
        assert!(matches!(
            err.into_details(),
            Details::InvalidMetadataKey(_)
        ));

        writer.add_user_metadata("app.version".to_string(), b"1")?;
        writer.append(&Value::Int(1))?;
        let err = writer
            .add_user_metadata("too.late".to_string(), b"x")
            .unwrap_err();
        assert!(matches!(
            err.into_details(),
            Details::FileHeaderAlreadyWritten
        ));
        Ok(())
    }

    #[test]
    fn test_empty_file_still_has_header() -> TestResult {
        let schema = Schema::parse_str(r#""int""#)?;
        let writer = Writer::new(&schema, Vec::new())?;
        let bytes = writer.into_inner()?;
        assert!(bytes.len() > 20);
        assert_eq!(&bytes[..4], b"Obj\x01");
        Ok(())
    }

    #[test]
    fn test_record_append() -> TestResult {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "test",
                "fields": [
                    {"name": "a", "type": "long", "default": 42},
                    {"name": "b", "type": "string"}
                ]
            }"#,
        )?;
        let mut writer = Writer::new(&schema, Vec::new())?;
        writer.append(&record_from(vec![
            ("a", Value::Long(27)),
            ("b", "foo".into()),
        ]))?;
        let bytes = writer.into_inner()?;
        assert!(!bytes.is_empty());
        Ok(())
    }
}
