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

//! Reading Avro object-container files and raw datums.

use crate::codec::Codec;
use crate::decode::{self, Decoder, DecoderConfig};
use crate::error::Details;
use crate::resolve::ResolvedDecoder;
use crate::schema::Schema;
use crate::types::Value;
use crate::util::{self, read_exact};
use crate::AvroResult;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::str::FromStr;

const OBJECT_HEADER_MAGIC: &[u8; 4] = b"Obj\x01";

#[derive(Debug)]
enum DatumDecoder {
    Plain(Decoder),
    Resolved(ResolvedDecoder),
}

/// Reads the values of an Avro object-container file.
///
/// The file header carries the writer schema; if a reader schema is supplied
/// the values are resolved into it. `Reader` implements [`Iterator`] over
/// decoded values; after the first error the iterator fuses.
#[derive(Debug)]
pub struct Reader<R: Read> {
    inner: R,
    writer_schema: Schema,
    datum: DatumDecoder,
    codec: Codec,
    marker: [u8; 16],
    user_metadata: HashMap<String, Vec<u8>>,
    config: DecoderConfig,
    block: Cursor<Vec<u8>>,
    items_left: u64,
    errored: bool,
}

impl<R: Read> Reader<R> {
    /// Open a container file, decoding values with the writer schema found
    /// in its header.
    pub fn new(inner: R) -> AvroResult<Self> {
        Self::with_config(inner, None, DecoderConfig::default())
    }

    /// Open a container file, resolving every value into `reader_schema`.
    pub fn with_reader_schema(inner: R, reader_schema: &Schema) -> AvroResult<Self> {
        Self::with_config(inner, Some(reader_schema), DecoderConfig::default())
    }

    /// Open a container file with explicit decoding options.
    pub fn with_config(
        mut inner: R,
        reader_schema: Option<&Schema>,
        config: DecoderConfig,
    ) -> AvroResult<Self> {
        let mut magic = [0u8; 4];
        read_exact(&mut inner, &mut magic)?;
        if &magic != OBJECT_HEADER_MAGIC {
            return Err(Details::HeaderMagic.into());
        }

        let mut metadata: HashMap<String, Vec<u8>> = HashMap::new();
        decode::for_each_block_item(&mut inner, |r| {
            let key = decode::read_string(r, config.max_block_bytes)?;
            let value = decode::read_bytes(r, config.max_block_bytes)?;
            metadata.insert(key, value);
            Ok(())
        })?;

        let mut marker = [0u8; 16];
        read_exact(&mut inner, &mut marker)?;

        let schema_json = metadata
            .remove("avro.schema")
            .ok_or(Details::GetHeaderSchema)?;
        let schema_json = String::from_utf8(schema_json).map_err(Details::HeaderSchemaUtf8)?;
        let writer_schema = Schema::parse_str(&schema_json)?;

        let codec = match metadata.remove("avro.codec") {
            None => Codec::Null,
            Some(name) => {
                let name = String::from_utf8_lossy(&name).to_string();
                Codec::from_str(&name).map_err(|_| Details::UnknownCodec(name))?
            }
        };

        let datum = match reader_schema {
            None => DatumDecoder::Plain(Decoder::with_config(&writer_schema, config.clone())?),
            Some(reader) => DatumDecoder::Resolved(ResolvedDecoder::with_config(
                &writer_schema,
                reader,
                config.clone(),
            )?),
        };

        metadata.retain(|key, _| !key.starts_with("avro."));

        Ok(Self {
            inner,
            writer_schema,
            datum,
            codec,
            marker,
            user_metadata: metadata,
            config,
            block: Cursor::new(Vec::new()),
            items_left: 0,
            errored: false,
        })
    }

    /// The schema the file was written with.
    pub fn writer_schema(&self) -> &Schema {
        &self.writer_schema
    }

    /// The compression codec of the file's blocks.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Metadata entries outside the reserved `avro.` namespace.
    pub fn user_metadata(&self) -> &HashMap<String, Vec<u8>> {
        &self.user_metadata
    }

    /// Load the next block. `Ok(false)` means clean end-of-file.
    fn read_block(&mut self) -> AvroResult<bool> {
        // Probe a single byte so that end-of-file between blocks is not an
        // error.
        let mut first = [0u8; 1];
        loop {
            match self.inner.read(&mut first) {
                Ok(0) => return Ok(false),
                Ok(_) => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Details::ReadBytes(e).into()),
            }
        }

        let count = util::zag_i64_with_lead(first[0], &mut self.inner)?;
        if count < 0 {
            return Err(Details::NegativeLength(count).into());
        }
        let size = decode::read_len(&mut self.inner, self.config.max_block_bytes)?;

        let mut data = decode::read_raw(&mut self.inner, size)?;
        self.codec.decompress(&mut data)?;

        let mut sync = [0u8; 16];
        read_exact(&mut self.inner, &mut sync)?;
        if sync != self.marker {
            return Err(Details::SyncMarkerMismatch.into());
        }

        self.block = Cursor::new(data);
        self.items_left = count as u64;
        Ok(true)
    }

    fn decode_datum(&mut self) -> AvroResult<Value> {
        match &self.datum {
            DatumDecoder::Plain(decoder) => decoder.decode(&mut self.block),
            DatumDecoder::Resolved(decoder) => decoder.decode(&mut self.block),
        }
    }
}

impl<R: Read> Iterator for Reader<R> {
    type Item = AvroResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.errored {
            return None;
        }
        while self.items_left == 0 {
            match self.read_block() {
                Ok(true) => (),
                Ok(false) => return None,
                Err(e) => {
                    self.errored = true;
                    return Some(Err(e));
                }
            }
        }
        self.items_left -= 1;
        let result = self.decode_datum();
        if result.is_err() {
            self.errored = true;
        }
        Some(result)
    }
}

/// Decode a single raw datum written under `writer_schema`.
///
/// With a `reader_schema` the datum is resolved into it. For decoding many
/// datums, compile a [`Decoder`] or [`ResolvedDecoder`] once and reuse it.
pub fn from_avro_datum<R: Read>(
    writer_schema: &Schema,
    reader: &mut R,
    reader_schema: Option<&Schema>,
) -> AvroResult<Value> {
    match reader_schema {
        None => Decoder::new(writer_schema)?.decode(reader),
        Some(reader_schema) => {
            ResolvedDecoder::new(writer_schema, reader_schema)?.decode(reader)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_magic() {
        let not_avro: &[u8] = b"NotAvroData";
        let err = Reader::new(not_avro).unwrap_err();
        assert!(matches!(err.into_details(), Details::HeaderMagic));
    }

    #[test]
    fn test_from_avro_datum() {
        let schema = Schema::parse_str(r#""long""#).unwrap();
        let wire: &[u8] = &[0x86, 0xEA, 0xB0, 0xDC, 0xCC, 0x8C, 0x48];
        assert_eq!(
            from_avro_datum(&schema, &mut &*wire, None).unwrap(),
            Value::Long(1234567890123)
        );
    }

    #[test]
    fn test_from_avro_datum_with_promotion() {
        let writer = Schema::parse_str(r#""int""#).unwrap();
        let reader = Schema::parse_str(r#""double""#).unwrap();
        let wire: &[u8] = &[0x54];
        assert_eq!(
            from_avro_datum(&writer, &mut &*wire, Some(&reader)).unwrap(),
            Value::Double(42.0)
        );
    }
}
