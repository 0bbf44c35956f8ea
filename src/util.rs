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

//! Low-level helpers shared across the crate: zig-zag variable-length
//! integers, allocation guards for wire-declared lengths, and a small
//! convenience trait for reading JSON maps.

use crate::AvroResult;
use crate::error::Details;
use serde_json::{Map, Value};
use std::io::{Read, Write};

/// Default ceiling for any single wire-declared length, in bytes.
///
/// Ill-formed or hostile data can declare enormous lengths; decoding rejects
/// anything above the configured ceiling instead of attempting the
/// allocation. See [`crate::DecoderConfig::max_block_bytes`].
pub const DEFAULT_MAX_BLOCK_BYTES: usize = 1 << 30;

/// Check a wire-declared length against the configured ceiling.
pub(crate) fn safe_len(len: usize, maximum: usize) -> AvroResult<usize> {
    if len <= maximum {
        Ok(len)
    } else {
        Err(Details::LengthLimit {
            desired: len,
            maximum,
        }
        .into())
    }
}

pub(crate) fn zig_i32<W: Write>(n: i32, writer: &mut W) -> AvroResult<()> {
    zig_i64(n as i64, writer)
}

pub(crate) fn zig_i64<W: Write>(n: i64, writer: &mut W) -> AvroResult<()> {
    encode_variable(((n << 1) ^ (n >> 63)) as u64, writer)
}

pub(crate) fn zag_i32<R: Read>(reader: &mut R) -> AvroResult<i32> {
    let i = zag_i64(reader)?;
    i32::try_from(i).map_err(|_| Details::IntegerRange(i).into())
}

pub(crate) fn zag_i64<R: Read>(reader: &mut R) -> AvroResult<i64> {
    let z = decode_variable(reader)?;
    Ok(if z & 0x1 == 0 {
        (z >> 1) as i64
    } else {
        !(z >> 1) as i64
    })
}

fn encode_variable<W: Write>(mut z: u64, writer: &mut W) -> AvroResult<()> {
    let mut buffer = [0u8; 10];
    let mut i: usize = 0;
    loop {
        if z <= 0x7F {
            buffer[i] = (z & 0x7F) as u8;
            i += 1;
            break;
        } else {
            buffer[i] = (0x80 | (z & 0x7F)) as u8;
            i += 1;
            z >>= 7;
        }
    }
    writer
        .write_all(&buffer[..i])
        .map_err(|e| Details::WriteBytes(e).into())
}

pub(crate) fn decode_variable<R: Read>(reader: &mut R) -> AvroResult<u64> {
    let mut i = 0u64;
    let mut buf = [0u8; 1];

    let mut j = 0;
    loop {
        if j > 9 {
            // 10 bytes of 7 payload bits each already cover 64 bits
            return Err(Details::InvalidVarInt.into());
        }
        read_exact(reader, &mut buf)?;
        i |= u64::from(buf[0] & 0x7F) << (j * 7);
        if (buf[0] >> 7) == 0 {
            break;
        } else {
            j += 1;
        }
    }

    Ok(i)
}

/// Continue a varint decode whose first byte has already been consumed.
///
/// The object-container reader uses this to probe for a clean end-of-file
/// before committing to a block header.
pub(crate) fn decode_variable_with_lead<R: Read>(lead: u8, reader: &mut R) -> AvroResult<u64> {
    let mut i = u64::from(lead & 0x7F);
    if (lead >> 7) == 0 {
        return Ok(i);
    }
    let mut buf = [0u8; 1];
    let mut j = 1;
    loop {
        if j > 9 {
            return Err(Details::InvalidVarInt.into());
        }
        read_exact(reader, &mut buf)?;
        i |= u64::from(buf[0] & 0x7F) << (j * 7);
        if (buf[0] >> 7) == 0 {
            break;
        } else {
            j += 1;
        }
    }
    Ok(i)
}

/// Zig-zag decode a varint whose first byte has already been consumed.
pub(crate) fn zag_i64_with_lead<R: Read>(lead: u8, reader: &mut R) -> AvroResult<i64> {
    let z = decode_variable_with_lead(lead, reader)?;
    Ok(if z & 0x1 == 0 {
        (z >> 1) as i64
    } else {
        !(z >> 1) as i64
    })
}

/// `Read::read_exact` with I/O errors mapped to this crate's error type.
pub(crate) fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> AvroResult<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Details::UnexpectedEof.into()
        } else {
            Details::ReadBytes(e).into()
        }
    })
}

/// Discard exactly `n` bytes from the reader without allocating for them.
pub(crate) fn skip_bytes<R: Read>(reader: &mut R, mut n: usize) -> AvroResult<()> {
    let mut scratch = [0u8; 512];
    while n > 0 {
        let take = n.min(scratch.len());
        read_exact(reader, &mut scratch[..take])?;
        n -= take;
    }
    Ok(())
}

pub(crate) trait MapHelper {
    fn string(&self, key: &str) -> Option<String>;

    fn name(&self) -> Option<String> {
        self.string("name")
    }

    fn doc(&self) -> Option<String> {
        self.string("doc")
    }

    fn aliases(&self) -> Option<Vec<String>>;
}

impl MapHelper for Map<String, Value> {
    fn string(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
    }

    fn aliases(&self) -> Option<Vec<String>> {
        self.get("aliases")
            .and_then(|aliases| aliases.as_array())
            .and_then(|aliases| {
                aliases
                    .iter()
                    .map(|alias| alias.as_str().map(|a| a.to_string()))
                    .collect::<Option<_>>()
            })
    }
}
