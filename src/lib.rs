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

//! **Apache Avro** is a data serialization system which provides rich data
//! structures and a compact, fast, binary data format. This crate implements
//! the codec core: it compiles Avro schemas into per-schema encoders and
//! decoders, and plans schema resolution when data written under one schema
//! is read under another.
//!
//! Compilation happens once per schema; the resulting [`Encoder`],
//! [`Decoder`] and [`ResolvedDecoder`] dispatch over pre-resolved
//! instructions, so per-value work is proportional to the value, not the
//! schema.
//!
//! ```
//! use avro_codec::{Decoder, Encoder, Schema, Value};
//!
//! # fn main() -> Result<(), avro_codec::Error> {
//! let schema = Schema::parse_str(
//!     r#"{
//!         "type": "record",
//!         "name": "User",
//!         "fields": [
//!             {"name": "name", "type": "string"},
//!             {"name": "favorite_number", "type": ["null", "int"]}
//!         ]
//!     }"#,
//! )?;
//!
//! let encoder = Encoder::new(&schema)?;
//! let decoder = Decoder::new(&schema)?;
//!
//! let value = Value::Record(vec![
//!     ("name".to_string(), Value::String("Alice".to_string())),
//!     ("favorite_number".to_string(), Value::Int(42)),
//! ]);
//! let bytes = encoder.encode(&value)?;
//! assert_eq!(decoder.decode(&mut &bytes[..])?, value);
//! # Ok(())
//! # }
//! ```
//!
//! Reading data written with an older or newer schema goes through
//! [`ResolvedDecoder`], which applies the Avro schema resolution rules:
//! promotions, field defaults, enum defaults and union re-matching.
//!
//! Object-container files are handled by [`Reader`] and [`Writer`], with
//! pluggable compression through [`Codec`].
//!
//! # Features
//!
//! - `snappy`: enable support for the Snappy codec
//! - `zstandard`: enable support for the Zstandard codec
//! - `bzip`: enable support for the Bzip2 codec
//! - `xz`: enable support for the Xz codec

mod codec;
mod decimal;
mod decode;
mod encode;
mod resolve;
mod util;
mod validator;

pub mod error;
pub mod reader;
pub mod schema;
pub mod types;
pub mod writer;

#[cfg(feature = "bzip")]
pub use codec::Bzip2Settings;
#[cfg(feature = "xz")]
pub use codec::XzSettings;
#[cfg(feature = "zstandard")]
pub use codec::ZstandardSettings;
pub use codec::{Codec, DeflateSettings};
pub use decimal::Decimal;
pub use decode::{Decoder, DecoderConfig};
pub use encode::{Encoder, EncoderConfig};
pub use error::Error;
pub use reader::{Reader, from_avro_datum};
pub use resolve::ResolvedDecoder;
pub use schema::Schema;
pub use types::Value;
pub use util::DEFAULT_MAX_BLOCK_BYTES;
pub use uuid::Uuid;
pub use writer::{Writer, to_avro_datum};

/// A convenience type alias for `Result`s with `Error`s.
pub type AvroResult<T> = Result<T, Error>;
