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

//! Compression codecs for object-container file blocks.

use crate::AvroResult;
use crate::error::Details;
use strum::{EnumString, IntoStaticStr};

/// Settings for the `Deflate` codec.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct DeflateSettings {
    compression_level: miniz_oxide::deflate::CompressionLevel,
}

impl DeflateSettings {
    pub fn new(compression_level: miniz_oxide::deflate::CompressionLevel) -> Self {
        DeflateSettings { compression_level }
    }

    fn compression_level(&self) -> u8 {
        self.compression_level as u8
    }
}

impl Default for DeflateSettings {
    fn default() -> Self {
        Self::new(miniz_oxide::deflate::CompressionLevel::DefaultCompression)
    }
}

/// Settings for the `Zstandard` codec.
#[cfg(feature = "zstandard")]
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ZstandardSettings {
    /// 0 selects the library default.
    pub compression_level: u8,
}

#[cfg(feature = "zstandard")]
impl Default for ZstandardSettings {
    fn default() -> Self {
        Self {
            compression_level: 0,
        }
    }
}

/// Settings for the `Bzip2` codec.
#[cfg(feature = "bzip")]
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct Bzip2Settings {
    pub compression_level: u8,
}

#[cfg(feature = "bzip")]
impl Default for Bzip2Settings {
    fn default() -> Self {
        Self {
            compression_level: 6,
        }
    }
}

/// Settings for the `Xz` codec.
#[cfg(feature = "xz")]
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct XzSettings {
    pub compression_level: u8,
}

#[cfg(feature = "xz")]
impl Default for XzSettings {
    fn default() -> Self {
        Self {
            compression_level: 6,
        }
    }
}

/// The compression codec used to compress blocks.
#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab_case")]
pub enum Codec {
    /// The `Null` codec passes data through uncompressed.
    Null,
    /// The `Deflate` codec writes the data block using the deflate algorithm
    /// as specified in RFC 1951. Note that this format (unlike the "zlib
    /// format" in RFC 1950) does not have a checksum.
    Deflate(DeflateSettings),
    #[cfg(feature = "snappy")]
    /// The `Snappy` codec uses Google's [Snappy](https://google.github.io/snappy/)
    /// compression library. Each compressed block is followed by the 4-byte,
    /// big-endian CRC32 checksum of the uncompressed data in the block.
    Snappy,
    #[cfg(feature = "zstandard")]
    /// The `Zstandard` codec uses Facebook's [Zstandard](https://facebook.github.io/zstd/)
    /// compression library.
    Zstandard(ZstandardSettings),
    #[cfg(feature = "bzip")]
    /// The `Bzip2` codec uses the [BZip2](https://sourceware.org/bzip2/)
    /// compression library.
    Bzip2(Bzip2Settings),
    #[cfg(feature = "xz")]
    /// The `Xz` codec uses the [Xz utils](https://tukaani.org/xz/)
    /// compression library.
    Xz(XzSettings),
}

impl Codec {
    /// The codec's name as it appears in the `avro.codec` metadata entry.
    pub fn name(self) -> &'static str {
        <&str>::from(self)
    }

    /// Compress a stream of bytes in-place.
    pub fn compress(self, stream: &mut Vec<u8>) -> AvroResult<()> {
        match self {
            Codec::Null => (),
            Codec::Deflate(settings) => {
                let compressed =
                    miniz_oxide::deflate::compress_to_vec(stream, settings.compression_level());
                *stream = compressed;
            }
            #[cfg(feature = "snappy")]
            Codec::Snappy => {
                let mut encoded: Vec<u8> = vec![0; snap::raw::max_compress_len(stream.len())];
                let compressed_size = snap::raw::Encoder::new()
                    .compress(&stream[..], &mut encoded[..])
                    .map_err(Details::SnappyCompress)?;

                let mut hasher = crc32fast::Hasher::new();
                hasher.update(&stream[..]);
                let checksum_as_bytes = hasher.finalize().to_be_bytes();
                let checksum_len = checksum_as_bytes.len();
                encoded.truncate(compressed_size + checksum_len);
                encoded[compressed_size..].copy_from_slice(&checksum_as_bytes);

                *stream = encoded;
            }
            #[cfg(feature = "zstandard")]
            Codec::Zstandard(settings) => {
                let compressed =
                    zstd::stream::encode_all(&stream[..], settings.compression_level as i32)
                        .map_err(Details::ZstdCompress)?;
                *stream = compressed;
            }
            #[cfg(feature = "bzip")]
            Codec::Bzip2(settings) => {
                use bzip2::read::BzEncoder;
                use std::io::Read;

                let mut encoder = BzEncoder::new(
                    &stream[..],
                    bzip2::Compression::new(settings.compression_level as u32),
                );
                let mut buffer = Vec::new();
                encoder
                    .read_to_end(&mut buffer)
                    .map_err(Details::WriteBytes)?;
                *stream = buffer;
            }
            #[cfg(feature = "xz")]
            Codec::Xz(settings) => {
                use liblzma::read::XzEncoder;
                use std::io::Read;

                let mut encoder = XzEncoder::new(&stream[..], settings.compression_level as u32);
                let mut buffer = Vec::new();
                encoder
                    .read_to_end(&mut buffer)
                    .map_err(Details::WriteBytes)?;
                *stream = buffer;
            }
        };

        Ok(())
    }

    /// Decompress a stream of bytes in-place.
    pub fn decompress(self, stream: &mut Vec<u8>) -> AvroResult<()> {
        *stream = match self {
            Codec::Null => return Ok(()),
            Codec::Deflate(_settings) => miniz_oxide::inflate::decompress_to_vec(stream)
                .map_err(|e| Details::DeflateDecompress(format!("{:?}", e.status)))?,
            #[cfg(feature = "snappy")]
            Codec::Snappy => {
                if stream.len() < 4 {
                    return Err(Details::UnexpectedEof.into());
                }
                let compressed = &stream[..stream.len() - 4];
                let decompressed_size =
                    snap::raw::decompress_len(compressed).map_err(Details::SnappyDecompress)?;
                let mut decoded = vec![0; decompressed_size];
                snap::raw::Decoder::new()
                    .decompress(compressed, &mut decoded[..])
                    .map_err(Details::SnappyDecompress)?;

                let mut last_four: [u8; 4] = [0; 4];
                last_four.copy_from_slice(&stream[(stream.len() - 4)..]);
                let expected = u32::from_be_bytes(last_four);

                let mut hasher = crc32fast::Hasher::new();
                hasher.update(&decoded);
                let actual = hasher.finalize();

                if expected != actual {
                    return Err(Details::SnappyCrc32 { expected, actual }.into());
                }
                decoded
            }
            #[cfg(feature = "zstandard")]
            Codec::Zstandard(_settings) => {
                zstd::stream::decode_all(&stream[..]).map_err(Details::ZstdDecompress)?
            }
            #[cfg(feature = "bzip")]
            Codec::Bzip2(_settings) => {
                use bzip2::read::BzDecoder;
                use std::io::Read;

                let mut decoder = BzDecoder::new(&stream[..]);
                let mut buffer = Vec::new();
                decoder
                    .read_to_end(&mut buffer)
                    .map_err(Details::Bzip2Decompress)?;
                buffer
            }
            #[cfg(feature = "xz")]
            Codec::Xz(_settings) => {
                use liblzma::read::XzDecoder;
                use std::io::Read;

                let mut decoder = XzDecoder::new(&stream[..]);
                let mut buffer = Vec::new();
                decoder
                    .read_to_end(&mut buffer)
                    .map_err(Details::XzDecompress)?;
                buffer
            }
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    const INPUT: &[u8] = b"theanswertolifetheuniverseandeverythingis42theanswertolifetheuniverseandeverythingis42";

    fn round_trip(codec: Codec) {
        let mut stream = INPUT.to_vec();
        codec.compress(&mut stream).unwrap();
        if codec != Codec::Null {
            assert!(stream.len() < INPUT.len());
        }
        codec.decompress(&mut stream).unwrap();
        assert_eq!(stream, INPUT);
    }

    #[test]
    fn test_null_round_trip() {
        round_trip(Codec::Null);
    }

    #[test]
    fn test_deflate_round_trip() {
        round_trip(Codec::Deflate(DeflateSettings::default()));
    }

    #[cfg(feature = "snappy")]
    #[test]
    fn test_snappy_round_trip() {
        round_trip(Codec::Snappy);
    }

    #[cfg(feature = "zstandard")]
    #[test]
    fn test_zstandard_round_trip() {
        round_trip(Codec::Zstandard(ZstandardSettings::default()));
    }

    #[cfg(feature = "bzip")]
    #[test]
    fn test_bzip2_round_trip() {
        round_trip(Codec::Bzip2(Bzip2Settings::default()));
    }

    #[cfg(feature = "xz")]
    #[test]
    fn test_xz_round_trip() {
        round_trip(Codec::Xz(XzSettings::default()));
    }

    #[test]
    fn test_codec_names() {
        assert_eq!(Codec::Null.name(), "null");
        assert_eq!(Codec::Deflate(DeflateSettings::default()).name(), "deflate");
        assert_eq!(
            Codec::from_str("deflate").unwrap(),
            Codec::Deflate(DeflateSettings::default())
        );
        assert!(Codec::from_str("sparkle").is_err());
    }
}
