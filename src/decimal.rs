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

//! The `decimal` logical value: an arbitrary-precision unscaled integer
//! paired with a scale.

use crate::AvroResult;
use crate::error::Details;
use num_bigint::{BigInt, Sign};

/// An exact decimal number `unscaled * 10^(-scale)`.
///
/// On the wire the unscaled value travels as two's-complement big-endian
/// bytes: minimal width for a `bytes` underlying schema, sign-extended to the
/// exact size for a `fixed` one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal {
    unscaled: BigInt,
    scale: usize,
}

impl Decimal {
    pub fn new(unscaled: BigInt, scale: usize) -> Self {
        Self { unscaled, scale }
    }

    /// Reconstruct a decimal from its two's-complement big-endian wire bytes.
    pub fn from_signed_bytes_be(bytes: &[u8], scale: usize) -> Self {
        Self {
            unscaled: BigInt::from_signed_bytes_be(bytes),
            scale,
        }
    }

    pub fn unscaled(&self) -> &BigInt {
        &self.unscaled
    }

    pub fn scale(&self) -> usize {
        self.scale
    }

    /// Two's-complement big-endian bytes of the unscaled value, trimmed to
    /// the minimum width.
    pub fn to_signed_bytes_be(&self) -> Vec<u8> {
        self.unscaled.to_signed_bytes_be()
    }

    /// Two's-complement big-endian bytes sign-extended to exactly `len`
    /// bytes, for a `fixed` underlying schema.
    pub fn to_sign_extended_bytes_be(&self, len: usize) -> AvroResult<Vec<u8>> {
        let minimal = self.to_signed_bytes_be();
        if minimal.len() > len {
            return Err(
                Details::EncodeDecimalTooLarge(self.unscaled.to_string(), len).into(),
            );
        }
        let fill = if self.unscaled.sign() == Sign::Minus {
            0xFF
        } else {
            0x00
        };
        let mut bytes = vec![fill; len - minimal.len()];
        bytes.extend_from_slice(&minimal);
        Ok(bytes)
    }
}

impl From<i64> for Decimal {
    /// An integer as a decimal with scale 0.
    fn from(n: i64) -> Self {
        Self {
            unscaled: BigInt::from(n),
            scale: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_signed_bytes_round_trip() {
        for n in [0i64, 1, -1, 127, -128, 128, -129, 1_000_000, -1_000_000] {
            let decimal = Decimal::new(BigInt::from(n), 2);
            let bytes = decimal.to_signed_bytes_be();
            assert_eq!(Decimal::from_signed_bytes_be(&bytes, 2), decimal);
        }
    }

    #[test]
    fn test_sign_extension() {
        let positive = Decimal::new(BigInt::from(1i64), 0);
        assert_eq!(
            positive.to_sign_extended_bytes_be(4).unwrap(),
            vec![0x00, 0x00, 0x00, 0x01]
        );

        let negative = Decimal::new(BigInt::from(-1i64), 0);
        assert_eq!(
            negative.to_sign_extended_bytes_be(4).unwrap(),
            vec![0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_too_large_for_fixed() {
        let big = Decimal::new(BigInt::from(1i64) << 40, 0);
        assert!(big.to_sign_extended_bytes_be(4).is_err());
    }
}
