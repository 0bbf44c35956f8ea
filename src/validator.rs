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

//! Validation of schema names, namespaces, enum symbols and record field
//! names against the rules of the Avro specification.

use crate::AvroResult;
use crate::error::Details;
use regex_lite::Regex;
use std::sync::OnceLock;

const SCHEMA_NAME_PATTERN: &str = r"^((?P<namespace>([A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*)?)\.)?(?P<name>[A-Za-z_][A-Za-z0-9_]*)$";
const NAMESPACE_PATTERN: &str = r"^([A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*)?$";
const SIMPLE_NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

fn schema_name_regex() -> &'static Regex {
    static SCHEMA_NAME_ONCE: OnceLock<Regex> = OnceLock::new();
    SCHEMA_NAME_ONCE.get_or_init(|| Regex::new(SCHEMA_NAME_PATTERN).unwrap())
}

fn namespace_regex() -> &'static Regex {
    static NAMESPACE_ONCE: OnceLock<Regex> = OnceLock::new();
    NAMESPACE_ONCE.get_or_init(|| Regex::new(NAMESPACE_PATTERN).unwrap())
}

fn simple_name_regex() -> &'static Regex {
    static SIMPLE_NAME_ONCE: OnceLock<Regex> = OnceLock::new();
    SIMPLE_NAME_ONCE.get_or_init(|| Regex::new(SIMPLE_NAME_PATTERN).unwrap())
}

/// Validates a (possibly dotted) schema name and returns the start byte of
/// the name part within the full name.
pub(crate) fn validate_schema_name(schema_name: &str) -> AvroResult<usize> {
    let caps = schema_name_regex()
        .captures(schema_name)
        .ok_or_else(|| Details::InvalidSchemaName(schema_name.to_string(), SCHEMA_NAME_PATTERN))?;
    Ok(caps
        .name("name")
        .expect("Regex has a group named `name`")
        .start())
}

pub(crate) fn validate_namespace(ns: &str) -> AvroResult<()> {
    if namespace_regex().is_match(ns) {
        Ok(())
    } else {
        Err(Details::InvalidNamespace(ns.to_string(), NAMESPACE_PATTERN).into())
    }
}

pub(crate) fn validate_enum_symbol_name(symbol: &str) -> AvroResult<()> {
    if simple_name_regex().is_match(symbol) {
        Ok(())
    } else {
        Err(Details::EnumSymbolName(symbol.to_string()).into())
    }
}

pub(crate) fn validate_record_field_name(field_name: &str) -> AvroResult<()> {
    if simple_name_regex().is_match(field_name) {
        Ok(())
    } else {
        Err(Details::FieldName(field_name.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_schema_names() {
        assert_eq!(validate_schema_name("example").unwrap(), 0);
        assert_eq!(validate_schema_name("com.example.Thing").unwrap(), 12);
        for funny_name in ["_", "_._", "__._", "_.__", "_._._"] {
            assert!(validate_schema_name(funny_name).is_ok());
        }
    }

    #[test]
    fn test_invalid_schema_names() {
        assert!(validate_schema_name("com-example").is_err());
        assert!(validate_schema_name(" ").is_err());
        assert!(validate_schema_name("space.").is_err());
        assert!(validate_schema_name("ns.0.record1").is_err());
        assert!(validate_schema_name("ns..record1").is_err());
    }

    #[test]
    fn test_namespaces() {
        assert!(validate_namespace("com.example").is_ok());
        assert!(validate_namespace("com-example").is_err());
    }

    #[test]
    fn test_symbols_and_fields() {
        assert!(validate_enum_symbol_name("spades").is_ok());
        assert!(validate_enum_symbol_name("com-example").is_err());
        assert!(validate_record_field_name("test").is_ok());
        assert!(validate_record_field_name("com-example").is_err());
    }
}
