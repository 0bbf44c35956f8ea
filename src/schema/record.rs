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

//! Record schemas and their fields.

use crate::AvroResult;
use crate::error::Details;
use crate::schema::name::{Aliases, Name};
use crate::schema::{Documentation, Schema};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A `record` Avro schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    /// The name of the record.
    pub name: Name,
    /// The aliases of the record, fully qualified.
    pub aliases: Aliases,
    /// The documentation of the record.
    pub doc: Documentation,
    /// The fields of the record, in declaration order.
    pub fields: Vec<RecordField>,
    /// Field name to position in `fields`.
    pub lookup: BTreeMap<String, usize>,
}

/// The `order` attribute of a record field.
///
/// Carried through parsing and serialization; the codec ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFieldOrder {
    Ascending,
    Descending,
    Ignore,
}

impl RecordFieldOrder {
    pub(crate) fn from_attribute(value: Option<&Value>) -> Self {
        match value.and_then(|v| v.as_str()) {
            Some("descending") => RecordFieldOrder::Descending,
            Some("ignore") => RecordFieldOrder::Ignore,
            _ => RecordFieldOrder::Ascending,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RecordFieldOrder::Ascending => "ascending",
            RecordFieldOrder::Descending => "descending",
            RecordFieldOrder::Ignore => "ignore",
        }
    }
}

/// A single field of a `record` Avro schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    /// Name of the field.
    pub name: String,
    /// Documentation of the field.
    pub doc: Documentation,
    /// Alternative names of the field. Field aliases have no namespace.
    pub aliases: Vec<String>,
    /// Default value of the field, as given in the schema JSON. The value is
    /// validated against `schema` at parse time; [`crate::Encoder`] supplies
    /// it when the field is absent from an input record, and the resolution
    /// planner when the writer schema lacks the field entirely.
    pub default: Option<Value>,
    /// Schema of the field.
    pub schema: Schema,
    /// Sort order hint; not used by the codec.
    pub order: RecordFieldOrder,
    /// Zero-based position of the field within its record.
    pub position: usize,
}

impl RecordField {
    /// Find `name` among this field's name and aliases.
    pub(crate) fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    pub(crate) fn parse_aliases(field: &Map<String, Value>) -> Vec<String> {
        field
            .get("aliases")
            .and_then(|aliases| aliases.as_array())
            .map(|aliases| {
                aliases
                    .iter()
                    .filter_map(|alias| alias.as_str())
                    .map(|alias| alias.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Serialize for RecordField {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("type", &self.schema)?;

        if let Some(default) = &self.default {
            map.serialize_entry("default", default)?;
        }
        if let Some(doc) = &self.doc {
            map.serialize_entry("doc", doc)?;
        }
        if !self.aliases.is_empty() {
            map.serialize_entry("aliases", &self.aliases)?;
        }
        if self.order != RecordFieldOrder::Ascending {
            map.serialize_entry("order", self.order.as_str())?;
        }

        map.end()
    }
}

impl RecordSchema {
    /// The field at `position`, by construction always present.
    pub fn field(&self, position: usize) -> &RecordField {
        &self.fields[position]
    }

    /// Look up a field by its declared name.
    pub fn field_by_name(&self, name: &str) -> Option<&RecordField> {
        self.lookup.get(name).map(|&i| &self.fields[i])
    }

    pub(crate) fn build_lookup(fields: &[RecordField]) -> AvroResult<BTreeMap<String, usize>> {
        let mut lookup = BTreeMap::new();
        for (position, field) in fields.iter().enumerate() {
            if lookup.insert(field.name.clone(), position).is_some() {
                return Err(Details::DuplicateFieldName(field.name.clone()).into());
            }
        }
        Ok(lookup)
    }
}
