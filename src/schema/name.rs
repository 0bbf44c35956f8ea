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

//! Names, namespaces and aliases of named Avro schemas.

use crate::error::Details;
use crate::util::MapHelper;
use crate::validator::{validate_namespace, validate_schema_name};
use crate::{AvroResult, Error, Schema};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// The name of a `record`, `enum` or `fixed` schema.
///
/// A name is composed of an optional dotted namespace and a simple name; the
/// two joined by a dot form the *fullname*, which identifies the type
/// globally.
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct Name {
    /// The full name, namespace included.
    namespace_and_name: String,
    /// Start byte of the name part. Zero means there is no namespace.
    index_of_name: usize,
}

/// The aliases of a named schema, if any.
pub type Aliases = Option<Vec<Alias>>;
/// Lookup of named schemas by fullname.
pub type Names = HashMap<Name, Schema>;
/// The namespace of a named schema.
pub type Namespace = Option<String>;

impl Name {
    /// Create a new `Name`, parsing an optional dotted namespace out of the
    /// `name` string.
    pub fn new(name: &str) -> AvroResult<Self> {
        Self::new_with_enclosing_namespace(name, None)
    }

    /// Create a new `Name`, falling back to `enclosing_namespace` when `name`
    /// does not carry a namespace of its own.
    pub fn new_with_enclosing_namespace(
        name: &str,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Self> {
        let index_of_name = validate_schema_name(name)?;

        if index_of_name == 0 {
            match enclosing_namespace {
                Some(namespace) if !namespace.is_empty() => {
                    validate_namespace(namespace)?;
                    Ok(Self {
                        namespace_and_name: format!("{namespace}.{name}"),
                        index_of_name: namespace.len() + 1,
                    })
                }
                _ => Ok(Self {
                    namespace_and_name: name.to_string(),
                    index_of_name,
                }),
            }
        } else if index_of_name == 1 {
            // A leading dot pins the name to the null namespace.
            Ok(Self {
                namespace_and_name: name[1..].to_string(),
                index_of_name: 0,
            })
        } else {
            Ok(Self {
                namespace_and_name: name.to_string(),
                index_of_name,
            })
        }
    }

    /// Parse the `name`/`namespace` attributes of a JSON schema object.
    ///
    /// A dotted `name` wins over an explicit `namespace` attribute, which in
    /// turn wins over the enclosing namespace.
    pub(crate) fn parse(
        complex: &Map<String, Value>,
        enclosing_namespace: Option<&str>,
    ) -> AvroResult<Self> {
        let name_field = complex.name().ok_or(Details::GetNameField)?;
        let namespace = complex.string("namespace");
        Self::new_with_enclosing_namespace(
            &name_field,
            namespace.as_deref().or(enclosing_namespace),
        )
    }

    pub fn name(&self) -> &str {
        &self.namespace_and_name[self.index_of_name..]
    }

    pub fn namespace(&self) -> Option<&str> {
        if self.index_of_name == 0 {
            None
        } else {
            Some(&self.namespace_and_name[..(self.index_of_name - 1)])
        }
    }

    /// The `namespace.name` fullname of this `Name`.
    pub fn fullname(&self) -> &str {
        &self.namespace_and_name
    }
}

impl TryFrom<&str> for Name {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("Name");
        debug.field("name", &self.name());
        if self.index_of_name != 0 {
            debug.field("namespace", &self.namespace());
            debug.finish()
        } else {
            debug.finish_non_exhaustive()
        }
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.namespace_and_name)
    }
}

/// An alternative name of a named schema, registered for schema resolution.
///
/// An alias without a namespace is relative to the namespace of the schema
/// that declares it.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Alias(Name);

impl Alias {
    pub fn new(name: &str) -> AvroResult<Self> {
        Name::new(name).map(Self)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.namespace()
    }

    /// The alias as a `Name`, qualified against the declaring schema's
    /// namespace when the alias itself has none.
    pub fn fully_qualified_name(&self, default_namespace: Option<&str>) -> Name {
        match (self.0.namespace(), default_namespace) {
            (None, Some(ns)) if !ns.is_empty() => Name {
                namespace_and_name: format!("{ns}.{}", self.0.name()),
                index_of_name: ns.len() + 1,
            },
            _ => self.0.clone(),
        }
    }
}

impl TryFrom<&str> for Alias {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for Alias {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for Alias {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.fullname())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Details;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    /// Zero-length namespace is considered as no-namespace.
    fn test_namespace_from_name_with_empty_value() -> TestResult {
        let name = Name::new(".name")?;
        assert_eq!(name.name(), "name");
        assert_eq!(name.namespace(), None);
        Ok(())
    }

    #[test]
    fn test_name_with_whitespace_value() {
        match Name::new(" ").map_err(Error::into_details) {
            Err(Details::InvalidSchemaName(_, _)) => {}
            other => panic!("Expected an InvalidSchemaName, got {other:?}"),
        }
    }

    #[test]
    fn test_name_with_no_name_part() {
        match Name::new("space.").map_err(Error::into_details) {
            Err(Details::InvalidSchemaName(_, _)) => {}
            other => panic!("Expected an InvalidSchemaName, got {other:?}"),
        }
    }

    #[test]
    fn test_enclosing_namespace() -> TestResult {
        let name = Name::new_with_enclosing_namespace("Thing", Some("com.example"))?;
        assert_eq!(name.fullname(), "com.example.Thing");
        assert_eq!(name.namespace(), Some("com.example"));

        // A dotted name keeps its own namespace.
        let name = Name::new_with_enclosing_namespace("org.other.Thing", Some("com.example"))?;
        assert_eq!(name.fullname(), "org.other.Thing");
        Ok(())
    }

    #[test]
    fn test_alias_qualification() -> TestResult {
        let alias = Alias::new("OldThing")?;
        assert_eq!(
            alias.fully_qualified_name(Some("com.example")).fullname(),
            "com.example.OldThing"
        );
        let alias = Alias::new("org.other.OldThing")?;
        assert_eq!(
            alias.fully_qualified_name(Some("com.example")).fullname(),
            "org.other.OldThing"
        );
        Ok(())
    }
}
