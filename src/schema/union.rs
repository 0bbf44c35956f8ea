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

//! Union schemas.

use crate::AvroResult;
use crate::error::Details;
use crate::schema::{Schema, SchemaKind};
use std::collections::BTreeMap;

/// A `union` Avro schema.
#[derive(Debug, Clone)]
pub struct UnionSchema {
    pub(crate) schemas: Vec<Schema>,
    // Ensures uniqueness of the unnamed branches and gives constant-time
    // branch lookup by value kind. Named branches (record, enum, fixed) may
    // repeat per kind and are not indexed here.
    variant_index: BTreeMap<SchemaKind, usize>,
}

impl UnionSchema {
    /// Creates a new `UnionSchema` from a vector of branch schemas.
    ///
    /// # Errors
    /// Will return an error if `schemas` is empty, contains a union, or has
    /// duplicate unnamed branches.
    pub fn new(schemas: Vec<Schema>) -> AvroResult<Self> {
        if schemas.is_empty() {
            return Err(Details::EmptyUnion.into());
        }
        let mut vindex = BTreeMap::new();
        for (i, schema) in schemas.iter().enumerate() {
            if let Schema::Union(_) = schema {
                return Err(Details::GetNestedUnion.into());
            }
            if !schema.is_named() && vindex.insert(SchemaKind::from(schema), i).is_some() {
                return Err(Details::GetUnionDuplicate.into());
            }
        }
        Ok(UnionSchema {
            schemas,
            variant_index: vindex,
        })
    }

    /// Returns a slice of all branches of this union.
    pub fn variants(&self) -> &[Schema] {
        &self.schemas
    }

    /// Returns true if any of the branches of this union is `Null`.
    pub fn is_nullable(&self) -> bool {
        self.schemas.iter().any(|x| matches!(x, Schema::Null))
    }
}

// No need to compare variant_index, it is derivative of schemas.
impl PartialEq for UnionSchema {
    fn eq(&self, other: &UnionSchema) -> bool {
        self.schemas.eq(&other.schemas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_union_rejected() {
        assert!(UnionSchema::new(vec![]).is_err());
    }

    #[test]
    fn test_nested_union_rejected() {
        let inner = UnionSchema::new(vec![Schema::Null, Schema::Int]).unwrap();
        assert!(UnionSchema::new(vec![Schema::Union(inner), Schema::String]).is_err());
    }

    #[test]
    fn test_duplicate_unnamed_branch_rejected() {
        assert!(UnionSchema::new(vec![Schema::Int, Schema::Int]).is_err());
    }

    #[test]
    fn test_nullability() {
        let union = UnionSchema::new(vec![Schema::String, Schema::Null]).unwrap();
        assert!(union.is_nullable());
        let union = UnionSchema::new(vec![Schema::String, Schema::Int]).unwrap();
        assert!(!union.is_nullable());
    }
}
