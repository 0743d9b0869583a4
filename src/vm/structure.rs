/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use super::{heap::StructureTypeRef, name_map::NameMap, value::Value};

/// Layout of a user-defined record type. Shared by every value of the type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructureTypeData {
    pub names: NameMap,
}

impl StructureTypeData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            names: fields.into_iter().collect(),
        }
    }

    pub fn num_fields(&self) -> usize {
        self.names.len()
    }
}

/// An instance of a record type: the type plus one value per field.
///
/// `ty` is `None` only for a loader placeholder whose record never arrived.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructureValueData {
    pub ty: Option<StructureTypeRef>,
    pub values: Vec<Value>,
}

impl StructureValueData {
    /// Create an instance with all fields empty.
    pub fn new(ty: StructureTypeRef, num_fields: usize) -> Self {
        Self {
            ty: Some(ty),
            values: vec![Value::Null; num_fields],
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn set(&mut self, index: usize, value: Value) {
        if index >= self.values.len() {
            self.values.resize(index + 1, Value::Null);
        }
        self.values[index] = value;
    }
}
