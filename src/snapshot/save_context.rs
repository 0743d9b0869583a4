/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use crate::error::{Error, Result};
use crate::vm::heap::{ArrayRef, BcoRef, HashRef, ProcessId, StructureTypeRef, StructureValueRef};

/// Assigns ids to shared objects while a graph is being saved.
///
/// Every `add_*` is idempotent per object: the first call for an object
/// assigns an id and schedules the object to be written, later calls return
/// the same id. Id 0 is never assigned.
pub trait SaveContext {
    fn add_bco(&mut self, bco: BcoRef) -> Result<u32>;
    fn add_hash(&mut self, hash: HashRef) -> Result<u32>;
    fn add_array(&mut self, array: ArrayRef) -> Result<u32>;
    fn add_structure_type(&mut self, ty: StructureTypeRef) -> Result<u32>;
    fn add_structure_value(&mut self, value: StructureValueRef) -> Result<u32>;

    /// True if `process` is the process whose record is being written. A
    /// reference to it is saved as a marker rather than by id.
    fn is_current_process(&self, process: ProcessId) -> bool;
}

/// Save context for places where objects cannot be saved at all.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSaveContext;

impl SaveContext for NullSaveContext {
    fn add_bco(&mut self, _bco: BcoRef) -> Result<u32> {
        Err(Error::Unsupported { what: "subroutine" })
    }

    fn add_hash(&mut self, _hash: HashRef) -> Result<u32> {
        Err(Error::Unsupported { what: "hash" })
    }

    fn add_array(&mut self, _array: ArrayRef) -> Result<u32> {
        Err(Error::Unsupported { what: "array" })
    }

    fn add_structure_type(&mut self, _ty: StructureTypeRef) -> Result<u32> {
        Err(Error::Unsupported {
            what: "structure type",
        })
    }

    fn add_structure_value(&mut self, _value: StructureValueRef) -> Result<u32> {
        Err(Error::Unsupported {
            what: "structure value",
        })
    }

    fn is_current_process(&self, _process: ProcessId) -> bool {
        false
    }
}
