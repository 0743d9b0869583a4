/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
//! Arena for every object that may be shared between several owners.
//!
//! Objects are addressed by generation-checked handles. Two values refer to
//! the same object exactly when their handles are equal, which is what the
//! save contexts memoize on; cycles are just handles pointing back.
use super::{
    array::ArrayData, bytecode::BytecodeObject, hash::HashData, structure::StructureTypeData,
    structure::StructureValueData,
};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a [`BytecodeObject`].
    pub struct BcoRef;
}
new_key_type! {
    /// Handle to a [`HashData`].
    pub struct HashRef;
}
new_key_type! {
    /// Handle to an [`ArrayData`].
    pub struct ArrayRef;
}
new_key_type! {
    /// Handle to a [`StructureTypeData`].
    pub struct StructureTypeRef;
}
new_key_type! {
    /// Handle to a [`StructureValueData`].
    pub struct StructureValueRef;
}

/// Runtime identifier of a process. Not persisted; a loaded process gets a
/// fresh one.
pub type ProcessId = u32;

#[derive(Default)]
pub struct Heap {
    pub bcos: SlotMap<BcoRef, BytecodeObject>,
    pub hashes: SlotMap<HashRef, HashData>,
    pub arrays: SlotMap<ArrayRef, ArrayData>,
    pub structure_types: SlotMap<StructureTypeRef, StructureTypeData>,
    pub structure_values: SlotMap<StructureValueRef, StructureValueData>,
    next_process_id: ProcessId,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_bco(&mut self, bco: BytecodeObject) -> BcoRef {
        self.bcos.insert(bco)
    }

    pub fn alloc_hash(&mut self, hash: HashData) -> HashRef {
        self.hashes.insert(hash)
    }

    pub fn alloc_array(&mut self, array: ArrayData) -> ArrayRef {
        self.arrays.insert(array)
    }

    pub fn alloc_structure_type(&mut self, ty: StructureTypeData) -> StructureTypeRef {
        self.structure_types.insert(ty)
    }

    pub fn alloc_structure_value(&mut self, value: StructureValueData) -> StructureValueRef {
        self.structure_values.insert(value)
    }

    /// Hand out a process id. Ids start at 1.
    pub fn allocate_process_id(&mut self) -> ProcessId {
        self.next_process_id += 1;
        self.next_process_id
    }

    /// Total number of live objects of all kinds.
    pub fn object_count(&self) -> usize {
        self.bcos.len()
            + self.hashes.len()
            + self.arrays.len()
            + self.structure_types.len()
            + self.structure_values.len()
    }
}
