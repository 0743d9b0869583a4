/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
//! Write order for an object graph.
//!
//! Adding an object assigns its id first, then walks its children, then
//! appends it to the plan. Children therefore come before their parents;
//! a child that is already on the walk stack (a cycle) just reuses the id
//! it has been given and is referenced forward.
use crate::error::{Error, Result};
use crate::vm::{
    heap::{ArrayRef, BcoRef, HashRef, Heap, ProcessId, StructureTypeRef, StructureValueRef},
    process::Process,
    value::Value,
};
use std::collections::HashMap;

/// Identity of a shared object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Bco(BcoRef),
    Hash(HashRef),
    Array(ArrayRef),
    StructureType(StructureTypeRef),
    StructureValue(StructureValueRef),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlanItem {
    Object(ObjectRef),
    /// Index into the process list of the owning save context.
    Process(usize),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlanEntry {
    pub item: PlanItem,
    pub id: u32,
}

pub struct Planner<'a> {
    heap: &'a Heap,
    ids: HashMap<ObjectRef, u32>,
    process_ids: HashMap<ProcessId, u32>,
    plan: Vec<PlanEntry>,
    next_id: u32,
}

impl<'a> Planner<'a> {
    pub fn new(heap: &'a Heap) -> Self {
        Self {
            heap,
            ids: HashMap::new(),
            process_ids: HashMap::new(),
            plan: Vec::new(),
            next_id: 0,
        }
    }

    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn exists(&self, object: ObjectRef) -> bool {
        let heap = self.heap;
        match object {
            ObjectRef::Bco(r) => heap.bcos.contains_key(r),
            ObjectRef::Hash(r) => heap.hashes.contains_key(r),
            ObjectRef::Array(r) => heap.arrays.contains_key(r),
            ObjectRef::StructureType(r) => heap.structure_types.contains_key(r),
            ObjectRef::StructureValue(r) => heap.structure_values.contains_key(r),
        }
    }

    /// Id of `object`, scheduling it and everything it refers to if this is
    /// the first time it is seen.
    pub fn add(&mut self, object: ObjectRef) -> Result<u32> {
        if let Some(&id) = self.ids.get(&object) {
            return Ok(id);
        }
        if !self.exists(object) {
            return Err(Error::Unsupported {
                what: "stale object handle",
            });
        }
        let id = self.allocate_id();
        self.ids.insert(object, id);
        self.add_children(object)?;
        self.plan.push(PlanEntry {
            item: PlanItem::Object(object),
            id,
        });
        Ok(id)
    }

    fn add_children(&mut self, object: ObjectRef) -> Result<()> {
        let heap = self.heap;
        match object {
            ObjectRef::Bco(r) => self.add_values(&heap.bcos[r].literals),
            ObjectRef::Hash(r) => self.add_values(&heap.hashes[r].values),
            ObjectRef::Array(r) => self.add_values(&heap.arrays[r].content),
            ObjectRef::StructureType(_) => Ok(()),
            ObjectRef::StructureValue(r) => {
                let value = &heap.structure_values[r];
                if let Some(ty) = value.ty {
                    self.add(ObjectRef::StructureType(ty))?;
                }
                self.add_values(&value.values)
            }
        }
    }

    pub fn add_value(&mut self, value: &Value) -> Result<()> {
        match *value {
            Value::Hash(r) => self.add(ObjectRef::Hash(r)).map(drop),
            Value::Array(r) => self.add(ObjectRef::Array(r)).map(drop),
            Value::Subroutine(r) => self.add(ObjectRef::Bco(r)).map(drop),
            Value::StructureType(r) => self.add(ObjectRef::StructureType(r)).map(drop),
            Value::StructureValue(r) => self.add(ObjectRef::StructureValue(r)).map(drop),
            _ => Ok(()),
        }
    }

    pub fn add_values(&mut self, values: &[Value]) -> Result<()> {
        for value in values {
            self.add_value(value)?;
        }
        Ok(())
    }

    /// Schedule a process record. `index` identifies the process to the
    /// caller when the plan is executed.
    pub fn add_process(&mut self, process: &Process, index: usize) -> Result<u32> {
        if let Some(&id) = self.process_ids.get(&process.id) {
            return Ok(id);
        }
        let id = self.allocate_id();
        self.process_ids.insert(process.id, id);
        for frame in &process.frames {
            self.add(ObjectRef::Bco(frame.bco))?;
            self.add_values(&frame.locals)?;
        }
        self.add_values(&process.contexts)?;
        self.add_values(&process.values)?;
        self.plan.push(PlanEntry {
            item: PlanItem::Process(index),
            id,
        });
        Ok(id)
    }

    pub fn id_of(&self, object: ObjectRef) -> Option<u32> {
        self.ids.get(&object).copied()
    }

    pub fn plan(&self) -> &[PlanEntry] {
        &self.plan
    }

    pub fn len(&self) -> usize {
        self.plan.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plan.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{
        bytecode::BytecodeObject, hash::HashData, structure::StructureTypeData,
        structure::StructureValueData,
    };

    fn position(planner: &Planner, object: ObjectRef) -> usize {
        planner
            .plan()
            .iter()
            .position(|e| e.item == PlanItem::Object(object))
            .unwrap()
    }

    #[test]
    fn dependencies_come_first() {
        let mut heap = Heap::new();
        let ty = heap.alloc_structure_type(StructureTypeData::with_fields(vec!["A"]));
        let value = heap.alloc_structure_value(StructureValueData::new(ty, 1));
        let mut hash = HashData::new();
        hash.set("V", Value::StructureValue(value));
        let hash = heap.alloc_hash(hash);
        let mut bco = BytecodeObject::new();
        bco.add_literal(Value::Hash(hash));
        let bco = heap.alloc_bco(bco);

        let mut planner = Planner::new(&heap);
        let id = planner.add(ObjectRef::Bco(bco)).unwrap();
        assert_eq!(id, 1);
        assert_eq!(planner.len(), 4);
        assert!(
            position(&planner, ObjectRef::StructureType(ty))
                < position(&planner, ObjectRef::StructureValue(value))
        );
        assert!(
            position(&planner, ObjectRef::StructureValue(value))
                < position(&planner, ObjectRef::Hash(hash))
        );
        assert_eq!(position(&planner, ObjectRef::Bco(bco)), 3);
    }

    #[test]
    fn idempotent() {
        let mut heap = Heap::new();
        let bco = heap.alloc_bco(BytecodeObject::new());
        let mut planner = Planner::new(&heap);
        let a = planner.add(ObjectRef::Bco(bco)).unwrap();
        let b = planner.add(ObjectRef::Bco(bco)).unwrap();
        assert_eq!(a, b);
        assert_eq!(planner.len(), 1);
    }

    #[test]
    fn cycles() {
        let mut heap = Heap::new();
        let a = heap.alloc_bco(BytecodeObject::new_procedure("A"));
        let b = heap.alloc_bco(BytecodeObject::new_procedure("B"));
        heap.bcos[a].add_literal(Value::Subroutine(b));
        heap.bcos[b].add_literal(Value::Subroutine(a));
        heap.bcos[b].add_literal(Value::Subroutine(b));

        let mut planner = Planner::new(&heap);
        assert_eq!(planner.add(ObjectRef::Bco(a)).unwrap(), 1);
        assert_eq!(planner.id_of(ObjectRef::Bco(b)), Some(2));
        let order: Vec<u32> = planner.plan().iter().map(|e| e.id).collect();
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn stale_handle() {
        let mut heap = Heap::new();
        let bco = heap.alloc_bco(BytecodeObject::new());
        heap.bcos.remove(bco);
        let mut planner = Planner::new(&heap);
        assert!(planner.add(ObjectRef::Bco(bco)).is_err());
    }
}
