/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use super::heap::{ArrayRef, BcoRef, HashRef, ProcessId, StructureTypeRef, StructureValueRef};

/// A script value as stored in literal segments, frames, stacks and containers.
///
/// Object kinds refer into the [`Heap`](super::heap::Heap) by handle.
/// `Opaque` preserves values of kinds this crate does not know by their raw
/// tag and auxiliary bytes.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Float(f64),
    String(String),
    Hash(HashRef),
    Array(ArrayRef),
    Subroutine(BcoRef),
    StructureType(StructureTypeRef),
    StructureValue(StructureValueRef),
    Error(String),
    Process(ProcessId),
    Opaque { tag: u16, bytes: Vec<u8> },
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Dispatch to the visitor method matching this value's kind.
    pub fn visit<V: ValueVisitor + ?Sized>(&self, visitor: &mut V) -> Result<(), V::Error> {
        match self {
            Value::Null => visitor.visit_null(),
            Value::Bool(b) => visitor.visit_boolean(*b),
            Value::Int(i) => visitor.visit_integer(*i),
            Value::Float(f) => visitor.visit_float(*f),
            Value::String(s) => visitor.visit_string(s),
            Value::Hash(h) => visitor.visit_hash(*h),
            Value::Array(a) => visitor.visit_vector(*a),
            Value::Subroutine(b) => visitor.visit_subroutine(*b),
            Value::StructureType(t) => visitor.visit_structure_type(*t),
            Value::StructureValue(v) => visitor.visit_structure_value(*v),
            Value::Error(msg) => visitor.visit_error(msg),
            Value::Process(p) => visitor.visit_process(*p),
            Value::Opaque { tag, bytes } => visitor.visit_other(*tag, bytes),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<BcoRef> for Value {
    fn from(b: BcoRef) -> Self {
        Value::Subroutine(b)
    }
}

/// One method per value kind. Implemented by the binary value encoder and
/// the assembler's literal formatter.
pub trait ValueVisitor {
    type Error;

    fn visit_null(&mut self) -> Result<(), Self::Error>;
    fn visit_boolean(&mut self, value: bool) -> Result<(), Self::Error>;
    fn visit_integer(&mut self, value: i32) -> Result<(), Self::Error>;
    fn visit_float(&mut self, value: f64) -> Result<(), Self::Error>;
    fn visit_string(&mut self, value: &str) -> Result<(), Self::Error>;
    fn visit_hash(&mut self, hash: HashRef) -> Result<(), Self::Error>;
    fn visit_vector(&mut self, array: ArrayRef) -> Result<(), Self::Error>;
    fn visit_subroutine(&mut self, bco: BcoRef) -> Result<(), Self::Error>;
    fn visit_structure_type(&mut self, ty: StructureTypeRef) -> Result<(), Self::Error>;
    fn visit_structure_value(&mut self, value: StructureValueRef) -> Result<(), Self::Error>;
    fn visit_process(&mut self, process: ProcessId) -> Result<(), Self::Error>;
    fn visit_other(&mut self, tag: u16, bytes: &[u8]) -> Result<(), Self::Error>;
    fn visit_error(&mut self, message: &str) -> Result<(), Self::Error>;
}
