/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
//! Encoding of value segments and name lists.
//!
//! A segment of `n` values is `n` slots of `{tag:u16, payload:u32}`
//! followed by the auxiliary data of all slots, in slot order.
use super::save_context::SaveContext;
use super::RecordWriter;
use crate::error::{Error, Result};
use crate::vm::{
    heap::{ArrayRef, BcoRef, HashRef, ProcessId, StructureTypeRef, StructureValueRef},
    name_map::NameMap,
    value::{Value, ValueVisitor},
};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

pub mod tag {
    pub const NULL: u16 = 0;
    pub const INTEGER: u16 = 1;
    pub const BOOLEAN: u16 = 2;
    pub const FLOAT: u16 = 3;
    pub const STRING: u16 = 4;
    pub const HASH: u16 = 5;
    pub const ARRAY: u16 = 6;
    pub const SUBROUTINE: u16 = 7;
    pub const STRUCTURE_TYPE: u16 = 8;
    pub const STRUCTURE_VALUE: u16 = 9;
    pub const ERROR: u16 = 10;
    pub const CURRENT_PROCESS: u16 = 11;
    /// Tags from here on are opaque: payload is the auxiliary data length.
    pub const OPAQUE_MIN: u16 = 0x8000;
}

pub const SLOT_SIZE: usize = 6;

/// Encodes values into tag slots and auxiliary data, asking the save context
/// for the id of every referenced object.
pub struct ValueEncoder<'c> {
    ctx: &'c mut dyn SaveContext,
    slots: Vec<u8>,
    aux: Vec<u8>,
}

impl<'c> ValueEncoder<'c> {
    pub fn new(ctx: &'c mut dyn SaveContext) -> Self {
        Self {
            ctx,
            slots: Vec::new(),
            aux: Vec::new(),
        }
    }

    fn slot(&mut self, tag: u16, payload: u32) -> Result<()> {
        self.slots.write_u16::<LittleEndian>(tag)?;
        self.slots.write_u32::<LittleEndian>(payload)?;
        Ok(())
    }

    fn slot_with_aux(&mut self, tag: u16, bytes: &[u8]) -> Result<()> {
        self.slot(tag, bytes.len() as u32)?;
        self.aux.extend_from_slice(bytes);
        Ok(())
    }

    /// Slots followed by auxiliary data.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.slots.append(&mut self.aux);
        self.slots
    }
}

impl ValueVisitor for ValueEncoder<'_> {
    type Error = Error;

    fn visit_null(&mut self) -> Result<()> {
        self.slot(tag::NULL, 0)
    }

    fn visit_boolean(&mut self, value: bool) -> Result<()> {
        self.slot(tag::BOOLEAN, value as u32)
    }

    fn visit_integer(&mut self, value: i32) -> Result<()> {
        self.slot(tag::INTEGER, value as u32)
    }

    fn visit_float(&mut self, value: f64) -> Result<()> {
        self.slot(tag::FLOAT, 0)?;
        self.aux.write_f64::<LittleEndian>(value)?;
        Ok(())
    }

    fn visit_string(&mut self, value: &str) -> Result<()> {
        self.slot_with_aux(tag::STRING, value.as_bytes())
    }

    fn visit_hash(&mut self, hash: HashRef) -> Result<()> {
        let id = self.ctx.add_hash(hash)?;
        self.slot(tag::HASH, id)
    }

    fn visit_vector(&mut self, array: ArrayRef) -> Result<()> {
        let id = self.ctx.add_array(array)?;
        self.slot(tag::ARRAY, id)
    }

    fn visit_subroutine(&mut self, bco: BcoRef) -> Result<()> {
        let id = self.ctx.add_bco(bco)?;
        self.slot(tag::SUBROUTINE, id)
    }

    fn visit_structure_type(&mut self, ty: StructureTypeRef) -> Result<()> {
        let id = self.ctx.add_structure_type(ty)?;
        self.slot(tag::STRUCTURE_TYPE, id)
    }

    fn visit_structure_value(&mut self, value: StructureValueRef) -> Result<()> {
        let id = self.ctx.add_structure_value(value)?;
        self.slot(tag::STRUCTURE_VALUE, id)
    }

    fn visit_process(&mut self, process: ProcessId) -> Result<()> {
        if self.ctx.is_current_process(process) {
            self.slot(tag::CURRENT_PROCESS, 0)
        } else {
            Err(Error::Unsupported {
                what: "reference to another process",
            })
        }
    }

    fn visit_other(&mut self, raw_tag: u16, bytes: &[u8]) -> Result<()> {
        if raw_tag < tag::OPAQUE_MIN {
            return Err(Error::Unsupported {
                what: "opaque value with reserved tag",
            });
        }
        self.slot_with_aux(raw_tag, bytes)
    }

    fn visit_error(&mut self, message: &str) -> Result<()> {
        self.slot_with_aux(tag::ERROR, message.as_bytes())
    }
}

/// Write `values` as a complete segment property.
pub fn write_segment(
    record: &mut RecordWriter,
    ctx: &mut dyn SaveContext,
    values: &[Value],
) -> Result<()> {
    let mut encoder = ValueEncoder::new(ctx);
    for value in values {
        value.visit(&mut encoder)?;
    }
    record.write_bytes(&encoder.into_bytes());
    record.end_property(values.len() as u32);
    Ok(())
}

/// Encode a single value, returning `(tag, payload, aux)`.
pub fn encode_value(ctx: &mut dyn SaveContext, value: &Value) -> Result<(u16, u32, Vec<u8>)> {
    let mut encoder = ValueEncoder::new(ctx);
    value.visit(&mut encoder)?;
    let tag = LittleEndian::read_u16(&encoder.slots[0..2]);
    let payload = LittleEndian::read_u32(&encoder.slots[2..6]);
    Ok((tag, payload, encoder.aux))
}

/// Write a name list property: one length per name, then the bytes.
pub fn write_names(record: &mut RecordWriter, names: &NameMap) -> Result<()> {
    for name in names.iter() {
        record.write_u32(name.len() as u32)?;
    }
    for name in names.iter() {
        record.write_bytes(name.as_bytes());
    }
    record.end_property(names.len() as u32);
    Ok(())
}

/// Supplies live objects for ids found while decoding values.
pub trait ObjectResolver {
    fn resolve_bco(&mut self, id: u32) -> Result<BcoRef>;
    fn resolve_hash(&mut self, id: u32) -> Result<HashRef>;
    fn resolve_array(&mut self, id: u32) -> Result<ArrayRef>;
    fn resolve_structure_type(&mut self, id: u32) -> Result<StructureTypeRef>;
    fn resolve_structure_value(&mut self, id: u32) -> Result<StructureValueRef>;

    /// The process being loaded, if any.
    fn current_process(&self) -> Option<ProcessId>;
}

fn take<'a>(aux: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if aux.len() < len {
        return Err(Error::format("value data truncated"));
    }
    let (head, tail) = aux.split_at(len);
    *aux = tail;
    Ok(head)
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::format("string is not valid UTF-8"))
}

/// Decode a segment of `count` values.
pub fn read_segment(
    data: &[u8],
    count: u32,
    resolver: &mut dyn ObjectResolver,
) -> Result<Vec<Value>> {
    let count = count as usize;
    let slots_size = count
        .checked_mul(SLOT_SIZE)
        .filter(|&n| n <= data.len())
        .ok_or_else(|| Error::format("value segment truncated"))?;
    let (slots, mut aux) = data.split_at(slots_size);
    let mut values = Vec::with_capacity(count);
    for slot in slots.chunks_exact(SLOT_SIZE) {
        let raw_tag = LittleEndian::read_u16(&slot[0..2]);
        let payload = LittleEndian::read_u32(&slot[2..6]);
        let value = match raw_tag {
            tag::NULL => Value::Null,
            tag::INTEGER => Value::Int(payload as i32),
            tag::BOOLEAN => Value::Bool(payload != 0),
            tag::FLOAT => Value::Float(LittleEndian::read_f64(take(&mut aux, 8)?)),
            tag::STRING => Value::String(utf8(take(&mut aux, payload as usize)?)?),
            tag::HASH => Value::Hash(resolver.resolve_hash(payload)?),
            tag::ARRAY => Value::Array(resolver.resolve_array(payload)?),
            tag::SUBROUTINE => Value::Subroutine(resolver.resolve_bco(payload)?),
            tag::STRUCTURE_TYPE => {
                Value::StructureType(resolver.resolve_structure_type(payload)?)
            }
            tag::STRUCTURE_VALUE => {
                Value::StructureValue(resolver.resolve_structure_value(payload)?)
            }
            tag::ERROR => Value::Error(utf8(take(&mut aux, payload as usize)?)?),
            tag::CURRENT_PROCESS => match resolver.current_process() {
                Some(process) => Value::Process(process),
                None => {
                    return Err(Error::format(
                        "reference to current process outside of a process",
                    ))
                }
            },
            opaque if opaque >= tag::OPAQUE_MIN => Value::Opaque {
                tag: opaque,
                bytes: take(&mut aux, payload as usize)?.to_vec(),
            },
            unknown => return Err(Error::format(format!("unknown value tag {}", unknown))),
        };
        values.push(value);
    }
    Ok(values)
}

/// Decode a name list of `count` names.
pub fn read_names(data: &[u8], count: u32) -> Result<NameMap> {
    let count = count as usize;
    let lengths_size = count
        .checked_mul(4)
        .filter(|&n| n <= data.len())
        .ok_or_else(|| Error::format("name list truncated"))?;
    let (lengths, mut bytes) = data.split_at(lengths_size);
    let mut names = NameMap::new();
    for length in lengths.chunks_exact(4) {
        let name = take(&mut bytes, LittleEndian::read_u32(length) as usize)
            .map_err(|_| Error::format("name list truncated"))?;
        let name =
            std::str::from_utf8(name).map_err(|_| Error::format("name is not valid UTF-8"))?;
        if names.get_index(name).is_some() {
            return Err(Error::format(format!("duplicate name '{}'", name)));
        }
        names.add(name);
    }
    Ok(names)
}

/// Decode a string property.
pub fn read_string(data: &[u8]) -> Result<String> {
    utf8(data)
}
