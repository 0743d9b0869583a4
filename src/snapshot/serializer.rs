/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
//! Binary object file writer.
//!
//! Saving is split in two phases. The `add_*` calls walk the graph and
//! build a [`Planner`] without producing any output. [`FileSaveContext::save`]
//! then writes one record per planned object, in plan order. During the
//! second phase every reference resolves to an id that is already planned.
use super::{
    planner::{ObjectRef, PlanItem, Planner},
    save_context::SaveContext,
    value_codec::{write_names, write_segment},
    write_object_file_header, ObjectType, RecordWriter,
};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::vm::{
    array::ArrayData,
    bytecode::BytecodeObject,
    hash::HashData,
    heap::{ArrayRef, BcoRef, HashRef, Heap, ProcessId, StructureTypeRef, StructureValueRef},
    process::{Frame, Process},
    structure::{StructureTypeData, StructureValueData},
};
use std::io::Write;

pub const BCO_FLAG_PROCEDURE: u16 = 1;
pub const BCO_FLAG_VARARGS: u16 = 2;
pub const FRAME_FLAG_WANT_RESULT: u32 = 1;

/// Serialize a bytecode object. Without `debug_information` the file name
/// and line number properties are written empty.
pub fn serialize_bco(
    ctx: &mut dyn SaveContext,
    bco: &BytecodeObject,
    id: u32,
    debug_information: bool,
) -> Result<Vec<u8>> {
    let mut record = RecordWriter::new(ObjectType::Bytecode, id, 8);

    let mut flags = 0;
    if bco.is_procedure {
        flags |= BCO_FLAG_PROCEDURE;
    }
    if bco.is_varargs {
        flags |= BCO_FLAG_VARARGS;
    }
    record.write_u16(flags)?;
    record.write_u16(bco.min_args)?;
    record.write_u16(bco.max_args)?;
    record.write_u16(bco.num_labels)?;
    record.end_property(1);

    write_segment(&mut record, ctx, &bco.literals)?;
    write_names(&mut record, &bco.names)?;

    for insn in &bco.code {
        record.write_u32(insn.to_word())?;
    }
    record.end_property(bco.code.len() as u32);

    write_names(&mut record, &bco.local_names)?;
    record.string_property(&bco.subroutine_name);

    if debug_information {
        record.string_property(&bco.file_name);
        for &(pc, line) in &bco.line_numbers {
            record.write_u32(pc)?;
            record.write_u32(line)?;
        }
        record.end_property(bco.line_numbers.len() as u32);
    } else {
        record.end_property(0);
        record.end_property(0);
    }
    Ok(record.finish())
}

pub fn serialize_hash(ctx: &mut dyn SaveContext, hash: &HashData, id: u32) -> Result<Vec<u8>> {
    let mut record = RecordWriter::new(ObjectType::DataHash, id, 2);
    write_names(&mut record, &hash.keys)?;
    write_segment(&mut record, ctx, &hash.values)?;
    Ok(record.finish())
}

pub fn serialize_array(ctx: &mut dyn SaveContext, array: &ArrayData, id: u32) -> Result<Vec<u8>> {
    let mut record = RecordWriter::new(ObjectType::DataArray, id, 2);
    for &dim in &array.dimensions {
        record.write_u32(dim)?;
    }
    record.end_property(array.dimensions.len() as u32);
    write_segment(&mut record, ctx, &array.content)?;
    Ok(record.finish())
}

pub fn serialize_structure_type(ty: &StructureTypeData, id: u32) -> Result<Vec<u8>> {
    let mut record = RecordWriter::new(ObjectType::DataStructType, id, 1);
    write_names(&mut record, &ty.names)?;
    Ok(record.finish())
}

/// Serialize a structure value. A value without a type is written with
/// type id 0.
pub fn serialize_structure_value(
    ctx: &mut dyn SaveContext,
    value: &StructureValueData,
    id: u32,
) -> Result<Vec<u8>> {
    let mut record = RecordWriter::new(ObjectType::DataStructValue, id, 2);
    let type_id = match value.ty {
        Some(ty) => ctx.add_structure_type(ty)?,
        None => 0,
    };
    record.write_u32(type_id)?;
    record.end_property(1);
    write_segment(&mut record, ctx, &value.values)?;
    Ok(record.finish())
}

/// Serialize one frame. Frames only appear nested in process records and
/// always carry id 0.
pub fn serialize_frame(ctx: &mut dyn SaveContext, frame: &Frame) -> Result<Vec<u8>> {
    let mut record = RecordWriter::new(ObjectType::Frame, 0, 3);
    let bco_id = ctx.add_bco(frame.bco)?;
    record.write_u32(bco_id)?;
    record.write_u32(frame.pc)?;
    record.write_u32(frame.context_sp)?;
    record.write_u32(frame.exception_sp)?;
    record.write_u32(if frame.want_result {
        FRAME_FLAG_WANT_RESULT
    } else {
        0
    })?;
    record.end_property(1);
    write_segment(&mut record, ctx, &frame.locals)?;
    write_names(&mut record, &frame.local_names)?;
    Ok(record.finish())
}

pub fn serialize_process(ctx: &mut dyn SaveContext, process: &Process, id: u32) -> Result<Vec<u8>> {
    let mut record = RecordWriter::new(ObjectType::Process, id, 6);
    record.write_u32(process.priority)?;
    record.write_u32(process.kind.to_u32())?;
    record.write_u32(process.context_tos)?;
    record.end_property(1);

    record.string_property(&process.name);

    for frame in &process.frames {
        let frame = serialize_frame(ctx, frame)?;
        record.write_bytes(&frame);
    }
    record.end_property(process.frames.len() as u32);

    write_segment(&mut record, ctx, &process.contexts)?;

    for handler in &process.exceptions {
        record.write_u32(handler.frame_sp)?;
        record.write_u32(handler.context_sp)?;
        record.write_u32(handler.value_sp)?;
        record.write_u32(handler.pc)?;
    }
    record.end_property(process.exceptions.len() as u32);

    write_segment(&mut record, ctx, &process.values)?;
    Ok(record.finish())
}

/// Save context producing a binary object file.
pub struct FileSaveContext<'a> {
    heap: &'a Heap,
    planner: Planner<'a>,
    processes: Vec<&'a Process>,
    current_process: Option<ProcessId>,
    debug_information: bool,
    log: bool,
}

impl<'a> FileSaveContext<'a> {
    pub fn new(heap: &'a Heap) -> Self {
        Self {
            heap,
            planner: Planner::new(heap),
            processes: Vec::new(),
            current_process: None,
            debug_information: true,
            log: false,
        }
    }

    pub fn with_options(heap: &'a Heap, options: &Options) -> Self {
        let mut ctx = Self::new(heap);
        ctx.debug_information = !options.strip_debug;
        ctx.log = options.log_save;
        ctx
    }

    pub fn set_debug_information(&mut self, enable: bool) {
        self.debug_information = enable;
    }

    pub fn set_log(&mut self, enable: bool) {
        self.log = enable;
    }

    /// Schedule a process and everything its stacks refer to.
    pub fn add_process(&mut self, process: &'a Process) -> Result<u32> {
        if let Err(reason) = process.check_consistency() {
            return Err(Error::InvalidProcess {
                name: process.name.clone(),
                reason,
            });
        }
        let index = match self.processes.iter().position(|p| p.id == process.id) {
            Some(index) => index,
            None => {
                self.processes.push(process);
                self.processes.len() - 1
            }
        };
        self.planner.add_process(process, index)
    }

    /// Number of records `save` will write.
    pub fn num_objects(&self) -> usize {
        self.planner.len()
    }

    fn add(&mut self, object: ObjectRef) -> Result<u32> {
        let known = self.planner.len();
        let id = self.planner.add(object)?;
        if self.planner.len() > known {
            logln_if!(self.log, "[save] planned {:?} as #{}", object, id);
        }
        Ok(id)
    }

    /// Write every planned object.
    pub fn save<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<()> {
        let heap = self.heap;
        let mut index = 0;
        while index < self.planner.len() {
            let entry = self.planner.plan()[index];
            index += 1;
            let (ty, bytes) = match entry.item {
                PlanItem::Object(ObjectRef::Bco(r)) => {
                    let debug = self.debug_information;
                    let bytes = serialize_bco(self, &heap.bcos[r], entry.id, debug)?;
                    (ObjectType::Bytecode, bytes)
                }
                PlanItem::Object(ObjectRef::Hash(r)) => (
                    ObjectType::DataHash,
                    serialize_hash(self, &heap.hashes[r], entry.id)?,
                ),
                PlanItem::Object(ObjectRef::Array(r)) => (
                    ObjectType::DataArray,
                    serialize_array(self, &heap.arrays[r], entry.id)?,
                ),
                PlanItem::Object(ObjectRef::StructureType(r)) => (
                    ObjectType::DataStructType,
                    serialize_structure_type(&heap.structure_types[r], entry.id)?,
                ),
                PlanItem::Object(ObjectRef::StructureValue(r)) => (
                    ObjectType::DataStructValue,
                    serialize_structure_value(self, &heap.structure_values[r], entry.id)?,
                ),
                PlanItem::Process(ix) => {
                    let process = self.processes[ix];
                    self.current_process = Some(process.id);
                    let result = serialize_process(self, process, entry.id);
                    self.current_process = None;
                    (ObjectType::Process, result?)
                }
            };
            logln_if!(
                self.log,
                "[save] wrote {} #{} ({} bytes)",
                ty.name(),
                entry.id,
                bytes.len()
            );
            out.write_all(&bytes)?;
        }
        Ok(())
    }

    /// Write an object file: header with `entry_id`, then all planned
    /// objects.
    pub fn save_object_file<W: Write + ?Sized>(&mut self, out: &mut W, entry_id: u32) -> Result<()> {
        write_object_file_header(out, entry_id)?;
        self.save(out)
    }
}

impl SaveContext for FileSaveContext<'_> {
    fn add_bco(&mut self, bco: BcoRef) -> Result<u32> {
        self.add(ObjectRef::Bco(bco))
    }

    fn add_hash(&mut self, hash: HashRef) -> Result<u32> {
        self.add(ObjectRef::Hash(hash))
    }

    fn add_array(&mut self, array: ArrayRef) -> Result<u32> {
        self.add(ObjectRef::Array(array))
    }

    fn add_structure_type(&mut self, ty: StructureTypeRef) -> Result<u32> {
        self.add(ObjectRef::StructureType(ty))
    }

    fn add_structure_value(&mut self, value: StructureValueRef) -> Result<u32> {
        self.add(ObjectRef::StructureValue(value))
    }

    fn is_current_process(&self, process: ProcessId) -> bool {
        self.current_process == Some(process)
    }
}
