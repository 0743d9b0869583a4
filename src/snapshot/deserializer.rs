/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
//! Object file reader.
//!
//! Records are read in stream order. A reference to an id that has not been
//! defined yet allocates a blank object of the right kind immediately; the
//! record defining that id later fills it in place. Ids that are never
//! defined keep their blank object and show up in
//! [`ObjectLoader::unresolved_ids`].
use super::{
    read_object_file_header,
    serializer::{BCO_FLAG_PROCEDURE, BCO_FLAG_VARARGS, FRAME_FLAG_WANT_RESULT},
    value_codec::{read_names, read_segment, read_string, ObjectResolver},
    ObjectType, Property, Record, MAX_OBJECT_ID, MIN_RECORD_SIZE,
};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::vm::{
    array::ArrayData,
    bytecode::BytecodeObject,
    hash::HashData,
    heap::{ArrayRef, BcoRef, HashRef, Heap, ProcessId, StructureTypeRef, StructureValueRef},
    opcodes::Instruction,
    process::{ExceptionHandler, Frame, Process, ProcessKind},
    structure::{StructureTypeData, StructureValueData},
};
use byteorder::{ByteOrder, LittleEndian};
use std::io::Read;
use vec_map::VecMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Slot<K> {
    /// Referenced but not yet defined.
    Placeholder(K),
    Loaded(K),
}

impl<K: Copy> Slot<K> {
    fn handle(&self) -> K {
        match *self {
            Slot::Placeholder(k) | Slot::Loaded(k) => k,
        }
    }
}

fn check_id(id: u32, limit: u32) -> Result<()> {
    if id == 0 || id > limit {
        return Err(Error::format(format!(
            "invalid object id {} (limit {})",
            id, limit
        )));
    }
    Ok(())
}

fn resolve_slot<K: Copy>(
    slots: &mut VecMap<Slot<K>>,
    id: u32,
    limit: u32,
    create: impl FnOnce() -> K,
) -> Result<K> {
    check_id(id, limit)?;
    Ok(slots
        .entry(id as usize)
        .or_insert_with(|| Slot::Placeholder(create()))
        .handle())
}

fn define_slot<K: Copy>(
    slots: &mut VecMap<Slot<K>>,
    ty: ObjectType,
    id: u32,
    limit: u32,
    create: impl FnOnce() -> K,
) -> Result<K> {
    check_id(id, limit)?;
    match slots.get(id as usize).copied() {
        Some(Slot::Loaded(_)) => Err(Error::format(format!(
            "{} #{} defined twice",
            ty.name(),
            id
        ))),
        Some(Slot::Placeholder(k)) => {
            slots.insert(id as usize, Slot::Loaded(k));
            Ok(k)
        }
        None => {
            let k = create();
            slots.insert(id as usize, Slot::Loaded(k));
            Ok(k)
        }
    }
}

fn words(property: Property, at_least: usize, what: &str) -> Result<Vec<u32>> {
    let count = property.count as usize;
    if count < at_least || count.checked_mul(4).map_or(true, |n| n > property.data.len()) {
        return Err(Error::format(format!("{} truncated", what)));
    }
    Ok(property.data[..count * 4]
        .chunks_exact(4)
        .map(LittleEndian::read_u32)
        .collect())
}

/// Rebuilds an object graph from a record stream into a heap.
pub struct ObjectLoader<'h> {
    heap: &'h mut Heap,
    bcos: VecMap<Slot<BcoRef>>,
    hashes: VecMap<Slot<HashRef>>,
    arrays: VecMap<Slot<ArrayRef>>,
    structure_types: VecMap<Slot<StructureTypeRef>>,
    structure_values: VecMap<Slot<StructureValueRef>>,
    processes: Vec<Process>,
    current_process: Option<ProcessId>,
    id_limit: u32,
    log: bool,
}

impl<'h> ObjectLoader<'h> {
    pub fn new(heap: &'h mut Heap) -> Self {
        Self {
            heap,
            bcos: VecMap::new(),
            hashes: VecMap::new(),
            arrays: VecMap::new(),
            structure_types: VecMap::new(),
            structure_values: VecMap::new(),
            processes: Vec::new(),
            current_process: None,
            id_limit: MAX_OBJECT_ID,
            log: false,
        }
    }

    pub fn with_options(heap: &'h mut Heap, options: &Options) -> Self {
        let mut loader = Self::new(heap);
        loader.log = options.log_load;
        loader
    }

    pub fn set_log(&mut self, enable: bool) {
        self.log = enable;
    }

    /// Reject ids that a stream of `bytes` bytes cannot define. Ids are
    /// otherwise checked against [`MAX_OBJECT_ID`] only.
    pub fn set_input_size(&mut self, bytes: usize) {
        let limit = (bytes / MIN_RECORD_SIZE).min(MAX_OBJECT_ID as usize);
        self.id_limit = limit as u32;
    }

    pub fn heap(&self) -> &Heap {
        self.heap
    }

    /// Load every record up to the end of `input`.
    pub fn load<R: Read + ?Sized>(&mut self, input: &mut R) -> Result<()> {
        while let Some(record) = Record::read(input)? {
            self.load_record(&record)?;
        }
        Ok(())
    }

    /// Load an object file and return its entry subroutine.
    pub fn load_object_file<R: Read + ?Sized>(&mut self, input: &mut R) -> Result<BcoRef> {
        let entry = read_object_file_header(input)?;
        logln_if!(self.log, "[load] object file, entry #{}", entry);
        self.load(input)?;
        self.resolve_bco(entry)
    }

    fn load_record(&mut self, record: &Record) -> Result<()> {
        let header = record.header;
        let ty = match header.object_type() {
            Some(ty) => ty,
            None => {
                logln_if!(
                    self.log,
                    "[load] skipping record type {} #{} ({} bytes)",
                    header.ty,
                    header.id,
                    header.size
                );
                return Ok(());
            }
        };
        logln_if!(
            self.log,
            "[load] {} #{} ({} bytes)",
            ty.name(),
            header.id,
            header.size
        );
        match ty {
            ObjectType::Bytecode => self.load_bco(record),
            ObjectType::DataHash => self.load_hash(record),
            ObjectType::DataArray => self.load_array(record),
            ObjectType::DataStructType => self.load_structure_type(record),
            ObjectType::DataStructValue => self.load_structure_value(record),
            ObjectType::Process => self.load_process(record),
            ObjectType::Frame => Err(Error::format("frame record outside of a process")),
        }
    }

    fn load_bco(&mut self, record: &Record) -> Result<()> {
        let header = record.property(0);
        if header.count < 1 || header.data.len() < 8 {
            return Err(Error::format("bytecode header truncated"));
        }
        let flags = LittleEndian::read_u16(&header.data[0..2]);
        let mut bco = BytecodeObject {
            is_procedure: flags & BCO_FLAG_PROCEDURE != 0,
            is_varargs: flags & BCO_FLAG_VARARGS != 0,
            min_args: LittleEndian::read_u16(&header.data[2..4]),
            max_args: LittleEndian::read_u16(&header.data[4..6]),
            num_labels: LittleEndian::read_u16(&header.data[6..8]),
            ..BytecodeObject::default()
        };

        let literals = record.property(1);
        bco.literals = read_segment(literals.data, literals.count, self)?;
        let names = record.property(2);
        bco.names = read_names(names.data, names.count)?;
        for word in words(record.property(3), 0, "code")? {
            let insn = Instruction::from_word(word)
                .ok_or_else(|| Error::format(format!("invalid instruction {:#010x}", word)))?;
            bco.code.push(insn);
        }
        let local_names = record.property(4);
        bco.local_names = read_names(local_names.data, local_names.count)?;
        bco.subroutine_name = read_string(record.property(5).data)?;
        bco.file_name = read_string(record.property(6).data)?;
        let lines = record.property(7);
        let pairs = words(
            Property {
                count: lines.count.saturating_mul(2),
                data: lines.data,
            },
            0,
            "line numbers",
        )?;
        bco.line_numbers = pairs.chunks_exact(2).map(|p| (p[0], p[1])).collect();

        if bco.min_args > bco.max_args || bco.max_args as usize > bco.local_names.len() {
            return Err(Error::format(format!(
                "bytecode #{} has inconsistent argument counts",
                record.header.id
            )));
        }

        let heap = &mut *self.heap;
        let r = define_slot(
            &mut self.bcos,
            ObjectType::Bytecode,
            record.header.id,
            self.id_limit,
            || heap.alloc_bco(BytecodeObject::new()),
        )?;
        self.heap.bcos[r] = bco;
        Ok(())
    }

    fn load_hash(&mut self, record: &Record) -> Result<()> {
        let keys = record.property(0);
        let values = record.property(1);
        let hash = HashData {
            keys: read_names(keys.data, keys.count)?,
            values: read_segment(values.data, values.count, self)?,
        };
        if hash.keys.len() != hash.values.len() {
            return Err(Error::format(format!(
                "hash #{} has {} keys but {} values",
                record.header.id,
                hash.keys.len(),
                hash.values.len()
            )));
        }
        let heap = &mut *self.heap;
        let r = define_slot(
            &mut self.hashes,
            ObjectType::DataHash,
            record.header.id,
            self.id_limit,
            || heap.alloc_hash(HashData::new()),
        )?;
        self.heap.hashes[r] = hash;
        Ok(())
    }

    fn load_array(&mut self, record: &Record) -> Result<()> {
        let dimensions = words(record.property(0), 0, "array dimensions")?;
        let content = record.property(1);
        let array = ArrayData {
            dimensions,
            content: read_segment(content.data, content.count, self)?,
        };
        let expected = array.checked_dimension_product().ok_or_else(|| {
            Error::format(format!(
                "array #{} dimensions {:?} are too large",
                record.header.id, array.dimensions
            ))
        })?;
        if array.content.len() != expected {
            return Err(Error::format(format!(
                "array #{} content does not match its dimensions",
                record.header.id
            )));
        }
        let heap = &mut *self.heap;
        let r = define_slot(
            &mut self.arrays,
            ObjectType::DataArray,
            record.header.id,
            self.id_limit,
            || heap.alloc_array(ArrayData::default()),
        )?;
        self.heap.arrays[r] = array;
        Ok(())
    }

    fn load_structure_type(&mut self, record: &Record) -> Result<()> {
        let names = record.property(0);
        let ty = StructureTypeData {
            names: read_names(names.data, names.count)?,
        };
        let heap = &mut *self.heap;
        let r = define_slot(
            &mut self.structure_types,
            ObjectType::DataStructType,
            record.header.id,
            self.id_limit,
            || heap.alloc_structure_type(StructureTypeData::new()),
        )?;
        self.heap.structure_types[r] = ty;
        Ok(())
    }

    fn load_structure_value(&mut self, record: &Record) -> Result<()> {
        let header = words(record.property(0), 1, "structure header")?;
        let ty = match header[0] {
            0 => None,
            id => Some(self.resolve_structure_type(id)?),
        };
        let values = record.property(1);
        let value = StructureValueData {
            ty,
            values: read_segment(values.data, values.count, self)?,
        };
        let heap = &mut *self.heap;
        let r = define_slot(
            &mut self.structure_values,
            ObjectType::DataStructValue,
            record.header.id,
            self.id_limit,
            || heap.alloc_structure_value(StructureValueData::default()),
        )?;
        self.heap.structure_values[r] = value;
        Ok(())
    }

    fn load_process(&mut self, record: &Record) -> Result<()> {
        let id = self.heap.allocate_process_id();
        self.current_process = Some(id);
        let result = self.read_process(record, id);
        self.current_process = None;
        let process = result?;
        if let Err(reason) = process.check_consistency() {
            return Err(Error::format(format!(
                "process '{}': {}",
                process.name, reason
            )));
        }
        self.processes.push(process);
        Ok(())
    }

    fn read_process(&mut self, record: &Record, id: ProcessId) -> Result<Process> {
        let header = words(record.property(0), 3, "process header")?;
        let kind = ProcessKind::from_u32(header[1])
            .ok_or_else(|| Error::format(format!("unknown process kind {}", header[1])))?;
        let mut process = Process {
            id,
            name: read_string(record.property(1).data)?,
            priority: header[0],
            kind,
            context_tos: header[2],
            ..Process::default()
        };

        let frames = record.property(2);
        let mut data = frames.data;
        for _ in 0..frames.count {
            let frame = Record::read(&mut data)?
                .ok_or_else(|| Error::format("process frame list truncated"))?;
            if frame.header.object_type() != Some(ObjectType::Frame) {
                return Err(Error::format("process frame list holds a non-frame record"));
            }
            process.frames.push(self.read_frame(&frame)?);
        }

        let contexts = record.property(3);
        process.contexts = read_segment(contexts.data, contexts.count, self)?;

        let handlers = record.property(4);
        let table = words(
            Property {
                count: handlers.count.saturating_mul(4),
                data: handlers.data,
            },
            0,
            "exception table",
        )?;
        process.exceptions = table
            .chunks_exact(4)
            .map(|h| ExceptionHandler {
                frame_sp: h[0],
                context_sp: h[1],
                value_sp: h[2],
                pc: h[3],
            })
            .collect();

        let values = record.property(5);
        process.values = read_segment(values.data, values.count, self)?;
        Ok(process)
    }

    fn read_frame(&mut self, record: &Record) -> Result<Frame> {
        let header = words(record.property(0), 5, "frame header")?;
        let mut frame = Frame::new(self.resolve_bco(header[0])?);
        frame.pc = header[1];
        frame.context_sp = header[2];
        frame.exception_sp = header[3];
        frame.want_result = header[4] & FRAME_FLAG_WANT_RESULT != 0;
        let locals = record.property(1);
        frame.locals = read_segment(locals.data, locals.count, self)?;
        let names = record.property(2);
        frame.local_names = read_names(names.data, names.count)?;
        Ok(frame)
    }

    pub fn get_bco(&self, id: u32) -> Option<BcoRef> {
        self.bcos.get(id as usize).map(Slot::handle)
    }

    pub fn get_hash(&self, id: u32) -> Option<HashRef> {
        self.hashes.get(id as usize).map(Slot::handle)
    }

    pub fn get_array(&self, id: u32) -> Option<ArrayRef> {
        self.arrays.get(id as usize).map(Slot::handle)
    }

    pub fn get_structure_type(&self, id: u32) -> Option<StructureTypeRef> {
        self.structure_types.get(id as usize).map(Slot::handle)
    }

    pub fn get_structure_value(&self, id: u32) -> Option<StructureValueRef> {
        self.structure_values.get(id as usize).map(Slot::handle)
    }

    /// Ids that were referenced but never defined, by kind.
    pub fn unresolved_ids(&self) -> Vec<(ObjectType, u32)> {
        fn placeholders<K>(ty: ObjectType, slots: &VecMap<Slot<K>>, out: &mut Vec<(ObjectType, u32)>) {
            for (id, slot) in slots.iter() {
                if let Slot::Placeholder(_) = slot {
                    out.push((ty, id as u32));
                }
            }
        }
        let mut out = Vec::new();
        placeholders(ObjectType::Bytecode, &self.bcos, &mut out);
        placeholders(ObjectType::DataHash, &self.hashes, &mut out);
        placeholders(ObjectType::DataArray, &self.arrays, &mut out);
        placeholders(ObjectType::DataStructType, &self.structure_types, &mut out);
        placeholders(ObjectType::DataStructValue, &self.structure_values, &mut out);
        out
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn take_processes(&mut self) -> Vec<Process> {
        std::mem::take(&mut self.processes)
    }
}

impl ObjectResolver for ObjectLoader<'_> {
    fn resolve_bco(&mut self, id: u32) -> Result<BcoRef> {
        let heap = &mut *self.heap;
        resolve_slot(&mut self.bcos, id, self.id_limit, || {
            heap.alloc_bco(BytecodeObject::new())
        })
    }

    fn resolve_hash(&mut self, id: u32) -> Result<HashRef> {
        let heap = &mut *self.heap;
        resolve_slot(&mut self.hashes, id, self.id_limit, || {
            heap.alloc_hash(HashData::new())
        })
    }

    fn resolve_array(&mut self, id: u32) -> Result<ArrayRef> {
        let heap = &mut *self.heap;
        resolve_slot(&mut self.arrays, id, self.id_limit, || {
            heap.alloc_array(ArrayData::default())
        })
    }

    fn resolve_structure_type(&mut self, id: u32) -> Result<StructureTypeRef> {
        let heap = &mut *self.heap;
        resolve_slot(&mut self.structure_types, id, self.id_limit, || {
            heap.alloc_structure_type(StructureTypeData::new())
        })
    }

    fn resolve_structure_value(&mut self, id: u32) -> Result<StructureValueRef> {
        let heap = &mut *self.heap;
        resolve_slot(&mut self.structure_values, id, self.id_limit, || {
            heap.alloc_structure_value(StructureValueData::default())
        })
    }

    fn current_process(&self) -> Option<ProcessId> {
        self.current_process
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{
        save_context::SaveContext, serializer::FileSaveContext, value_codec::write_segment,
        RecordWriter,
    };
    use crate::vm::value::Value;

    fn load(bytes: &[u8], heap: &mut Heap) -> Result<Vec<(ObjectType, u32)>> {
        let mut loader = ObjectLoader::new(heap);
        loader.load(&mut &bytes[..])?;
        Ok(loader.unresolved_ids())
    }

    #[test]
    fn data_objects() {
        let mut heap = Heap::new();
        let ty = heap.alloc_structure_type(StructureTypeData::with_fields(vec!["X", "Y"]));
        let mut point = StructureValueData::new(ty, 2);
        point.set(0, Value::Int(3));
        point.set(1, Value::Float(4.5));
        let point = heap.alloc_structure_value(point);
        let mut grid = ArrayData::new(vec![2, 2]).unwrap();
        grid.set(&[1, 0], Value::StructureValue(point));
        let grid = heap.alloc_array(grid);
        let mut hash = HashData::new();
        hash.set("GRID", Value::Array(grid));
        hash.set("NAME", Value::from("home"));
        let hash = heap.alloc_hash(hash);

        let mut ctx = FileSaveContext::new(&heap);
        let id = ctx.add_hash(hash).unwrap();
        let mut out = Vec::new();
        ctx.save(&mut out).unwrap();

        let mut target = Heap::new();
        let mut loader = ObjectLoader::new(&mut target);
        loader.load(&mut &out[..]).unwrap();
        assert!(loader.unresolved_ids().is_empty());
        let hash = loader.get_hash(id).unwrap();
        let heap = loader.heap();
        let grid = match heap.hashes[hash].get("GRID") {
            Some(Value::Array(r)) => *r,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(heap.arrays[grid].dimensions, vec![2, 2]);
        let point = match heap.arrays[grid].get(&[1, 0]) {
            Some(Value::StructureValue(r)) => *r,
            other => panic!("unexpected {:?}", other),
        };
        let point = &heap.structure_values[point];
        assert_eq!(point.values, vec![Value::Int(3), Value::Float(4.5)]);
        let ty = point.ty.unwrap();
        assert_eq!(heap.structure_types[ty].names.iter().collect::<Vec<_>>(), vec!["X", "Y"]);
        assert_eq!(heap.hashes[hash].get("NAME"), Some(&Value::from("home")));
    }

    #[test]
    fn forward_reference_placeholder() {
        // hash #1 refers to hash #2, which is never defined
        let mut record = RecordWriter::new(ObjectType::DataHash, 1, 2);
        record.write_u32(1).unwrap();
        record.write_bytes(b"K");
        record.end_property(1);
        record.write_bytes(&[5, 0, 2, 0, 0, 0]);
        record.end_property(1);
        let bytes = record.finish();

        let mut heap = Heap::new();
        let mut loader = ObjectLoader::new(&mut heap);
        loader.load(&mut &bytes[..]).unwrap();
        assert_eq!(loader.unresolved_ids(), vec![(ObjectType::DataHash, 2)]);
        let missing = loader.get_hash(2).unwrap();
        assert!(loader.heap().hashes[missing].is_empty());
        let outer = loader.get_hash(1).unwrap();
        assert_eq!(loader.heap().hashes[outer].get("K"), Some(&Value::Hash(missing)));
    }

    #[test]
    fn duplicate_and_invalid_ids() {
        let record = RecordWriter::new(ObjectType::DataStructType, 3, 1).finish();
        let mut twice = record.clone();
        twice.extend_from_slice(&record);
        let mut heap = Heap::new();
        assert!(matches!(load(&twice, &mut heap), Err(Error::Format(_))));

        let zero = RecordWriter::new(ObjectType::DataStructType, 0, 1).finish();
        assert!(matches!(load(&zero, &mut heap), Err(Error::Format(_))));

        let frame = RecordWriter::new(ObjectType::Frame, 0, 3).finish();
        assert!(matches!(load(&frame, &mut heap), Err(Error::Format(_))));
    }

    #[test]
    fn unknown_records_are_skipped() {
        let mut bytes = vec![99, 0, 0, 0, 1, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3];
        bytes.extend_from_slice(&RecordWriter::new(ObjectType::DataStructType, 1, 1).finish());
        let mut heap = Heap::new();
        assert!(load(&bytes, &mut heap).unwrap().is_empty());
        assert_eq!(heap.structure_types.len(), 1);
    }

    #[test]
    fn current_process_outside_process() {
        let mut record = RecordWriter::new(ObjectType::DataArray, 1, 2);
        record.write_u32(1).unwrap();
        record.end_property(1);
        record.write_bytes(&[11, 0, 0, 0, 0, 0]);
        record.end_property(1);
        let bytes = record.finish();
        let mut heap = Heap::new();
        assert!(matches!(load(&bytes, &mut heap), Err(Error::Format(_))));
    }

    #[test]
    fn array_shape_mismatch() {
        let mut heap = Heap::new();
        let mut record = RecordWriter::new(ObjectType::DataArray, 1, 2);
        record.write_u32(3).unwrap();
        record.end_property(1);
        write_segment(
            &mut record,
            &mut crate::snapshot::save_context::NullSaveContext,
            &[Value::Null],
        )
        .unwrap();
        let bytes = record.finish();
        assert!(matches!(load(&bytes, &mut heap), Err(Error::Format(_))));
    }

    #[test]
    fn oversized_array_dimensions() {
        let mut record = RecordWriter::new(ObjectType::DataArray, 1, 2);
        for _ in 0..4 {
            record.write_u32(0x10000).unwrap();
        }
        record.end_property(4);
        record.end_property(0);
        let bytes = record.finish();
        let mut heap = Heap::new();
        assert!(matches!(load(&bytes, &mut heap), Err(Error::Format(_))));
        assert!(heap.arrays.is_empty());
    }

    #[test]
    fn out_of_range_ids() {
        // hash #1 refers to hash #0xffffff
        let mut record = RecordWriter::new(ObjectType::DataHash, 1, 2);
        record.write_u32(1).unwrap();
        record.write_bytes(b"K");
        record.end_property(1);
        record.write_bytes(&[5, 0, 0xff, 0xff, 0xff, 0]);
        record.end_property(1);
        let bytes = record.finish();
        let mut heap = Heap::new();
        assert!(matches!(load(&bytes, &mut heap), Err(Error::Format(_))));

        let far = RecordWriter::new(ObjectType::DataStructType, MAX_OBJECT_ID + 1, 1).finish();
        assert!(matches!(load(&far, &mut heap), Err(Error::Format(_))));
    }

    #[test]
    fn ids_are_bounded_by_input_size() {
        // one record cannot define or need an id above 1
        let mut record = RecordWriter::new(ObjectType::DataHash, 1, 2);
        record.write_u32(1).unwrap();
        record.write_bytes(b"K");
        record.end_property(1);
        record.write_bytes(&[5, 0, 2, 0, 0, 0]);
        record.end_property(1);
        let bytes = record.finish();
        assert!(bytes.len() < 2 * MIN_RECORD_SIZE);

        let mut heap = Heap::new();
        let mut loader = ObjectLoader::new(&mut heap);
        loader.set_input_size(bytes.len());
        assert!(matches!(
            loader.load(&mut &bytes[..]),
            Err(Error::Format(_))
        ));

        let own = RecordWriter::new(ObjectType::DataStructType, 1, 1).finish();
        let mut heap = Heap::new();
        let mut loader = ObjectLoader::new(&mut heap);
        loader.set_input_size(own.len());
        loader.load(&mut &own[..]).unwrap();
        assert!(loader.get_structure_type(1).is_some());
    }

    #[test]
    fn process_round_trip() {
        let mut heap = Heap::new();
        let mut main = BytecodeObject::new_procedure("MAIN");
        main.add_local_variable("I");
        let main = heap.alloc_bco(main);
        let mut process = Process::new(&mut heap, "worker", 40);
        process.kind = ProcessKind::ShipTask;
        process.contexts.push(Value::Null);
        process.context_tos = 1;
        {
            let frame = process.push_frame(Frame::for_bco(&heap, main));
            frame.pc = 7;
            frame.want_result = true;
            frame.locals[0] = Value::Int(12);
        }
        process.exceptions.push(ExceptionHandler {
            frame_sp: 1,
            context_sp: 1,
            value_sp: 0,
            pc: 3,
        });
        process.values.push(Value::Process(process.id));

        let mut ctx = FileSaveContext::new(&heap);
        ctx.add_process(&process).unwrap();
        let mut out = Vec::new();
        ctx.save(&mut out).unwrap();

        let mut target = Heap::new();
        target.allocate_process_id();
        let mut loader = ObjectLoader::new(&mut target);
        loader.load(&mut &out[..]).unwrap();
        let mut loaded = loader.take_processes();
        assert_eq!(loaded.len(), 1);
        let loaded = loaded.remove(0);
        assert_eq!(loaded.id, 2);
        assert_eq!(loaded.name, "worker");
        assert_eq!(loaded.priority, 40);
        assert_eq!(loaded.kind, ProcessKind::ShipTask);
        assert_eq!(loaded.context_tos, 1);
        assert_eq!(loaded.exceptions, process.exceptions);
        assert_eq!(loaded.values, vec![Value::Process(2)]);
        let frame = &loaded.frames[0];
        assert_eq!((frame.pc, frame.context_sp, frame.want_result), (7, 1, true));
        assert_eq!(frame.locals, vec![Value::Int(12)]);
        assert_eq!(frame.local_names.get_name(0), Some("I"));
        assert_eq!(target.bcos[frame.bco].subroutine_name, "MAIN");
    }
}
