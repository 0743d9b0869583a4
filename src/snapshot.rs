/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
//! Object file format.
//!
//! A stream is a sequence of records. Every record is
//! `{type:u32, id:u32, size:u32, num_properties:u32}`, followed by one
//! `{count:u32, byte_size:u32}` directory entry per property and then the
//! property payloads in order. `size` counts everything after the 16-byte
//! header. Object files prepend a header with signature, version and entry
//! point. All integers are little-endian.
use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub mod assembler;
pub mod deserializer;
pub mod planner;
pub mod records;
pub mod save_context;
pub mod serializer;
pub mod value_codec;

pub const MAGIC: [u8; 8] = *b"VMSNAP\x1a\0";
pub const VERSION: u32 = 100;
/// Bytes of object file header following the `header_size` field.
pub const HEADER_SIZE: u32 = 4;

pub const RECORD_HEADER_SIZE: usize = 16;
pub const PROPERTY_ENTRY_SIZE: usize = 8;

/// Largest object id the loader accepts. Writers allocate ids densely from 1.
pub const MAX_OBJECT_ID: u32 = 0x0003_ffff;

/// Smallest record a writer produces: header plus one directory entry.
/// A stream of `n` bytes therefore holds at most `n / MIN_RECORD_SIZE` ids.
pub const MIN_RECORD_SIZE: usize = RECORD_HEADER_SIZE + PROPERTY_ENTRY_SIZE;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Process = 1,
    Bytecode = 2,
    DataHash = 3,
    DataArray = 4,
    DataStructValue = 5,
    DataStructType = 6,
    Frame = 7,
}

impl ObjectType {
    pub fn from_u32(n: u32) -> Option<Self> {
        Some(match n {
            1 => ObjectType::Process,
            2 => ObjectType::Bytecode,
            3 => ObjectType::DataHash,
            4 => ObjectType::DataArray,
            5 => ObjectType::DataStructValue,
            6 => ObjectType::DataStructType,
            7 => ObjectType::Frame,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectType::Process => "Process",
            ObjectType::Bytecode => "Bytecode",
            ObjectType::DataHash => "Hash",
            ObjectType::DataArray => "Array",
            ObjectType::DataStructValue => "StructValue",
            ObjectType::DataStructType => "StructType",
            ObjectType::Frame => "Frame",
        }
    }
}

pub fn write_object_file_header<W: Write + ?Sized>(out: &mut W, entry_id: u32) -> Result<()> {
    out.write_all(&MAGIC)?;
    out.write_u32::<LittleEndian>(VERSION)?;
    out.write_u32::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(HEADER_SIZE)?;
    out.write_u32::<LittleEndian>(entry_id)?;
    Ok(())
}

/// Validate the object file header and return the entry point id.
pub fn read_object_file_header<R: Read + ?Sized>(input: &mut R) -> Result<u32> {
    let mut magic = [0u8; 8];
    input.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(Error::BadMagic);
    }
    let version = input.read_u32::<LittleEndian>()?;
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let _reserved = input.read_u32::<LittleEndian>()?;
    let header_size = input.read_u32::<LittleEndian>()?;
    if header_size < HEADER_SIZE {
        return Err(Error::format(format!("header size {} too small", header_size)));
    }
    let entry_id = input.read_u32::<LittleEndian>()?;
    let skip = (header_size - HEADER_SIZE) as u64;
    let skipped = io::copy(&mut input.take(skip), &mut io::sink())?;
    if skipped != skip {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(entry_id)
}

/// Builds one record in memory. Directory entries are patched as each
/// property is finished, the size field when the record is finished.
pub struct RecordWriter {
    pub(crate) output: Vec<u8>,
    num_properties: usize,
    current: usize,
    property_start: usize,
}

impl RecordWriter {
    pub fn new(ty: ObjectType, id: u32, num_properties: usize) -> Self {
        let mut output =
            vec![0u8; RECORD_HEADER_SIZE + num_properties * PROPERTY_ENTRY_SIZE];
        LittleEndian::write_u32(&mut output[0..4], ty as u32);
        LittleEndian::write_u32(&mut output[4..8], id);
        LittleEndian::write_u32(&mut output[12..16], num_properties as u32);
        let property_start = output.len();
        Self {
            output,
            num_properties,
            current: 0,
            property_start,
        }
    }

    /// Close the current property, which holds `count` elements.
    pub fn end_property(&mut self, count: u32) {
        debug_assert!(self.current < self.num_properties);
        let size = (self.output.len() - self.property_start) as u32;
        let patch_at = RECORD_HEADER_SIZE + self.current * PROPERTY_ENTRY_SIZE;
        LittleEndian::write_u32(&mut self.output[patch_at..patch_at + 4], count);
        LittleEndian::write_u32(&mut self.output[patch_at + 4..patch_at + 8], size);
        self.current += 1;
        self.property_start = self.output.len();
    }

    pub fn write_u16(&mut self, val: u16) -> Result<()> {
        self.output.write_u16::<LittleEndian>(val)?;
        Ok(())
    }

    pub fn write_u32(&mut self, val: u32) -> Result<()> {
        self.output.write_u32::<LittleEndian>(val)?;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    /// Write a string property.
    pub fn string_property(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
        self.end_property(s.len() as u32);
    }

    /// Patch the size field and return the finished record. Properties not
    /// written keep a zero directory entry.
    pub fn finish(mut self) -> Vec<u8> {
        let size = (self.output.len() - RECORD_HEADER_SIZE) as u32;
        LittleEndian::write_u32(&mut self.output[8..12], size);
        self.output
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    /// Raw type; unknown types are passed through so readers can skip them.
    pub ty: u32,
    pub id: u32,
    pub size: u32,
    pub num_properties: u32,
}

impl RecordHeader {
    pub fn object_type(&self) -> Option<ObjectType> {
        ObjectType::from_u32(self.ty)
    }
}

/// One property of a record as read from a stream.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Property<'a> {
    pub count: u32,
    pub data: &'a [u8],
}

/// A record read from a stream, with its property directory resolved.
#[derive(Debug)]
pub struct Record {
    pub header: RecordHeader,
    body: Vec<u8>,
    directory: Vec<(u32, std::ops::Range<usize>)>,
}

impl Record {
    /// Read the next record. Returns `None` at a clean end of stream.
    pub fn read<R: Read + ?Sized>(input: &mut R) -> Result<Option<Record>> {
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        let mut filled = 0;
        while filled < buf.len() {
            match input.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < buf.len() {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        let header = RecordHeader {
            ty: LittleEndian::read_u32(&buf[0..4]),
            id: LittleEndian::read_u32(&buf[4..8]),
            size: LittleEndian::read_u32(&buf[8..12]),
            num_properties: LittleEndian::read_u32(&buf[12..16]),
        };

        let mut body = Vec::new();
        input.take(header.size as u64).read_to_end(&mut body)?;
        if body.len() != header.size as usize {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Record::parse(header, body).map(Some)
    }

    fn parse(header: RecordHeader, body: Vec<u8>) -> Result<Record> {
        let num_properties = header.num_properties as usize;
        let directory_size = num_properties
            .checked_mul(PROPERTY_ENTRY_SIZE)
            .filter(|&n| n <= body.len())
            .ok_or_else(|| {
                Error::format(format!(
                    "record #{} has {} properties but only {} bytes",
                    header.id,
                    num_properties,
                    body.len()
                ))
            })?;
        let mut directory = Vec::with_capacity(num_properties);
        let mut offset = directory_size;
        for i in 0..num_properties {
            let entry = &body[i * PROPERTY_ENTRY_SIZE..];
            let count = LittleEndian::read_u32(&entry[0..4]);
            let size = LittleEndian::read_u32(&entry[4..8]) as usize;
            let end = offset
                .checked_add(size)
                .filter(|&end| end <= body.len())
                .ok_or_else(|| {
                    Error::format(format!(
                        "property {} of record #{} exceeds record size",
                        i + 1,
                        header.id
                    ))
                })?;
            directory.push((count, offset..end));
            offset = end;
        }
        Ok(Record {
            header,
            body,
            directory,
        })
    }

    pub fn num_properties(&self) -> usize {
        self.directory.len()
    }

    /// Property `index` (zero-based). Missing properties read as empty.
    pub fn property(&self, index: usize) -> Property<'_> {
        match self.directory.get(index) {
            Some((count, range)) => Property {
                count: *count,
                data: &self.body[range.clone()],
            },
            None => Property::default(),
        }
    }
}
