/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
//! Structural dump of a record stream, without interpreting payloads.
use super::{ObjectType, Record};
use crate::error::Result;
use std::io::{Read, Write};

fn type_name(ty: u32) -> String {
    match ObjectType::from_u32(ty) {
        Some(ty) => ty.name().to_owned(),
        None => format!("type {}", ty),
    }
}

fn dump_record<W: Write + ?Sized>(record: &Record, indent: usize, out: &mut W) -> Result<()> {
    let header = record.header;
    writeln!(
        out,
        "{:indent$}{} #{}: {} bytes, {} properties",
        "",
        type_name(header.ty),
        header.id,
        header.size,
        header.num_properties,
        indent = indent
    )?;
    for i in 0..record.num_properties() {
        let property = record.property(i);
        writeln!(
            out,
            "{:indent$}  {}: count {}, {} bytes",
            "",
            i + 1,
            property.count,
            property.data.len(),
            indent = indent
        )?;
    }
    if header.object_type() == Some(ObjectType::Process) {
        let frames = record.property(2);
        let mut data = frames.data;
        while let Some(frame) = Record::read(&mut data)? {
            dump_record(&frame, indent + 4, out)?;
        }
    }
    Ok(())
}

/// Write one summary block per record in `input`. Returns the number of
/// top-level records.
pub fn dump_records<R, W>(input: &mut R, out: &mut W) -> Result<usize>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut count = 0;
    while let Some(record) = Record::read(input)? {
        dump_record(&record, 0, out)?;
        count += 1;
    }
    Ok(count)
}
