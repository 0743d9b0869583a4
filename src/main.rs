/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use std::fs::File;
use std::io::{self, BufWriter, Write};

use memmap2::Mmap;
use structopt::StructOpt;
use vmsnap::{
    options::Options,
    snapshot::{
        assembler::AssemblerSaveContext, deserializer::ObjectLoader, read_object_file_header,
        records::dump_records, save_context::SaveContext, serializer::FileSaveContext,
    },
    vm::heap::Heap,
    Result,
};

fn run(options: &Options) -> Result<()> {
    let file = File::open(&options.file)?;
    let map = unsafe { Mmap::map(&file)? };
    let mut input = &map[..];
    let stdout = io::stdout();

    if options.records {
        let entry = read_object_file_header(&mut input)?;
        let mut out = stdout.lock();
        writeln!(out, "entry #{}", entry)?;
        dump_records(&mut input, &mut out)?;
        return Ok(());
    }

    let mut heap = Heap::new();
    let mut loader = ObjectLoader::with_options(&mut heap, options);
    loader.set_input_size(map.len());
    let entry = loader.load_object_file(&mut input)?;
    for (ty, id) in loader.unresolved_ids() {
        eprintln!("warning: {} #{} is referenced but never defined", ty.name(), id);
    }
    let processes = loader.take_processes();

    match &options.output {
        Some(path) => {
            let mut ctx = FileSaveContext::with_options(&heap, options);
            let entry_id = ctx.add_bco(entry)?;
            for process in &processes {
                ctx.add_process(process)?;
            }
            let mut out = BufWriter::new(File::create(path)?);
            ctx.save_object_file(&mut out, entry_id)?;
            out.flush()?;
        }
        None => {
            let mut ctx = AssemblerSaveContext::with_options(&heap, options);
            ctx.add_bco(entry)?;
            ctx.save(&mut stdout.lock())?;
            if !processes.is_empty() {
                eprintln!("note: {} process records not shown", processes.len());
            }
        }
    }
    Ok(())
}

fn main() {
    let options = Options::from_args();
    if let Err(e) = run(&options) {
        eprintln!("vmsnap: {}: {}", options.file.display(), e);
        std::process::exit(1);
    }
}
