/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
//! Assembler listing writer.
//!
//! Only subroutines and structure types have a textual form. Objects are
//! rendered in the order they were first added; rendering an object may add
//! more. Objects referenced before their body is rendered get a forward
//! declaration at the top of the listing.
use super::{planner::ObjectRef, save_context::SaveContext, value_codec::tag};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::utils::{is_valid_identifier, quote_string};
use crate::vm::{
    bytecode::BytecodeObject,
    heap::{ArrayRef, BcoRef, HashRef, Heap, ProcessId, StructureTypeRef, StructureValueRef},
    name_map::NameMap,
    opcodes::{Instruction, Operand},
    structure::StructureTypeData,
    value::ValueVisitor,
};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::io;

struct Entry {
    object: ObjectRef,
    name: String,
    is_sequenced: bool,
    need_declaration: bool,
}

pub struct AssemblerSaveContext<'a> {
    heap: &'a Heap,
    entries: Vec<Entry>,
    index: HashMap<ObjectRef, usize>,
    used_names: HashSet<String>,
    counter: u32,
    debug_information: bool,
}

impl<'a> AssemblerSaveContext<'a> {
    pub fn new(heap: &'a Heap) -> Self {
        Self {
            heap,
            entries: Vec::new(),
            index: HashMap::new(),
            used_names: HashSet::new(),
            counter: 0,
            debug_information: true,
        }
    }

    pub fn with_options(heap: &'a Heap, options: &Options) -> Self {
        let mut ctx = Self::new(heap);
        ctx.debug_information = !options.strip_debug;
        ctx
    }

    pub fn set_debug_information(&mut self, enable: bool) {
        self.debug_information = enable;
    }

    /// Label assigned to an object, if it has been added.
    pub fn name_of(&self, object: ObjectRef) -> Option<&str> {
        self.index
            .get(&object)
            .map(|&ix| self.entries[ix].name.as_str())
    }

    fn make_name(&mut self, preferred: &str, prefix: &str) -> String {
        if is_valid_identifier(preferred)
            && preferred == preferred.to_uppercase()
            && !self.used_names.contains(preferred)
        {
            self.used_names.insert(preferred.to_owned());
            return preferred.to_owned();
        }
        loop {
            self.counter += 1;
            let candidate = format!("{}{}", prefix, self.counter);
            if !self.used_names.contains(&candidate) {
                self.used_names.insert(candidate.clone());
                return candidate;
            }
        }
    }

    fn add(&mut self, object: ObjectRef) -> Result<u32> {
        let ix = match self.index.get(&object) {
            Some(&ix) => ix,
            None => {
                let heap = self.heap;
                let name = match object {
                    ObjectRef::Bco(r) => {
                        let bco = heap.bcos.get(r).ok_or(Error::Unsupported {
                            what: "stale object handle",
                        })?;
                        self.make_name(&bco.subroutine_name, "BCO")
                    }
                    ObjectRef::StructureType(r) => {
                        if !heap.structure_types.contains_key(r) {
                            return Err(Error::Unsupported {
                                what: "stale object handle",
                            });
                        }
                        self.make_name("", "TYPE")
                    }
                    _ => {
                        return Err(Error::Unsupported {
                            what: "object without textual form",
                        })
                    }
                };
                self.entries.push(Entry {
                    object,
                    name,
                    is_sequenced: false,
                    need_declaration: false,
                });
                self.index.insert(object, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[ix];
        if !entry.is_sequenced {
            entry.need_declaration = true;
        }
        Ok(ix as u32 + 1)
    }

    /// Write the listing of every object added so far.
    pub fn save<W: io::Write + ?Sized>(&mut self, out: &mut W) -> Result<()> {
        for entry in &mut self.entries {
            entry.is_sequenced = false;
            entry.need_declaration = false;
        }
        let heap = self.heap;
        let mut bodies = Vec::new();
        let mut ix = 0;
        while ix < self.entries.len() {
            self.entries[ix].is_sequenced = true;
            let body = match self.entries[ix].object {
                ObjectRef::Bco(r) => self.render_bco(ix, &heap.bcos[r])?,
                ObjectRef::StructureType(r) => {
                    self.render_structure_type(ix, &heap.structure_types[r])?
                }
                _ => {
                    return Err(Error::Unsupported {
                        what: "object without textual form",
                    })
                }
            };
            bodies.push(body);
            ix += 1;
        }

        let mut any_declaration = false;
        for entry in &self.entries {
            if !entry.need_declaration {
                continue;
            }
            let keyword = match entry.object {
                ObjectRef::Bco(r) if heap.bcos[r].is_procedure => "Sub",
                ObjectRef::Bco(_) => "Function",
                _ => "Struct",
            };
            writeln!(out, "Declare {} {}", keyword, entry.name)?;
            any_declaration = true;
        }
        if any_declaration {
            writeln!(out)?;
        }
        for (i, body) in bodies.iter().enumerate() {
            if i != 0 {
                writeln!(out)?;
            }
            out.write_all(body.as_bytes())?;
        }
        Ok(())
    }

    fn render_structure_type(&mut self, ix: usize, ty: &StructureTypeData) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "Struct {}", self.entries[ix].name)?;
        if !ty.names.is_empty() {
            let fields: Vec<&str> = ty.names.iter().collect();
            writeln!(out, "  .field {}", fields.join(", "))?;
        }
        writeln!(out, "EndStruct")?;
        Ok(out)
    }

    fn render_bco(&mut self, ix: usize, bco: &BytecodeObject) -> Result<String> {
        let name = self.entries[ix].name.clone();
        let keyword = if bco.is_procedure { "Sub" } else { "Function" };
        let mut out = String::new();

        write!(out, "{} {}", keyword, name)?;
        if bco.max_args > 0 {
            let mut args = Vec::with_capacity(bco.max_args as usize);
            for i in 0..bco.max_args {
                let mut arg = String::new();
                if i >= bco.min_args {
                    arg.push_str("Optional ");
                }
                arg.push_str(&local_name(&bco.local_names, i));
                if bco.is_varargs && i + 1 == bco.max_args {
                    arg.push_str("()");
                }
                args.push(arg);
            }
            write!(out, " ({})", args.join(", "))?;
        }
        writeln!(out)?;

        if !bco.subroutine_name.is_empty() && bco.subroutine_name != name {
            writeln!(out, "  .name {}", bco.subroutine_name)?;
        }
        if self.debug_information && !bco.file_name.is_empty() {
            writeln!(out, "  .file {}", quote_string(&bco.file_name))?;
        }
        for local in bco.local_names.iter().skip(bco.max_args as usize) {
            writeln!(out, "  .local {}", local)?;
        }

        let mut lines = bco.line_numbers.iter().peekable();
        for (pc, &insn) in bco.code.iter().enumerate() {
            if self.debug_information {
                while let Some(&&(at, line)) = lines.peek() {
                    if at as usize > pc {
                        break;
                    }
                    if at as usize == pc {
                        writeln!(out, "  .line {}", line)?;
                    }
                    lines.next();
                }
            }
            if insn.is_label() {
                writeln!(out, "  L{}:", insn.arg)?;
                continue;
            }
            let operand = self.format_operand(bco, insn)?;
            let line = format!("    {:<12}{}", insn.mnemonic(), operand);
            writeln!(out, "{}", line.trim_end())?;
        }
        if self.debug_information {
            for &(at, line) in lines {
                if at as usize == bco.code.len() {
                    writeln!(out, "  .line {}", line)?;
                }
            }
        }
        writeln!(out, "End{}", keyword)?;
        Ok(out)
    }

    fn format_operand(&mut self, bco: &BytecodeObject, insn: Instruction) -> Result<String> {
        Ok(match insn.operand() {
            Operand::None => String::new(),
            Operand::Name => match bco.names.get_name(insn.arg as u32) {
                Some(name) => name.to_owned(),
                None => format!("#{}", insn.arg),
            },
            Operand::Local => local_name(&bco.local_names, insn.arg),
            Operand::Literal => match bco.literals.get(insn.arg as usize) {
                Some(value) => {
                    let mut formatter = LiteralFormatter {
                        ctx: self,
                        output: String::new(),
                    };
                    value.visit(&mut formatter)?;
                    formatter.output
                }
                None => format!("#{}", insn.arg),
            },
            Operand::Integer | Operand::Boolean => (insn.arg as i16).to_string(),
            Operand::Label => format!("L{}", insn.arg),
            Operand::Address => format!("#{}", insn.arg),
            Operand::Count => insn.arg.to_string(),
        })
    }
}

fn local_name(names: &NameMap, index: u16) -> String {
    match names.get_name(index as u32) {
        Some(name) => name.to_owned(),
        None => format!("#{}", index),
    }
}

/// Formats a literal the way the assembler reads it back.
struct LiteralFormatter<'c, 'a> {
    ctx: &'c mut AssemblerSaveContext<'a>,
    output: String,
}

impl LiteralFormatter<'_, '_> {
    fn raw(&mut self, raw_tag: u16, payload: usize) -> Result<()> {
        write!(self.output, "({:#06x},{})", raw_tag, payload)?;
        Ok(())
    }

    fn label(&mut self, object: ObjectRef) -> Result<()> {
        self.ctx.add(object)?;
        if let Some(name) = self.ctx.name_of(object) {
            self.output.push_str(name);
        }
        Ok(())
    }
}

impl ValueVisitor for LiteralFormatter<'_, '_> {
    type Error = Error;

    fn visit_null(&mut self) -> Result<()> {
        self.output.push_str("Z(0)");
        Ok(())
    }

    fn visit_boolean(&mut self, value: bool) -> Result<()> {
        self.output.push_str(if value { "True" } else { "False" });
        Ok(())
    }

    fn visit_integer(&mut self, value: i32) -> Result<()> {
        write!(self.output, "{}", value)?;
        Ok(())
    }

    fn visit_float(&mut self, value: f64) -> Result<()> {
        write!(self.output, "{:?}", value)?;
        Ok(())
    }

    fn visit_string(&mut self, value: &str) -> Result<()> {
        self.output.push_str(&quote_string(value));
        Ok(())
    }

    fn visit_hash(&mut self, hash: HashRef) -> Result<()> {
        self.ctx.add_hash(hash).map(drop)
    }

    fn visit_vector(&mut self, array: ArrayRef) -> Result<()> {
        self.ctx.add_array(array).map(drop)
    }

    fn visit_subroutine(&mut self, bco: BcoRef) -> Result<()> {
        self.label(ObjectRef::Bco(bco))
    }

    fn visit_structure_type(&mut self, ty: StructureTypeRef) -> Result<()> {
        self.label(ObjectRef::StructureType(ty))
    }

    fn visit_structure_value(&mut self, value: StructureValueRef) -> Result<()> {
        self.ctx.add_structure_value(value).map(drop)
    }

    fn visit_process(&mut self, _process: ProcessId) -> Result<()> {
        Err(Error::Unsupported {
            what: "process reference in a literal",
        })
    }

    fn visit_other(&mut self, raw_tag: u16, bytes: &[u8]) -> Result<()> {
        self.raw(raw_tag, bytes.len())
    }

    fn visit_error(&mut self, message: &str) -> Result<()> {
        self.raw(tag::ERROR, message.len())
    }
}

impl SaveContext for AssemblerSaveContext<'_> {
    fn add_bco(&mut self, bco: BcoRef) -> Result<u32> {
        self.add(ObjectRef::Bco(bco))
    }

    fn add_hash(&mut self, _hash: HashRef) -> Result<u32> {
        Err(Error::Unsupported {
            what: "hash in assembler output",
        })
    }

    fn add_array(&mut self, _array: ArrayRef) -> Result<u32> {
        Err(Error::Unsupported {
            what: "array in assembler output",
        })
    }

    fn add_structure_type(&mut self, ty: StructureTypeRef) -> Result<u32> {
        self.add(ObjectRef::StructureType(ty))
    }

    fn add_structure_value(&mut self, _value: StructureValueRef) -> Result<u32> {
        Err(Error::Unsupported {
            what: "structure value in assembler output",
        })
    }

    fn is_current_process(&self, _process: ProcessId) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{
        hash::HashData,
        opcodes::{jump, scope, Major},
        value::Value,
    };

    fn listing(ctx: &mut AssemblerSaveContext) -> String {
        let mut out = Vec::new();
        ctx.save(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn simple_function() {
        let mut heap = Heap::new();
        let mut bco = BytecodeObject::new_function("ADD");
        bco.file_name = "add.q".into();
        bco.add_argument("A", false);
        bco.add_argument("B", true);
        bco.add_local_variable("TMP");
        bco.add_line_number(10);
        bco.add_instruction(Major::Push, scope::LOCAL, 0);
        bco.add_instruction(Major::Push, scope::LOCAL, 1);
        bco.add_instruction(Major::Binary, 0, 0);
        bco.add_line_number(11);
        let label = bco.make_label();
        bco.add_label(label);
        bco.add_push_literal(Value::String("it's".into()));
        bco.add_jump(jump::IF_TRUE | jump::POP, label);
        let bco = heap.alloc_bco(bco);

        let mut ctx = AssemblerSaveContext::new(&heap);
        ctx.add_bco(bco).unwrap();
        assert_eq!(
            listing(&mut ctx),
            "Function ADD (A, Optional B)\n\
             \x20 .file 'add.q'\n\
             \x20 .local TMP\n\
             \x20 .line 10\n\
             \x20   pushloc     A\n\
             \x20   pushloc     B\n\
             \x20   badd\n\
             \x20 .line 11\n\
             \x20 L0:\n\
             \x20   pushlit     \"it's\"\n\
             \x20   jtp         L0\n\
             EndFunction\n"
        );

        let mut ctx = AssemblerSaveContext::new(&heap);
        ctx.set_debug_information(false);
        ctx.add_bco(bco).unwrap();
        let text = listing(&mut ctx);
        assert!(!text.contains(".file"));
        assert!(!text.contains(".line"));
    }

    #[test]
    fn mutual_recursion_declares_once() {
        let mut heap = Heap::new();
        let a = heap.alloc_bco(BytecodeObject::new_procedure("A"));
        let b = heap.alloc_bco(BytecodeObject::new_procedure("B"));
        heap.bcos[a].add_push_literal(Value::Subroutine(b));
        heap.bcos[b].add_push_literal(Value::Subroutine(a));

        let mut ctx = AssemblerSaveContext::new(&heap);
        ctx.add_bco(a).unwrap();
        let text = listing(&mut ctx);
        assert_eq!(text.matches("Declare Sub").count(), 1);
        assert!(text.starts_with("Declare Sub B\n\nSub A\n"));
        assert!(text.contains("    pushlit     B\n"));
        assert!(text.contains("    pushlit     A\n"));
    }

    #[test]
    fn synthesized_names() {
        let mut heap = Heap::new();
        let first = heap.alloc_bco(BytecodeObject::new_procedure("S"));
        let second = heap.alloc_bco(BytecodeObject::new_procedure("S"));
        let lower = heap.alloc_bco(BytecodeObject::new_procedure("lower"));
        let mut ctx = AssemblerSaveContext::new(&heap);
        ctx.add_bco(first).unwrap();
        ctx.add_bco(second).unwrap();
        ctx.add_bco(lower).unwrap();
        assert_eq!(
            listing(&mut ctx),
            "Sub S\nEndSub\n\nSub BCO1\n  .name S\nEndSub\n\nSub BCO2\n  .name lower\nEndSub\n"
        );
    }

    #[test]
    fn line_number_after_last_instruction() {
        let mut heap = Heap::new();
        let mut bco = BytecodeObject::new_procedure("P");
        bco.add_line_number(1);
        bco.add_instruction(Major::Push, scope::LOCAL, 0);
        bco.add_line_number(2);
        let bco = heap.alloc_bco(bco);

        let mut ctx = AssemblerSaveContext::new(&heap);
        ctx.add_bco(bco).unwrap();
        let text = listing(&mut ctx);
        assert!(text.ends_with("\n  .line 2\nEndSub\n"), "{}", text);

        let mut ctx = AssemblerSaveContext::new(&heap);
        ctx.set_debug_information(false);
        ctx.add_bco(bco).unwrap();
        assert!(!listing(&mut ctx).contains(".line"));
    }

    #[test]
    fn explicit_names_shadow_synthesized_ones() {
        let mut heap = Heap::new();
        let explicit = heap.alloc_bco(BytecodeObject::new_procedure("BCO1"));
        let first = heap.alloc_bco(BytecodeObject::new_procedure("S"));
        let second = heap.alloc_bco(BytecodeObject::new_procedure("S"));
        let mut ctx = AssemblerSaveContext::new(&heap);
        ctx.add_bco(explicit).unwrap();
        ctx.add_bco(first).unwrap();
        ctx.add_bco(second).unwrap();
        assert_eq!(
            listing(&mut ctx),
            "Sub BCO1\nEndSub\n\nSub S\nEndSub\n\nSub BCO2\n  .name S\nEndSub\n"
        );

        // a synthesized name taken first pushes the explicit one aside
        let mut ctx = AssemblerSaveContext::new(&heap);
        ctx.add_bco(first).unwrap();
        ctx.add_bco(second).unwrap();
        ctx.add_bco(explicit).unwrap();
        assert_eq!(ctx.name_of(ObjectRef::Bco(second)), Some("BCO1"));
        assert_eq!(ctx.name_of(ObjectRef::Bco(explicit)), Some("BCO2"));
        assert_eq!(
            listing(&mut ctx),
            "Sub S\nEndSub\n\nSub BCO1\n  .name S\nEndSub\n\nSub BCO2\n  .name BCO1\nEndSub\n"
        );
    }

    #[test]
    fn structure_types() {
        let mut heap = Heap::new();
        let ty = heap.alloc_structure_type(StructureTypeData::with_fields(vec!["X", "Y"]));
        let mut bco = BytecodeObject::new_procedure("MAKE");
        bco.add_push_literal(Value::StructureType(ty));
        bco.add_push_literal(Value::Error("boom".into()));
        bco.add_push_literal(Value::Float(2.0));
        let bco = heap.alloc_bco(bco);

        let mut ctx = AssemblerSaveContext::new(&heap);
        ctx.add_bco(bco).unwrap();
        assert_eq!(
            listing(&mut ctx),
            "Declare Struct TYPE1\n\n\
             Sub MAKE\n\
             \x20   pushlit     TYPE1\n\
             \x20   pushlit     (0x000a,4)\n\
             \x20   pushlit     2.0\n\
             EndSub\n\n\
             Struct TYPE1\n\
             \x20 .field X, Y\n\
             EndStruct\n"
        );
    }

    #[test]
    fn data_objects_are_rejected() {
        let mut heap = Heap::new();
        let hash = heap.alloc_hash(HashData::new());
        let mut bco = BytecodeObject::new_procedure("H");
        bco.add_push_literal(Value::Hash(hash));
        let bco = heap.alloc_bco(bco);
        let mut ctx = AssemblerSaveContext::new(&heap);
        assert!(matches!(ctx.add_hash(hash), Err(Error::Unsupported { .. })));
        assert!(!ctx.is_current_process(1));
        ctx.add_bco(bco).unwrap();
        assert!(matches!(
            ctx.save(&mut Vec::new()),
            Err(Error::Unsupported { .. })
        ));
    }
}
