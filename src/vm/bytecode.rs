/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use super::{
    name_map::NameMap,
    opcodes::{jump, scope, Instruction, Major},
    value::Value,
};

/// A single compiled subroutine.
///
/// Bytecode objects are produced by the compiler and do not change afterwards,
/// except for debug metadata. They are shared by handle: literal slots,
/// frames and global variables may all refer to the same object, including
/// the object itself for recursive subroutines.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BytecodeObject {
    /// Instructions
    pub code: Vec<Instruction>,
    /// Constant literals, indexed by `pushlit` and friends
    pub literals: Vec<Value>,
    /// Global names referenced by name-addressed instructions
    pub names: NameMap,
    /// Local variable names. Arguments come first.
    pub local_names: NameMap,
    /// `(pc, line)` pairs, ascending by pc
    pub line_numbers: Vec<(u32, u32)>,
    /// Is this a procedure (`Sub`) rather than a function?
    pub is_procedure: bool,
    /// Does this subroutine take a variable argument list?
    pub is_varargs: bool,
    pub min_args: u16,
    pub max_args: u16,
    /// Number of symbolic labels allocated so far.
    pub num_labels: u16,
    /// Subroutine name, empty if anonymous.
    pub subroutine_name: String,
    /// Source file name, empty if unknown.
    pub file_name: String,
}

impl BytecodeObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_procedure(name: &str) -> Self {
        Self {
            is_procedure: true,
            subroutine_name: name.to_owned(),
            ..Self::default()
        }
    }

    pub fn new_function(name: &str) -> Self {
        Self {
            is_procedure: false,
            subroutine_name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Append an instruction and return its address.
    pub fn add_instruction(&mut self, major: Major, minor: u8, arg: u16) -> u32 {
        self.code.push(Instruction::new(major, minor, arg));
        self.code.len() as u32 - 1
    }

    /// Append a literal and an instruction pushing it.
    pub fn add_push_literal(&mut self, value: Value) -> u32 {
        let index = self.add_literal(value);
        self.add_instruction(Major::Push, scope::LITERAL, index)
    }

    pub fn add_literal(&mut self, value: Value) -> u16 {
        self.literals.push(value);
        self.literals.len() as u16 - 1
    }

    pub fn add_name(&mut self, name: &str) -> u16 {
        self.names.add(name) as u16
    }

    pub fn add_local_variable(&mut self, name: &str) -> u16 {
        self.local_names.add(name) as u16
    }

    /// Declare the next argument. Arguments must be declared before other
    /// locals.
    pub fn add_argument(&mut self, name: &str, optional: bool) -> u16 {
        let index = self.add_local_variable(name);
        self.max_args += 1;
        if !optional {
            self.min_args = self.max_args;
        }
        index
    }

    pub fn make_label(&mut self) -> u16 {
        self.num_labels += 1;
        self.num_labels - 1
    }

    pub fn add_label(&mut self, label: u16) -> u32 {
        self.add_instruction(Major::Jump, jump::SYMBOLIC, label)
    }

    pub fn add_jump(&mut self, flags: u8, label: u16) -> u32 {
        self.add_instruction(Major::Jump, flags | jump::SYMBOLIC, label)
    }

    /// Record that the next instruction belongs to source `line`.
    pub fn add_line_number(&mut self, line: u32) {
        let pc = self.code.len() as u32;
        match self.line_numbers.last_mut() {
            Some(last) if last.1 == line => {}
            Some(last) if last.0 == pc => last.1 = line,
            _ => self.line_numbers.push((pc, line)),
        }
    }

    /// Source line of the instruction at `pc`, if known.
    pub fn get_line_number(&self, pc: u32) -> Option<u32> {
        match self.line_numbers.binary_search_by_key(&pc, |&(at, _)| at) {
            Ok(ix) => Some(self.line_numbers[ix].1),
            Err(0) => None,
            Err(ix) => Some(self.line_numbers[ix - 1].1),
        }
    }

    /// Number of local slots a frame executing this object needs.
    pub fn num_locals(&self) -> usize {
        self.local_names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments() {
        let mut bco = BytecodeObject::new_function("F");
        bco.add_argument("A", false);
        bco.add_argument("B", false);
        bco.add_argument("C", true);
        bco.add_local_variable("TMP");
        assert_eq!(bco.min_args, 2);
        assert_eq!(bco.max_args, 3);
        assert_eq!(bco.num_locals(), 4);
    }

    #[test]
    fn line_numbers() {
        let mut bco = BytecodeObject::new();
        bco.add_line_number(10);
        bco.add_instruction(Major::Stack, 0, 1);
        bco.add_line_number(10);
        bco.add_instruction(Major::Stack, 0, 1);
        bco.add_line_number(12);
        bco.add_line_number(13);
        bco.add_instruction(Major::Stack, 0, 1);
        assert_eq!(bco.line_numbers, vec![(0, 10), (2, 13)]);
        assert_eq!(bco.get_line_number(0), Some(10));
        assert_eq!(bco.get_line_number(1), Some(10));
        assert_eq!(bco.get_line_number(2), Some(13));
        assert_eq!(bco.get_line_number(99), Some(13));

        let empty = BytecodeObject::new();
        assert_eq!(empty.get_line_number(0), None);
    }

    #[test]
    fn labels() {
        let mut bco = BytecodeObject::new();
        let l0 = bco.make_label();
        let l1 = bco.make_label();
        bco.add_label(l0);
        bco.add_jump(jump::IF_TRUE | jump::POP, l1);
        assert_eq!((l0, l1), (0, 1));
        assert_eq!(bco.num_labels, 2);
        assert!(bco.code[0].is_label());
        assert!(bco.code[1].is_jump());
    }
}
