/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use std::borrow::Cow;

/// Instruction class. The discriminants are internal; the numbers written
/// to object files come from [`Major::to_external`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Major {
    Push,
    Pop,
    Store,
    Binary,
    Unary,
    Ternary,
    Jump,
    Indirect,
    Stack,
    Memref,
    Dim,
    Special,
}

impl Major {
    pub fn to_external(self) -> u8 {
        match self {
            Major::Push => 0,
            Major::Binary => 1,
            Major::Unary => 2,
            Major::Ternary => 3,
            Major::Jump => 4,
            Major::Indirect => 5,
            Major::Stack => 6,
            Major::Pop => 7,
            Major::Store => 8,
            Major::Memref => 9,
            Major::Dim => 10,
            Major::Special => 11,
        }
    }

    pub fn from_external(n: u8) -> Option<Self> {
        Some(match n {
            0 => Major::Push,
            1 => Major::Binary,
            2 => Major::Unary,
            3 => Major::Ternary,
            4 => Major::Jump,
            5 => Major::Indirect,
            6 => Major::Stack,
            7 => Major::Pop,
            8 => Major::Store,
            9 => Major::Memref,
            10 => Major::Dim,
            11 => Major::Special,
            _ => return None,
        })
    }
}

/// Variable scopes, the minor opcode of push/pop/store/dim.
pub mod scope {
    pub const NAMED_VARIABLE: u8 = 0;
    pub const LOCAL: u8 = 1;
    pub const STATIC: u8 = 2;
    pub const SHARED: u8 = 3;
    pub const NAMED_SHARED: u8 = 4;
    pub const LITERAL: u8 = 5;
    pub const INTEGER: u8 = 6;
    pub const BOOLEAN: u8 = 7;
}

/// Jump condition bits.
pub mod jump {
    pub const IF_TRUE: u8 = 1;
    pub const IF_FALSE: u8 = 2;
    pub const IF_EMPTY: u8 = 4;
    pub const ALWAYS: u8 = IF_TRUE | IF_FALSE | IF_EMPTY;
    pub const POP: u8 = 8;
    /// Argument is a label number, not an address.
    pub const SYMBOLIC: u8 = 16;
}

pub mod indirect {
    pub const CALL: u8 = 0;
    pub const LOAD: u8 = 1;
    pub const STORE: u8 = 2;
    pub const POP: u8 = 3;
    /// With `CALL`: the callee's result is kept.
    pub const RESULT: u8 = 8;
}

pub mod stack {
    pub const DUP: u8 = 0;
    pub const DROP: u8 = 1;
    pub const SWAP: u8 = 2;
}

pub mod memref {
    pub const LOAD: u8 = 0;
    pub const POP: u8 = 1;
    pub const STORE: u8 = 2;
}

pub mod special {
    pub const UNCATCH: u8 = 0;
    pub const RETURN: u8 = 1;
    pub const WITH: u8 = 2;
    pub const END_WITH: u8 = 3;
    pub const FIRST_INDEX: u8 = 4;
    pub const NEXT_INDEX: u8 = 5;
    pub const END_INDEX: u8 = 6;
    pub const EVAL_STATEMENT: u8 = 7;
    pub const EVAL_EXPR: u8 = 8;
    pub const DEF_SUB: u8 = 9;
    pub const LOAD: u8 = 10;
    pub const PRINT: u8 = 11;
    pub const ADD_HOOK: u8 = 12;
    pub const RUN_HOOK: u8 = 13;
    pub const THROW: u8 = 14;
    pub const TERMINATE: u8 = 15;
    pub const SUSPEND: u8 = 16;
    pub const NEW_ARRAY: u8 = 17;
    pub const MAKE_LIST: u8 = 18;
    pub const NEW_HASH: u8 = 19;
    pub const INSTANCE: u8 = 20;
    pub const RESIZE_ARRAY: u8 = 21;
    pub const BIND: u8 = 22;
}

const BINARY_NAMES: &[&str] = &[
    "add", "sub", "mult", "divide", "idiv", "rem", "pow", "concat", "concatempty", "cmpeq",
    "cmpne", "cmplt", "cmple", "cmpgt", "cmpge", "min", "max", "firststr", "reststr", "find",
    "bitand", "bitor", "bitxor", "and", "or", "xor", "keyfind", "arraydim",
];

const UNARY_NAMES: &[&str] = &[
    "not", "bool", "neg", "pos", "sin", "cos", "tan", "zap", "abs", "exp", "log", "bitnot",
    "isempty", "isnum", "isstr", "asc", "chr", "str", "val", "trunc", "round", "ltrim", "rtrim",
    "trim", "length", "inc", "dec", "isproc", "keycreate", "keylookup", "fileno",
];

const TERNARY_NAMES: &[&str] = &["keyadd", "substr"];

const SPECIAL_NAMES: &[&str] = &[
    "uncatch",
    "return",
    "with",
    "endwith",
    "firstindex",
    "nextindex",
    "endindex",
    "evals",
    "evalx",
    "defsub",
    "load",
    "print",
    "addhook",
    "runhook",
    "throw",
    "terminate",
    "suspend",
    "newarray",
    "makelist",
    "newhash",
    "instance",
    "resizearray",
    "bind",
];

const SCOPE_SUFFIX: &[&str] = &["var", "loc", "top", "glob", "gvar", "lit", "int", "bool"];

/// How the disassembler renders an instruction's argument.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    None,
    /// Index into the referenced-name table.
    Name,
    /// Index into the local-name table.
    Local,
    /// Index into the literal segment.
    Literal,
    /// Signed 16-bit immediate.
    Integer,
    /// Tristate immediate: negative is empty, 0 false, positive true.
    Boolean,
    Label,
    Address,
    Count,
}

/// One instruction: `{major, minor, arg}`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub major: Major,
    pub minor: u8,
    pub arg: u16,
}

impl Instruction {
    pub const fn new(major: Major, minor: u8, arg: u16) -> Self {
        Self { major, minor, arg }
    }

    /// Object file representation: `arg | minor << 16 | major << 24`.
    pub fn to_word(self) -> u32 {
        self.arg as u32 | (self.minor as u32) << 16 | (self.major.to_external() as u32) << 24
    }

    /// Decode an instruction word; `None` if the major is unknown.
    pub fn from_word(word: u32) -> Option<Self> {
        let major = Major::from_external((word >> 24) as u8)?;
        Some(Self {
            major,
            minor: (word >> 16) as u8,
            arg: word as u16,
        })
    }

    /// Label definition: a symbolic jump without conditions.
    pub fn is_label(self) -> bool {
        self.major == Major::Jump && self.minor == jump::SYMBOLIC
    }

    pub fn is_jump(self) -> bool {
        self.major == Major::Jump && !self.is_label()
    }

    pub fn operand(self) -> Operand {
        match self.major {
            Major::Push | Major::Pop | Major::Store | Major::Dim => match self.minor {
                scope::NAMED_VARIABLE | scope::NAMED_SHARED => Operand::Name,
                scope::LOCAL => Operand::Local,
                scope::STATIC | scope::SHARED => Operand::Address,
                scope::LITERAL => Operand::Literal,
                scope::INTEGER => Operand::Integer,
                scope::BOOLEAN => Operand::Boolean,
                _ => Operand::Count,
            },
            Major::Binary | Major::Unary | Major::Ternary => Operand::None,
            Major::Jump => {
                if self.minor & jump::SYMBOLIC != 0 {
                    Operand::Label
                } else {
                    Operand::Address
                }
            }
            Major::Indirect | Major::Stack => Operand::Count,
            Major::Memref => Operand::Name,
            Major::Special => match self.minor {
                special::DEF_SUB => Operand::Name,
                special::RETURN
                | special::NEW_ARRAY
                | special::MAKE_LIST
                | special::RESIZE_ARRAY
                | special::BIND => Operand::Count,
                _ => Operand::None,
            },
        }
    }

    pub fn mnemonic(self) -> Cow<'static, str> {
        fn table(names: &'static [&'static str], prefix: &str, minor: u8) -> Cow<'static, str> {
            match names.get(minor as usize) {
                Some(name) if prefix.is_empty() => Cow::Borrowed(*name),
                Some(name) => Cow::Owned(format!("{}{}", prefix, name)),
                None => Cow::Owned(format!("{}?{}", prefix, minor)),
            }
        }
        match self.major {
            Major::Push => table(SCOPE_SUFFIX, "push", self.minor),
            Major::Pop => table(&SCOPE_SUFFIX[..5], "pop", self.minor),
            Major::Store => table(&SCOPE_SUFFIX[..5], "store", self.minor),
            Major::Dim => table(&SCOPE_SUFFIX[..5], "dim", self.minor),
            Major::Binary => table(BINARY_NAMES, "b", self.minor),
            Major::Unary => table(UNARY_NAMES, "u", self.minor),
            Major::Ternary => table(TERNARY_NAMES, "t", self.minor),
            Major::Special => table(SPECIAL_NAMES, "s", self.minor),
            Major::Stack => table(&["dup", "drop", "swap"], "", self.minor),
            Major::Memref => table(&["pushmem", "popmem", "storemem"], "", self.minor),
            Major::Indirect => {
                let base = match self.minor & !indirect::RESULT {
                    indirect::CALL if self.minor & indirect::RESULT != 0 => "callind",
                    indirect::CALL => "procind",
                    indirect::LOAD => "loadind",
                    indirect::STORE => "storeind",
                    indirect::POP => "popind",
                    _ => return Cow::Owned(format!("ind?{}", self.minor)),
                };
                Cow::Borrowed(base)
            }
            Major::Jump => {
                if self.is_label() {
                    return Cow::Borrowed("label");
                }
                let mut name = String::from("j");
                if self.minor & jump::ALWAYS != jump::ALWAYS {
                    if self.minor & jump::IF_TRUE != 0 {
                        name.push('t');
                    }
                    if self.minor & jump::IF_FALSE != 0 {
                        name.push('f');
                    }
                    if self.minor & jump::IF_EMPTY != 0 {
                        name.push('e');
                    }
                }
                if self.minor & jump::POP != 0 {
                    name.push('p');
                }
                Cow::Owned(name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_encoding() {
        let insn = Instruction::new(Major::Store, scope::LOCAL, 0x1234);
        assert_eq!(insn.to_word(), 0x0801_1234);
        assert_eq!(Instruction::from_word(0x0801_1234), Some(insn));
        assert_eq!(Instruction::from_word(0x7f00_0000), None);
    }

    #[test]
    fn external_numbers_are_stable() {
        for n in 0..=11 {
            let major = Major::from_external(n).unwrap();
            assert_eq!(major.to_external(), n);
        }
        assert_eq!(Major::Push.to_external(), 0);
        assert_eq!(Major::Special.to_external(), 11);
    }

    #[test]
    fn mnemonics() {
        assert_eq!(Instruction::new(Major::Push, scope::LITERAL, 0).mnemonic(), "pushlit");
        assert_eq!(Instruction::new(Major::Pop, scope::LITERAL, 0).mnemonic(), "pop?5");
        assert_eq!(Instruction::new(Major::Binary, 0, 0).mnemonic(), "badd");
        assert_eq!(
            Instruction::new(Major::Jump, jump::IF_TRUE | jump::POP, 0).mnemonic(),
            "jtp"
        );
        assert_eq!(Instruction::new(Major::Jump, jump::ALWAYS, 0).mnemonic(), "j");
        assert_eq!(
            Instruction::new(Major::Jump, jump::SYMBOLIC, 3).mnemonic(),
            "label"
        );
        assert_eq!(
            Instruction::new(Major::Indirect, indirect::CALL | indirect::RESULT, 2).mnemonic(),
            "callind"
        );
        assert_eq!(Instruction::new(Major::Special, special::RETURN, 1).mnemonic(), "sreturn");
    }

    #[test]
    fn operands() {
        assert_eq!(Instruction::new(Major::Push, scope::LOCAL, 0).operand(), Operand::Local);
        assert_eq!(
            Instruction::new(Major::Jump, jump::IF_FALSE | jump::SYMBOLIC, 0).operand(),
            Operand::Label
        );
        assert_eq!(Instruction::new(Major::Jump, jump::ALWAYS, 0).operand(), Operand::Address);
        assert_eq!(Instruction::new(Major::Memref, memref::LOAD, 0).operand(), Operand::Name);
    }
}
