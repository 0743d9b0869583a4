/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use super::{
    heap::{BcoRef, Heap, ProcessId},
    name_map::NameMap,
    value::Value,
};

/// What a process was started for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcessKind {
    Default,
    ShipTask,
    PlanetTask,
    BaseTask,
}

impl ProcessKind {
    pub fn to_u32(self) -> u32 {
        match self {
            ProcessKind::Default => 0,
            ProcessKind::ShipTask => 1,
            ProcessKind::PlanetTask => 2,
            ProcessKind::BaseTask => 3,
        }
    }

    pub fn from_u32(n: u32) -> Option<Self> {
        Some(match n {
            0 => ProcessKind::Default,
            1 => ProcessKind::ShipTask,
            2 => ProcessKind::PlanetTask,
            3 => ProcessKind::BaseTask,
            _ => return None,
        })
    }
}

impl Default for ProcessKind {
    fn default() -> Self {
        ProcessKind::Default
    }
}

/// Active `Try` block of a process.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub frame_sp: u32,
    pub context_sp: u32,
    pub value_sp: u32,
    /// Address of the handler in the frame at `frame_sp`.
    pub pc: u32,
}

/// One activation record.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub bco: BcoRef,
    pub pc: u32,
    /// Context stack depth when this frame was entered.
    pub context_sp: u32,
    /// Exception stack depth when this frame was entered.
    pub exception_sp: u32,
    pub want_result: bool,
    pub locals: Vec<Value>,
    pub local_names: NameMap,
}

impl Frame {
    pub fn new(bco: BcoRef) -> Self {
        Self {
            bco,
            pc: 0,
            context_sp: 0,
            exception_sp: 0,
            want_result: false,
            locals: Vec::new(),
            local_names: NameMap::new(),
        }
    }

    /// Frame entering `bco`, with one empty slot per declared local.
    pub fn for_bco(heap: &Heap, bco: BcoRef) -> Self {
        let mut frame = Frame::new(bco);
        if let Some(code) = heap.bcos.get(bco) {
            frame.local_names = code.local_names.clone();
            frame.locals = vec![Value::Null; code.num_locals()];
        }
        frame
    }
}

/// A script call stack, suspended or running.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Process {
    /// Runtime id; reassigned when a process is loaded.
    pub id: ProcessId,
    pub name: String,
    pub priority: u32,
    pub kind: ProcessKind,
    pub frames: Vec<Frame>,
    pub contexts: Vec<Value>,
    /// Index of the context that receives global lookups.
    pub context_tos: u32,
    pub exceptions: Vec<ExceptionHandler>,
    pub values: Vec<Value>,
}

impl Process {
    pub fn new(heap: &mut Heap, name: &str, priority: u32) -> Self {
        Self {
            id: heap.allocate_process_id(),
            name: name.to_owned(),
            priority,
            ..Self::default()
        }
    }

    pub fn push_frame(&mut self, mut frame: Frame) -> &mut Frame {
        frame.context_sp = self.contexts.len() as u32;
        frame.exception_sp = self.exceptions.len() as u32;
        self.frames.push(frame);
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }

    /// Check the stack invariants: no frame records deeper context or
    /// exception stacks than the process has, depths never decrease going
    /// up the stack, and handlers refer to existing frames.
    pub fn check_consistency(&self) -> Result<(), String> {
        let contexts = self.contexts.len() as u32;
        let exceptions = self.exceptions.len() as u32;
        if self.context_tos > contexts {
            return Err(format!(
                "context top {} exceeds context stack size {}",
                self.context_tos, contexts
            ));
        }
        let mut previous = (0, 0);
        for (index, frame) in self.frames.iter().enumerate() {
            if frame.context_sp > contexts || frame.exception_sp > exceptions {
                return Err(format!(
                    "frame {} saved depths ({}, {}) exceed process depths ({}, {})",
                    index, frame.context_sp, frame.exception_sp, contexts, exceptions
                ));
            }
            if frame.context_sp < previous.0 || frame.exception_sp < previous.1 {
                return Err(format!("frame {} saved depths decrease", index));
            }
            previous = (frame.context_sp, frame.exception_sp);
        }
        for handler in &self.exceptions {
            if handler.frame_sp as usize > self.frames.len() {
                return Err(format!(
                    "exception handler refers to frame {} of {}",
                    handler.frame_sp,
                    self.frames.len()
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::bytecode::BytecodeObject;

    #[test]
    fn frame_depths() {
        let mut heap = Heap::new();
        let bco = heap.alloc_bco(BytecodeObject::new_procedure("MAIN"));
        let mut process = Process::new(&mut heap, "test", 50);
        process.contexts.push(Value::Null);
        process.push_frame(Frame::for_bco(&heap, bco));
        assert_eq!(process.frames[0].context_sp, 1);
        assert!(process.check_consistency().is_ok());

        process.contexts.clear();
        assert!(process.check_consistency().is_err());
    }

    #[test]
    fn process_ids() {
        let mut heap = Heap::new();
        let a = Process::new(&mut heap, "a", 0);
        let b = Process::new(&mut heap, "b", 0);
        assert_eq!((a.id, b.id), (1, 2));
    }
}
