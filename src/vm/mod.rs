//! The tape-machine interpreter: a fixed ring of byte cells, a wrapping
//! pointer, and an instruction pointer driven one step at a time. Loop
//! brackets are resolved into a dense jump table by a validating pre-pass,
//! so execution never searches for a match and malformed sequences are
//! rejected before any instruction runs.

pub mod pretty_print;
pub mod syscall;

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::{
    code::{Op, Program},
    codegen::layout::{TRIGGER_CELL, TRIGGER_SENTINEL},
};

pub const DEFAULT_TAPE_LENGTH: usize = 30_000;

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("loop close at instruction {0} has no matching open")]
    UnmatchedLoopClose(usize),
    #[error("loop open at instruction {0} is never closed")]
    UnmatchedLoopOpen(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Bidirectional bracket-jump resolution for one instruction sequence.
#[derive(Debug)]
pub struct JumpTable {
    targets: Vec<usize>,
}

impl JumpTable {
    /// Single scan with a stack of open positions. Structural validity is
    /// settled here; execution assumes a well-formed sequence.
    pub fn build(program: &Program) -> Result<Self, MachineError> {
        let mut targets: Vec<usize> = (0..program.len()).collect();
        let mut open_stack = Vec::new();

        for (index, op) in program.ops().iter().enumerate() {
            match op {
                Op::LoopOpen => open_stack.push(index),
                Op::LoopClose => {
                    let open = open_stack
                        .pop()
                        .ok_or(MachineError::UnmatchedLoopClose(index))?;
                    targets[open] = index;
                    targets[index] = open;
                }
                _ => {}
            }
        }

        if let Some(open) = open_stack.pop() {
            return Err(MachineError::UnmatchedLoopOpen(open));
        }

        Ok(Self { targets })
    }

    pub fn matching(&self, index: usize) -> usize {
        self.targets[index]
    }
}

/// One interpreter run owns its tape exclusively; nothing is shared across
/// runs or threads.
pub struct Machine<R = io::Stdin, W = io::Stdout> {
    tape: Box<[u8]>,
    pointer: usize,
    input: R,
    output: W,
}

impl Machine {
    /// A machine wired to the host's standard streams.
    pub fn new(tape_length: usize) -> Self {
        Machine::with_io(tape_length, io::stdin(), io::stdout())
    }
}

impl<R: Read, W: Write> Machine<R, W> {
    pub fn with_io(tape_length: usize, input: R, output: W) -> Self {
        Self {
            tape: vec![0; tape_length].into_boxed_slice(),
            pointer: 0,
            input,
            output,
        }
    }

    pub fn tape(&self) -> &[u8] {
        &self.tape
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// The first `count` cells, for dumps and assertions.
    pub fn cells(&self, count: usize) -> &[u8] {
        &self.tape[..count.min(self.tape.len())]
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn execute(&mut self, program: &Program) -> Result<(), MachineError> {
        let jumps = JumpTable::build(program)?;
        let ops = program.ops();
        let mut pc = 0;

        while pc < ops.len() {
            match ops[pc] {
                Op::MoveRight => self.pointer = (self.pointer + 1) % self.tape.len(),
                Op::MoveLeft => {
                    self.pointer = (self.pointer + self.tape.len() - 1) % self.tape.len()
                }
                Op::Increment => {
                    let cell = &mut self.tape[self.pointer];
                    *cell = cell.wrapping_add(1);
                }
                Op::Decrement => {
                    let cell = &mut self.tape[self.pointer];
                    *cell = cell.wrapping_sub(1);
                }
                Op::Output => {
                    // The trigger cell's value, not the pointer position,
                    // decides whether this is a host-call request.
                    if self.tape[TRIGGER_CELL] == TRIGGER_SENTINEL {
                        syscall::dispatch(&mut self.tape, &mut self.output);
                    } else {
                        self.output.write_all(&[self.tape[self.pointer]])?;
                        self.output.flush()?;
                    }
                }
                Op::Input => {
                    // End of input is not an error; the cell just reads 0.
                    let mut byte = [0u8; 1];
                    self.tape[self.pointer] = match self.input.read_exact(&mut byte) {
                        Ok(()) => byte[0],
                        Err(_) => 0,
                    };
                }
                Op::LoopOpen => {
                    if self.tape[self.pointer] == 0 {
                        pc = jumps.matching(pc);
                    }
                }
                Op::LoopClose => {
                    if self.tape[self.pointer] != 0 {
                        pc = jumps.matching(pc);
                    }
                }
            }
            // Jumps land on the matched bracket itself, which counts as
            // already handled for this visit.
            pc += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn capture(text: &str) -> Machine<io::Empty, Vec<u8>> {
        let program = Program::from_text(text);
        let mut machine = Machine::with_io(64, io::empty(), Vec::new());
        machine.execute(&program).unwrap();
        machine
    }

    #[test]
    fn output_emits_cell_bytes() {
        assert_eq!(capture("+++.").output, vec![3]);
    }

    #[test]
    fn pointer_movement_selects_cells() {
        assert_eq!(capture(">+++>++<.").output, vec![3]);
    }

    #[test]
    fn loops_transfer_values() {
        assert_eq!(capture("+++[>+<-]>.").output, vec![3]);
    }

    #[test]
    fn hello_world() {
        let machine = capture(
            "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.",
        );
        assert_eq!(String::from_utf8(machine.output).unwrap(), "Hello World!\n");
    }

    #[test]
    fn comment_text_is_ignored() {
        let machine = capture(indoc! {"
            three into the first cell
            +++
            emit it
            .
        "});
        assert_eq!(machine.output, vec![3]);
    }

    #[test]
    fn cell_arithmetic_wraps() {
        assert_eq!(capture("-").cells(1), [255]);
        assert_eq!(capture("-+").cells(1), [0]);
    }

    #[test]
    fn pointer_wraps_at_both_ends() {
        let machine = capture("<+");
        assert_eq!(machine.tape()[63], 1);
        let machine = capture("<+>+");
        assert_eq!(machine.cells(1), [1]);
        assert_eq!(machine.tape()[63], 1);
    }

    #[test]
    fn input_reads_bytes_and_defaults_to_zero() {
        let program = Program::from_text(",>,");
        let mut machine = Machine::with_io(64, io::Cursor::new(b"A".to_vec()), Vec::new());
        machine.execute(&program).unwrap();
        assert_eq!(machine.cells(2), [b'A', 0]);
    }

    #[test]
    fn unmatched_brackets_are_rejected_before_execution() {
        let mut machine = Machine::with_io(64, io::empty(), Vec::new());

        let error = machine.execute(&Program::from_text("[")).unwrap_err();
        assert!(matches!(error, MachineError::UnmatchedLoopOpen(0)));

        let error = machine.execute(&Program::from_text("+]")).unwrap_err();
        assert!(matches!(error, MachineError::UnmatchedLoopClose(1)));
    }

    #[test]
    fn jump_table_is_symmetric_and_forward() {
        let program = Program::from_text("[[][]]");
        let jumps = JumpTable::build(&program).unwrap();

        for (index, op) in program.ops().iter().enumerate() {
            if let Op::LoopOpen = op {
                let close = jumps.matching(index);
                assert!(close > index);
                assert_eq!(jumps.matching(close), index);
                assert_eq!(program.ops()[close], Op::LoopClose);
            }
        }
    }
}
