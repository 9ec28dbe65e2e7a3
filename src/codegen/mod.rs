//! Lowering from the source tree to tape-machine instructions.
//!
//! Every construct that produces a value designates a tape cell holding that
//! value once the emitted instructions have run; callers compose by reading
//! the designated cell. Control flow is encoded entirely through zero-test
//! loops, so every fragment emitted here leaves its working cells in a state
//! where the same fragment can run again (loop bodies re-execute their cells
//! on every iteration, and all initialization is clear-then-increment).

pub mod alloc;
pub mod layout;

use hashbrown::HashMap;
use thiserror::Error;

use crate::{
    ast::{BinaryOperatorKind, ComparisonOperatorKind, Node},
    code::{Op, Program},
    codegen::{
        alloc::CellAllocator,
        layout::{
            CALL_NUMBER_CELL, FIRST_ARGUMENT_CELL, MAX_CALL_ARGUMENTS, RESULT_CELL, SCRATCH_CELL,
            TRIGGER_CELL, TRIGGER_SENTINEL,
        },
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerError {
    /// A value was required (operand, condition, call argument) but the
    /// expression has no result cell.
    #[error("expression in value position produces no value")]
    MissingValue,
    #[error("host call takes at most six arguments, got {0}")]
    TooManyArguments(usize),
    /// Buffer start addresses are stored in single cells, so they must fit
    /// in a byte.
    #[error("buffer start {0} does not fit in a byte-sized cell")]
    AddressOutOfRange(usize),
}

/// The lowered artifact: the instruction sequence plus the bindings that
/// name cells inside it.
#[derive(Debug)]
pub struct CompiledProgram {
    pub code: Program,
    variables: HashMap<String, usize>,
}

impl CompiledProgram {
    pub fn variable_cell(&self, name: &str) -> Option<usize> {
        self.variables.get(name).copied()
    }
}

/// Lowers a whole program (a sequence of top-level statements).
pub fn lower_program(nodes: &[Node]) -> Result<CompiledProgram, LowerError> {
    let mut context = LoweringContext::new();
    for node in nodes {
        context.lower(node)?;
    }
    Ok(context.into_output())
}

pub struct LoweringContext {
    code: Program,
    pointer: usize,
    allocator: CellAllocator,
}

impl Default for LoweringContext {
    fn default() -> Self {
        Self::new()
    }
}

impl LoweringContext {
    pub fn new() -> Self {
        Self {
            code: Program::new(),
            pointer: 0,
            allocator: CellAllocator::new(),
        }
    }

    /// Lowers one node, returning the cell that holds its value if the
    /// construct produces one.
    pub fn lower(&mut self, node: &Node) -> Result<Option<usize>, LowerError> {
        match node {
            Node::Literal(value) => {
                let cell = self.allocator.allocate(1);
                self.store(cell, *value);
                Ok(Some(cell))
            }
            // Resolving a name emits nothing by itself.
            Node::Variable(name) => Ok(Some(self.allocator.variable(name))),
            Node::Assign { target, value } => {
                self.lower_assign(target, value)?;
                Ok(None)
            }
            Node::Binary { operator, lhs, rhs } => {
                self.lower_binary(*operator, lhs, rhs).map(Some)
            }
            Node::Comparison { operator, lhs, rhs } => {
                self.lower_comparison(*operator, lhs, rhs).map(Some)
            }
            Node::If {
                condition,
                then_branch,
                else_branch,
            } => self
                .lower_if(condition, then_branch, else_branch.as_deref())
                .map(Some),
            Node::While { condition, body } => self.lower_while(condition, body).map(Some),
            Node::Block(nodes) => {
                for node in nodes {
                    self.lower(node)?;
                }
                Ok(None)
            }
            Node::StringLiteral(value) => Ok(Some(self.lower_string(value))),
            Node::HostCall { number, arguments } => {
                self.lower_host_call(*number, arguments).map(Some)
            }
        }
    }

    pub fn into_output(self) -> CompiledProgram {
        CompiledProgram {
            code: self.code,
            variables: self.allocator.into_bindings(),
        }
    }

    /* Emission primitives */

    fn emit(&mut self, op: Op) {
        self.code.push(op);
    }

    /// Moves the tape pointer to `cell`, tracking its position statically.
    fn move_to(&mut self, cell: usize) {
        if cell > self.pointer {
            self.code.push_repeated(Op::MoveRight, cell - self.pointer);
        } else {
            self.code.push_repeated(Op::MoveLeft, self.pointer - cell);
        }
        self.pointer = cell;
    }

    /// Drains the cell under the pointer to zero.
    fn clear_current(&mut self) {
        self.emit(Op::LoopOpen);
        self.emit(Op::Decrement);
        self.emit(Op::LoopClose);
    }

    /// `cell = value`, independent of the cell's previous contents.
    fn store(&mut self, cell: usize, value: u8) {
        self.move_to(cell);
        self.clear_current();
        self.code.push_repeated(Op::Increment, value as usize);
    }

    /// Destructive transfer: drains `source` into `destination`, leaving the
    /// source zeroed. Only for sources that are disposable temporaries.
    fn transfer(&mut self, source: usize, destination: usize) {
        self.move_to(destination);
        self.clear_current();
        self.move_to(source);
        self.emit(Op::LoopOpen);
        self.emit(Op::Decrement);
        self.move_to(destination);
        self.emit(Op::Increment);
        self.move_to(source);
        self.emit(Op::LoopClose);
    }

    /// Non-destructive copy: shuttles the value through the reserved scratch
    /// cell and drains the scratch back, so the source keeps its value.
    fn copy(&mut self, source: usize, destination: usize) {
        self.move_to(SCRATCH_CELL);
        self.clear_current();
        self.move_to(destination);
        self.clear_current();

        self.move_to(source);
        self.emit(Op::LoopOpen);
        self.emit(Op::Decrement);
        self.move_to(destination);
        self.emit(Op::Increment);
        self.move_to(SCRATCH_CELL);
        self.emit(Op::Increment);
        self.move_to(source);
        self.emit(Op::LoopClose);

        self.move_to(SCRATCH_CELL);
        self.emit(Op::LoopOpen);
        self.emit(Op::Decrement);
        self.move_to(source);
        self.emit(Op::Increment);
        self.move_to(SCRATCH_CELL);
        self.emit(Op::LoopClose);
    }

    /// Lowers `node` in a position that requires a result cell.
    fn lower_value(&mut self, node: &Node) -> Result<usize, LowerError> {
        self.lower(node)?.ok_or(LowerError::MissingValue)
    }

    fn cell_address(cell: usize) -> Result<u8, LowerError> {
        u8::try_from(cell).map_err(|_| LowerError::AddressOutOfRange(cell))
    }

    /* Statements */

    fn lower_assign(&mut self, target: &str, value: &Node) -> Result<(), LowerError> {
        let cell = self.allocator.variable(target);

        match value {
            // Write in place instead of staging through a temporary.
            Node::Literal(literal) => self.store(cell, *literal),
            // The variable receives the buffer's start address, not its
            // contents; scalars and addresses share the same cells because
            // the tape only has bytes.
            Node::StringLiteral(text) => {
                let start = self.lower_string(text);
                self.store(cell, Self::cell_address(start)?);
            }
            // Another variable must survive being read.
            Node::Variable(_) => {
                let source = self.lower_value(value)?;
                if source != cell {
                    self.copy(source, cell);
                }
            }
            _ => {
                let result = self.lower_value(value)?;
                if result != cell {
                    self.transfer(result, cell);
                }
            }
        }

        Ok(())
    }

    /* Expressions */

    fn lower_binary(
        &mut self,
        operator: BinaryOperatorKind,
        lhs: &Node,
        rhs: &Node,
    ) -> Result<usize, LowerError> {
        let unit = match operator {
            BinaryOperatorKind::Add => Op::Increment,
            BinaryOperatorKind::Subtract => Op::Decrement,
        };

        let lhs_cell = self.lower_value(lhs)?;
        let rhs_cell = self.lower_value(rhs)?;

        let result = self.allocator.allocate(1);
        let staging = self.allocator.allocate(1);

        self.copy(lhs_cell, result);
        self.copy(rhs_cell, staging);

        // Drain the staged right operand, applying the operator's unit
        // effect to the result once per unit.
        self.move_to(staging);
        self.emit(Op::LoopOpen);
        self.emit(Op::Decrement);
        self.move_to(result);
        self.emit(unit);
        self.move_to(staging);
        self.emit(Op::LoopClose);

        Ok(result)
    }

    fn lower_comparison(
        &mut self,
        operator: ComparisonOperatorKind,
        lhs: &Node,
        rhs: &Node,
    ) -> Result<usize, LowerError> {
        match operator {
            ComparisonOperatorKind::Equal => self.lower_equal(lhs, rhs),
            ComparisonOperatorKind::LessThan => self.lower_less_than(lhs, rhs),
            ComparisonOperatorKind::GreaterThan => self.lower_less_than(rhs, lhs),
            ComparisonOperatorKind::LessThanOrEqual => {
                let base = self.lower_less_than(rhs, lhs)?;
                Ok(self.lower_inverted(base))
            }
            ComparisonOperatorKind::GreaterThanOrEqual => {
                let base = self.lower_less_than(lhs, rhs)?;
                Ok(self.lower_inverted(base))
            }
        }
    }

    fn lower_equal(&mut self, lhs: &Node, rhs: &Node) -> Result<usize, LowerError> {
        let lhs_cell = self.lower_value(lhs)?;
        let rhs_cell = self.lower_value(rhs)?;

        let result = self.allocator.allocate(1);
        let left = self.allocator.allocate(1);
        let right = self.allocator.allocate(1);

        self.copy(lhs_cell, left);
        self.copy(rhs_cell, right);
        self.store(result, 1);

        // Drain the left copy while stepping the right copy down in
        // lockstep; the right copy wraps below zero when the left operand
        // is the larger one.
        self.move_to(left);
        self.emit(Op::LoopOpen);
        self.emit(Op::Decrement);
        self.move_to(right);
        self.emit(Op::Decrement);
        self.move_to(left);
        self.emit(Op::LoopClose);

        // Any residue in the right copy means the operands differed.
        self.move_to(right);
        self.emit(Op::LoopOpen);
        self.move_to(result);
        self.clear_current();
        self.move_to(right);
        self.clear_current();
        self.emit(Op::LoopClose);

        Ok(result)
    }

    /// The race lowering: the right copy drains one unit per iteration, and
    /// each iteration either spends one unit of the left copy or, once the
    /// left copy empties first, records the win and stops the race.
    fn lower_less_than(&mut self, lhs: &Node, rhs: &Node) -> Result<usize, LowerError> {
        let lhs_cell = self.lower_value(lhs)?;
        let rhs_cell = self.lower_value(rhs)?;

        let result = self.allocator.allocate(1);
        let left = self.allocator.allocate(1);
        let right = self.allocator.allocate(1);
        let shuttle = self.allocator.allocate(1);
        let probe = self.allocator.allocate(1);
        let exhausted = self.allocator.allocate(1);

        self.copy(lhs_cell, left);
        self.copy(rhs_cell, right);
        self.store(result, 0);

        self.move_to(right);
        self.emit(Op::LoopOpen);
        self.emit(Op::Decrement);

        // Probe the left copy without losing it: move it aside and back.
        self.move_to(left);
        self.emit(Op::LoopOpen);
        self.emit(Op::Decrement);
        self.move_to(shuttle);
        self.emit(Op::Increment);
        self.move_to(probe);
        self.emit(Op::Increment);
        self.move_to(left);
        self.emit(Op::LoopClose);
        self.move_to(shuttle);
        self.emit(Op::LoopOpen);
        self.emit(Op::Decrement);
        self.move_to(left);
        self.emit(Op::Increment);
        self.move_to(shuttle);
        self.emit(Op::LoopClose);

        self.store(exhausted, 1);

        // Left copy still has units: spend one and discard the probe.
        self.move_to(probe);
        self.emit(Op::LoopOpen);
        self.move_to(exhausted);
        self.emit(Op::Decrement);
        self.move_to(left);
        self.emit(Op::Decrement);
        self.move_to(probe);
        self.clear_current();
        self.emit(Op::LoopClose);

        // Left copy emptied while the right copy still held value: the
        // right operand wins the race.
        self.move_to(exhausted);
        self.emit(Op::LoopOpen);
        self.store(result, 1);
        self.move_to(right);
        self.clear_current();
        self.move_to(exhausted);
        self.emit(Op::Decrement);
        self.emit(Op::LoopClose);

        self.move_to(right);
        self.emit(Op::LoopClose);

        Ok(result)
    }

    /// Flips a 0/1 result by draining it against a fresh cell seeded to 1.
    fn lower_inverted(&mut self, base: usize) -> usize {
        let inverted = self.allocator.allocate(1);
        self.store(inverted, 1);

        self.move_to(base);
        self.emit(Op::LoopOpen);
        self.emit(Op::Decrement);
        self.move_to(inverted);
        self.emit(Op::Decrement);
        self.move_to(base);
        self.emit(Op::LoopClose);

        inverted
    }

    /* Control flow */

    fn lower_if(
        &mut self,
        condition: &Node,
        then_branch: &Node,
        else_branch: Option<&Node>,
    ) -> Result<usize, LowerError> {
        let condition_cell = self.lower_value(condition)?;
        let result = self.allocator.allocate(1);
        let guard = self.allocator.allocate(1);

        self.copy(condition_cell, guard);

        // Zero-test loop run at most once: the guard is forcibly cleared
        // before the close, so nothing the branch body does can re-trigger
        // it.
        self.move_to(guard);
        self.emit(Op::LoopOpen);
        if let Some(branch_result) = self.lower(then_branch)? {
            self.copy(branch_result, result);
        }
        self.move_to(guard);
        self.clear_current();
        self.emit(Op::LoopClose);

        if let Some(else_branch) = else_branch {
            let negated = self.allocator.allocate(1);
            self.store(negated, 1);
            self.copy(condition_cell, guard);

            // Normalize the guard to a 0/1 flag while knocking the seeded
            // cell down, so conditions greater than 1 negate correctly.
            self.move_to(guard);
            self.emit(Op::LoopOpen);
            self.move_to(negated);
            self.emit(Op::Decrement);
            self.move_to(guard);
            self.clear_current();
            self.emit(Op::LoopClose);

            self.move_to(negated);
            self.emit(Op::LoopOpen);
            if let Some(branch_result) = self.lower(else_branch)? {
                self.copy(branch_result, result);
            }
            self.move_to(negated);
            self.clear_current();
            self.emit(Op::LoopClose);
        }

        Ok(result)
    }

    fn lower_while(&mut self, condition: &Node, body: &Node) -> Result<usize, LowerError> {
        let result = self.allocator.allocate(1);
        let guard = self.allocator.allocate(1);

        // Seed the guard once; each iteration re-evaluates the condition
        // (side effects included) and feeds the fresh value back in.
        let seed = self.lower_value(condition)?;
        self.copy(seed, guard);

        self.move_to(guard);
        self.emit(Op::LoopOpen);
        if let Some(body_result) = self.lower(body)? {
            self.copy(body_result, result);
        }
        let next = self.lower_value(condition)?;
        self.copy(next, guard);
        self.move_to(guard);
        self.emit(Op::LoopClose);

        Ok(result)
    }

    /* Buffers and host calls */

    fn lower_string(&mut self, text: &str) -> usize {
        // Allocation length is the UTF-8 byte count; even an empty string
        // owns one cell so intervals always have length >= 1.
        let bytes = text.as_bytes();
        let start = self.allocator.allocate(bytes.len().max(1));
        for (offset, byte) in bytes.iter().enumerate() {
            self.store(start + offset, *byte);
        }
        start
    }

    fn lower_host_call(&mut self, number: u8, arguments: &[Node]) -> Result<usize, LowerError> {
        if arguments.len() > MAX_CALL_ARGUMENTS {
            return Err(LowerError::TooManyArguments(arguments.len()));
        }

        self.store(CALL_NUMBER_CELL, number);

        for (index, argument) in arguments.iter().enumerate() {
            let slot = FIRST_ARGUMENT_CELL + index;
            match argument {
                Node::Literal(value) => self.store(slot, *value),
                // Argument cells receive a copy; the variable keeps its
                // value.
                Node::Variable(name) => {
                    let cell = self.allocator.variable(name);
                    self.copy(cell, slot);
                }
                // Strings pass by buffer start address.
                Node::StringLiteral(text) => {
                    let start = self.lower_string(text);
                    let address = Self::cell_address(start)?;
                    self.store(slot, address);
                }
                _ => {
                    let cell = self.lower_value(argument)?;
                    self.transfer(cell, slot);
                }
            }
        }

        // Stale bytes in unused slots would change how the bridge truncates
        // the argument list on the next call.
        for index in arguments.len()..MAX_CALL_ARGUMENTS {
            self.store(FIRST_ARGUMENT_CELL + index, 0);
        }

        self.store(TRIGGER_CELL, TRIGGER_SENTINEL);
        self.emit(Op::Output);
        // Drop the sentinel so later output instructions emit bytes instead
        // of re-triggering the bridge.
        self.clear_current();

        Ok(RESULT_CELL)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ast::Node, codegen::layout::USER_SPACE_START};

    #[test]
    fn literal_assignment_writes_in_place() {
        let compiled = lower_program(&[Node::assign("x", Node::Literal(2))]).unwrap();
        assert_eq!(compiled.variable_cell("x"), Some(USER_SPACE_START));
        assert_eq!(compiled.code.to_string(), ">>>>>>>>>>[-]++");
    }

    #[test]
    fn copy_restores_the_source() {
        let mut context = LoweringContext::new();
        context.copy(10, 11);
        assert_eq!(
            context.code.to_string(),
            ">>>>>>>>>[-]>>[-]<[->+<<+>]<[->+<]"
        );
    }

    #[test]
    fn transfer_drains_the_source() {
        let mut context = LoweringContext::new();
        context.transfer(10, 11);
        assert_eq!(context.code.to_string(), ">>>>>>>>>>>[-]<[->+<]");
    }

    #[test]
    fn string_lowering_allocates_the_byte_count() {
        let mut context = LoweringContext::new();
        let start = context.lower_string("héllo");
        let next = context.allocator.allocate(1);
        assert_eq!(next, start + "héllo".len());
    }

    #[test]
    fn value_position_requires_a_value() {
        let error = lower_program(&[Node::assign("x", Node::block(vec![]))]).unwrap_err();
        assert_eq!(error, LowerError::MissingValue);
    }

    #[test]
    fn too_many_call_arguments_is_rejected() {
        let arguments = vec![Node::Literal(0); 7];
        let error = lower_program(&[Node::host_call(1, arguments)]).unwrap_err();
        assert_eq!(error, LowerError::TooManyArguments(7));
    }

    #[test]
    fn lowered_loops_are_balanced() {
        let compiled = lower_program(&[
            Node::assign("x", Node::Literal(3)),
            Node::while_loop(
                Node::variable("x"),
                Node::assign("x", Node::subtract(Node::variable("x"), Node::Literal(1))),
            ),
        ])
        .unwrap();

        let mut depth = 0i32;
        for op in compiled.code.ops() {
            match op {
                Op::LoopOpen => depth += 1,
                Op::LoopClose => {
                    depth -= 1;
                    assert!(depth >= 0);
                }
                _ => {}
            }
        }
        assert_eq!(depth, 0);
    }
}
