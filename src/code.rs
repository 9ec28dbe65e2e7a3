//! The flat instruction alphabet shared by the code generator and the
//! machine, together with its textual encoding. A [`Program`] is the only
//! artifact that crosses between the two stages: by the time code reaches
//! execution it carries no names, no tree structure, and no cell bindings.

use std::{collections::BTreeMap, fmt};

use once_cell::sync::Lazy;
use strum::{EnumIter, IntoEnumIterator};

/// One primitive tape-machine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Op {
    MoveRight, // >
    MoveLeft,  // <
    Increment, // +
    Decrement, // -
    Output,    // .
    Input,     // ,
    LoopOpen,  // [
    LoopClose, // ]
}

static SYMBOL_TABLE: Lazy<BTreeMap<char, Op>> =
    Lazy::new(|| Op::iter().map(|op| (op.symbol(), op)).collect());

impl Op {
    pub fn symbol(self) -> char {
        match self {
            Op::MoveRight => '>',
            Op::MoveLeft => '<',
            Op::Increment => '+',
            Op::Decrement => '-',
            Op::Output => '.',
            Op::Input => ',',
            Op::LoopOpen => '[',
            Op::LoopClose => ']',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        SYMBOL_TABLE.get(&symbol).copied()
    }
}

/// An ordered sequence of primitive operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    ops: Vec<Op>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes program text. Bytes outside the eight-symbol alphabet are
    /// skipped, which is the target language's comment convention.
    pub fn from_text(text: &str) -> Self {
        Self {
            ops: text.chars().filter_map(Op::from_symbol).collect(),
        }
    }

    pub fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    pub fn push_repeated(&mut self, op: Op, count: usize) {
        self.ops.extend(std::iter::repeat_n(op, count));
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.ops {
            write!(f, "{}", op.symbol())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn text_round_trips() {
        let program = Program::from_text("+[>-.,<]");
        assert_eq!(program.to_string(), "+[>-.,<]");
    }

    #[test]
    fn bytes_outside_the_alphabet_are_comments() {
        let program = Program::from_text(indoc! {"
            seed the counter
            +++
            and emit it
            .
        "});
        assert_eq!(program.to_string(), "+++.");
    }

    #[test]
    fn every_op_has_a_distinct_symbol() {
        let symbols: std::collections::BTreeSet<_> = Op::iter().map(Op::symbol).collect();
        assert_eq!(symbols.len(), Op::iter().count());
    }
}
