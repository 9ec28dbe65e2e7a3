//! Human-facing dumps: the instruction stream and the front of the tape.

use colored::Colorize;
use itertools::Itertools;

use crate::code::{Op, Program};

const ROW_WIDTH: usize = 64;

pub fn pretty_print_program(program: &Program) {
    for row in &program.ops().iter().chunks(ROW_WIDTH) {
        let line = row.map(|op| colorize(*op).to_string()).join("");
        println!("{line}");
    }
}

fn colorize(op: Op) -> colored::ColoredString {
    let symbol = op.symbol().to_string();
    match op {
        Op::MoveRight | Op::MoveLeft => symbol.white(),
        Op::Increment | Op::Decrement => symbol.cyan(),
        Op::Output | Op::Input => symbol.magenta(),
        Op::LoopOpen | Op::LoopClose => symbol.bright_red(),
    }
}

/// Renders the first `count` cells as an index/value/char table with a
/// caret under the pointer.
pub fn pretty_print_tape(tape: &[u8], pointer: usize, count: usize) {
    let count = count.min(tape.len());
    let cells = &tape[..count];

    let index_row = (0..count).map(|index| format!("{index:>4}")).join("");
    let value_row = cells.iter().map(|value| format!("{value:>4}")).join("");
    let char_row = cells
        .iter()
        .map(|&value| {
            let shown = if (32..=126).contains(&value) {
                value as char
            } else {
                '.'
            };
            format!("{shown:>4}")
        })
        .join("");
    let pointer_row = (0..count)
        .map(|index| {
            if index == pointer {
                format!("{:>4}", "^")
            } else {
                "    ".to_string()
            }
        })
        .join("");

    println!("{}{}", "cell ".cyan(), index_row.cyan());
    println!("{}{}", "byte ".cyan(), value_row);
    println!("{}{}", "char ".cyan(), char_row.green());
    println!("     {}", pointer_row.bright_red());
}
