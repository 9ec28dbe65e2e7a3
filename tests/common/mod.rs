//! Shared harness: lower a tree, run it with captured streams, and read
//! cells back through the variable bindings.

use std::io;

use tapec::{CompiledProgram, Machine, ast::Node, lower_program};

pub type CapturedMachine = Machine<io::Empty, Vec<u8>>;

pub fn run(nodes: &[Node]) -> (CompiledProgram, CapturedMachine) {
    let compiled = lower_program(nodes).expect("program should lower");
    let mut machine = Machine::with_io(4096, io::empty(), Vec::new());
    machine
        .execute(&compiled.code)
        .expect("program should execute");
    (compiled, machine)
}

pub fn cell(compiled: &CompiledProgram, machine: &CapturedMachine, name: &str) -> u8 {
    let index = compiled
        .variable_cell(name)
        .unwrap_or_else(|| panic!("variable '{name}' should be bound"));
    machine.tape()[index]
}
