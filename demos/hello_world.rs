//! Builds a tree that asks the host to write a greeting, lowers it, and
//! runs the result on a fresh machine.

use tapec::{
    ast::Node,
    lower_program,
    vm::{DEFAULT_TAPE_LENGTH, Machine, syscall::SYS_WRITE},
};

fn main() {
    let message = "Hello, world!\n";
    let nodes = [
        Node::assign("message", Node::string(message)),
        Node::host_call(
            SYS_WRITE,
            vec![
                Node::Literal(1),
                Node::variable("message"),
                Node::Literal(message.len() as u8),
            ],
        ),
    ];

    let compiled = lower_program(&nodes).expect("demo should lower");
    Machine::new(DEFAULT_TAPE_LENGTH)
        .execute(&compiled.code)
        .expect("demo should execute");
}
