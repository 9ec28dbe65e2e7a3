//! Compares two variables and writes one of two messages depending on the
//! outcome. The chosen buffer's address and length both live in variables
//! by the time the host call fires.

use tapec::{
    ast::{ComparisonOperatorKind, Node},
    lower_program,
    vm::{DEFAULT_TAPE_LENGTH, Machine, syscall::SYS_WRITE},
};

fn main() {
    let smaller = "y is smaller\n";
    let not_smaller = "y is not smaller\n";

    let nodes = [
        Node::assign("x", Node::Literal(5)),
        Node::assign("y", Node::Literal(3)),
        Node::if_else(
            Node::compare(
                ComparisonOperatorKind::LessThan,
                Node::variable("y"),
                Node::variable("x"),
            ),
            Node::block(vec![
                Node::assign("msg", Node::string(smaller)),
                Node::assign("len", Node::Literal(smaller.len() as u8)),
            ]),
            Node::block(vec![
                Node::assign("msg", Node::string(not_smaller)),
                Node::assign("len", Node::Literal(not_smaller.len() as u8)),
            ]),
        ),
        Node::host_call(
            SYS_WRITE,
            vec![
                Node::Literal(1),
                Node::variable("msg"),
                Node::variable("len"),
            ],
        ),
    ];

    let compiled = lower_program(&nodes).expect("demo should lower");
    Machine::new(DEFAULT_TAPE_LENGTH)
        .execute(&compiled.code)
        .expect("demo should execute");
}
