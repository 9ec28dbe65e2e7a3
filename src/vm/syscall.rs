//! Bridge between the tape and the host kernel.
//!
//! The machine calls in here when an output instruction fires while the
//! trigger cell holds the sentinel. The call request is read straight off
//! the tape per the reserved-cell convention, the host operation runs, and
//! a single result byte lands in the result cell. Failures of every kind
//! stay behind this boundary: the generated program only ever observes the
//! failure byte and decides its own policy.

use std::io::{self, Write};

use crate::codegen::layout::{
    CALL_FAILURE_BYTE, CALL_NUMBER_CELL, FIRST_ARGUMENT_CELL, MAX_CALL_ARGUMENTS, RESULT_CELL,
};

/// Host syscall number for `write`.
#[cfg(target_os = "linux")]
pub const SYS_WRITE: u8 = 1;
#[cfg(target_os = "macos")]
pub const SYS_WRITE: u8 = 4;

/// Host syscall number for `read`.
#[cfg(target_os = "linux")]
pub const SYS_READ: u8 = 0;
#[cfg(target_os = "macos")]
pub const SYS_READ: u8 = 3;

/// Reads the memory-mapped call request off the tape, performs it, and
/// writes the result byte back. Never fails out of the bridge.
pub fn dispatch<W: Write>(tape: &mut [u8], output: &mut W) {
    let number = tape[CALL_NUMBER_CELL];

    // Trailing zero-valued arguments are not part of the call; zeroes in
    // the middle are passed as-is.
    let mut arguments: Vec<u8> =
        tape[FIRST_ARGUMENT_CELL..FIRST_ARGUMENT_CELL + MAX_CALL_ARGUMENTS].to_vec();
    while arguments.last() == Some(&0) {
        arguments.pop();
    }

    let result = perform(tape, number, &arguments, output);
    tape[RESULT_CELL] = result.unwrap_or(CALL_FAILURE_BYTE);
}

fn perform<W: Write>(tape: &[u8], number: u8, arguments: &[u8], output: &mut W) -> Option<u8> {
    if number == SYS_WRITE {
        return write_from_tape(tape, arguments, output);
    }

    let result = raw_syscall(number, arguments);
    if result < 0 {
        None
    } else {
        Some((result & 0xFF) as u8)
    }
}

/// The write call reads its buffer directly out of tape memory:
/// `(descriptor, buffer start, length)`.
fn write_from_tape<W: Write>(tape: &[u8], arguments: &[u8], output: &mut W) -> Option<u8> {
    let descriptor = *arguments.first()?;
    let start = *arguments.get(1)? as usize;
    let length = *arguments.get(2)? as usize;
    let buffer = tape.get(start..start + length)?;

    match descriptor {
        // Descriptors 1 and 2 go through the machine's own streams so the
        // bytes interleave correctly with ordinary output.
        1 => {
            output.write_all(buffer).ok()?;
            output.flush().ok()?;
        }
        2 => {
            io::stderr().write_all(buffer).ok()?;
        }
        _ => {
            let written = unsafe {
                libc::write(
                    descriptor as libc::c_int,
                    buffer.as_ptr() as *const libc::c_void,
                    length,
                )
            };
            if written < 0 {
                return None;
            }
            return Some((written & 0xFF) as u8);
        }
    }

    Some((length & 0xFF) as u8)
}

/// Forwards to the kernel with exactly the truncated argument count.
fn raw_syscall(number: u8, arguments: &[u8]) -> i64 {
    // The kernel interface word differs between the supported hosts.
    #[cfg(target_os = "linux")]
    type Word = libc::c_long;
    #[cfg(target_os = "macos")]
    type Word = libc::c_int;

    let number = Word::from(number);
    let arg = |index: usize| Word::from(arguments[index]);

    let result = unsafe {
        match arguments.len() {
            0 => libc::syscall(number),
            1 => libc::syscall(number, arg(0)),
            2 => libc::syscall(number, arg(0), arg(1)),
            3 => libc::syscall(number, arg(0), arg(1), arg(2)),
            4 => libc::syscall(number, arg(0), arg(1), arg(2), arg(3)),
            5 => libc::syscall(number, arg(0), arg(1), arg(2), arg(3), arg(4)),
            _ => libc::syscall(number, arg(0), arg(1), arg(2), arg(3), arg(4), arg(5)),
        }
    };

    i64::from(result)
}
