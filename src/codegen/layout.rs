//! The reserved-cell convention shared by the code generator, the machine,
//! and the host bridge. These offsets are a wire protocol: already-generated
//! programs depend on them, so they are fixed.

/// Watched by the machine's output instruction; holding [`TRIGGER_SENTINEL`]
/// turns that instruction into a host-call request.
pub const TRIGGER_CELL: usize = 0;

/// Carries the host call number.
pub const CALL_NUMBER_CELL: usize = 1;

/// First of the consecutive argument cells (2 through 7).
pub const FIRST_ARGUMENT_CELL: usize = 2;

/// A call passes at most this many arguments.
pub const MAX_CALL_ARGUMENTS: usize = 6;

/// Receives the call's result byte.
pub const RESULT_CELL: usize = 8;

/// Shuttle cell for the generator's non-destructive copies.
pub const SCRATCH_CELL: usize = 9;

/// First cell the allocator may hand out for variables and buffers.
pub const USER_SPACE_START: usize = 10;

/// Byte that marks an output instruction as a host-call request.
pub const TRIGGER_SENTINEL: u8 = 255;

/// Result byte reported for any failed host call.
pub const CALL_FAILURE_BYTE: u8 = 0xFF;
