// Constants shared by the exercise presets

use crate::memory::Address;

/// One past the highest mapped stack address; frames are laid out below it
/// Fixed, so every run of an exercise sees the same addresses
pub const STACK_TOP: Address = 0x7fff_ffff_e000;

/// The integer the first level wants to see in `changeme` ("abcd" as bytes
/// of a big-endian int, "dcba" in little-endian memory)
pub const MAGIC: u32 = 0x6162_6364;

/// Where `main` returns to inside the C runtime
pub const LIBC_START_CALL_MAIN: Address = 0x7fff_f7c2_9d90;

/// Capacity of the bounded `line` buffer that feeds the format exercise
pub const LINE_BUFFER_SIZE: usize = 16;

/// Size passed to `fgets` for the `line` buffer (`sizeof(buffer) - 1`)
pub const LINE_READ_LIMIT: usize = LINE_BUFFER_SIZE - 1;

/// Largest buffer capacity an exercise may be given
pub const MAX_BUFFER_CAPACITY: usize = 64 * 1024;

/// Number of variadic arguments passed in registers before the stack is used
pub const REGISTER_ARGS: usize = 4;

/// Snapshot history limit for one run (in bytes)
pub const SNAPSHOT_MEMORY_LIMIT: usize = 16 * 1024 * 1024;
