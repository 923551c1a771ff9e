//! Simulated memory for the exercises
//!
//! This module provides the memory abstractions an exercise runs against:
//! - [`value`]: addresses, sentinel kinds and decoded sentinel values
//! - [`image`]: a flat, mapped byte region with named sub-ranges
//! - [`layout`]: the activation record of one exercise, built on an image
//! - [`code`]: the simulated text segment that control transfers land in
//!
//! # Type Sizes
//!
//! Sizes follow the x86-64 System V ABI the exercises target:
//! - `int`: 4 bytes
//! - `char`: 1 byte
//! - pointer / return address: 8 bytes
//!
//! # Byte Order
//!
//! Multi-byte cells are decoded with a configurable [`ByteOrder`]. The default
//! is little-endian, so the integer `0x61626364` sits in memory as `"dcba"`.

pub mod code;
pub mod image;
pub mod layout;
pub mod value;

pub use value::Address;

/// Size of a C `int`
pub const INT_SIZE: usize = 4;

/// Size of a pointer, function pointer or saved return address
pub const POINTER_SIZE: usize = 8;

/// Alignment of stack slots holding pointers
pub const SLOT_ALIGN: usize = 8;

/// Byte order used to encode and decode multi-byte cells of the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    pub fn encode_u32(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }

    pub fn decode_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }

    pub fn encode_u64(self, value: u64) -> [u8; 8] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }

    pub fn decode_u64(self, bytes: [u8; 8]) -> u64 {
        match self {
            ByteOrder::Little => u64::from_le_bytes(bytes),
            ByteOrder::Big => u64::from_be_bytes(bytes),
        }
    }

    /// Encode the low `width` bytes of `value`, as a `%hhn`/`%hn`/`%n` store would
    pub fn encode_truncated(self, value: u64, width: usize) -> Vec<u8> {
        let full = self.encode_u64(value);
        match self {
            ByteOrder::Little => full[..width].to_vec(),
            ByteOrder::Big => full[8 - width..].to_vec(),
        }
    }
}

/// Round `offset` up to the next multiple of `align`
pub fn align_up(offset: usize, align: usize) -> usize {
    offset.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_in_little_endian_memory() {
        assert_eq!(&ByteOrder::Little.encode_u32(0x6162_6364), b"dcba");
        assert_eq!(&ByteOrder::Big.encode_u32(0x6162_6364), b"abcd");
    }

    #[test]
    fn test_truncated_store_keeps_low_bytes() {
        assert_eq!(ByteOrder::Little.encode_truncated(0x1234, 2), vec![0x34, 0x12]);
        assert_eq!(ByteOrder::Big.encode_truncated(0x1234, 2), vec![0x12, 0x34]);
        assert_eq!(ByteOrder::Little.encode_truncated(0x1ff, 1), vec![0xff]);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(36, 8), 40);
        assert_eq!(align_up(40, 8), 40);
        assert_eq!(align_up(0, 8), 0);
    }
}
