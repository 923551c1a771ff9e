//! Sentinel representation
//!
//! This module defines what an exercise watches after the copy:
//!
//! - [`SentinelKind`]: which cell sits next to the buffer
//! - [`SentinelValue`]: that cell decoded after the copy
//!
//! # Sentinel Kinds
//!
//! - [`SentinelKind::Integer`]: a 4-byte `volatile int`, starts at 0
//! - [`SentinelKind::FunctionPointer`]: an 8-byte function pointer, starts null
//! - [`SentinelKind::ReturnAddress`]: the routine's own return slot, written by
//!   the calling convention rather than by the exercise

use super::{INT_SIZE, POINTER_SIZE};
use std::fmt;

/// Memory address type (64-bit)
pub type Address = u64;

/// The cell placed directly after the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelKind {
    Integer,
    FunctionPointer,
    ReturnAddress,
}

impl SentinelKind {
    /// Size of the sentinel cell in bytes
    pub fn size(self) -> usize {
        match self {
            SentinelKind::Integer => INT_SIZE,
            SentinelKind::FunctionPointer | SentinelKind::ReturnAddress => POINTER_SIZE,
        }
    }

    /// Name used for the sentinel region in the image
    pub fn region_name(self) -> &'static str {
        match self {
            SentinelKind::Integer => "changeme",
            SentinelKind::FunctionPointer => "fp",
            SentinelKind::ReturnAddress => "return address",
        }
    }
}

impl fmt::Display for SentinelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentinelKind::Integer => write!(f, "int"),
            SentinelKind::FunctionPointer => write!(f, "function pointer"),
            SentinelKind::ReturnAddress => write!(f, "return address"),
        }
    }
}

/// A sentinel cell decoded from the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelValue {
    Int(u32),
    Pointer(Address),
}

impl SentinelValue {
    /// Get the integer value, returns None if not an Int
    pub fn as_int(&self) -> Option<u32> {
        match self {
            SentinelValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the pointer value, returns None if not a Pointer
    pub fn as_pointer(&self) -> Option<Address> {
        match self {
            SentinelValue::Pointer(addr) => Some(*addr),
            _ => None,
        }
    }

    /// Whether the cell still holds all-zero bytes
    pub fn is_zero(&self) -> bool {
        match self {
            SentinelValue::Int(n) => *n == 0,
            SentinelValue::Pointer(addr) => *addr == 0,
        }
    }
}

impl fmt::Display for SentinelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentinelValue::Int(n) => write!(f, "0x{:08x}", n),
            SentinelValue::Pointer(0) => write!(f, "(nil)"),
            SentinelValue::Pointer(addr) => write!(f, "0x{:x}", addr),
        }
    }
}
