//! Copy primitives, unchecked and checked side by side
//!
//! The unchecked primitives model `strcpy` and `gets`: they store bytes at the
//! destination address until the source runs out, with no idea how large the
//! destination is. They go through [`MemoryImage::write`], which only stops at
//! the end of the mapped image.
//!
//! [`bounded_copy`] is the safe counterpart (`strlcpy`): it is given the
//! destination region, never writes past it, and always terminates.

use crate::exercise::errors::Fault;
use crate::memory::image::{MemoryImage, Region};
use crate::memory::Address;

/// `strcpy(dest, src)`: copy up to the first nul of `src`, then a terminator.
///
/// Returns the number of bytes stored, terminator included.
pub fn string_copy(image: &mut MemoryImage, dest: Address, src: &[u8]) -> Result<usize, Fault> {
    let len = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    image.write(dest, &src[..len])?;
    image.write_byte(dest + len as u64, 0)?;
    log::debug!("strcpy stored {} bytes at 0x{:x}", len + 1, dest);
    Ok(len + 1)
}

/// `gets(dest)` fed with `line`: the trailing newline (if any) becomes the
/// terminator. Embedded nul bytes are copied like any other byte.
///
/// Returns the number of bytes stored, terminator included.
pub fn line_copy(image: &mut MemoryImage, dest: Address, line: &[u8]) -> Result<usize, Fault> {
    let body = line.strip_suffix(b"\n").unwrap_or(line);
    image.write(dest, body)?;
    image.write_byte(dest + body.len() as u64, 0)?;
    log::debug!("gets stored {} bytes at 0x{:x}", body.len() + 1, dest);
    Ok(body.len() + 1)
}

/// Result of a [`bounded_copy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedCopy {
    /// Bytes stored, terminator included
    pub written: usize,
    /// Whether the source had to be cut to fit
    pub truncated: bool,
}

/// `strlcpy(dest, src, sizeof dest)`: copy at most `region.len - 1` bytes of
/// `src` (up to its first nul) and terminate. Never leaves `region`.
pub fn bounded_copy(image: &mut MemoryImage, region: &Region, src: &[u8]) -> BoundedCopy {
    if region.len == 0 {
        return BoundedCopy {
            written: 0,
            truncated: !src.is_empty(),
        };
    }
    let len = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    let kept = len.min(region.len - 1);
    let mut bytes = src[..kept].to_vec();
    bytes.push(0);
    let stored = image.write_within(region, 0, &bytes);
    debug_assert_eq!(stored, Ok(()), "bounded copy spilled out of '{}'", region.name);
    if kept < len {
        log::warn!(
            "bounded copy into '{}' cut {} of {} bytes",
            region.name,
            len - kept,
            len
        );
    }
    BoundedCopy {
        written: kept + 1,
        truncated: kept < len,
    }
}
