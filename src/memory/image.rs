//! Flat memory image with named regions
//!
//! A [`MemoryImage`] is one contiguous, mapped byte range starting at a fixed
//! virtual address. [`Region`]s name sub-ranges of it (`buffer`, `changeme`,
//! `return address`, ...) but do not fence them: [`MemoryImage::write`] only
//! refuses bytes that fall outside the image, never bytes that cross from one
//! region into the next. That unfenced write is the whole exploit surface.
//!
//! The fenced counterpart is [`MemoryImage::write_within`], which refuses to
//! run past the end of the region it was given.

use super::value::Address;
use super::ByteOrder;
use crate::exercise::errors::Fault;
use rustc_hash::FxHashMap;

/// What a region holds, used for display and for locating slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Local variable the exercise copies into or reads from
    Buffer,
    /// The watched cell after the buffer
    Sentinel,
    /// Alignment bytes nothing reads
    Padding,
    /// A caller's saved frame pointer
    FramePointer,
    /// A saved return address
    ReturnSlot,
}

/// A named sub-range of the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub offset: usize,
    pub len: usize,
    pub kind: RegionKind,
}

impl Region {
    pub fn new(name: impl Into<String>, offset: usize, len: usize, kind: RegionKind) -> Self {
        Region {
            name: name.into(),
            offset,
            len,
            kind,
        }
    }

    /// One past the last offset of the region
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        offset >= self.offset && offset < self.end()
    }
}

/// A contiguous mapped byte range at a fixed base address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
    base: Address,
    bytes: Vec<u8>,
    regions: Vec<Region>,
    index: FxHashMap<String, usize>,
}

impl MemoryImage {
    /// Create a zero-filled image covering `size` bytes from `base`
    pub fn new(base: Address, size: usize) -> Self {
        MemoryImage {
            base,
            bytes: vec![0; size],
            regions: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Register a named region. Regions are kept in insertion order.
    pub fn add_region(&mut self, region: Region) {
        self.index.insert(region.name.clone(), self.regions.len());
        self.regions.push(region);
    }

    pub fn base(&self) -> Address {
        self.base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// One past the last mapped address
    pub fn end(&self) -> Address {
        self.base + self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.index.get(name).map(|&i| &self.regions[i])
    }

    /// Region covering the given image offset, if any
    pub fn region_at(&self, offset: usize) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains_offset(offset))
    }

    /// Virtual address of a region's first byte
    pub fn address_of(&self, region: &Region) -> Address {
        self.base + region.offset as u64
    }

    pub fn is_mapped(&self, addr: Address) -> bool {
        addr >= self.base && addr < self.end()
    }

    fn offset_of(&self, addr: Address) -> Result<usize, Fault> {
        if self.is_mapped(addr) {
            Ok((addr - self.base) as usize)
        } else {
            Err(Fault::Segfault { address: addr })
        }
    }

    pub fn read_byte(&self, addr: Address) -> Result<u8, Fault> {
        let offset = self.offset_of(addr)?;
        Ok(self.bytes[offset])
    }

    /// Read `len` bytes from `addr`; every byte must be mapped
    pub fn read(&self, addr: Address, len: usize) -> Result<&[u8], Fault> {
        let start = self.offset_of(addr)?;
        let end = start + len;
        if end > self.bytes.len() {
            return Err(Fault::Segfault {
                address: self.end(),
            });
        }
        Ok(&self.bytes[start..end])
    }

    pub fn read_u32(&self, addr: Address, order: ByteOrder) -> Result<u32, Fault> {
        let mut cell = [0u8; 4];
        cell.copy_from_slice(self.read(addr, 4)?);
        Ok(order.decode_u32(cell))
    }

    pub fn read_u64(&self, addr: Address, order: ByteOrder) -> Result<u64, Fault> {
        let mut cell = [0u8; 8];
        cell.copy_from_slice(self.read(addr, 8)?);
        Ok(order.decode_u64(cell))
    }

    /// Read a nul-terminated string starting at `addr` (terminator excluded)
    pub fn read_c_string(&self, addr: Address) -> Result<Vec<u8>, Fault> {
        let mut bytes = Vec::new();
        let mut current = addr;
        loop {
            let byte = self.read_byte(current)?;
            if byte == 0 {
                return Ok(bytes);
            }
            bytes.push(byte);
            current += 1;
        }
    }

    pub fn write_byte(&mut self, addr: Address, byte: u8) -> Result<(), Fault> {
        let offset = self.offset_of(addr)?;
        self.bytes[offset] = byte;
        Ok(())
    }

    /// Write `bytes` starting at `addr` with no regard for region boundaries.
    ///
    /// Bytes are stored one at a time in ascending address order, so a write
    /// that runs off the end of the image has already clobbered everything up
    /// to the last mapped byte when it faults.
    pub fn write(&mut self, addr: Address, bytes: &[u8]) -> Result<(), Fault> {
        for (i, &byte) in bytes.iter().enumerate() {
            self.write_byte(addr + i as u64, byte)?;
        }
        Ok(())
    }

    /// Write `bytes` at `offset` inside `region`, refusing to cross its end.
    ///
    /// Returns the number of bytes that did not fit (nothing is written then).
    pub fn write_within(
        &mut self,
        region: &Region,
        offset: usize,
        bytes: &[u8],
    ) -> Result<(), usize> {
        if offset + bytes.len() > region.len {
            return Err(offset + bytes.len() - region.len);
        }
        let start = region.offset + offset;
        self.bytes[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn write_u32(&mut self, addr: Address, value: u32, order: ByteOrder) -> Result<(), Fault> {
        self.write(addr, &order.encode_u32(value))
    }

    pub fn write_u64(&mut self, addr: Address, value: u64, order: ByteOrder) -> Result<(), Fault> {
        self.write(addr, &order.encode_u64(value))
    }

    /// Offsets whose byte differs from `other` (images must be the same size)
    pub fn diff(&self, other: &MemoryImage) -> Vec<usize> {
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect()
    }
}
