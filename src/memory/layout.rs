//! Activation record of an exercise
//!
//! [`MemoryLayout`] turns an [`ExerciseConfig`] into concrete offsets inside a
//! [`MemoryImage`]. The buffer and the sentinel are placed back to back by
//! construction, never by whatever a compiler would choose:
//!
//! ```text
//! low addresses                                              high addresses
//! [line (hw2 only)][buffer ........][sentinel][pad][saved rbp][return addr]
//!                                   ^ buffer_address + capacity
//! ```
//!
//! For the return-address exercise the sentinel *is* the routine's return
//! slot, followed by `main`'s saved frame pointer and return address:
//!
//! ```text
//! [buffer ........][return addr][main saved rbp][main return addr]
//! ```
//!
//! The image ends at [`STACK_TOP`]; anything above it is unmapped.

use super::image::{MemoryImage, Region, RegionKind};
use super::value::{Address, SentinelKind, SentinelValue};
use super::{align_up, ByteOrder, POINTER_SIZE, SLOT_ALIGN};
use crate::exercise::config::ExerciseConfig;
use crate::exercise::constants::{
    LIBC_START_CALL_MAIN, LINE_BUFFER_SIZE, MAX_BUFFER_CAPACITY, STACK_TOP,
};
use crate::exercise::errors::Fault;

/// A saved return address the routine will `ret` through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnSlot {
    pub region: Region,
    /// Function that owns the slot (returns through it)
    pub owner: String,
    /// Address the slot holds until something overwrites it
    pub expected: Address,
}

/// Offsets of every local and slot of one exercise frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLayout {
    base: Address,
    size: usize,
    order: ByteOrder,
    sentinel_kind: SentinelKind,
    regions: Vec<Region>,
    buffer: Region,
    sentinel: Region,
    line: Option<Region>,
    return_slots: Vec<ReturnSlot>,
}

impl MemoryLayout {
    /// Lay out the frame described by `config`
    pub fn new(config: &ExerciseConfig) -> Self {
        let mut regions = Vec::new();
        let mut offset = 0;

        let line = if config.has_line_buffer() {
            let line = Region::new("line", offset, LINE_BUFFER_SIZE, RegionKind::Buffer);
            offset += LINE_BUFFER_SIZE;
            regions.push(line.clone());
            Some(line)
        } else {
            None
        };

        let capacity = config.buffer_capacity.min(MAX_BUFFER_CAPACITY);
        if capacity < config.buffer_capacity {
            log::warn!(
                "buffer capacity {} capped at {}",
                config.buffer_capacity,
                capacity
            );
        }
        let buffer = Region::new(config.buffer_name(), offset, capacity, RegionKind::Buffer);
        offset = buffer.end();
        regions.push(buffer.clone());

        let sentinel = Region::new(
            config.sentinel.region_name(),
            offset,
            config.sentinel.size(),
            RegionKind::Sentinel,
        );
        offset = sentinel.end();
        regions.push(sentinel.clone());

        let mut return_slots = Vec::new();
        let (caller_rbp, caller_ret) = match config.sentinel {
            SentinelKind::ReturnAddress => {
                return_slots.push(ReturnSlot {
                    region: sentinel.clone(),
                    owner: "start_level".to_string(),
                    expected: config.caller_resume.unwrap_or(LIBC_START_CALL_MAIN),
                });
                ("main saved rbp", "main return address")
            }
            _ => ("saved rbp", "return address"),
        };

        let aligned = align_up(offset, SLOT_ALIGN);
        if aligned > offset {
            regions.push(Region::new(
                "padding",
                offset,
                aligned - offset,
                RegionKind::Padding,
            ));
            offset = aligned;
        }

        regions.push(Region::new(
            caller_rbp,
            offset,
            POINTER_SIZE,
            RegionKind::FramePointer,
        ));
        offset += POINTER_SIZE;

        let ret = Region::new(caller_ret, offset, POINTER_SIZE, RegionKind::ReturnSlot);
        offset += POINTER_SIZE;
        regions.push(ret.clone());
        return_slots.push(ReturnSlot {
            region: ret,
            owner: "main".to_string(),
            expected: LIBC_START_CALL_MAIN,
        });

        MemoryLayout {
            base: STACK_TOP - offset as u64,
            size: offset,
            order: config.byte_order,
            sentinel_kind: config.sentinel,
            regions,
            buffer,
            sentinel,
            line,
            return_slots,
        }
    }

    /// Build the initialized image: zeroed locals, null sentinel, return
    /// slots holding their expected addresses.
    pub fn instantiate(&self) -> MemoryImage {
        let mut image = MemoryImage::new(self.base, self.size);
        for region in &self.regions {
            image.add_region(region.clone());
        }
        for slot in &self.return_slots {
            let value = self.order.encode_u64(slot.expected);
            let stored = image.write_within(&slot.region, 0, &value);
            debug_assert_eq!(
                stored,
                Ok(()),
                "slot '{}' is not pointer-sized",
                slot.region.name
            );
        }
        image
    }

    pub fn base(&self) -> Address {
        self.base
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn sentinel_kind(&self) -> SentinelKind {
        self.sentinel_kind
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn buffer(&self) -> &Region {
        &self.buffer
    }

    pub fn sentinel(&self) -> &Region {
        &self.sentinel
    }

    pub fn line(&self) -> Option<&Region> {
        self.line.as_ref()
    }

    /// Return slots, innermost (first to be returned through) first
    pub fn return_slots(&self) -> &[ReturnSlot] {
        &self.return_slots
    }

    pub fn buffer_address(&self) -> Address {
        self.base + self.buffer.offset as u64
    }

    pub fn sentinel_address(&self) -> Address {
        self.base + self.sentinel.offset as u64
    }

    pub fn line_address(&self) -> Option<Address> {
        self.line.as_ref().map(|r| self.base + r.offset as u64)
    }

    /// Bytes from the start of the buffer to the first sentinel byte
    pub fn filler_len(&self) -> usize {
        self.sentinel.offset - self.buffer.offset
    }

    /// The adjacency contract: the sentinel starts right where the buffer ends
    pub fn is_adjacent(&self) -> bool {
        self.buffer.end() == self.sentinel.offset
    }

    /// Decode the sentinel cell from `image`
    pub fn read_sentinel(&self, image: &MemoryImage) -> Result<SentinelValue, Fault> {
        let addr = self.sentinel_address();
        match self.sentinel_kind {
            SentinelKind::Integer => Ok(SentinelValue::Int(image.read_u32(addr, self.order)?)),
            SentinelKind::FunctionPointer | SentinelKind::ReturnAddress => {
                Ok(SentinelValue::Pointer(image.read_u64(addr, self.order)?))
            }
        }
    }

    /// Current content of a return slot
    pub fn read_return_slot(
        &self,
        image: &MemoryImage,
        slot: &ReturnSlot,
    ) -> Result<Address, Fault> {
        image.read_u64(self.base + slot.region.offset as u64, self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_layout_is_adjacent_and_aligned() {
        let layout = MemoryLayout::new(&ExerciseConfig::hw1_level1());
        assert!(layout.is_adjacent());
        assert_eq!(layout.filler_len(), 32);
        assert_eq!(layout.sentinel().len, 4);
        // 32 + 4 + 4 padding + 8 saved rbp + 8 return address
        assert_eq!(layout.size(), 56);
        assert_eq!(layout.base() + layout.size() as u64, STACK_TOP);
        assert_eq!(layout.return_slots().len(), 1);
    }

    #[test]
    fn test_return_address_layout_has_two_slots() {
        let layout = MemoryLayout::new(&ExerciseConfig::hw1_level3());
        assert!(layout.is_adjacent());
        let slots = layout.return_slots();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].region, *layout.sentinel());
        assert_eq!(slots[0].owner, "start_level");
        assert_eq!(slots[1].owner, "main");
        assert_eq!(layout.size(), 64 + 8 + 8 + 8);
    }

    #[test]
    fn test_format_layout_puts_line_lowest() {
        let layout = MemoryLayout::new(&ExerciseConfig::hw2_level1());
        let line = layout.line().expect("line buffer");
        assert_eq!(line.offset, 0);
        assert_eq!(layout.buffer().offset, LINE_BUFFER_SIZE);
        assert_eq!(layout.buffer().name, "dest");
        assert_eq!(layout.line_address(), Some(layout.base()));
    }

    #[test]
    fn test_instantiate_initializes_slots_and_sentinel() {
        let config = ExerciseConfig::hw1_level3();
        let layout = MemoryLayout::new(&config);
        let image = layout.instantiate();
        assert_eq!(
            layout.read_sentinel(&image).unwrap(),
            SentinelValue::Pointer(config.caller_resume.unwrap())
        );
        let main_slot = &layout.return_slots()[1];
        assert_eq!(
            layout.read_return_slot(&image, main_slot).unwrap(),
            LIBC_START_CALL_MAIN
        );

        let layout = MemoryLayout::new(&ExerciseConfig::hw1_level2());
        let image = layout.instantiate();
        assert_eq!(layout.read_sentinel(&image).unwrap(), SentinelValue::Pointer(0));
    }

    #[test]
    fn test_oversized_capacity_is_capped() {
        let mut config = ExerciseConfig::hw1_level1();
        config.buffer_capacity = usize::MAX;
        let layout = MemoryLayout::new(&config);
        assert_eq!(layout.buffer().len, MAX_BUFFER_CAPACITY);
        assert!(layout.is_adjacent());
        assert_eq!(layout.base() + layout.size() as u64, STACK_TOP);
        assert_eq!(layout.instantiate().len(), layout.size());
    }

    #[test]
    fn test_unaligned_capacity_keeps_adjacency() {
        let config = ExerciseConfig::hw1_level2().with_buffer_capacity(30);
        let layout = MemoryLayout::new(&config);
        assert!(layout.is_adjacent());
        assert_eq!(layout.sentinel().offset, 30);
        assert_eq!(layout.size(), 30 + 8 + 2 + 8 + 8);
    }
}
