//! Frame-local scratch memory

use bytes::Bytes;
use primitive_types::U256;

/// Size in bytes of a machine word; memory length is always a multiple
/// of this after any extension.
pub const WORD_SIZE: usize = 32;

/// Byte-addressable, zero-filled scratch space owned by one frame.
///
/// Memory never shrinks. Callers charge extension gas, extend, and only
/// then access, in that order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Create new empty memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Current size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if memory is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grow memory to cover `[offset, offset + size)`, rounded up to the
    /// word size. Idempotent: a no-op when the region is already covered
    /// or `size` is zero.
    pub fn extend(&mut self, offset: usize, size: usize) {
        if size == 0 {
            return;
        }
        let end = offset.saturating_add(size);
        if end > self.data.len() {
            let aligned = end.div_ceil(WORD_SIZE) * WORD_SIZE;
            self.data.resize(aligned, 0);
        }
    }

    /// Read `size` bytes starting at `offset`. A zero-length read yields
    /// an empty buffer; bytes past the current length read as zero.
    pub fn read(&self, offset: usize, size: usize) -> Bytes {
        if size == 0 {
            return Bytes::new();
        }
        let mut out = vec![0u8; size];
        let end = offset.saturating_add(size).min(self.data.len());
        if offset < self.data.len() {
            out[..end - offset].copy_from_slice(&self.data[offset..end]);
        }
        Bytes::from(out)
    }

    /// Write `data` starting at `offset`. A zero-length write is a no-op.
    pub fn write(&mut self, offset: usize, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.extend(offset, data.len());
        self.data[offset..offset + data.len()].copy_from_slice(data);
    }
}

/// Truncate a word to a memory offset or size.
///
/// Callers charge extension gas before any access; a region too large to
/// address can never be paid for, so the high bits a successful charge
/// rules out are simply discarded.
pub fn to_offset(word: U256) -> usize {
    word.low_u64() as usize
}
