//! # The Byte Store contract
//!
//! The node table, edge table, and geometry heap do not know or care
//! whether their bytes live in a `Vec<u8>`, a memory-mapped file, or
//! something more exotic. They only depend on [`ByteStore`]: random
//! access reads/writes of 32-bit integers and byte spans, a small
//! fixed header area, and capacity management.
//!
//! This module ships two reference implementations ([`InMemoryByteStore`]
//! and [`MmapByteStore`]); callers are free to provide their own.

mod memory;
mod mmap;

pub use memory::InMemoryByteStore;
pub use mmap::MmapByteStore;

use crate::error::Result;

/// The number of reserved 32-bit header slots at the start of every region.
///
/// Nodes use all seven; edges use three; geometry uses one. Unused slots
/// are left at zero and ignored.
pub const HEADER_SLOT_COUNT: usize = 7;

/// Byte size of the fixed header area carried by every region.
pub const HEADER_BYTES: u64 = (HEADER_SLOT_COUNT * 4) as u64;

/// The byte order a store reads and writes its integers in.
///
/// Both reference implementations in this crate are little-endian; the
/// contract exposes this so a caller reconstructing a region from raw
/// bytes written by someone else's store can detect a mismatch early
/// rather than silently misinterpreting multi-byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// A pluggable, byte-addressable backing region.
///
/// Implementations own one contiguous region: a small fixed header
/// ([`HEADER_BYTES`] long) followed by a growable body. All offsets
/// passed to the body accessors (`get_int`, `get_bytes`, ...) are
/// relative to the start of the body, *not* the header.
pub trait ByteStore {
    /// Creates a fresh, empty region with at least `initial_bytes` of
    /// body capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage could not be allocated
    /// (e.g. a file could not be created for an [`MmapByteStore`]).
    fn create(&mut self, initial_bytes: u64) -> Result<()>;

    /// Attempts to reconstruct this region from storage that already
    /// exists (e.g. a file written by a previous `flush`).
    ///
    /// Returns `Ok(true)` if existing data was found and loaded, or
    /// `Ok(false)` if there was nothing to load (the caller should then
    /// fall back to `create`).
    ///
    /// # Errors
    ///
    /// Returns an error if the region exists but could not be read.
    fn load_existing(&mut self) -> Result<bool>;

    /// Commits all writes made so far to durable storage.
    ///
    /// For [`InMemoryByteStore`] this is a no-op (there is nothing
    /// durable to commit to); for [`MmapByteStore`] it flushes the
    /// mapping to the backing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying flush fails.
    fn flush(&mut self) -> Result<()>;

    /// Releases any resources held by this region (file handles, maps).
    /// After `close`, no other method may be called.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing the resource fails.
    fn close(&mut self) -> Result<()>;

    /// The current body capacity, in bytes.
    fn capacity(&self) -> u64;

    /// Grows the body capacity to at least `new_bytes`, if it isn't
    /// already that large. Returns whether capacity actually grew (a
    /// caller asking to grow to a size already available gets `false`,
    /// not an error).
    ///
    /// Implementations are free to over-allocate for amortized growth;
    /// callers must tolerate capacity being larger than requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying allocation/remap fails.
    fn inc_capacity(&mut self, new_bytes: u64) -> Result<bool>;

    /// Shrinks the body to exactly `bytes`. Implementations may choose
    /// not to release the underlying allocation immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying operation fails.
    fn trim_to(&mut self, bytes: u64) -> Result<()>;

    /// Reads a little/big-endian (per [`ByteStore::byte_order`]) 32-bit
    /// integer at the given body offset.
    fn get_int(&self, offset: u64) -> i32;

    /// Writes a 32-bit integer at the given body offset.
    fn set_int(&mut self, offset: u64, value: i32);

    /// Copies `buf.len()` bytes starting at the given body offset into `buf`.
    fn get_bytes(&self, offset: u64, buf: &mut [u8]);

    /// Writes `buf` starting at the given body offset.
    fn set_bytes(&mut self, offset: u64, buf: &[u8]);

    /// Reads one of the fixed header slots (`slot_offset` is a byte
    /// offset into the header area, a multiple of 4 less than
    /// [`HEADER_BYTES`]).
    fn get_header(&self, slot_offset: u64) -> i32;

    /// Writes one of the fixed header slots.
    fn set_header(&mut self, slot_offset: u64, value: i32);

    /// Hints the preferred growth increment for future `inc_capacity`
    /// calls. Purely an optimization; implementations may ignore it.
    fn set_segment_size(&mut self, bytes: u64);

    /// Copies this region's entire header and body into `other`,
    /// replacing whatever `other` previously held.
    ///
    /// # Errors
    ///
    /// Returns an error if `other` cannot grow to fit this region.
    fn copy_to(&self, other: &mut dyn ByteStore) -> Result<()> {
        other.create(self.capacity())?;
        other.inc_capacity(self.capacity())?;
        let mut buf = vec![0u8; self.capacity() as usize];
        self.get_bytes(0, &mut buf);
        other.set_bytes(0, &buf);
        for slot in (0..HEADER_BYTES).step_by(4) {
            other.set_header(slot, self.get_header(slot));
        }
        Ok(())
    }

    /// The byte order this store's integers are read/written in.
    fn byte_order(&self) -> ByteOrder;
}
