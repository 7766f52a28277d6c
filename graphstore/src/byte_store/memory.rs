use super::{ByteOrder, ByteStore, HEADER_SLOT_COUNT};
use crate::error::Result;
use tracing::debug;

/// A growable, heap-resident [`ByteStore`].
///
/// This is the default backing store for tests and for building a graph
/// entirely in memory. It never persists anything on `flush`/`close` —
/// callers who need durability should use [`super::MmapByteStore`] (or
/// copy an `InMemoryByteStore` into one via [`ByteStore::copy_to`]).
#[derive(Debug, Default, Clone)]
pub struct InMemoryByteStore {
    header: [i32; HEADER_SLOT_COUNT],
    body: Vec<u8>,
    segment_size_hint: u64,
}

impl InMemoryByteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteStore for InMemoryByteStore {
    fn create(&mut self, initial_bytes: u64) -> Result<()> {
        self.header = [0; HEADER_SLOT_COUNT];
        self.body = vec![0u8; initial_bytes as usize];
        debug!(bytes = initial_bytes, "created in-memory byte store");
        Ok(())
    }

    fn load_existing(&mut self) -> Result<bool> {
        // There is nothing external to reload from; whatever is already
        // resident in `self.body` (e.g. populated by a prior `create` +
        // writes in the same process) is all there is.
        Ok(!self.body.is_empty())
    }

    fn flush(&mut self) -> Result<()> {
        // Nothing durable backs this store.
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.body.clear();
        self.body.shrink_to_fit();
        Ok(())
    }

    fn capacity(&self) -> u64 {
        self.body.len() as u64
    }

    fn inc_capacity(&mut self, new_bytes: u64) -> Result<bool> {
        if new_bytes <= self.capacity() {
            return Ok(false);
        }
        // Amortize growth the way a segmented/mmap store would, so
        // callers that depend on over-allocation tolerance (see
        // ensure_node_index) are exercised even by the in-memory store.
        let increment = self.segment_size_hint.max(new_bytes - self.capacity());
        let target = self.capacity() + increment;
        self.body.resize(target.max(new_bytes) as usize, 0);
        debug!(new_capacity = self.body.len(), "grew in-memory byte store");
        Ok(true)
    }

    fn trim_to(&mut self, bytes: u64) -> Result<()> {
        self.body.truncate(bytes as usize);
        Ok(())
    }

    fn get_int(&self, offset: u64) -> i32 {
        let o = offset as usize;
        i32::from_le_bytes(self.body[o..o + 4].try_into().expect("4-byte slice"))
    }

    fn set_int(&mut self, offset: u64, value: i32) {
        let o = offset as usize;
        self.body[o..o + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn get_bytes(&self, offset: u64, buf: &mut [u8]) {
        let o = offset as usize;
        buf.copy_from_slice(&self.body[o..o + buf.len()]);
    }

    fn set_bytes(&mut self, offset: u64, buf: &[u8]) {
        let o = offset as usize;
        self.body[o..o + buf.len()].copy_from_slice(buf);
    }

    fn get_header(&self, slot_offset: u64) -> i32 {
        self.header[(slot_offset / 4) as usize]
    }

    fn set_header(&mut self, slot_offset: u64, value: i32) {
        self.header[(slot_offset / 4) as usize] = value;
    }

    fn set_segment_size(&mut self, bytes: u64) {
        self.segment_size_hint = bytes;
    }

    fn byte_order(&self) -> ByteOrder {
        ByteOrder::Little
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn grows_and_round_trips_ints() {
        let mut store = InMemoryByteStore::new();
        store.create(16).unwrap();
        store.set_int(0, 42);
        store.set_int(12, -7);
        assert_eq!(store.get_int(0), 42);
        assert_eq!(store.get_int(12), -7);

        assert!(store.inc_capacity(64).unwrap());
        assert!(store.capacity() >= 64);
        // Pre-existing data survives growth.
        assert_eq!(store.get_int(0), 42);
        assert!(!store.inc_capacity(64).unwrap());
    }

    #[test]
    fn header_slots_are_independent_of_body() {
        let mut store = InMemoryByteStore::new();
        store.create(4).unwrap();
        store.set_header(0, 7);
        store.set_header(24, 99);
        store.set_int(0, 123);
        assert_eq!(store.get_header(0), 7);
        assert_eq!(store.get_header(24), 99);
        assert_eq!(store.get_int(0), 123);
    }
}
