//! The node table: one fixed-stride record per node, holding the head
//! of its adjacency list and its quantized coordinates.

use crate::byte_store::ByteStore;
use crate::error::Result;
use crate::quantize::DegreeQuantizer;
use crate::NO_EDGE;
use zerocopy::{LE, I32};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// On-disk layout of a single node: `edge_ref`, `lat_q`, `lon_q`, each a
/// little-endian `i32`. `edge_ref` is [`NO_EDGE`] until an edge touches
/// this node.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct NodeRecord {
    pub edge_ref: I32<LE>,
    pub lat_q: I32<LE>,
    pub lon_q: I32<LE>,
}

/// Byte stride of one [`NodeRecord`].
pub const NODE_RECORD_BYTES: u64 = 12;

/// Slot 2 (offset 8): `class-fingerprint` and `node_entry_bytes` occupy
/// slots 0-1, and the bounding box occupies slots 3-6 — see
/// [`crate::storage`] for the rest of the nodes header layout.
const HEADER_NODE_COUNT: u64 = 2;

/// A packed-array table of [`NodeRecord`]s backed by a [`ByteStore`].
pub struct NodeTable<S> {
    store: S,
    node_count: i32,
}

impl<S: ByteStore> NodeTable<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            node_count: 0,
        }
    }

    /// Initializes fresh, empty storage with room for `initial_capacity`
    /// nodes.
    ///
    /// # Errors
    ///
    /// Propagates any [`ByteStore::create`] failure.
    pub fn create(&mut self, initial_capacity: usize) -> Result<()> {
        self.store
            .create(initial_capacity as u64 * NODE_RECORD_BYTES)?;
        self.store.set_segment_size(64 * NODE_RECORD_BYTES);
        self.node_count = 0;
        self.store.set_header(HEADER_NODE_COUNT * 4, 0);
        Ok(())
    }

    /// Reconstructs the table from existing storage.
    ///
    /// # Errors
    ///
    /// Propagates any [`ByteStore::load_existing`] failure.
    pub fn load_existing(&mut self) -> Result<bool> {
        if !self.store.load_existing()? {
            return Ok(false);
        }
        self.node_count = self.store.get_header(HEADER_NODE_COUNT * 4);
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.set_header(HEADER_NODE_COUNT * 4, self.node_count);
        self.store.flush()
    }

    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }

    #[must_use]
    pub fn node_count(&self) -> i32 {
        self.node_count
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Grows the table so that `id` is a valid node index, filling any
    /// newly created slots with `edge_ref = NO_EDGE`.
    ///
    /// # Errors
    ///
    /// Propagates any [`ByteStore::inc_capacity`] failure.
    #[allow(clippy::cast_sign_loss)]
    pub fn ensure_node_index(&mut self, id: i32) -> Result<()> {
        if id < self.node_count {
            return Ok(());
        }
        let new_count = id + 1;
        let needed_bytes = new_count as u64 * NODE_RECORD_BYTES;
        self.store.inc_capacity(needed_bytes)?;
        for idx in self.node_count..new_count {
            self.write_record(idx, &default_record());
        }
        self.node_count = new_count;
        self.store.set_header(HEADER_NODE_COUNT * 4, self.node_count);
        Ok(())
    }

    #[allow(clippy::cast_sign_loss)]
    fn offset(id: i32) -> u64 {
        id as u64 * NODE_RECORD_BYTES
    }

    fn read_record(&self, id: i32) -> NodeRecord {
        debug_assert!(
            id >= 0 && id < self.node_count,
            "node id {id} out of bounds (node_count = {})",
            self.node_count
        );
        let mut buf = [0u8; NODE_RECORD_BYTES as usize];
        self.store.get_bytes(Self::offset(id), &mut buf);
        NodeRecord::read_from_bytes(&buf).expect("fixed-size buffer matches NodeRecord layout")
    }

    fn write_record(&mut self, id: i32, record: &NodeRecord) {
        self.store.set_bytes(Self::offset(id), record.as_bytes());
    }

    /// Sets a node's adjacency head and quantized coordinates.
    ///
    /// # Errors
    ///
    /// Propagates any [`ByteStore::inc_capacity`] failure from growing
    /// to accommodate `id`.
    pub fn set_node(&mut self, id: i32, edge_ref: i32, lat_q: i32, lon_q: i32) -> Result<()> {
        self.ensure_node_index(id)?;
        self.write_record(
            id,
            &NodeRecord {
                edge_ref: I32::new(edge_ref),
                lat_q: I32::new(lat_q),
                lon_q: I32::new(lon_q),
            },
        );
        Ok(())
    }

    /// Copies the raw record bytes from `from` to `to` verbatim
    /// (including `edge_ref`, which travels with the node unchanged).
    /// Used by compaction when relocating a surviving tail node into a
    /// freed slot.
    pub(crate) fn copy_record(&mut self, from: i32, to: i32) {
        let record = self.read_record(from);
        self.write_record(to, &record);
    }

    /// Shrinks the logical node count without touching storage
    /// capacity. Used by compaction after relocating tail nodes.
    pub(crate) fn set_node_count(&mut self, count: i32) {
        self.node_count = count;
        self.store.set_header(HEADER_NODE_COUNT * 4, self.node_count);
    }

    #[must_use]
    pub fn edge_ref(&self, id: i32) -> i32 {
        self.read_record(id).edge_ref.get()
    }

    pub fn set_edge_ref(&mut self, id: i32, edge_ref: i32) {
        let mut record = self.read_record(id);
        record.edge_ref = I32::new(edge_ref);
        self.write_record(id, &record);
    }

    #[must_use]
    pub fn latitude(&self, id: i32) -> f64 {
        DegreeQuantizer::dequantize(self.read_record(id).lat_q.get())
    }

    #[must_use]
    pub fn longitude(&self, id: i32) -> f64 {
        DegreeQuantizer::dequantize(self.read_record(id).lon_q.get())
    }
}

fn default_record() -> NodeRecord {
    NodeRecord {
        edge_ref: I32::new(NO_EDGE),
        lat_q: I32::new(0),
        lon_q: I32::new(0),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::byte_store::InMemoryByteStore;

    fn table() -> NodeTable<InMemoryByteStore> {
        let mut table = NodeTable::new(InMemoryByteStore::new());
        table.create(4).unwrap();
        table
    }

    #[test]
    fn fresh_node_has_no_edge() {
        let mut table = table();
        table.ensure_node_index(0).unwrap();
        assert_eq!(table.edge_ref(0), NO_EDGE);
    }

    #[test]
    fn set_node_round_trips_coordinates() {
        let mut table = table();
        let lat_q = DegreeQuantizer::quantize(45.5);
        let lon_q = DegreeQuantizer::quantize(-122.25);
        table.set_node(2, 7, lat_q, lon_q).unwrap();
        assert_eq!(table.edge_ref(2), 7);
        assert!((table.latitude(2) - 45.5).abs() < 1e-6);
        assert!((table.longitude(2) - -122.25).abs() < 1e-6);
    }

    #[test]
    fn ensure_node_index_grows_sparsely() {
        let mut table = table();
        table.ensure_node_index(10).unwrap();
        assert_eq!(table.node_count(), 11);
        // Intermediate nodes were default-initialized, not left dangling.
        assert_eq!(table.edge_ref(5), NO_EDGE);
    }
}
