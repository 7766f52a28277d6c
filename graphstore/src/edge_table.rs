//! The edge table and the canonical-orientation adjacency protocol.
//!
//! Every stored edge has `node_a <= node_b`; this is the single
//! invariant the rest of the crate leans on to avoid ever storing or
//! consulting a direction flag just to find "the other side" of an
//! edge. [`EdgeTable::write_edge`] is the only place that invariant is
//! established or restored.

use crate::byte_store::ByteStore;
use crate::error::{GraphStoreError, Result};
use crate::flags::FlagsCodec;
use crate::{NO_EDGE, NO_NODE};
use tracing::trace;
use zerocopy::{LE, I32};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// On-disk layout of a single edge: eight little-endian `i32` fields in
/// the order the spec fixes them.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct EdgeRecord {
    pub node_a: I32<LE>,
    pub node_b: I32<LE>,
    pub link_a: I32<LE>,
    pub link_b: I32<LE>,
    pub dist_q: I32<LE>,
    pub flags: I32<LE>,
    pub geo_ref: I32<LE>,
    pub name_ref: I32<LE>,
}

/// Byte stride of one [`EdgeRecord`].
pub const EDGE_RECORD_BYTES: u64 = 32;

const HEADER_EDGE_COUNT: u64 = 4;

/// Which of an edge's two link fields belongs to a given endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    A,
    B,
}

/// A packed-array table of [`EdgeRecord`]s backed by a [`ByteStore`].
pub struct EdgeTable<S> {
    store: S,
    edge_count: i32,
}

impl<S: ByteStore> EdgeTable<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            edge_count: 0,
        }
    }

    /// # Errors
    ///
    /// Propagates any [`ByteStore::create`] failure.
    pub fn create(&mut self, initial_capacity: usize) -> Result<()> {
        self.store
            .create(initial_capacity as u64 * EDGE_RECORD_BYTES)?;
        self.store.set_segment_size(64 * EDGE_RECORD_BYTES);
        self.edge_count = 0;
        self.store.set_header(HEADER_EDGE_COUNT, 0);
        Ok(())
    }

    /// # Errors
    ///
    /// Propagates any [`ByteStore::load_existing`] failure.
    pub fn load_existing(&mut self) -> Result<bool> {
        if !self.store.load_existing()? {
            return Ok(false);
        }
        self.edge_count = self.store.get_header(HEADER_EDGE_COUNT);
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.set_header(HEADER_EDGE_COUNT, self.edge_count);
        self.store.flush()
    }

    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }

    #[must_use]
    pub fn edge_count(&self) -> i32 {
        self.edge_count
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Allocates a fresh edge id, growing storage as needed.
    ///
    /// # Errors
    ///
    /// Returns [`GraphStoreError::TooManyEdges`] if the next id would
    /// overflow, or propagates a [`ByteStore::inc_capacity`] failure.
    pub fn allocate_edge(&mut self) -> Result<i32> {
        let id = self.edge_count;
        let next = id.checked_add(1).ok_or(GraphStoreError::TooManyEdges)?;
        self.store
            .inc_capacity(next as u64 * EDGE_RECORD_BYTES)?;
        self.edge_count = next;
        self.store.set_header(HEADER_EDGE_COUNT, self.edge_count);
        Ok(id)
    }

    #[allow(clippy::cast_sign_loss)]
    fn offset(id: i32) -> u64 {
        id as u64 * EDGE_RECORD_BYTES
    }

    pub(crate) fn read_record(&self, id: i32) -> EdgeRecord {
        let mut buf = [0u8; EDGE_RECORD_BYTES as usize];
        self.store.get_bytes(Self::offset(id), &mut buf);
        EdgeRecord::read_from_bytes(&buf).expect("fixed-size buffer matches EdgeRecord layout")
    }

    fn write_record(&mut self, id: i32, record: &EdgeRecord) {
        self.store.set_bytes(Self::offset(id), record.as_bytes());
    }

    /// The canonical-orientation choke point. Normalizes `node_a <=
    /// node_b`, swapping the link fields and flag bits to match when a
    /// swap is needed.
    pub fn write_edge<F: FlagsCodec>(
        &mut self,
        id: i32,
        node_a: i32,
        node_b: i32,
        link_a: i32,
        link_b: i32,
        dist_q: i32,
        flags: i32,
        geo_ref: i32,
        name_ref: i32,
        codec: &F,
    ) {
        let (node_a, node_b, link_a, link_b, flags) = if node_a > node_b {
            (node_b, node_a, link_b, link_a, codec.swap_direction(flags))
        } else {
            (node_a, node_b, link_a, link_b, flags)
        };
        self.write_record(
            id,
            &EdgeRecord {
                node_a: I32::new(node_a),
                node_b: I32::new(node_b),
                link_a: I32::new(link_a),
                link_b: I32::new(link_b),
                dist_q: I32::new(dist_q),
                flags: I32::new(flags),
                geo_ref: I32::new(geo_ref),
                name_ref: I32::new(name_ref),
            },
        );
    }

    /// Given an edge record and an endpoint `w` known to lie on it,
    /// selects which link field belongs to `w`: `link_a` when `w` is
    /// the smaller (or equal, for self-loops) endpoint, else `link_b`.
    #[must_use]
    pub fn link_side(record: &EdgeRecord, w: i32) -> LinkSide {
        let other = Self::other_node(record, w);
        if w <= other {
            LinkSide::A
        } else {
            LinkSide::B
        }
    }

    /// Returns the endpoint of `record` that is not `base`. For a
    /// self-loop (`node_a == node_b == base`), returns `base`.
    #[must_use]
    pub fn other_node(record: &EdgeRecord, base: i32) -> i32 {
        let a = record.node_a.get();
        let b = record.node_b.get();
        if base == a {
            b
        } else {
            a
        }
    }

    pub(crate) fn link_field(record: &EdgeRecord, side: LinkSide) -> i32 {
        match side {
            LinkSide::A => record.link_a.get(),
            LinkSide::B => record.link_b.get(),
        }
    }

    pub(crate) fn set_link_field(&mut self, id: i32, side: LinkSide, value: i32) {
        let mut record = self.read_record(id);
        match side {
            LinkSide::A => record.link_a = I32::new(value),
            LinkSide::B => record.link_b = I32::new(value),
        }
        self.write_record(id, &record);
    }

    #[must_use]
    pub fn is_tombstone(&self, id: i32) -> bool {
        self.read_record(id).node_a.get() == NO_NODE
    }

    pub(crate) fn tombstone(&mut self, id: i32) {
        let mut record = self.read_record(id);
        record.node_a = I32::new(NO_NODE);
        self.write_record(id, &record);
        trace!(edge = id, "tombstoned edge");
    }

    #[must_use]
    pub fn distance(&self, id: i32) -> i32 {
        self.read_record(id).dist_q.get()
    }

    pub fn set_distance(&mut self, id: i32, dist_q: i32) {
        let mut record = self.read_record(id);
        record.dist_q = I32::new(dist_q);
        self.write_record(id, &record);
    }

    #[must_use]
    pub fn name_ref(&self, id: i32) -> i32 {
        self.read_record(id).name_ref.get()
    }

    pub fn set_name_ref(&mut self, id: i32, name_ref: i32) {
        let mut record = self.read_record(id);
        record.name_ref = I32::new(name_ref);
        self.write_record(id, &record);
    }

    #[must_use]
    pub fn geo_ref(&self, id: i32) -> i32 {
        self.read_record(id).geo_ref.get()
    }

    pub fn set_geo_ref(&mut self, id: i32, geo_ref: i32) {
        let mut record = self.read_record(id);
        record.geo_ref = I32::new(geo_ref);
        self.write_record(id, &record);
    }

    #[must_use]
    pub fn raw_flags(&self, id: i32) -> i32 {
        self.read_record(id).flags.get()
    }

    /// Splices a freshly written edge `e` at the head of `base`'s
    /// adjacency list: reads the node's current `edge_ref`, stores it
    /// into `e`'s link field for `base` (if it wasn't already
    /// `NO_EDGE`), and returns the new head (`e` itself) for the
    /// caller to write back into the node record.
    pub(crate) fn splice_at_head(&mut self, edge: i32, base: i32, prev_head: i32) {
        if prev_head != NO_EDGE {
            let record = self.read_record(edge);
            let side = Self::link_side(&record, base);
            self.set_link_field(edge, side, prev_head);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::byte_store::InMemoryByteStore;
    use crate::flags::DefaultFlagsCodec;

    fn table() -> EdgeTable<InMemoryByteStore> {
        let mut table = EdgeTable::new(InMemoryByteStore::new());
        table.create(4).unwrap();
        table
    }

    #[test]
    fn write_edge_normalizes_order() {
        let mut table = table();
        let codec = DefaultFlagsCodec;
        let id = table.allocate_edge().unwrap();
        let fwd = codec.default_flags(false);
        table.write_edge(id, 5, 3, 11, 22, 100, fwd, 0, 0, &codec);
        let record = table.read_record(id);
        assert_eq!(record.node_a.get(), 3);
        assert_eq!(record.node_b.get(), 5);
        // links swapped along with the endpoints
        assert_eq!(record.link_a.get(), 22);
        assert_eq!(record.link_b.get(), 11);
        assert_eq!(record.flags.get(), codec.swap_direction(fwd));
    }

    #[test]
    fn write_edge_leaves_already_canonical_order_untouched() {
        let mut table = table();
        let codec = DefaultFlagsCodec;
        let id = table.allocate_edge().unwrap();
        table.write_edge(id, 1, 2, -1, -1, 50, 0, 0, 0, &codec);
        let record = table.read_record(id);
        assert_eq!(record.node_a.get(), 1);
        assert_eq!(record.node_b.get(), 2);
    }

    #[test]
    fn link_side_ties_break_toward_a_for_self_loops() {
        let mut table = table();
        let codec = DefaultFlagsCodec;
        let id = table.allocate_edge().unwrap();
        table.write_edge(id, 4, 4, -1, -1, 10, 0, 0, 0, &codec);
        let record = table.read_record(id);
        assert_eq!(EdgeTable::<InMemoryByteStore>::link_side(&record, 4), LinkSide::A);
    }

    #[test]
    fn other_node_resolves_both_sides() {
        let mut table = table();
        let codec = DefaultFlagsCodec;
        let id = table.allocate_edge().unwrap();
        table.write_edge(id, 2, 9, -1, -1, 10, 0, 0, 0, &codec);
        let record = table.read_record(id);
        assert_eq!(EdgeTable::<InMemoryByteStore>::other_node(&record, 2), 9);
        assert_eq!(EdgeTable::<InMemoryByteStore>::other_node(&record, 9), 2);
    }

    #[test]
    fn allocate_edge_rejects_overflow() {
        let mut table = table();
        table.edge_count = i32::MAX;
        assert!(matches!(
            table.allocate_edge(),
            Err(GraphStoreError::TooManyEdges)
        ));
    }
}
