//! Cursors over the edge table: a per-node adjacency iterator, a
//! single-edge probe, and a cursor that linearly scans every edge slot.
//!
//! None of these hold a lock; they borrow the tables they read (and,
//! for the mutating accessors, write) directly, so the borrow checker
//! is what enforces the "no structural mutation while a cursor is
//! alive" rule from the concurrency contract.

use crate::byte_store::ByteStore;
use crate::edge_table::{EdgeTable, LinkSide};
use crate::error::{GraphStoreError, Result};
use crate::flags::FlagsCodec;
use crate::geometry::{GeometryFetchMode, GeometryHeap};
use crate::node_table::NodeTable;
use crate::{MAX_EDGES, NO_EDGE};
use geo::LineString;

/// A per-node adjacency iterator.
///
/// Construct with [`EdgeExplorer::set_base_node`], then repeatedly call
/// [`EdgeExplorer::next`]. While positioned on an edge (after a `next`
/// that returned `true`), the accessor and mutator methods all act on
/// that edge, oriented from `base`.
pub struct EdgeExplorer<'a, S, F> {
    nodes: &'a NodeTable<S>,
    edges: &'a mut EdgeTable<S>,
    codec: &'a F,
    base: i32,
    next_edge: i32,
    edge_id: i32,
    other: i32,
    advanced: bool,
}

impl<'a, S: ByteStore, F: FlagsCodec> EdgeExplorer<'a, S, F> {
    pub(crate) fn new(nodes: &'a NodeTable<S>, edges: &'a mut EdgeTable<S>, codec: &'a F) -> Self {
        Self {
            nodes,
            edges,
            codec,
            base: NO_EDGE,
            next_edge: NO_EDGE,
            edge_id: NO_EDGE,
            other: NO_EDGE,
            advanced: false,
        }
    }

    /// Repositions this explorer at the head of `base`'s adjacency
    /// list.
    pub fn set_base_node(&mut self, base: i32) {
        self.base = base;
        self.next_edge = self.nodes.edge_ref(base);
        self.edge_id = NO_EDGE;
        self.other = NO_EDGE;
        self.advanced = false;
    }

    /// Advances to the next edge incident to the current base node.
    /// Returns `false` when the chain is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`GraphStoreError::CorruptChain`] if the chain does not
    /// terminate within [`MAX_EDGES`] steps, or if a link field points
    /// back at the edge that holds it.
    pub fn next(&mut self) -> Result<bool> {
        self.next_matching(|_, _| true)
    }

    /// Like [`EdgeExplorer::next`], but skips edges for which
    /// `predicate(edge_id, adj_node)` returns `false`.
    ///
    /// # Errors
    ///
    /// Same as [`EdgeExplorer::next`].
    pub fn next_matching(&mut self, mut predicate: impl FnMut(i32, i32) -> bool) -> Result<bool> {
        for _ in 0..MAX_EDGES {
            if self.next_edge == NO_EDGE {
                return Ok(false);
            }
            let edge_id = self.next_edge;
            let record = self.edges.read_record(edge_id);
            let other = EdgeTable::<S>::other_node(&record, self.base);
            let side = EdgeTable::<S>::link_side(&record, self.base);
            let new_next = EdgeTable::<S>::link_field(&record, side);
            if new_next == edge_id {
                return Err(GraphStoreError::CorruptChain);
            }
            self.edge_id = edge_id;
            self.other = other;
            self.next_edge = new_next;
            self.advanced = true;
            if predicate(edge_id, other) {
                return Ok(true);
            }
        }
        Err(GraphStoreError::CorruptChain)
    }

    fn ensure_advanced(&self) -> Result<()> {
        if self.advanced {
            Ok(())
        } else {
            Err(GraphStoreError::DetachBeforeAdvance)
        }
    }

    /// # Errors
    ///
    /// Returns [`GraphStoreError::DetachBeforeAdvance`] if called
    /// before `next` has advanced this explorer.
    pub fn get_edge(&self) -> Result<i32> {
        self.ensure_advanced()?;
        Ok(self.edge_id)
    }

    /// # Errors
    ///
    /// Returns [`GraphStoreError::DetachBeforeAdvance`] if called
    /// before `next` has advanced this explorer.
    pub fn get_base_node(&self) -> Result<i32> {
        self.ensure_advanced()?;
        Ok(self.base)
    }

    /// # Errors
    ///
    /// Returns [`GraphStoreError::DetachBeforeAdvance`] if called
    /// before `next` has advanced this explorer.
    pub fn get_adj_node(&self) -> Result<i32> {
        self.ensure_advanced()?;
        Ok(self.other)
    }

    /// # Errors
    ///
    /// Returns [`GraphStoreError::DetachBeforeAdvance`] if called
    /// before `next` has advanced this explorer.
    pub fn distance(&self) -> Result<i32> {
        self.ensure_advanced()?;
        Ok(self.edges.distance(self.edge_id))
    }

    pub fn set_distance(&mut self, dist_q: i32) -> Result<()> {
        self.ensure_advanced()?;
        self.edges.set_distance(self.edge_id, dist_q);
        Ok(())
    }

    /// Returns the current edge's flags, oriented `base -> adj`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphStoreError::DetachBeforeAdvance`] if called
    /// before `next` has advanced this explorer.
    pub fn get_flags(&self) -> Result<i32> {
        self.ensure_advanced()?;
        let raw = self.edges.raw_flags(self.edge_id);
        Ok(if self.base <= self.other {
            raw
        } else {
            self.codec.swap_direction(raw)
        })
    }

    /// Sets the current edge's flags, given in `base -> adj`
    /// orientation; restores canonical storage orientation via
    /// `write_edge`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphStoreError::DetachBeforeAdvance`] if called
    /// before `next` has advanced this explorer.
    pub fn set_flags(&mut self, flags_base_to_adj: i32) -> Result<()> {
        self.ensure_advanced()?;
        let record = self.edges.read_record(self.edge_id);
        let link_base =
            EdgeTable::<S>::link_field(&record, EdgeTable::<S>::link_side(&record, self.base));
        let link_other =
            EdgeTable::<S>::link_field(&record, EdgeTable::<S>::link_side(&record, self.other));
        self.edges.write_edge(
            self.edge_id,
            self.base,
            self.other,
            link_base,
            link_other,
            record.dist_q.get(),
            flags_base_to_adj,
            record.geo_ref.get(),
            record.name_ref.get(),
            self.codec,
        );
        Ok(())
    }

    pub fn name_ref(&self) -> Result<i32> {
        self.ensure_advanced()?;
        Ok(self.edges.name_ref(self.edge_id))
    }

    pub fn set_name_ref(&mut self, name_ref: i32) -> Result<()> {
        self.ensure_advanced()?;
        self.edges.set_name_ref(self.edge_id, name_ref);
        Ok(())
    }

    /// Stores a pillar-node polyline for the current edge, oriented
    /// `base -> adj`. Reversal relative to the canonical `a -> b`
    /// storage order is handled automatically.
    ///
    /// # Errors
    ///
    /// Propagates geometry-heap allocation failures, or
    /// [`GraphStoreError::DetachBeforeAdvance`] if called before `next`
    /// has advanced this explorer.
    pub fn set_way_geometry(
        &mut self,
        geometry: &mut GeometryHeap<S>,
        points: &[(f64, f64)],
    ) -> Result<()> {
        self.ensure_advanced()?;
        let reverse = self.base > self.other;
        let geo_ref = geometry.set_way_geometry(points, reverse)?;
        self.edges.set_geo_ref(self.edge_id, geo_ref);
        Ok(())
    }

    /// Decodes the current edge's pillar-node polyline, oriented
    /// `base -> adj`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphStoreError::DetachBeforeAdvance`] if called
    /// before `next` has advanced this explorer.
    pub fn fetch_way_geometry(
        &self,
        geometry: &GeometryHeap<S>,
        mode: GeometryFetchMode,
        base_coord: (f64, f64),
        adj_coord: (f64, f64),
    ) -> Result<LineString<f64>> {
        self.ensure_advanced()?;
        let reverse = self.base > self.other;
        Ok(geometry.fetch_way_geometry(
            self.edges.geo_ref(self.edge_id),
            reverse,
            mode,
            base_coord,
            adj_coord,
        ))
    }
}

/// Bounds-checks `edge_id` and, if it is live and incident to
/// `expected_adj`, returns a single-shot [`EdgeExplorer`] already
/// positioned on it (oriented so `base` is the endpoint that is *not*
/// `expected_adj`). Returns `Ok(None)` if the edge is tombstoned or
/// does not touch `expected_adj`.
///
/// # Errors
///
/// Returns [`GraphStoreError::EdgeOutOfBounds`] if `edge_id` is not in
/// `[0, edge_count)`.
pub fn edge_props<'a, S: ByteStore, F: FlagsCodec>(
    nodes: &'a NodeTable<S>,
    edges: &'a mut EdgeTable<S>,
    codec: &'a F,
    edge_id: i32,
    expected_adj: i32,
) -> Result<Option<EdgeExplorer<'a, S, F>>> {
    let edge_count = edges.edge_count();
    if edge_id < 0 || edge_id >= edge_count {
        return Err(GraphStoreError::EdgeOutOfBounds { id: edge_id, edge_count });
    }
    let record = edges.read_record(edge_id);
    if record.node_a.get() == crate::NO_NODE {
        return Err(GraphStoreError::EdgeAlreadyRemoved(edge_id));
    }
    let node_a = record.node_a.get();
    let node_b = record.node_b.get();
    let base = if node_a == expected_adj {
        node_b
    } else if node_b == expected_adj {
        node_a
    } else {
        return Ok(None);
    };

    let mut explorer = EdgeExplorer::new(nodes, edges, codec);
    explorer.base = base;
    explorer.other = expected_adj;
    explorer.edge_id = edge_id;
    explorer.next_edge = NO_EDGE;
    explorer.advanced = true;
    Ok(Some(explorer))
}

/// Linearly scans every edge slot, skipping tombstones.
///
/// Flags are returned exactly as stored (canonical `node_a -> node_b`
/// orientation); this cursor does not support `set_flags` since it has
/// no notion of a "base" node to orient against.
pub struct AllEdgesCursor<'a, S> {
    edges: &'a EdgeTable<S>,
    next_id: i32,
    edge_id: i32,
    advanced: bool,
}

impl<'a, S: ByteStore> AllEdgesCursor<'a, S> {
    pub(crate) fn new(edges: &'a EdgeTable<S>) -> Self {
        Self {
            edges,
            next_id: 0,
            edge_id: NO_EDGE,
            advanced: false,
        }
    }

    /// Advances to the next non-tombstoned edge slot.
    pub fn next(&mut self) -> bool {
        while self.next_id < self.edges.edge_count() {
            let id = self.next_id;
            self.next_id += 1;
            if !self.edges.is_tombstone(id) {
                self.edge_id = id;
                self.advanced = true;
                return true;
            }
        }
        false
    }

    fn ensure_advanced(&self) -> Result<()> {
        if self.advanced {
            Ok(())
        } else {
            Err(GraphStoreError::DetachBeforeAdvance)
        }
    }

    pub fn get_edge(&self) -> Result<i32> {
        self.ensure_advanced()?;
        Ok(self.edge_id)
    }

    pub fn node_a(&self) -> Result<i32> {
        self.ensure_advanced()?;
        Ok(self.edges.read_record(self.edge_id).node_a.get())
    }

    pub fn node_b(&self) -> Result<i32> {
        self.ensure_advanced()?;
        Ok(self.edges.read_record(self.edge_id).node_b.get())
    }

    pub fn distance(&self) -> Result<i32> {
        self.ensure_advanced()?;
        Ok(self.edges.distance(self.edge_id))
    }

    pub fn get_flags(&self) -> Result<i32> {
        self.ensure_advanced()?;
        Ok(self.edges.raw_flags(self.edge_id))
    }

    pub fn name_ref(&self) -> Result<i32> {
        self.ensure_advanced()?;
        Ok(self.edges.name_ref(self.edge_id))
    }

    pub fn geo_ref(&self) -> Result<i32> {
        self.ensure_advanced()?;
        Ok(self.edges.geo_ref(self.edge_id))
    }
}
