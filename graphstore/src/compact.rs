//! In-place node removal compaction.
//!
//! Given a set of removed node ids, [`optimize`] relocates surviving
//! high-id nodes into the freed low slots, re-splices adjacency chains
//! to drop edges incident to removed nodes, and rewrites the endpoint
//! ids of every edge touched by a relocation. Edge slots are never
//! reclaimed — a dead edge is tombstoned (`node_a = NO_NODE`) and
//! skipped by the all-edges cursor forever after.

use crate::byte_store::ByteStore;
use crate::edge_table::EdgeTable;
use crate::error::{GraphStoreError, Result};
use crate::flags::FlagsCodec;
use crate::geometry::GeometryHeap;
use crate::node_table::NodeTable;
use crate::{MAX_EDGES, NO_EDGE};
use bit_set::BitSet;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Summary counters for one `optimize` call, logged on completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompactionReport {
    pub nodes_removed: usize,
    pub nodes_relocated: usize,
    pub edges_rewritten: usize,
    pub edges_tombstoned: usize,
}

/// Walks `base`'s adjacency chain and returns the incident edge ids.
fn walk_chain<S: ByteStore>(
    nodes: &NodeTable<S>,
    edges: &EdgeTable<S>,
    base: i32,
) -> Result<Vec<i32>> {
    let mut out = Vec::new();
    let mut cur = nodes.edge_ref(base);
    for _ in 0..MAX_EDGES {
        if cur == NO_EDGE {
            return Ok(out);
        }
        let record = edges.read_record(cur);
        let side = EdgeTable::<S>::link_side(&record, base);
        let next = EdgeTable::<S>::link_field(&record, side);
        if next == cur {
            return Err(GraphStoreError::CorruptChain);
        }
        out.push(cur);
        cur = next;
    }
    Err(GraphStoreError::CorruptChain)
}

/// Re-splices `v`'s adjacency chain, tombstoning every incident edge
/// whose other endpoint is in `removed` and dropping it from the
/// chain.
fn disconnect_dead_edges<S: ByteStore>(
    nodes: &mut NodeTable<S>,
    edges: &mut EdgeTable<S>,
    v: i32,
    removed: &BitSet,
    report: &mut CompactionReport,
) -> Result<()> {
    let mut prev_edge = NO_EDGE;
    let mut cur = nodes.edge_ref(v);
    for _ in 0..MAX_EDGES {
        if cur == NO_EDGE {
            return Ok(());
        }
        let record = edges.read_record(cur);
        let other = EdgeTable::<S>::other_node(&record, v);
        let side = EdgeTable::<S>::link_side(&record, v);
        let next = EdgeTable::<S>::link_field(&record, side);
        if next == cur {
            return Err(GraphStoreError::CorruptChain);
        }

        #[allow(clippy::cast_sign_loss)]
        let other_is_removed = other >= 0 && removed.contains(other as usize);

        if other_is_removed {
            if prev_edge == NO_EDGE {
                nodes.set_edge_ref(v, next);
            } else {
                let prev_record = edges.read_record(prev_edge);
                let prev_side = EdgeTable::<S>::link_side(&prev_record, v);
                edges.set_link_field(prev_edge, prev_side, next);
            }
            edges.tombstone(cur);
            report.edges_tombstoned += 1;
            cur = next;
        } else {
            prev_edge = cur;
            cur = next;
        }
    }
    Err(GraphStoreError::CorruptChain)
}

/// Runs the compaction algorithm over `removed`, a bitset of node ids
/// slated for removal. Returns the new node count and a summary
/// report; the caller is responsible for clearing its removal set
/// afterward.
///
/// # Errors
///
/// Returns [`GraphStoreError::CorruptChain`] if an adjacency chain
/// turns out to be longer than [`MAX_EDGES`] or self-referential —
/// this means an invariant was already broken before `optimize` ran.
pub fn optimize<S: ByteStore, F: FlagsCodec>(
    nodes: &mut NodeTable<S>,
    edges: &mut EdgeTable<S>,
    geometry: &mut GeometryHeap<S>,
    codec: &F,
    removed: &BitSet,
) -> Result<(i32, CompactionReport)> {
    let node_count = nodes.node_count();
    let k = removed.len();
    let mut report = CompactionReport {
        nodes_removed: k,
        ..Default::default()
    };
    debug!(node_count, k, "optimize: starting compaction");

    // 1. Relabel map: tail (surviving high id) -> dest (freed low id).
    // Ascending key order falls out of BTreeMap + walking `removed` in
    // ascending order with a monotonically descending tail pointer.
    let mut relabel: BTreeMap<i32, i32> = BTreeMap::new();
    let mut tail = node_count - 1;
    for remove_node in removed.iter() {
        #[allow(clippy::cast_possible_wrap)]
        let remove_node = remove_node as i32;
        #[allow(clippy::cast_sign_loss)]
        while tail > remove_node && removed.contains(tail as usize) {
            tail -= 1;
        }
        if tail > remove_node {
            relabel.insert(tail, remove_node);
            tail -= 1;
        }
    }
    report.nodes_relocated = relabel.len();

    // 2. Touch set T: every neighbor of a removed node, survivor or not.
    // A neighbor that is itself removed must still be walked in step 3:
    // it is the only side from which an edge joining two removed nodes
    // gets tombstoned (neither endpoint is a surviving node, so skipping
    // removed neighbors here would leave that edge live with both
    // endpoints gone).
    let mut touched: BTreeSet<i32> = BTreeSet::new();
    for remove_node in removed.iter() {
        #[allow(clippy::cast_possible_wrap)]
        let remove_node = remove_node as i32;
        for edge_id in walk_chain(nodes, edges, remove_node)? {
            let record = edges.read_record(edge_id);
            let other = EdgeTable::<S>::other_node(&record, remove_node);
            if other >= 0 {
                touched.insert(other);
            }
        }
    }

    // 3. Disconnect dead edges from every touched node's chain.
    for v in &touched {
        disconnect_dead_edges(nodes, edges, *v, removed, &mut report)?;
    }

    // 4. M (the set of nodes whose incident edges need endpoint
    // rewriting) is exactly the relabel map's key set: every edge
    // touching a relocated node must be rewritten, and no other edge
    // needs to be. We fold this directly into the all-edges scan in
    // step 6 rather than materializing M separately.

    // 5. Relocate node records.
    for (&from, &to) in &relabel {
        nodes.copy_record(from, to);
    }

    // 6 & 7. Rewrite every edge touching a relocated node; reverse
    // geometry if the orientation flips.
    let mut edge_id = 0;
    while edge_id < edges.edge_count() {
        if !edges.is_tombstone(edge_id) {
            let record = edges.read_record(edge_id);
            let node_a = record.node_a.get();
            let node_b = record.node_b.get();
            let relabeled_a = relabel.get(&node_a);
            let relabeled_b = relabel.get(&node_b);
            if relabeled_a.is_some() || relabeled_b.is_some() {
                let updated_a = relabeled_a.copied().unwrap_or(node_a);
                let updated_b = relabeled_b.copied().unwrap_or(node_b);
                let flipped = (updated_a < updated_b) != (node_a < node_b);

                edges.write_edge(
                    edge_id,
                    updated_a,
                    updated_b,
                    record.link_a.get(),
                    record.link_b.get(),
                    record.dist_q.get(),
                    record.flags.get(),
                    record.geo_ref.get(),
                    record.name_ref.get(),
                    codec,
                );
                report.edges_rewritten += 1;

                let geo_ref = record.geo_ref.get();
                if flipped && geo_ref != 0 {
                    let mut pairs = geometry.raw_pairs(geo_ref);
                    pairs.reverse();
                    geometry.rewrite_in_place(geo_ref, &pairs);
                }
            }
        }
        edge_id += 1;
    }

    // 8. Finalize.
    let new_node_count = node_count - i32::try_from(k).expect("removal set smaller than i32::MAX");
    nodes.set_node_count(new_node_count);

    debug!(
        nodes_removed = report.nodes_removed,
        nodes_relocated = report.nodes_relocated,
        edges_rewritten = report.edges_rewritten,
        edges_tombstoned = report.edges_tombstoned,
        "optimize: compaction complete"
    );

    debug_assert!(
        new_node_count >= 0,
        "compaction must never remove more nodes than exist"
    );

    Ok((new_node_count, report))
}
