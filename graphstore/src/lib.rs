//! A packed-array graph storage engine for a road-routing network.
//!
//! Nodes and edges live in fixed-stride tables addressed by integer id
//! and backed by a pluggable [`byte_store::ByteStore`]. Adjacency is a
//! singly-linked list threaded through the edge records themselves —
//! there is no per-node `Vec` of incident edges. Edges are stored in a
//! canonical orientation (`node_a <= node_b`); [`edge_table::EdgeTable`]
//! is the only place that invariant is written or restored, which is
//! what lets [`compact`] relabel node ids by rewriting edges in place
//! rather than rebuilding adjacency from scratch.
//!
//! See [`storage::GraphStorage`] for the entry point.

pub mod bounding_box;
pub mod byte_store;
pub mod compact;
pub mod cursor;
pub mod edge_table;
pub mod error;
pub mod flags;
pub mod geometry;
pub mod names;
pub mod node_table;
pub mod properties;
pub mod quantize;
pub mod storage;

pub use error::{GraphStoreError, Result};
pub use storage::{GraphStorage, GraphStorageConfig};

/// Sentinel meaning "no edge": a node with no incident edges, or the
/// end of an adjacency chain.
pub const NO_EDGE: i32 = -1;

/// Sentinel meaning "no node": used both for an uninitialized endpoint
/// and, reused on `node_a`, to mark a tombstoned edge slot.
pub const NO_NODE: i32 = -1;

/// Safety fuse bounding adjacency-chain walks. Graphs with a node of
/// degree higher than this trip `GraphStoreError::CorruptChain` rather
/// than spin forever on a corrupted chain.
pub const MAX_EDGES: usize = 1000;
