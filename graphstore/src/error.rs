//! Error types for the graph storage engine.
//!
//! Every fallible operation in this crate returns [`GraphStoreError`].
//! There is no retry logic anywhere: a returned error means the current
//! operation did not complete and, for anything beyond a simple bounds
//! check, the instance should be treated as unusable.

use thiserror::Error;

/// The error type returned by all fallible operations in this crate.
#[derive(Debug, Error)]
pub enum GraphStoreError {
    /// `create` was called without a flags codec configured.
    #[error("no flags codec was configured before create()")]
    NotConfigured,

    /// A setter (flags codec, name index, ...) was supplied after the
    /// engine was already configured via `create`/`load_existing`.
    #[error("the engine is already configured; this setter cannot be called twice")]
    DoubleConfigured,

    /// `load_existing` found a missing region, a class fingerprint
    /// mismatch, or an encoder list mismatch.
    #[error("on-disk storage is corrupt or incompatible: {0}")]
    Corrupt(String),

    /// An edge id fell outside `[0, edge_count)`.
    #[error("edge id {id} is out of bounds (edge_count = {edge_count})")]
    EdgeOutOfBounds { id: i32, edge_count: i32 },

    /// A node id fell outside `[0, node_count)`.
    #[error("node id {id} is out of bounds (node_count = {node_count})")]
    NodeOutOfBounds { id: i32, node_count: i32 },

    /// `edge_props` was called on a tombstoned edge slot.
    #[error("edge {0} has already been removed (tombstoned)")]
    EdgeAlreadyRemoved(i32),

    /// Allocating a new edge id would overflow `edge_count`.
    #[error("too many edges: the next edge id would overflow")]
    TooManyEdges,

    /// An adjacency walk exceeded `MAX_EDGES` iterations or observed a
    /// self-pointing link. This means an earlier invariant was already
    /// broken; it is not recoverable.
    #[error("adjacency chain is corrupt (exceeded MAX_EDGES or found a self-pointing link)")]
    CorruptChain,

    /// A cursor was asked to report state (detach, read fields) before
    /// `next()` had advanced it at least once.
    #[error("cursor was used before next() advanced it")]
    DetachBeforeAdvance,

    /// The underlying byte store reported an I/O failure (e.g. the
    /// `MmapByteStore` failed to grow or flush a backing file).
    #[error("byte store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GraphStoreError>;
