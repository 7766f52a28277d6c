//! The geometry heap: an append-only region holding the pillar-node
//! polylines referenced by `geo_ref` in edge records.

use crate::byte_store::ByteStore;
use crate::error::Result;
use crate::quantize::DegreeQuantizer;
use bitfield_struct::bitfield;
use geo::{Coord, LineString};

const HEADER_MAX_GEO_REF: u64 = 0;

/// Which endpoints to splice onto a decoded pillar sequence.
///
/// Bit 0 includes the base node's own coordinate, bit 1 includes the
/// adjacent node's. Both unset returns pillars only.
#[bitfield(u8)]
pub struct GeometryFetchMode {
    pub include_base: bool,
    pub include_adjacent: bool,
    #[bits(6)]
    __reserved: u8,
}

impl GeometryFetchMode {
    #[must_use]
    pub fn pillars_only() -> Self {
        Self::new()
    }

    #[must_use]
    pub fn both_endpoints() -> Self {
        Self::new().with_include_base(true).with_include_adjacent(true)
    }
}

/// An append-only region of quantized `(lat, lon)` int32 pairs, one
/// blob per edge that has pillar geometry.
///
/// Word offset `0` is reserved (a `geo_ref` of `0` means "no
/// geometry"), so the heap's first real allocation starts at word `4`
/// (the header occupies words `0..HEADER_SLOT_COUNT`, and `geo_ref`
/// values are measured in words from the start of the body).
pub struct GeometryHeap<S> {
    store: S,
    max_geo_ref: i32,
}

impl<S: ByteStore> GeometryHeap<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_geo_ref: 4,
        }
    }

    /// # Errors
    ///
    /// Propagates any [`ByteStore::create`] failure.
    pub fn create(&mut self, initial_words: u64) -> Result<()> {
        self.store.create(initial_words * 4)?;
        self.max_geo_ref = 4;
        self.store.set_header(HEADER_MAX_GEO_REF, self.max_geo_ref);
        Ok(())
    }

    /// # Errors
    ///
    /// Propagates any [`ByteStore::load_existing`] failure.
    pub fn load_existing(&mut self) -> Result<bool> {
        if !self.store.load_existing()? {
            return Ok(false);
        }
        self.max_geo_ref = self.store.get_header(HEADER_MAX_GEO_REF);
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.set_header(HEADER_MAX_GEO_REF, self.max_geo_ref);
        self.store.flush()
    }

    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }

    #[must_use]
    pub fn max_geo_ref(&self) -> i32 {
        self.max_geo_ref
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Allocates a contiguous range of `n_pairs*2 + 1` words and
    /// returns the old high-water mark as a fresh `geo_ref`.
    ///
    /// # Errors
    ///
    /// Propagates any [`ByteStore::inc_capacity`] failure.
    pub fn next_geo_ref(&mut self, n_pairs: usize) -> Result<i32> {
        let words = n_pairs * 2 + 1;
        let geo_ref = self.max_geo_ref;
        let new_high_water = geo_ref + i32::try_from(words).expect("geometry blob too large");
        self.store.inc_capacity(new_high_water as u64 * 4)?;
        self.max_geo_ref = new_high_water;
        Ok(geo_ref)
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_pairs(&mut self, geo_ref: i32, pairs: &[(i32, i32)]) {
        let base = geo_ref as u64 * 4;
        self.store
            .set_int(base, i32::try_from(pairs.len()).expect("pillar count too large"));
        for (idx, (lat_q, lon_q)) in pairs.iter().enumerate() {
            let word = base + 4 + idx as u64 * 8;
            self.store.set_int(word, *lat_q);
            self.store.set_int(word + 4, *lon_q);
        }
    }

    #[allow(clippy::cast_sign_loss)]
    fn read_pairs(&self, geo_ref: i32) -> Vec<(i32, i32)> {
        let base = geo_ref as u64 * 4;
        let len = self.store.get_int(base);
        let len = usize::try_from(len).expect("stored pillar count is never negative");
        let mut pairs = Vec::with_capacity(len);
        for idx in 0..len {
            let word = base + 4 + idx as u64 * 8;
            pairs.push((self.store.get_int(word), self.store.get_int(word + 4)));
        }
        pairs
    }

    /// Stores the pillar sequence for an edge, returning the `geo_ref`
    /// to save into the edge record (`0` if `points` is empty).
    ///
    /// `reverse` flips the sequence before storing, for callers who
    /// walked the source geometry from the `node_b` side and need it
    /// re-expressed in canonical `a -> b` order.
    ///
    /// # Errors
    ///
    /// Propagates any [`ByteStore::inc_capacity`] failure.
    pub fn set_way_geometry(&mut self, points: &[(f64, f64)], reverse: bool) -> Result<i32> {
        if points.is_empty() {
            return Ok(0);
        }
        let mut pairs: Vec<(i32, i32)> = points
            .iter()
            .map(|&(lat, lon)| (DegreeQuantizer::quantize(lat), DegreeQuantizer::quantize(lon)))
            .collect();
        if reverse {
            pairs.reverse();
        }
        let geo_ref = self.next_geo_ref(pairs.len())?;
        self.write_pairs(geo_ref, &pairs);
        Ok(geo_ref)
    }

    /// Overwrites an existing blob in place with an already-quantized,
    /// already-oriented pillar sequence of the same length as the one
    /// originally allocated at `geo_ref`. Used by compaction when an
    /// edge's orientation flips and its geometry must be reversed.
    pub fn rewrite_in_place(&mut self, geo_ref: i32, pairs_lat_lon_q: &[(i32, i32)]) {
        self.write_pairs(geo_ref, pairs_lat_lon_q);
    }

    pub(crate) fn raw_pairs(&self, geo_ref: i32) -> Vec<(i32, i32)> {
        if geo_ref == 0 {
            Vec::new()
        } else {
            self.read_pairs(geo_ref)
        }
    }

    /// Decodes the polyline for an edge, reading from `base` toward
    /// `adj`.
    ///
    /// `reverse` indicates the caller is on the `node_b` side of the
    /// stored (canonical `a -> b`) geometry, so both the pillar order
    /// and the endpoint-inclusion bits of `mode` are mirrored.
    #[must_use]
    pub fn fetch_way_geometry(
        &self,
        geo_ref: i32,
        reverse: bool,
        mode: GeometryFetchMode,
        base: (f64, f64),
        adj: (f64, f64),
    ) -> LineString<f64> {
        let mut pairs = self.raw_pairs(geo_ref);
        if reverse {
            pairs.reverse();
        }
        let (include_base, include_adjacent) = if reverse {
            (mode.include_adjacent(), mode.include_base())
        } else {
            (mode.include_base(), mode.include_adjacent())
        };

        let mut coords = Vec::with_capacity(pairs.len() + 2);
        if include_base {
            coords.push(Coord { x: base.1, y: base.0 });
        }
        for (lat_q, lon_q) in pairs {
            coords.push(Coord {
                x: DegreeQuantizer::dequantize(lon_q),
                y: DegreeQuantizer::dequantize(lat_q),
            });
        }
        if include_adjacent {
            coords.push(Coord { x: adj.1, y: adj.0 });
        }
        LineString::new(coords)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::byte_store::InMemoryByteStore;

    fn heap() -> GeometryHeap<InMemoryByteStore> {
        let mut heap = GeometryHeap::new(InMemoryByteStore::new());
        heap.create(64).unwrap();
        heap
    }

    #[test]
    fn empty_points_store_as_zero_ref() {
        let mut heap = heap();
        assert_eq!(heap.set_way_geometry(&[], false).unwrap(), 0);
    }

    #[test]
    fn round_trips_pillar_sequence() {
        let mut heap = heap();
        let points = vec![(45.0, -122.0), (45.1, -122.1)];
        let geo_ref = heap.set_way_geometry(&points, false).unwrap();
        assert!(geo_ref >= 4);

        let line = heap.fetch_way_geometry(
            geo_ref,
            false,
            GeometryFetchMode::pillars_only(),
            (44.9, -121.9),
            (45.2, -122.2),
        );
        assert_eq!(line.0.len(), 2);
        assert!((line.0[0].y - 45.0).abs() < 1e-6);
    }

    #[test]
    fn reverse_flips_pillar_order_and_endpoint_bits() {
        let mut heap = heap();
        let points = vec![(1.0, 1.0), (2.0, 2.0)];
        let geo_ref = heap.set_way_geometry(&points, false).unwrap();

        let forward = heap.fetch_way_geometry(
            geo_ref,
            false,
            GeometryFetchMode::both_endpoints(),
            (0.0, 0.0),
            (3.0, 3.0),
        );
        let reversed = heap.fetch_way_geometry(
            geo_ref,
            true,
            GeometryFetchMode::both_endpoints(),
            (3.0, 3.0),
            (0.0, 0.0),
        );
        let forward_coords: Vec<_> = forward.0.iter().map(|c| (c.y, c.x)).collect();
        let mut reversed_coords: Vec<_> = reversed.0.iter().map(|c| (c.y, c.x)).collect();
        reversed_coords.reverse();
        assert_eq!(forward_coords, reversed_coords);
    }
}
