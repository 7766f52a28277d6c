//! Fixed-precision quantization for latitude/longitude, so coordinates
//! fit in the same 32-bit integer slots as everything else in a node
//! record.

/// Quantizes degrees to/from a 32-bit integer at `1e-7` degree
/// precision (roughly 1.1cm at the equator) — enough for road geometry
/// without needing a float field in the packed record.
pub struct DegreeQuantizer;

impl DegreeQuantizer {
    const SCALE: f64 = 1e7;

    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn quantize(degrees: f64) -> i32 {
        (degrees * Self::SCALE).round() as i32
    }

    #[must_use]
    pub fn dequantize(quantized: i32) -> f64 {
        f64::from(quantized) / Self::SCALE
    }
}

/// Quantizes a distance in meters to the signed int32 stored in an edge
/// record (`dist_q`), as meters * 1000, **rounded toward zero** (not to
/// nearest) per the persisted format.
pub struct DistanceQuantizer;

impl DistanceQuantizer {
    const SCALE: f64 = 1000.0;

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn quantize(meters: f64) -> i32 {
        (meters * Self::SCALE).trunc() as i32
    }

    #[must_use]
    pub fn dequantize(quantized: i32) -> f64 {
        f64::from(quantized) / Self::SCALE
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn round_trips_within_half_a_unit(degrees in -180.0f64..180.0) {
            let q = DegreeQuantizer::quantize(degrees);
            let back = DegreeQuantizer::dequantize(q);
            prop_assert!((back - degrees).abs() < 1e-7);
        }
    }

    #[test]
    fn distance_truncates_toward_zero() {
        assert_eq!(DistanceQuantizer::quantize(1.4999), 1499);
        assert_eq!(DistanceQuantizer::quantize(-1.4999), -1499);
    }
}
