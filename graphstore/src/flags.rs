//! Direction and access flags carried by every edge record.
//!
//! The storage engine itself never interprets flag bits — it only needs
//! to know how to flip them when an edge's canonical orientation swaps
//! the stored `(node_a, node_b)` order, and how to seed sensible
//! defaults for a freshly inserted edge. Everything else (which bits
//! mean "bike forward", "toll", ...) is the caller's business, supplied
//! through this trait.

use enumset::{EnumSet, EnumSetType};

/// Translates between an application's access/direction semantics and
/// the 32-bit flags word stored inline in an edge record.
pub trait FlagsCodec {
    /// The flags word for a brand new edge, given whether it is
    /// traversable in both directions or only `node_a -> node_b`.
    fn default_flags(&self, both_directions: bool) -> i32;

    /// Returns `flags` with every direction-dependent bit flipped, used
    /// when `write_edge` swaps `node_a`/`node_b` to restore canonical
    /// orientation.
    fn swap_direction(&self, flags: i32) -> i32;

    /// A stable, human-readable identifier for the set of encoders this
    /// codec implements (e.g. `"default_access_v1"`). Stored in the
    /// header on `create` and checked by `load_existing` so mismatched
    /// codecs are caught instead of silently misreading flags.
    fn encoder_list(&self) -> String;

    /// A short integer fingerprint derived from `encoder_list`, stored
    /// in the header for a cheap check before falling back to the full
    /// string comparison.
    fn fingerprint(&self) -> i32 {
        self.encoder_list()
            .bytes()
            .fold(0i32, |acc, b| acc.wrapping_mul(31).wrapping_add(i32::from(b)))
    }
}

#[derive(Debug, EnumSetType)]
pub enum AccessBit {
    Forward,
    Backward,
}

/// A minimal reference [`FlagsCodec`]: two bits recording whether the
/// edge may be traversed `node_a -> node_b` and/or `node_b -> node_a`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFlagsCodec;

impl DefaultFlagsCodec {
    const FORWARD_BIT: i32 = 1 << 0;
    const BACKWARD_BIT: i32 = 1 << 1;

    #[must_use]
    pub fn forward(flags: i32) -> bool {
        flags & Self::FORWARD_BIT != 0
    }

    #[must_use]
    pub fn backward(flags: i32) -> bool {
        flags & Self::BACKWARD_BIT != 0
    }

    fn bits(set: EnumSet<AccessBit>) -> i32 {
        let mut flags = 0;
        if set.contains(AccessBit::Forward) {
            flags |= Self::FORWARD_BIT;
        }
        if set.contains(AccessBit::Backward) {
            flags |= Self::BACKWARD_BIT;
        }
        flags
    }
}

impl FlagsCodec for DefaultFlagsCodec {
    fn default_flags(&self, both_directions: bool) -> i32 {
        let mut set = EnumSet::only(AccessBit::Forward);
        if both_directions {
            set |= AccessBit::Backward;
        }
        Self::bits(set)
    }

    fn swap_direction(&self, flags: i32) -> i32 {
        let forward = Self::forward(flags);
        let backward = Self::backward(flags);
        let mut out = flags & !(Self::FORWARD_BIT | Self::BACKWARD_BIT);
        if backward {
            out |= Self::FORWARD_BIT;
        }
        if forward {
            out |= Self::BACKWARD_BIT;
        }
        out
    }

    fn encoder_list(&self) -> String {
        "default_access_v1".to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn swap_flips_forward_and_backward() {
        let codec = DefaultFlagsCodec;
        let one_way = codec.default_flags(false);
        assert!(DefaultFlagsCodec::forward(one_way));
        assert!(!DefaultFlagsCodec::backward(one_way));

        let swapped = codec.swap_direction(one_way);
        assert!(!DefaultFlagsCodec::forward(swapped));
        assert!(DefaultFlagsCodec::backward(swapped));
    }

    #[test]
    fn swap_is_its_own_inverse() {
        let codec = DefaultFlagsCodec;
        let flags = codec.default_flags(true);
        assert_eq!(codec.swap_direction(codec.swap_direction(flags)), flags);
    }

    #[test]
    fn fingerprint_is_stable() {
        let codec = DefaultFlagsCodec;
        assert_eq!(codec.fingerprint(), codec.fingerprint());
    }
}
