//! Fixed-width subsets of a soft-goal universe, represented as a single machine word.
//!
//! The width cap of 64 (enforced by [`GoalSubset::new`]) lets every operation below compile
//! down to a handful of bit instructions instead of the variable-length bitset the planning
//! literature usually reaches for.

use std::fmt;

/// A subset of `{0, .., width-1}`, `width <= 64`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GoalSubset {
    bits: u64,
    width: u8,
}

impl GoalSubset {
    pub const MAX_WIDTH: u8 = 64;

    /// The empty subset of a universe of the given width.
    pub fn empty(width: u8) -> Self {
        assert!(width <= Self::MAX_WIDTH, "goal subset width exceeds the 64-bit cap");
        GoalSubset { bits: 0, width }
    }

    /// The subset containing only `index` (`index < width`).
    pub fn singleton(index: u8, width: u8) -> Self {
        let mut s = Self::empty(width);
        s.insert(index);
        s
    }

    /// Rebuilds a subset from a raw bit-mask, masking off any bit beyond `width`.
    pub fn from_bits(bits: u64, width: u8) -> Self {
        let mut s = Self::empty(width);
        s.bits = bits & s.full_mask();
        s
    }

    fn full_mask(&self) -> u64 {
        if self.width == 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// Stable integer identifier for this subset, equal to its bit mask.
    pub fn id(&self) -> u64 {
        self.bits
    }

    pub fn contains(&self, index: u8) -> bool {
        debug_assert!(index < self.width);
        (self.bits >> index) & 1 == 1
    }

    pub fn insert(&mut self, index: u8) {
        debug_assert!(index < self.width);
        self.bits |= 1u64 << index;
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn is_full(&self) -> bool {
        self.bits == self.full_mask()
    }

    /// Number of set bits, a.k.a. cardinality.
    pub fn card(&self) -> u32 {
        self.bits.count_ones()
    }

    fn same_width(&self, other: &Self) {
        assert_eq!(self.width, other.width, "goal subsets of different widths");
    }

    pub fn union(&self, other: &Self) -> Self {
        self.same_width(other);
        GoalSubset {
            bits: self.bits | other.bits,
            width: self.width,
        }
    }

    pub fn intersection(&self, other: &Self) -> Self {
        self.same_width(other);
        GoalSubset {
            bits: self.bits & other.bits,
            width: self.width,
        }
    }

    pub fn complement(&self) -> Self {
        GoalSubset {
            bits: (!self.bits) & self.full_mask(),
            width: self.width,
        }
    }

    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.same_width(other);
        self.bits & !other.bits == 0
    }

    pub fn is_superset_of(&self, other: &Self) -> bool {
        other.is_subset_of(self)
    }

    pub fn is_strict_superset_of(&self, other: &Self) -> bool {
        self.is_superset_of(other) && self.bits != other.bits
    }

    /// The `card()` singleton subsets whose single member is set in `self`.
    pub fn singletons(&self) -> Vec<GoalSubset> {
        (0..self.width)
            .filter(|&i| self.contains(i))
            .map(|i| GoalSubset::singleton(i, self.width))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.width).filter(move |&i| self.contains(i))
    }
}

impl fmt::Debug for GoalSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for i in self.iter() {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{i}")?;
            first = false;
        }
        write!(f, "}}")
    }
}

/// Inclusion-minimizes a family of subsets, discarding any element that is a strict superset
/// of another element in the same family.
fn minimize(mut family: Vec<GoalSubset>) -> Vec<GoalSubset> {
    // sorting by ascending cardinality means a previously-kept set can never be a superset of
    // a candidate visited later, so a single forward pass suffices.
    family.sort_by_key(|s| s.card());
    let mut result: Vec<GoalSubset> = Vec::with_capacity(family.len());
    for candidate in family {
        if !result.iter().any(|kept| kept.is_subset_of(&candidate)) {
            result.push(candidate);
        }
    }
    result
}

/// Computes the inclusion-minimal hitting sets of a family of subsets of a `width`-wide universe:
/// the minimal `H` such that `H` intersects every member of `family`.
///
/// `family` must be non-empty; an empty family has no constraint on `H` other than minimality,
/// which degenerates to `{ {} }` and is returned as such.
pub fn minimal_hitting_sets(family: &[GoalSubset], width: u8) -> Vec<GoalSubset> {
    let Some((first, rest)) = family.split_first() else {
        return vec![GoalSubset::empty(width)];
    };

    let mut hitting_sets = first.singletons();
    for set in rest {
        let members = set.singletons();
        let mut combined = Vec::with_capacity(hitting_sets.len() * members.len().max(1));
        for h in &hitting_sets {
            for m in &members {
                combined.push(h.union(m));
            }
        }
        hitting_sets = minimize(combined);
    }
    hitting_sets
}
