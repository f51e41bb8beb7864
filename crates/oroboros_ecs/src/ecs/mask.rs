//! # Component Mask
//!
//! 64-bit set of component ids. Used both as an entity's "has" set and as a
//! query's "requires" set.

use std::ops::Add;

use super::component::ComponentId;

/// Fixed-width bitset keyed by [`ComponentId`].
///
/// # Example
///
/// ```rust
/// use oroboros_ecs::{ComponentId, ComponentMask};
///
/// let position = ComponentId::new(0);
/// let velocity = ComponentId::new(1);
///
/// let query = ComponentMask::from(position) + velocity;
/// assert!(query.includes(position));
/// assert!(query.includes_mask(&ComponentMask::from(velocity)));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// The empty mask. Matches every entity when used as a query.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Creates a mask from raw bits (bit `i` = component id `i`).
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether component `id` is in the set.
    #[inline]
    #[must_use]
    pub const fn includes(&self, id: ComponentId) -> bool {
        self.0 & id.bit() != 0
    }

    /// Whether every component of `other` is in the set (superset test).
    #[inline]
    #[must_use]
    pub const fn includes_mask(&self, other: &Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no component of `other` is in the set (disjointness test).
    #[inline]
    #[must_use]
    pub const fn includes_not(&self, other: &Self) -> bool {
        self.0 & other.0 == 0
    }

    /// Adds component `id` to the set.
    #[inline]
    pub fn include(&mut self, id: ComponentId) {
        self.0 |= id.bit();
    }

    /// Removes component `id` from the set.
    #[inline]
    pub fn exclude(&mut self, id: ComponentId) {
        self.0 &= !id.bit();
    }

    /// Empties the set.
    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Whether the set is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of components in the set.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates over the ids in the set, ascending.
    #[inline]
    #[must_use]
    pub const fn iter(&self) -> MaskIter {
        MaskIter { bits: self.0 }
    }
}

impl From<ComponentId> for ComponentMask {
    fn from(id: ComponentId) -> Self {
        Self(id.bit())
    }
}

impl Add<ComponentId> for ComponentMask {
    type Output = Self;

    fn add(self, id: ComponentId) -> Self {
        Self(self.0 | id.bit())
    }
}

impl Add for ComponentMask {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl FromIterator<ComponentId> for ComponentMask {
    fn from_iter<I: IntoIterator<Item = ComponentId>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), |mask, id| mask + id)
    }
}

impl IntoIterator for ComponentMask {
    type Item = ComponentId;
    type IntoIter = MaskIter;

    fn into_iter(self) -> MaskIter {
        self.iter()
    }
}

/// Iterator over the component ids of a [`ComponentMask`].
#[derive(Clone, Debug)]
pub struct MaskIter {
    bits: u64,
}

impl Iterator for MaskIter {
    type Item = ComponentId;

    #[inline]
    fn next(&mut self) -> Option<ComponentId> {
        if self.bits == 0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        let id = self.bits.trailing_zeros() as u8;
        self.bits &= self.bits - 1;
        Some(ComponentId::new(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.bits.count_ones() as usize;
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u8) -> ComponentId {
        ComponentId::new(raw)
    }

    #[test]
    fn test_include_exclude() {
        let mut mask = ComponentMask::new();
        assert!(!mask.includes(id(5)));

        mask.include(id(5));
        mask.include(id(63));
        assert!(mask.includes(id(5)));
        assert!(mask.includes(id(63)));
        assert_eq!(mask.len(), 2);

        mask.exclude(id(5));
        assert!(!mask.includes(id(5)));

        mask.clear();
        assert!(mask.is_empty());
    }

    #[test]
    fn test_union_includes_both_operands() {
        let pairs = [(0b1010u64, 0b0110u64), (0, 1 << 63), (u64::MAX, 0), (0x00ff, 0xff00)];
        for (a, b) in pairs {
            let a = ComponentMask::from_bits(a);
            let b = ComponentMask::from_bits(b);
            let union = a + b;
            assert!(union.includes_mask(&a));
            assert!(union.includes_mask(&b));
        }
    }

    #[test]
    fn test_includes_not_single_bit() {
        let mask = ComponentMask::new() + id(1) + id(7);
        for raw in 0..64 {
            let single = ComponentMask::from(id(raw));
            assert_eq!(mask.includes_not(&single), !mask.includes_mask(&single));
        }
    }

    #[test]
    fn test_empty_mask_is_included_everywhere() {
        let empty = ComponentMask::new();
        assert!(ComponentMask::new().includes_mask(&empty));
        assert!(ComponentMask::from(id(9)).includes_mask(&empty));
        assert!(ComponentMask::from(id(9)).includes_not(&empty));
    }

    #[test]
    fn test_iter_ascending() {
        let mask: ComponentMask = [id(40), id(2), id(17)].into_iter().collect();
        let ids: Vec<u8> = mask.iter().map(ComponentId::raw).collect();
        assert_eq!(ids, vec![2, 17, 40]);
    }
}
