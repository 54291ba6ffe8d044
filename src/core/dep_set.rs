//! Dependency sets.
//!
//! A `DepSet` is an ordered, duplicate-free collection of targets. Order is
//! the total ordering over `BuildTarget`, never insertion or discovery
//! order, so two passes over the same inputs always list edges the same way.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::target::BuildTarget;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepSet {
    targets: BTreeSet<BuildTarget>,
}

impl DepSet {
    pub fn new() -> Self {
        DepSet {
            targets: BTreeSet::new(),
        }
    }

    /// A set holding exactly one target.
    pub fn single(target: BuildTarget) -> Self {
        DepSet {
            targets: BTreeSet::from([target]),
        }
    }

    /// Return a new set with `target` added.
    pub fn with(&self, target: BuildTarget) -> Self {
        let mut targets = self.targets.clone();
        targets.insert(target);
        DepSet { targets }
    }

    /// Return the union of `self` and `other`.
    pub fn union(&self, other: &DepSet) -> Self {
        DepSet {
            targets: self.targets.union(&other.targets).copied().collect(),
        }
    }

    /// Return the targets of `self` not present in `other`.
    pub fn difference(&self, other: &DepSet) -> Self {
        DepSet {
            targets: self.targets.difference(&other.targets).copied().collect(),
        }
    }

    /// Add a target in place; used while a set is still being collected.
    pub fn insert(&mut self, target: BuildTarget) -> bool {
        self.targets.insert(target)
    }

    pub fn contains(&self, target: &BuildTarget) -> bool {
        self.targets.contains(target)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterate targets in their total order.
    pub fn iter(&self) -> impl Iterator<Item = &BuildTarget> + '_ {
        self.targets.iter()
    }

    /// Copy the targets into an ordered list.
    pub fn to_vec(&self) -> Vec<BuildTarget> {
        self.targets.iter().copied().collect()
    }
}

impl FromIterator<BuildTarget> for DepSet {
    fn from_iter<I: IntoIterator<Item = BuildTarget>>(iter: I) -> Self {
        DepSet {
            targets: iter.into_iter().collect(),
        }
    }
}

impl Extend<BuildTarget> for DepSet {
    fn extend<I: IntoIterator<Item = BuildTarget>>(&mut self, iter: I) {
        self.targets.extend(iter);
    }
}

impl<'a> IntoIterator for &'a DepSet {
    type Item = &'a BuildTarget;
    type IntoIter = std::collections::btree_set::Iter<'a, BuildTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> BuildTarget {
        BuildTarget::parse(s).unwrap()
    }

    #[test]
    fn test_order_ignores_insertion_order() {
        let a: DepSet = [t("//c:c"), t("//a:a"), t("//b:b")].into_iter().collect();
        let b: DepSet = [t("//b:b"), t("//c:c"), t("//a:a")].into_iter().collect();

        assert_eq!(a.to_vec(), b.to_vec());
        assert_eq!(a.to_vec(), vec![t("//a:a"), t("//b:b"), t("//c:c")]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let set: DepSet = [t("//a:a"), t("//a:a")].into_iter().collect();
        assert_eq!(set.len(), 1);
        assert_eq!(set.with(t("//a:a")).len(), 1);
    }

    #[test]
    fn test_with_leaves_original_untouched() {
        let original = DepSet::single(t("//a:a"));
        let grown = original.with(t("//b:b"));

        assert_eq!(original.len(), 1);
        assert_eq!(grown.len(), 2);
    }

    #[test]
    fn test_union_and_difference() {
        let left: DepSet = [t("//a:a"), t("//b:b")].into_iter().collect();
        let right: DepSet = [t("//b:b"), t("//c:c")].into_iter().collect();

        assert_eq!(left.union(&right).len(), 3);
        assert_eq!(left.difference(&right).to_vec(), vec![t("//a:a")]);
    }
}
