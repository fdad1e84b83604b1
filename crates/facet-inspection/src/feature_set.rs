use std::collections::HashMap;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("feature '{name}' appears more than once")]
pub struct DuplicateFeatureError {
    pub name: String,
}

/// Ordered set of feature names with dense, 0-based indices.
///
/// Indices are assigned in insertion order and never change for the
/// lifetime of the set.
///
/// # Examples
///
/// ```
/// use facet_inspection::feature_set::FeatureSet;
///
/// let a = FeatureSet::new(["x", "y"]).unwrap();
/// let b = FeatureSet::new(["y", "z"]).unwrap();
/// let canonical = FeatureSet::union([&a, &b]);
///
/// assert_eq!(canonical.names(), &["x", "y", "z"]);
/// assert_eq!(canonical.index_of("z"), Some(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    names: Vec<String>,
    indices: HashMap<String, usize>,
}

impl FeatureSet {
    pub fn new<I, S>(names: I) -> Result<Self, DuplicateFeatureError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for name in names {
            let name = name.into();
            if set.indices.contains_key(&name) {
                return Err(DuplicateFeatureError { name });
            }
            set.push(name);
        }
        Ok(set)
    }

    /// Union of several sets, keeping the order in which names are first seen.
    #[must_use]
    pub fn union<'a, I>(sets: I) -> Self
    where
        I: IntoIterator<Item = &'a FeatureSet>,
    {
        let mut union = Self::default();
        for name in sets.into_iter().flat_map(|set| &set.names) {
            if !union.indices.contains_key(name) {
                union.push(name.clone());
            }
        }
        union
    }

    fn push(&mut self, name: String) {
        self.indices.insert(name.clone(), self.names.len());
        self.names.push(name);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    /// Maps every index of `self` to the index of the same name in `target`.
    ///
    /// Returns `None` if `target` lacks one of the names.
    #[must_use]
    pub fn reindex_into(&self, target: &FeatureSet) -> Option<Vec<usize>> {
        self.names.iter().map(|name| target.index_of(name)).collect()
    }
}

impl Serialize for FeatureSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(&self.names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_duplicates() {
        let err = FeatureSet::new(["a", "b", "a"]).unwrap_err();
        assert_eq!(err.name, "a");
    }

    #[test]
    fn test_indices_are_dense() {
        let set = FeatureSet::new(["c", "a", "b"]).unwrap();
        for (i, name) in set.iter().enumerate() {
            assert_eq!(set.index_of(name), Some(i));
            assert_eq!(set.name(i), Some(name));
        }
        assert_eq!(set.name(3), None);
    }

    #[test]
    fn test_union_first_seen_order() {
        let a = FeatureSet::new(["b", "a"]).unwrap();
        let b = FeatureSet::new(["c", "a", "d"]).unwrap();
        let c = FeatureSet::new(["d", "e"]).unwrap();
        let union = FeatureSet::union([&a, &b, &c]);
        assert_eq!(union.names(), &["b", "a", "c", "d", "e"]);
    }

    #[test]
    fn test_union_of_nothing_is_empty() {
        assert!(FeatureSet::union(std::iter::empty()).is_empty());
    }

    #[test]
    fn test_reindex_into() {
        let fold = FeatureSet::new(["c", "a"]).unwrap();
        let canonical = FeatureSet::new(["a", "b", "c"]).unwrap();
        assert_eq!(fold.reindex_into(&canonical), Some(vec![2, 0]));
        assert_eq!(canonical.reindex_into(&fold), None);
    }
}
