/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use lasso::{Key, Rodeo, Spur};
use std::fmt;

/// Insertion-ordered, duplicate-free identifier map.
///
/// Names are interned into a `Rodeo`, whose keys are handed out sequentially,
/// so the key of a name doubles as its index. Lookups are O(1) both ways.
#[derive(Default)]
pub struct NameMap {
    names: Rodeo<Spur>,
}

impl NameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name, returning its index. Adding an existing name returns the
    /// index it already has.
    pub fn add(&mut self, name: &str) -> u32 {
        self.names.get_or_intern(name).into_usize() as u32
    }

    /// Index of `name`, if present.
    pub fn get_index(&self, name: &str) -> Option<u32> {
        self.names.get(name).map(|key| key.into_usize() as u32)
    }

    /// Name at `index`, if present.
    pub fn get_name(&self, index: u32) -> Option<&str> {
        let key = Spur::try_from_usize(index as usize)?;
        self.names.try_resolve(&key)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.len() as u32).filter_map(move |index| self.get_name(index))
    }
}

impl Clone for NameMap {
    fn clone(&self) -> Self {
        self.iter().collect()
    }
}

impl PartialEq for NameMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl fmt::Debug for NameMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a> std::iter::FromIterator<&'a str> for NameMap {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut map = NameMap::new();
        for name in iter {
            map.add(name);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order() {
        let mut map = NameMap::new();
        assert_eq!(map.add("B"), 0);
        assert_eq!(map.add("A"), 1);
        assert_eq!(map.add("B"), 0);
        assert_eq!(map.len(), 2);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec!["B", "A"]);
    }

    #[test]
    fn lookup() {
        let map: NameMap = vec!["X", "Y", "Z"].into_iter().collect();
        assert_eq!(map.get_index("Y"), Some(1));
        assert_eq!(map.get_index("W"), None);
        assert_eq!(map.get_name(2), Some("Z"));
        assert_eq!(map.get_name(3), None);
    }

    #[test]
    fn clone_and_eq() {
        let map: NameMap = vec!["X", "Y"].into_iter().collect();
        let copy = map.clone();
        assert_eq!(map, copy);
        let other: NameMap = vec!["Y", "X"].into_iter().collect();
        assert_ne!(map, other);
    }
}
