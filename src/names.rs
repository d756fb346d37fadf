//! Case-insensitive name collections.
//!
//! Table and data source names are compared ignoring ASCII case. Keys are
//! normalized once on insert and the first spelling seen is kept for display,
//! so iteration order is insertion order and lookups never allocate twice.

use std::collections::HashMap;

#[inline]
pub fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[inline]
pub fn eq_ignore_case(left: &str, right: &str) -> bool {
    left.eq_ignore_ascii_case(right)
}

/// Ordered set of names with case-insensitive membership.
#[derive(Debug, Clone, Default)]
pub struct NameSet {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl NameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if an equal name (ignoring case) is already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        let key = normalize(&name);
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.names.len());
        self.names.push(name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&normalize(name))
    }

    /// Stored spelling of `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(&normalize(name))
            .map(|&pos| self.names[pos].as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.names.clone()
    }
}

impl<S: Into<String>> FromIterator<S> for NameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = NameSet::new();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

impl<S: Into<String>> Extend<S> for NameSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name);
        }
    }
}

/// Insertion-ordered map keyed by case-insensitive name.
#[derive(Debug, Clone)]
pub struct NameMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Default for NameMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> NameMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces; the original spelling of an existing key is kept.
    pub fn insert(&mut self, name: impl Into<String>, value: V) -> Option<V> {
        let name = name.into();
        let key = normalize(&name);
        match self.index.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.index
            .get(&normalize(name))
            .map(|&pos| &self.entries[pos].1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.index.contains_key(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_set_ignores_case() {
        let mut set = NameSet::new();
        assert!(set.insert("T_Order_0"));
        assert!(!set.insert("t_order_0"));
        assert!(set.contains("T_ORDER_0"));
        assert_eq!(set.get("t_order_0"), Some("T_Order_0"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_name_set_keeps_insertion_order() {
        let set: NameSet = ["ds_1", "ds_0", "DS_1"].into_iter().collect();
        assert_eq!(set.to_vec(), vec!["ds_1".to_string(), "ds_0".to_string()]);
    }

    #[test]
    fn test_name_map_replace_keeps_spelling() {
        let mut map = NameMap::new();
        map.insert("T_ORDER", 1);
        assert_eq!(map.insert("t_order", 2), Some(1));
        assert_eq!(map.get("T_Order"), Some(&2));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["T_ORDER"]);
    }
}
