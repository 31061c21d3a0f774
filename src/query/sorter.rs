use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered sort keys: field name to ascending flag.
///
/// Insertion order is priority order. Putting a key again changes its
/// direction but not its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    items: IndexMap<String, bool>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(self, field: &str) -> Self {
        self.put(field, true)
    }

    pub fn desc(self, field: &str) -> Self {
        self.put(field, false)
    }

    pub fn put(mut self, field: &str, ascending: bool) -> Self {
        self.items.insert(field.to_string(), ascending);
        self
    }

    pub fn combine(&mut self, other: &SortSpec) -> &mut Self {
        for (field, ascending) in &other.items {
            self.items.insert(field.clone(), *ascending);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.items.iter().map(|(field, ascending)| (field.as_str(), *ascending))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readded_key_keeps_position() {
        let sorter = SortSpec::new().asc("a").desc("b").desc("a");
        let items: Vec<_> = sorter.iter().collect();
        assert_eq!(items, vec![("a", false), ("b", false)]);
    }

    #[test]
    fn test_combine_appends_new_keys_and_overwrites_existing() {
        let mut base = SortSpec::new().asc("a").asc("b");
        base.combine(&SortSpec::new().desc("c").desc("a"));
        let items: Vec<_> = base.iter().collect();
        assert_eq!(items, vec![("a", false), ("b", true), ("c", false)]);
    }
}
