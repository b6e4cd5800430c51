//! Mapping between opaque user/item ids and dense matrix indices

use crate::data_model::RatingSource;
use crate::error::{ParVecMfError, Result};
use std::collections::HashMap;

/// Bidirectional id <-> index mapping for one kind of entity
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    kind: &'static str,
    index_of: HashMap<String, usize>,
    ids: Vec<String>,
}

impl IdIndex {
    /// Assign dense indices in iteration order
    ///
    /// Fails on a repeated id, since the mapping must be injective.
    pub fn build(kind: &'static str, ids: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut index = Self {
            kind,
            ..Default::default()
        };

        for id in ids {
            if index.index_of.contains_key(&id) {
                return Err(ParVecMfError::DuplicateId { kind, id });
            }
            index.index_of.insert(id.clone(), index.ids.len());
            index.ids.push(id);
        }

        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn index(&self, id: &str) -> Option<usize> {
        self.index_of.get(id).copied()
    }

    /// Like [`IdIndex::index`] but an unknown id is an error
    pub fn require(&self, id: &str) -> Result<usize> {
        self.index(id).ok_or_else(|| ParVecMfError::UnknownId {
            kind: self.kind,
            id: id.to_string(),
        })
    }

    pub fn id(&self, index: usize) -> Option<&str> {
        self.ids.get(index).map(String::as_str)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

/// User and item mappings for one rating source
#[derive(Debug, Clone, Default)]
pub struct IdMapping {
    pub users: IdIndex,
    pub items: IdIndex,
}

impl IdMapping {
    pub fn from_source(source: &dyn RatingSource) -> Result<Self> {
        Ok(Self {
            users: IdIndex::build("user", source.user_ids()?)?,
            items: IdIndex::build("item", source.item_ids()?)?,
        })
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::InMemoryRatings;

    #[test]
    fn test_round_trip_lookup() {
        let index = IdIndex::build("user", vec!["a".to_string(), "b".to_string()]).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.index("b"), Some(1));
        assert_eq!(index.id(0), Some("a"));
        assert_eq!(index.id(2), None);
        assert_eq!(index.index("c"), None);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = IdIndex::build("item", vec!["x".to_string(), "x".to_string()]);
        assert!(matches!(
            result,
            Err(ParVecMfError::DuplicateId { kind: "item", .. })
        ));
    }

    #[test]
    fn test_require_reports_kind() {
        let index = IdIndex::build("item", Vec::new()).unwrap();
        assert!(index.is_empty());

        match index.require("ghost") {
            Err(ParVecMfError::UnknownId { kind, id }) => {
                assert_eq!(kind, "item");
                assert_eq!(id, "ghost");
            }
            other => panic!("expected unknown id error, got {:?}", other),
        }
    }

    #[test]
    fn test_mapping_from_source() {
        let ratings =
            InMemoryRatings::from_interactions(vec![("u1", "i1", 1.0), ("u2", "i2", 2.0), ("u2", "i3", 3.0)]);
        let mapping = IdMapping::from_source(&ratings).unwrap();

        assert_eq!(mapping.num_users(), 2);
        assert_eq!(mapping.num_items(), 3);
        assert_eq!(mapping.items.index("i3"), Some(2));
    }
}
