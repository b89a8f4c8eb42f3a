//! In-process feature store.

use std::collections::HashMap;

use crate::error::{Result, StoreError};
use crate::store::{FeatureStore, validate_collection_name};
use crate::table::FeatureTable;

/// Feature collections held in a map, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: HashMap<String, FeatureTable>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if the table name is unusable.
    pub fn insert(&mut self, table: FeatureTable) -> Result<()> {
        validate_collection_name(table.name())?;
        self.collections.insert(table.name().to_string(), table);
        Ok(())
    }

    /// Borrows a collection without cloning it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FeatureTable> {
        self.collections.get(name)
    }
}

impl FeatureStore for MemoryStore {
    fn describe(&self) -> String {
        "memory workspace".to_string()
    }

    fn collection_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.collections.contains_key(name))
    }

    fn read_collection(&self, name: &str) -> Result<FeatureTable> {
        self.collections.get(name).cloned().ok_or_else(|| {
            StoreError::CollectionNotFound {
                name: name.to_string(),
                workspace: self.describe(),
            }
            .into()
        })
    }

    fn write_collection(&mut self, table: &FeatureTable, overwrite: bool) -> Result<()> {
        if !overwrite && self.collections.contains_key(table.name()) {
            return Err(StoreError::CollectionExists {
                name: table.name().to_string(),
                workspace: self.describe(),
            }
            .into());
        }
        self.insert(table.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaMapError;
    use crate::types::{FieldInfo, FieldType};

    fn empty_table(name: &str) -> FeatureTable {
        let geometry = arrow_array::new_null_array(&FieldType::Geometry.data_type(), 0);
        FeatureTable::try_new(name, &[FieldInfo::geometry()], vec![geometry], 0).unwrap()
    }

    #[test]
    fn test_write_without_overwrite_rejects_existing() {
        let mut store = MemoryStore::new();
        store.write_collection(&empty_table("a"), false).unwrap();
        let err = store.write_collection(&empty_table("a"), false).unwrap_err();
        assert!(matches!(err, SchemaMapError::Store(StoreError::CollectionExists { .. })));
        store.write_collection(&empty_table("a"), true).unwrap();
    }

    #[test]
    fn test_names_sorted() {
        let mut store = MemoryStore::new();
        store.insert(empty_table("b")).unwrap();
        store.insert(empty_table("a")).unwrap();
        assert_eq!(store.collection_names().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_read_missing_collection() {
        let err = MemoryStore::new().read_collection("nope").unwrap_err();
        assert!(matches!(err, SchemaMapError::Store(StoreError::CollectionNotFound { .. })));
    }
}
