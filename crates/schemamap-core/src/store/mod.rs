//! Feature stores: the workspace primitives the mapper is written against.
//!
//! A store owns named feature collections. Implementors provide collection
//! load, save and listing; the field-level primitives are provided methods
//! that load the collection, apply one [`FeatureTable`] operation and save it
//! back. Every primitive therefore persists on its own, and a failure between
//! primitives leaves earlier changes in place.

mod directory;
mod memory;

pub use directory::GeoJsonWorkspace;
pub use memory::MemoryStore;

use log::debug;

use crate::error::{Result, StoreError};
use crate::expression::FieldExpression;
use crate::table::FeatureTable;
use crate::types::{CollectionInfo, FieldInfo, FieldType};

/// A container of named feature collections.
pub trait FeatureStore {
    /// Human-readable description of the workspace, used in messages.
    fn describe(&self) -> String;

    /// Names of all collections, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace cannot be listed.
    fn collection_names(&self) -> Result<Vec<String>>;

    /// Returns `true` if a collection called `name` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or existence cannot be checked.
    fn contains(&self, name: &str) -> Result<bool>;

    /// Loads a collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CollectionNotFound`] for an unknown name, or a
    /// read/format error from the backing storage.
    fn read_collection(&self, name: &str) -> Result<FeatureTable>;

    /// Saves a collection under its own name.
    ///
    /// With `overwrite` unset, an existing collection is an error and is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CollectionExists`] as described above, or a
    /// write error from the backing storage.
    fn write_collection(&mut self, table: &FeatureTable, overwrite: bool) -> Result<()>;

    /// Lists the fields of a collection, geometry included.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    fn list_fields(&self, collection: &str) -> Result<Vec<FieldInfo>> {
        Ok(self.read_collection(collection)?.fields())
    }

    /// Summary of a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    fn describe_collection(&self, collection: &str) -> Result<CollectionInfo> {
        let table = self.read_collection(collection)?;
        Ok(CollectionInfo {
            name: table.name().to_string(),
            records: table.num_rows(),
            fields: table.fields(),
        })
    }

    /// Creates `output` holding only `fields` (plus geometry) of every record
    /// of `input`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CollectionExists`] without touching anything if
    /// `output` exists, and a not-found error for a missing input or field.
    fn copy_collection(&mut self, input: &str, output: &str, fields: &[&str]) -> Result<()> {
        validate_collection_name(output)?;
        if self.contains(output)? {
            return Err(StoreError::CollectionExists {
                name: output.to_string(),
                workspace: self.describe(),
            }
            .into());
        }
        debug!("Copying '{input}' to '{output}' in {}", self.describe());
        let copy = self.read_collection(input)?.select(output, fields)?;
        self.write_collection(&copy, false)
    }

    /// Renames a field and sets its alias.
    ///
    /// # Errors
    ///
    /// See [`FeatureTable::rename_field`].
    fn alter_field(
        &mut self,
        collection: &str,
        field: &str,
        new_name: &str,
        new_alias: &str,
    ) -> Result<()> {
        let mut table = self.read_collection(collection)?;
        table.rename_field(field, new_name, new_alias)?;
        self.write_collection(&table, true)
    }

    /// Adds an all-null field.
    ///
    /// # Errors
    ///
    /// See [`FeatureTable::add_field`].
    fn add_field(
        &mut self,
        collection: &str,
        name: &str,
        field_type: FieldType,
        nullable: bool,
    ) -> Result<()> {
        let mut table = self.read_collection(collection)?;
        table.add_field(name, field_type, nullable)?;
        self.write_collection(&table, true)
    }

    /// Sets every record's value of a field from an expression.
    ///
    /// # Errors
    ///
    /// See [`FeatureTable::calculate_field`].
    fn calculate_field(
        &mut self,
        collection: &str,
        field: &str,
        expression: &FieldExpression,
    ) -> Result<()> {
        let mut table = self.read_collection(collection)?;
        table.calculate_field(field, expression)?;
        self.write_collection(&table, true)
    }
}

/// Checks that a collection name can be used as a stored name.
///
/// Names must be non-empty and free of path separators, NUL and
/// surrounding whitespace, and must not be `.` or `..`.
///
/// # Errors
///
/// Returns [`StoreError::InvalidName`] describing the first problem found.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.trim() != name {
        Some("name has leading or trailing whitespace")
    } else if name == "." || name == ".." {
        Some("name is a relative path component")
    } else if name.contains(['/', '\\', '\0']) {
        Some("name contains a path separator")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StoreError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}
