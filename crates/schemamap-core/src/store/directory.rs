//! Directory workspace of `GeoJSON` feature collections.
//!
//! Each collection `name` lives in `<workspace>/<name>.geojson`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::codec::{table_from_geojson, table_to_geojson};
use crate::error::{IoError, IoErrorExt, Result, StoreError};
use crate::store::{FeatureStore, validate_collection_name};
use crate::table::FeatureTable;

const EXTENSION: &str = "geojson";
const FORMAT: &str = "GeoJSON";

/// A directory whose `.geojson` files are the feature collections.
#[derive(Debug, Clone)]
pub struct GeoJsonWorkspace {
    root: PathBuf,
}

impl GeoJsonWorkspace {
    /// Opens an existing directory as a workspace.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::FileNotFound`] if the path does not exist and
    /// [`IoError::InvalidPath`] if it is not a directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(IoError::FileNotFound {
                path: root.to_path_buf(),
            }
            .into());
        }
        if !root.is_dir() {
            return Err(IoError::InvalidPath {
                path: root.to_path_buf(),
                reason: "workspace is not a directory".to_string(),
            }
            .into());
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Workspace directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing a collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for names that cannot be file stems.
    pub fn collection_path(&self, name: &str) -> Result<PathBuf> {
        validate_collection_name(name)?;
        Ok(self.root.join(format!("{name}.{EXTENSION}")))
    }
}

impl FeatureStore for GeoJsonWorkspace {
    fn describe(&self) -> String {
        format!("workspace '{}'", self.root.display())
    }

    fn collection_names(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).with_read_context("workspace", &self.root)?;
        let mut names = Vec::new();
        for entry in entries {
            let path = entry.with_read_context("workspace", &self.root)?.path();
            // Must agree with collection_path, which builds the lowercase extension
            let is_collection = path.is_file() && path.extension().is_some_and(|ext| ext == EXTENSION);
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && is_collection
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.collection_path(name)?.is_file())
    }

    fn read_collection(&self, name: &str) -> Result<FeatureTable> {
        let path = self.collection_path(name)?;
        if !path.is_file() {
            return Err(StoreError::CollectionNotFound {
                name: name.to_string(),
                workspace: self.describe(),
            }
            .into());
        }
        debug!("Reading {}", path.display());
        let text = fs::read_to_string(&path).with_read_context(FORMAT, &path)?;
        table_from_geojson(name, &text)
    }

    fn write_collection(&mut self, table: &FeatureTable, overwrite: bool) -> Result<()> {
        let path = self.collection_path(table.name())?;
        let text = table_to_geojson(table)?;

        debug!("Writing {} record(s) to {}", table.num_rows(), path.display());
        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let mut file = match options.open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::CollectionExists {
                    name: table.name().to_string(),
                    workspace: self.describe(),
                }
                .into());
            },
            Err(e) => return Err(e).with_write_context(FORMAT, &path),
        };
        file.write_all(text.as_bytes())
            .with_write_context(FORMAT, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaMapError;
    use tempfile::TempDir;

    const POINTS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "geometry": {"type": "Point", "coordinates": [-6.2, 56.9]},
      "properties": {"GEMS_ID": "G1", "SURVEYKEY": "S1"}
    }
  ]
}"#;

    #[test]
    fn test_open_missing_directory() {
        let err = GeoJsonWorkspace::open("/definitely/not/here").unwrap_err();
        assert!(matches!(err, SchemaMapError::Io(IoError::FileNotFound { .. })));
    }

    #[test]
    fn test_open_file_is_invalid() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("layer.geojson");
        fs::write(&file, POINTS).unwrap();
        let err = GeoJsonWorkspace::open(&file).unwrap_err();
        assert!(matches!(err, SchemaMapError::Io(IoError::InvalidPath { .. })));
    }

    #[test]
    fn test_lists_only_geojson_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("reefs.geojson"), POINTS).unwrap();
        fs::write(dir.path().join("maerl.geojson"), POINTS).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        let workspace = GeoJsonWorkspace::open(dir.path()).unwrap();
        assert_eq!(workspace.collection_names().unwrap(), vec!["maerl", "reefs"]);
        assert!(workspace.contains("reefs").unwrap());
        assert!(!workspace.contains("notes").unwrap());
    }

    #[test]
    fn test_mixed_case_extension_not_listed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("reefs.GeoJSON"), POINTS).unwrap();
        fs::write(dir.path().join("maerl.geojson"), POINTS).unwrap();
        let workspace = GeoJsonWorkspace::open(dir.path()).unwrap();

        let names = workspace.collection_names().unwrap();
        assert_eq!(names, vec!["maerl"]);
        for name in &names {
            assert!(workspace.describe_collection(name).is_ok());
        }
    }

    #[test]
    fn test_read_and_rewrite() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("reefs.geojson"), POINTS).unwrap();
        let mut workspace = GeoJsonWorkspace::open(dir.path()).unwrap();

        let table = workspace.read_collection("reefs").unwrap();
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.name(), "reefs");

        let err = workspace.write_collection(&table, false).unwrap_err();
        assert!(matches!(err, SchemaMapError::Store(StoreError::CollectionExists { .. })));
        workspace.write_collection(&table, true).unwrap();

        let written = fs::read_to_string(dir.path().join("reefs.geojson")).unwrap();
        assert!(written.contains("\"fields\""));
    }

    #[test]
    fn test_read_missing_collection() {
        let dir = TempDir::new().unwrap();
        let workspace = GeoJsonWorkspace::open(dir.path()).unwrap();
        let err = workspace.read_collection("absent").unwrap_err();
        assert!(matches!(err, SchemaMapError::Store(StoreError::CollectionNotFound { .. })));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let workspace = GeoJsonWorkspace::open(dir.path()).unwrap();
        assert!(workspace.collection_path("../escape").is_err());
    }
}
