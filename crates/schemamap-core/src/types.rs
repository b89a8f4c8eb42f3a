//! Data types describing feature collection fields.
//!
//! Fields are stored as Arrow columns. The GIS-facing view of a column, its
//! [`FieldType`], alias and nullability, is carried by [`FieldInfo`] and
//! round-trips through Arrow field metadata.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use arrow_schema::{DataType, Field};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result, SchemaMapError};

/// Field metadata key holding the display alias.
pub const ALIAS_METADATA_KEY: &str = "schemamap:alias";

/// Field metadata key marking the geometry column.
pub const GEOMETRY_METADATA_KEY: &str = "schemamap:geometry";

/// Name given to the geometry field of every collection.
pub const GEOMETRY_FIELD: &str = "Shape";

/// Attribute field types understood by the feature stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    /// Variable-length text.
    Text,
    /// 64-bit integer.
    Long,
    /// 64-bit floating point.
    Double,
    /// True/false.
    Boolean,
    /// The collection's geometry, stored as `GeoJSON` geometry text.
    Geometry,
}

impl FieldType {
    /// Returns the label used in field listings (e.g. `"TEXT"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Long => "LONG",
            FieldType::Double => "DOUBLE",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Geometry => "GEOMETRY",
        }
    }

    /// Arrow type backing this field type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            FieldType::Text | FieldType::Geometry => DataType::Utf8,
            FieldType::Long => DataType::Int64,
            FieldType::Double => DataType::Float64,
            FieldType::Boolean => DataType::Boolean,
        }
    }

    /// Maps an Arrow field back to a field type.
    ///
    /// Returns `None` for Arrow types the stores do not handle.
    #[must_use]
    pub fn from_arrow(field: &Field) -> Option<Self> {
        if field.metadata().contains_key(GEOMETRY_METADATA_KEY) {
            return Some(FieldType::Geometry);
        }
        match field.data_type() {
            DataType::Utf8 | DataType::LargeUtf8 => Some(FieldType::Text),
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32 => Some(FieldType::Long),
            DataType::Float16 | DataType::Float32 | DataType::Float64 => Some(FieldType::Double),
            DataType::Boolean => Some(FieldType::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = SchemaMapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TEXT" | "STRING" => Ok(FieldType::Text),
            "LONG" | "INTEGER" => Ok(FieldType::Long),
            "DOUBLE" | "FLOAT" => Ok(FieldType::Double),
            "BOOLEAN" => Ok(FieldType::Boolean),
            "GEOMETRY" => Ok(FieldType::Geometry),
            _ => Err(ConfigError::InvalidOption {
                option: "field type".to_string(),
                message: format!("'{s}' is not one of TEXT, LONG, DOUBLE, BOOLEAN"),
            }
            .into()),
        }
    }
}

/// Information about a field of a feature collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Storage name
    pub name: String,
    /// Display alias; equals the name unless set otherwise
    #[serde(default)]
    pub alias: Option<String>,
    /// Field type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field accepts nulls
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl FieldInfo {
    /// Creates a nullable field without an explicit alias.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            alias: None,
            field_type,
            nullable: true,
        }
    }

    /// The geometry field every collection carries.
    #[must_use]
    pub fn geometry() -> Self {
        Self::new(GEOMETRY_FIELD, FieldType::Geometry)
    }

    /// Sets the display alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Sets nullability.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Alias shown to users, falling back to the storage name.
    #[must_use]
    pub fn display_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Returns `true` for the geometry field.
    #[must_use]
    pub fn is_geometry(&self) -> bool {
        self.field_type == FieldType::Geometry
    }

    /// Builds the Arrow field, encoding alias and geometry role as metadata.
    #[must_use]
    pub fn to_arrow(&self) -> Field {
        let mut metadata = HashMap::new();
        if let Some(alias) = &self.alias {
            metadata.insert(ALIAS_METADATA_KEY.to_string(), alias.clone());
        }
        if self.is_geometry() {
            metadata.insert(GEOMETRY_METADATA_KEY.to_string(), "geojson".to_string());
        }
        Field::new(&self.name, self.field_type.data_type(), self.nullable).with_metadata(metadata)
    }

    /// Reads a field description from an Arrow field.
    ///
    /// Unsupported Arrow types are reported as text.
    #[must_use]
    pub fn from_arrow(field: &Field) -> Self {
        Self {
            name: field.name().clone(),
            alias: field.metadata().get(ALIAS_METADATA_KEY).cloned(),
            field_type: FieldType::from_arrow(field).unwrap_or(FieldType::Text),
            nullable: field.is_nullable(),
        }
    }
}

/// Summary of one collection in a workspace.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    /// Collection name
    pub name: String,
    /// Number of records
    pub records: usize,
    /// Fields, geometry included
    pub fields: Vec<FieldInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_labels() {
        assert_eq!(FieldType::Text.as_str(), "TEXT");
        assert_eq!(FieldType::Long.to_string(), "LONG");
        assert_eq!(FieldType::Geometry.data_type(), DataType::Utf8);
    }

    #[test]
    fn test_field_type_parse_case_insensitive() {
        assert_eq!("text".parse::<FieldType>().unwrap(), FieldType::Text);
        assert_eq!("Double".parse::<FieldType>().unwrap(), FieldType::Double);
        assert!("blob".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_arrow_round_trip_keeps_alias() {
        let info = FieldInfo::new("SurveyKey", FieldType::Text).with_alias("Survey key");
        let field = info.to_arrow();
        assert_eq!(field.data_type(), &DataType::Utf8);
        assert_eq!(FieldInfo::from_arrow(&field), info);
    }

    #[test]
    fn test_geometry_role_survives_arrow() {
        let field = FieldInfo::geometry().to_arrow();
        assert_eq!(FieldType::from_arrow(&field), Some(FieldType::Geometry));
        assert!(FieldInfo::from_arrow(&field).is_geometry());
    }

    #[test]
    fn test_narrow_integers_report_as_long() {
        let field = Field::new("n", DataType::Int32, true);
        assert_eq!(FieldType::from_arrow(&field), Some(FieldType::Long));
    }

    #[test]
    fn test_display_alias_falls_back_to_name() {
        assert_eq!(FieldInfo::new("Comments", FieldType::Text).display_alias(), "Comments");
    }

    #[test]
    fn test_field_info_json_shape() {
        let info: FieldInfo =
            serde_json::from_str(r#"{"name":"Depth","type":"LONG"}"#).unwrap();
        assert_eq!(info.field_type, FieldType::Long);
        assert!(info.nullable);
        assert!(info.alias.is_none());
    }
}
