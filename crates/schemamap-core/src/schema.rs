//! Mapping tables and target schemas.
//!
//! A mapping run is driven by three values, all passed explicitly:
//!
//! - [`FieldMapping`]: which source fields are copied and what they are renamed to.
//! - [`ConstantFieldMap`]: values assigned to target fields with no source equivalent.
//! - [`SchemaDefinition`]: the fields the target schema requires, chosen by [`GeometryKind`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result, SchemaMapError};
use crate::expression::FieldExpression;

/// Source fields copied out of a GeMS habitat layer.
pub const GEMS_SOURCE_FIELDS: [&str; 8] = [
    "GEMS_ID",
    "SURVEYKEY",
    "BIOTOPEOCC",
    "ANNEX_I",
    "ANNEX_I_SU",
    "DATE_",
    "CURRENT_BI",
    "CURRENT__1",
];

/// JNCC fields required for point and line layers.
pub const JNCC_POINT_FIELDS: [&str; 14] = [
    "SNCB_Auth",
    "Occurrence",
    "FeaturCode",
    "FeaturName",
    "FeaturSubt",
    "FeaDetDate",
    "FeaDetName",
    "TranRelate",
    "TranComm",
    "OrigCode",
    "OrigName",
    "OrigClass",
    "SourceComp",
    "Comments",
];

/// JNCC fields required for polygon layers.
pub const JNCC_POLYGON_FIELDS: [&str; 16] = [
    "SNCB_Auth",
    "SNCB_UID",
    "EMODnetGUI",
    "Polygon",
    "FeaturCode",
    "FeaturName",
    "FeaturSubt",
    "FeaDetDate",
    "FeaDetName",
    "TranRelate",
    "TranComm",
    "OrigCode",
    "OrigName",
    "OrigClass",
    "SourceComp",
    "Comments",
];

/// Geometry class of the layer being mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// Point features.
    Point,
    /// Line features.
    Line,
    /// Mixed point and line features.
    PointLine,
    /// Polygon features.
    Polygon,
}

impl GeometryKind {
    /// Every kind, in CLI listing order.
    pub const ALL: [GeometryKind; 4] = [
        GeometryKind::Point,
        GeometryKind::Line,
        GeometryKind::PointLine,
        GeometryKind::Polygon,
    ];

    /// Lower-case name used on the command line.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Point => "point",
            GeometryKind::Line => "line",
            GeometryKind::PointLine => "pointline",
            GeometryKind::Polygon => "polygon",
        }
    }

    /// Which target schema variant this kind maps onto.
    #[must_use]
    pub fn schema_variant(&self) -> SchemaVariant {
        match self {
            GeometryKind::Point | GeometryKind::Line | GeometryKind::PointLine => {
                SchemaVariant::Points
            },
            GeometryKind::Polygon => SchemaVariant::Polygon,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeometryKind {
    type Err = SchemaMapError;

    /// Parses case-insensitively; `points` is accepted as a synonym of `point`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "point" | "points" => Ok(GeometryKind::Point),
            "line" => Ok(GeometryKind::Line),
            "pointline" => Ok(GeometryKind::PointLine),
            "polygon" => Ok(GeometryKind::Polygon),
            _ => Err(ConfigError::InvalidOption {
                option: "geometry".to_string(),
                message: format!(
                    "'{s}' is not one of {}",
                    GeometryKind::ALL.map(|kind| kind.as_str()).join(", ")
                ),
            }
            .into()),
        }
    }
}

/// The two target schema variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVariant {
    /// Point and line layers.
    Points,
    /// Polygon layers.
    Polygon,
}

impl SchemaVariant {
    /// Name of the variant.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVariant::Points => "points",
            SchemaVariant::Polygon => "polygon",
        }
    }
}

/// A named, ordered set of required field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefinition {
    name: String,
    fields: Vec<String>,
}

impl SchemaDefinition {
    /// Creates a schema definition.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the field list is empty or repeats a name.
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(invalid_option(
                "schema",
                format!("schema '{name}' has no fields"),
            ));
        }
        ensure_unique(fields.iter().map(String::as_str), "schema")?;
        Ok(Self { name, fields })
    }

    /// Schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Required fields, in order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Returns `true` if the schema requires `field`.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// Schema definitions for both variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSet {
    points: SchemaDefinition,
    polygon: SchemaDefinition,
}

impl SchemaSet {
    /// Creates a schema set from its two variants.
    #[must_use]
    pub fn new(points: SchemaDefinition, polygon: SchemaDefinition) -> Self {
        Self { points, polygon }
    }

    /// The JNCC point/line and polygon schemas.
    #[must_use]
    pub fn jncc() -> Self {
        Self {
            points: SchemaDefinition {
                name: "JNCC points".to_string(),
                fields: JNCC_POINT_FIELDS.iter().map(ToString::to_string).collect(),
            },
            polygon: SchemaDefinition {
                name: "JNCC polygon".to_string(),
                fields: JNCC_POLYGON_FIELDS.iter().map(ToString::to_string).collect(),
            },
        }
    }

    /// Selects the schema for a geometry kind.
    #[must_use]
    pub fn for_kind(&self, kind: GeometryKind) -> &SchemaDefinition {
        self.variant(kind.schema_variant())
    }

    /// Selects a schema variant.
    #[must_use]
    pub fn variant(&self, variant: SchemaVariant) -> &SchemaDefinition {
        match variant {
            SchemaVariant::Points => &self.points,
            SchemaVariant::Polygon => &self.polygon,
        }
    }
}

impl Default for SchemaSet {
    fn default() -> Self {
        Self::jncc()
    }
}

/// One rename: `source` in the input becomes `target` in the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRename {
    /// Target schema field name
    pub target: String,
    /// Source field name
    pub source: String,
}

/// Ordered target → source field mapping.
///
/// Targets are unique, and so are sources: each copied source field is
/// renamed exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldMapping {
    entries: Vec<FieldRename>,
}

impl FieldMapping {
    /// Builds a mapping from `(target, source)` pairs.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a target or source appears twice.
    pub fn new<I, T, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, S)>,
        T: Into<String>,
        S: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(target, source)| FieldRename {
                target: target.into(),
                source: source.into(),
            })
            .collect();
        Self::from_entries(entries)
    }

    /// Builds a mapping from rename entries.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a target or source appears twice.
    pub fn from_entries(entries: Vec<FieldRename>) -> Result<Self> {
        ensure_unique(entries.iter().map(|e| e.target.as_str()), "field mapping target")?;
        ensure_unique(entries.iter().map(|e| e.source.as_str()), "field mapping source")?;
        Ok(Self { entries })
    }

    /// The GeMS → JNCC mapping.
    ///
    /// Lagoon layers carry their Annex I feature name in `ANNEX_I_PH`
    /// rather than `ANNEX_I`.
    #[must_use]
    pub fn gems_to_jncc(lagoon: bool) -> Self {
        let feature_name = if lagoon { "ANNEX_I_PH" } else { "ANNEX_I" };
        let entries = [
            ("Polygon", "GEMS_ID"),
            ("SurveyKey", "SURVEYKEY"),
            ("Occurrence", "BIOTOPEOCC"),
            ("FeaturName", feature_name),
            ("FeaturSubt", "ANNEX_I_SU"),
            ("FeaDetDate", "DATE_"),
            ("OrigCode", "CURRENT_BI"),
            ("OrigName", "CURRENT__1"),
        ]
        .into_iter()
        .map(|(target, source)| FieldRename {
            target: target.to_string(),
            source: source.to_string(),
        })
        .collect();
        Self { entries }
    }

    /// Rename entries in order.
    #[must_use]
    pub fn entries(&self) -> &[FieldRename] {
        &self.entries
    }

    /// Source fields, in mapping order. This is the list copied out of the input.
    #[must_use]
    pub fn source_fields(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.source.as_str()).collect()
    }

    /// Target fields, in mapping order.
    #[must_use]
    pub fn target_fields(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.target.as_str()).collect()
    }

    /// Source field for a target, if mapped.
    #[must_use]
    pub fn source_for(&self, target: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.target == target)
            .map(|e| e.source.as_str())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Target field → value expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstantFieldMap {
    values: BTreeMap<String, FieldExpression>,
}

impl ConstantFieldMap {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the expression for a field.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, expression: FieldExpression) -> Self {
        self.insert(field, expression);
        self
    }

    /// Adds or replaces the expression for a field.
    pub fn insert(&mut self, field: impl Into<String>, expression: FieldExpression) {
        self.values.insert(field.into(), expression);
    }

    /// Parses each expression text.
    ///
    /// # Errors
    ///
    /// Returns an expression error for the first unparsable value.
    pub fn parse<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut map = Self::new();
        for (field, text) in pairs {
            map.insert(field, FieldExpression::parse(text.as_ref())?);
        }
        Ok(map)
    }

    /// Expression for a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldExpression> {
        self.values.get(field)
    }

    /// Returns `true` if the field has an expression.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Iterates entries in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldExpression)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no field has an expression.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn ensure_unique<'a>(names: impl Iterator<Item = &'a str>, what: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(invalid_option(what, "empty field name".to_string()));
        }
        if !seen.insert(name) {
            return Err(invalid_option(what, format!("'{name}' appears more than once")));
        }
    }
    Ok(())
}

fn invalid_option(option: &str, message: String) -> SchemaMapError {
    ConfigError::InvalidOption {
        option: option.to_string(),
        message,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_kind_case_insensitive() {
        for text in ["POINT", "Point", "point", " point "] {
            assert_eq!(text.parse::<GeometryKind>().unwrap(), GeometryKind::Point);
        }
        assert_eq!("Points".parse::<GeometryKind>().unwrap(), GeometryKind::Point);
        assert_eq!("POLYGON".parse::<GeometryKind>().unwrap(), GeometryKind::Polygon);
        assert_eq!("PointLine".parse::<GeometryKind>().unwrap(), GeometryKind::PointLine);
    }

    #[test]
    fn test_geometry_kind_rejects_unknown() {
        let err = "multipolygon".parse::<GeometryKind>().unwrap_err();
        assert!(matches!(err, SchemaMapError::Config(_)));
        assert!(err.to_string().contains("point, line, pointline, polygon"));
    }

    #[test]
    fn test_polygon_selects_polygon_schema() {
        let schemas = SchemaSet::jncc();
        let polygon = schemas.for_kind(GeometryKind::Polygon);
        assert_eq!(polygon.fields().len(), JNCC_POLYGON_FIELDS.len());
        assert!(polygon.contains("SNCB_UID"));
        assert!(polygon.contains("EMODnetGUI"));
        assert!(polygon.contains("Polygon"));
    }

    #[test]
    fn test_point_like_kinds_share_points_schema() {
        let schemas = SchemaSet::jncc();
        for kind in [GeometryKind::Point, GeometryKind::Line, GeometryKind::PointLine] {
            let schema = schemas.for_kind(kind);
            assert_eq!(schema.name(), "JNCC points");
            assert!(!schema.contains("SNCB_UID"));
            assert!(schema.contains("Occurrence"));
        }
    }

    #[test]
    fn test_default_mapping_copies_gems_fields() {
        let mapping = FieldMapping::gems_to_jncc(false);
        assert_eq!(mapping.source_fields(), GEMS_SOURCE_FIELDS.to_vec());
        assert_eq!(mapping.source_for("OrigName"), Some("CURRENT__1"));
    }

    #[test]
    fn test_lagoon_mapping_reads_annex_i_ph() {
        let mapping = FieldMapping::gems_to_jncc(true);
        assert_eq!(mapping.source_for("FeaturName"), Some("ANNEX_I_PH"));
        assert!(!mapping.source_fields().contains(&"ANNEX_I"));
    }

    #[test]
    fn test_mapping_rejects_duplicates() {
        assert!(FieldMapping::new([("A", "x"), ("A", "y")]).is_err());
        assert!(FieldMapping::new([("A", "x"), ("B", "x")]).is_err());
        assert!(FieldMapping::new([("A", "")]).is_err());
        assert_eq!(FieldMapping::new([("A", "x"), ("B", "y")]).unwrap().len(), 2);
    }

    #[test]
    fn test_schema_definition_validation() {
        assert!(SchemaDefinition::new("empty", Vec::<String>::new()).is_err());
        assert!(SchemaDefinition::new("dup", ["A", "A"]).is_err());
        assert_eq!(SchemaDefinition::new("ok", ["A", "B"]).unwrap().fields().len(), 2);
    }

    #[test]
    fn test_constant_map_parse() {
        let map = ConstantFieldMap::parse([("SNCB_Auth", "'NatureScot'"), ("SNCB_UID", "!SurveyKey!")])
            .unwrap();
        assert_eq!(map.get("SNCB_Auth"), Some(&FieldExpression::literal("NatureScot")));
        assert_eq!(map.get("SNCB_UID"), Some(&FieldExpression::field("SurveyKey")));
        assert!(ConstantFieldMap::parse([("X", "unquoted")]).is_err());
    }
}
