//! Mapping configuration.
//!
//! [`MappingOptions`] covers the values that change between GeMS downloads
//! and habitat types (download date, feature code, transition relation,
//! lagoon source field) and yields the standard GeMS → JNCC tables.
//! [`MappingConfig`] is an optional JSON file that replaces any of the
//! tables outright. Both resolve into a [`MappingPlan`].

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;

use crate::error::{ConfigError, FormatError, IoErrorExt, Result};
use crate::expression::FieldExpression;
use crate::schema::{
    ConstantFieldMap, FieldMapping, FieldRename, SchemaDefinition, SchemaSet, SchemaVariant,
};

/// Options for the standard GeMS → JNCC mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingOptions {
    /// Authority recorded in `SNCB_Auth` and `FeaDetName` (default: `NatureScot`)
    pub authority: String,
    /// Code written to `FeaturCode` (default: `XXX`)
    pub feature_code: String,
    /// Relation written to `TranRelate` (default: `>`; maerl uses `=`)
    pub tran_relate: String,
    /// Date the GeMS data was downloaded, `YYYY-MM-DD` (default: `2024-06-14`)
    pub source_date: String,
    /// Read the feature name from `ANNEX_I_PH` instead of `ANNEX_I`
    pub lagoon: bool,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            authority: "NatureScot".to_string(),
            feature_code: "XXX".to_string(),
            tran_relate: ">".to_string(),
            source_date: "2024-06-14".to_string(),
            lagoon: false,
        }
    }
}

const ISO_DATE: &str = "%Y-%m-%d";

/// Classification recorded in `OrigClass`.
pub const ORIG_CLASS: &str = "Marine Habitat Classification for Britain and Ireland v04.05";

impl MappingOptions {
    /// Create new options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the authority
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// Set the feature code
    #[must_use]
    pub fn with_feature_code(mut self, code: impl Into<String>) -> Self {
        self.feature_code = code.into();
        self
    }

    /// Set the transition relation
    #[must_use]
    pub fn with_tran_relate(mut self, relation: impl Into<String>) -> Self {
        self.tran_relate = relation.into();
        self
    }

    /// Set the GeMS download date
    #[must_use]
    pub fn with_source_date(mut self, date: impl Into<String>) -> Self {
        self.source_date = date.into();
        self
    }

    /// Set whether the layer is a lagoon layer
    #[must_use]
    pub fn with_lagoon(mut self, lagoon: bool) -> Self {
        self.lagoon = lagoon;
        self
    }

    /// Checks option values.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an empty authority, feature code or
    /// relation, or a source date not written as `YYYY-MM-DD`.
    pub fn validate(&self) -> Result<()> {
        for (option, value) in [
            ("authority", &self.authority),
            ("feature code", &self.feature_code),
            ("tran relate", &self.tran_relate),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidOption {
                    option: option.to_string(),
                    message: "value is empty".to_string(),
                }
                .into());
            }
        }
        if !is_iso_date(&self.source_date) {
            return Err(ConfigError::InvalidOption {
                option: "source date".to_string(),
                message: format!("'{}' is not a YYYY-MM-DD date", self.source_date),
            }
            .into());
        }
        Ok(())
    }

    /// The GeMS → JNCC field mapping.
    #[must_use]
    pub fn field_mapping(&self) -> FieldMapping {
        FieldMapping::gems_to_jncc(self.lagoon)
    }

    /// The JNCC constant and alias values.
    ///
    /// `TranComm` and `Comments` have no entry and stay null.
    #[must_use]
    pub fn constant_map(&self) -> ConstantFieldMap {
        ConstantFieldMap::new()
            .with("SNCB_Auth", FieldExpression::literal(&self.authority))
            .with("SNCB_UID", FieldExpression::field("SurveyKey"))
            .with("EMODnetGUI", FieldExpression::field("SurveyKey"))
            .with("FeaturCode", FieldExpression::literal(&self.feature_code))
            .with("FeaDetName", FieldExpression::literal(&self.authority))
            .with("TranRelate", FieldExpression::literal(&self.tran_relate))
            .with("OrigClass", FieldExpression::literal(ORIG_CLASS))
            .with(
                "SourceComp",
                FieldExpression::literal(format!("GeMS({})", self.source_date)),
            )
    }
}

/// Accepts only zero-padded `YYYY-MM-DD` text naming a real calendar day.
fn is_iso_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, ISO_DATE)
        .is_ok_and(|date| date.format(ISO_DATE).to_string() == text)
}

/// Schema lists of a configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    /// Fields required for point and line layers
    pub points: Vec<String>,
    /// Fields required for polygon layers
    pub polygon: Vec<String>,
}

/// A mapping configuration file.
///
/// ```json
/// {
///   "fields": [{"target": "Polygon", "source": "GEMS_ID"}],
///   "values": {"SNCB_Auth": "'NatureScot'", "SNCB_UID": "!SurveyKey!"},
///   "schemas": {"points": ["SNCB_Auth"], "polygon": ["SNCB_Auth", "SNCB_UID"]}
/// }
/// ```
///
/// Every section is optional; missing sections come from [`MappingOptions`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingConfig {
    /// Field renames, in order
    #[serde(default)]
    pub fields: Option<Vec<FieldRename>>,
    /// Expression text per target field
    #[serde(default)]
    pub values: Option<BTreeMap<String, String>>,
    /// Target schemas
    #[serde(default)]
    pub schemas: Option<SchemaConfig>,
}

impl MappingConfig {
    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a read error if the file cannot be read and a
    /// [`FormatError::Parse`] if it is not a valid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading mapping configuration from {}", path.display());
        let text = std::fs::read_to_string(path).with_read_context("JSON", path)?;
        Self::from_json_str(&text)
    }

    /// Parses configuration JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError::Parse`] if the JSON is malformed or has
    /// unknown keys.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            FormatError::Parse {
                format: "mapping configuration".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Combines the file with option-derived defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid, a mapping repeats a
    /// target or source, a schema is empty or repeats a field, or a value
    /// does not parse as an expression.
    pub fn resolve(self, options: &MappingOptions) -> Result<MappingPlan> {
        let mut plan = MappingPlan::from_options(options)?;
        if let Some(fields) = self.fields {
            plan.field_mapping = FieldMapping::from_entries(fields)?;
        }
        if let Some(values) = self.values {
            plan.constants = ConstantFieldMap::parse(values)?;
        }
        if let Some(schemas) = self.schemas {
            plan.schemas = SchemaSet::new(
                SchemaDefinition::new(SchemaVariant::Points.as_str(), schemas.points)?,
                SchemaDefinition::new(SchemaVariant::Polygon.as_str(), schemas.polygon)?,
            );
        }
        Ok(plan)
    }
}

/// Everything a mapping run needs besides the store and collection names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingPlan {
    /// Renames applied to the copied fields
    pub field_mapping: FieldMapping,
    /// Values assigned to schema fields
    pub constants: ConstantFieldMap,
    /// Target schemas
    pub schemas: SchemaSet,
}

impl MappingPlan {
    /// Standard GeMS → JNCC plan for the given options.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the options are invalid.
    pub fn from_options(options: &MappingOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            field_mapping: options.field_mapping(),
            constants: options.constant_map(),
            schemas: SchemaSet::jncc(),
        })
    }
}

impl Default for MappingPlan {
    fn default() -> Self {
        Self {
            field_mapping: FieldMapping::gems_to_jncc(false),
            constants: MappingOptions::default().constant_map(),
            schemas: SchemaSet::jncc(),
        }
    }
}
