//! GeMS → JNCC schema mapping.
//!
//! The mapper drives a [`FeatureStore`] through four passes over a new
//! output collection: copy the mapped source fields, rename them, add the
//! schema fields still missing, and calculate the schema fields that have a
//! value expression. Each pass is a separate store primitive, so an error
//! part way leaves the output collection partly migrated.

use std::collections::HashSet;

use log::{debug, info};

use crate::config::MappingPlan;
use crate::error::Result;
use crate::schema::{ConstantFieldMap, FieldMapping, FieldRename, GeometryKind, SchemaSet};
use crate::store::FeatureStore;
use crate::types::FieldType;

/// What a mapping run did to the output collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingReport {
    /// Output collection name
    pub output: String,
    /// Geometry kind the schema was selected for
    pub kind: GeometryKind,
    /// Name of the applied schema
    pub schema: String,
    /// Renames applied, in mapping order
    pub renamed: Vec<FieldRename>,
    /// Schema fields that were missing and got added
    pub added: Vec<String>,
    /// Schema fields set from a value expression
    pub populated: Vec<String>,
    /// Added schema fields with no value expression; null on every record
    pub left_null: Vec<String>,
}

/// Maps feature collections onto a target schema.
///
/// # Examples
///
/// ```
/// use schemamap_core::mapper::SchemaMapper;
/// use schemamap_core::config::MappingPlan;
/// use schemamap_core::schema::GeometryKind;
/// use schemamap_core::store::{FeatureStore, MemoryStore};
/// use schemamap_core::codec::table_from_geojson;
///
/// let layer = r#"{"type": "FeatureCollection", "features": [{
///     "type": "Feature",
///     "geometry": {"type": "Point", "coordinates": [-5.9, 57.3]},
///     "properties": {
///         "GEMS_ID": "G1", "SURVEYKEY": "S42", "BIOTOPEOCC": "Present",
///         "ANNEX_I": "Reefs", "ANNEX_I_SU": "Bedrock reefs", "DATE_": "2019-07-01",
///         "CURRENT_BI": "CR.HCR", "CURRENT__1": "High energy circalittoral rock"
///     }
/// }]}"#;
///
/// let mut store = MemoryStore::new();
/// store.insert(table_from_geojson("gems_points", layer).unwrap()).unwrap();
///
/// let plan = MappingPlan::default();
/// let report = SchemaMapper::from_plan(&plan)
///     .run(&mut store, "gems_points", "jncc_points", GeometryKind::Point)
///     .unwrap();
///
/// assert!(report.added.contains(&"SNCB_Auth".to_string()));
/// let output = store.read_collection("jncc_points").unwrap();
/// assert_eq!(
///     output.text_values("SourceComp").unwrap(),
///     vec![Some("GeMS(2024-06-14)".to_string())]
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SchemaMapper<'a> {
    field_mapping: &'a FieldMapping,
    constants: &'a ConstantFieldMap,
    schemas: &'a SchemaSet,
}

impl<'a> SchemaMapper<'a> {
    /// Creates a mapper over explicit tables.
    #[must_use]
    pub fn new(
        field_mapping: &'a FieldMapping,
        constants: &'a ConstantFieldMap,
        schemas: &'a SchemaSet,
    ) -> Self {
        Self {
            field_mapping,
            constants,
            schemas,
        }
    }

    /// Creates a mapper from a resolved plan.
    #[must_use]
    pub fn from_plan(plan: &'a MappingPlan) -> Self {
        Self::new(&plan.field_mapping, &plan.constants, &plan.schemas)
    }

    /// Maps `input` into a new collection `output`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the store: missing input or source
    /// field, an existing `output`, or a value that cannot be assigned.
    /// Nothing is rolled back.
    pub fn run<S>(
        &self,
        store: &mut S,
        input: &str,
        output: &str,
        kind: GeometryKind,
    ) -> Result<MappingReport>
    where
        S: FeatureStore + ?Sized,
    {
        info!("Mapping '{input}' to '{output}' as {kind} in {}", store.describe());

        let copy_fields = self.field_mapping.source_fields();
        debug!("Copying fields: {}", copy_fields.join(", "));
        store.copy_collection(input, output, &copy_fields)?;

        for rename in self.field_mapping.entries() {
            store.alter_field(output, &rename.source, &rename.target, &rename.target)?;
        }
        info!("Renamed {} field(s)", self.field_mapping.len());

        let schema = self.schemas.for_kind(kind);
        info!("Applying schema '{}'", schema.name());

        let existing: HashSet<String> = store
            .list_fields(output)?
            .into_iter()
            .map(|f| f.name)
            .collect();
        let mut added = Vec::new();
        for field in schema.fields() {
            if !existing.contains(field) {
                store.add_field(output, field, FieldType::Text, true)?;
                added.push(field.clone());
            }
        }
        info!("Added {} schema field(s)", added.len());

        for (field, expression) in self.constants.iter() {
            if !schema.contains(field) {
                debug!("Skipping value {expression} for '{field}': not a '{}' field", schema.name());
            }
        }

        let mut populated = Vec::new();
        for field in schema.fields() {
            if let Some(expression) = self.constants.get(field) {
                store.calculate_field(output, field, expression)?;
                populated.push(field.clone());
            }
        }
        info!("Populated {} schema field(s)", populated.len());

        let left_null: Vec<String> = added
            .iter()
            .filter(|f| !self.constants.contains(f))
            .cloned()
            .collect();
        if !left_null.is_empty() {
            debug!("Left null: {}", left_null.join(", "));
        }

        Ok(MappingReport {
            output: output.to_string(),
            kind,
            schema: schema.name().to_string(),
            renamed: self.field_mapping.entries().to_vec(),
            added,
            populated,
            left_null,
        })
    }
}

/// Maps `input` into a new collection `output` using the JNCC schemas.
///
/// # Errors
///
/// See [`SchemaMapper::run`].
pub fn map_to_schema<S>(
    store: &mut S,
    input: &str,
    output: &str,
    kind: GeometryKind,
    field_mapping: &FieldMapping,
    constants: &ConstantFieldMap,
) -> Result<MappingReport>
where
    S: FeatureStore + ?Sized,
{
    let schemas = SchemaSet::jncc();
    SchemaMapper::new(field_mapping, constants, &schemas).run(store, input, output, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::table_from_geojson;
    use crate::config::MappingOptions;
    use crate::error::{SchemaMapError, StoreError};
    use crate::expression::FieldExpression;
    use crate::schema::{GEMS_SOURCE_FIELDS, JNCC_POINT_FIELDS, JNCC_POLYGON_FIELDS};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn gems_feature(id: &str, survey: &str) -> serde_json::Value {
        json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [-5.0, 57.0]},
            "properties": {
                "GEMS_ID": id,
                "SURVEYKEY": survey,
                "BIOTOPEOCC": "Present",
                "ANNEX_I": "Reefs",
                "ANNEX_I_PH": "Coastal lagoons",
                "ANNEX_I_SU": "Stony reef",
                "DATE_": "2018-05-04",
                "CURRENT_BI": "CR.MCR",
                "CURRENT__1": "Moderate energy circalittoral rock",
                "SHAPE_AREA": 12.5
            }
        })
    }

    fn store_with_input() -> MemoryStore {
        let text = json!({
            "type": "FeatureCollection",
            "features": [gems_feature("G1", "S1"), gems_feature("G2", "S2")]
        })
        .to_string();
        let mut store = MemoryStore::new();
        store.insert(table_from_geojson("gems", &text).unwrap()).unwrap();
        store
    }

    fn field_names(store: &MemoryStore, name: &str) -> Vec<String> {
        store
            .list_fields(name)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect()
    }

    fn run(store: &mut MemoryStore, output: &str, kind: GeometryKind) -> Result<MappingReport> {
        let options = MappingOptions::default();
        map_to_schema(
            store,
            "gems",
            output,
            kind,
            &options.field_mapping(),
            &options.constant_map(),
        )
    }

    #[test]
    fn test_copy_list_matches_gems_fields() {
        assert_eq!(
            FieldMapping::gems_to_jncc(false).source_fields(),
            GEMS_SOURCE_FIELDS.to_vec()
        );
    }

    #[test]
    fn test_mapping_keys_present_and_sources_gone() {
        let mut store = store_with_input();
        run(&mut store, "out", GeometryKind::Point).unwrap();
        let names = field_names(&store, "out");
        for target in FieldMapping::gems_to_jncc(false).target_fields() {
            assert!(names.iter().any(|n| n == target), "missing {target}");
        }
        for source in GEMS_SOURCE_FIELDS {
            assert!(!names.iter().any(|n| n == source), "{source} survived");
        }
        assert!(!names.iter().any(|n| n == "SHAPE_AREA"), "unmapped field copied");
        assert!(!names.iter().any(|n| n == "ANNEX_I_PH"), "unmapped field copied");
    }

    #[test]
    fn test_renamed_fields_carry_alias() {
        let mut store = store_with_input();
        run(&mut store, "out", GeometryKind::Point).unwrap();
        let table = store.read_collection("out").unwrap();
        let info = table.field("SurveyKey").unwrap();
        assert_eq!(info.display_alias(), "SurveyKey");
        assert_eq!(
            table.text_values("SurveyKey").unwrap(),
            vec![Some("S1".to_string()), Some("S2".to_string())]
        );
    }

    #[test]
    fn test_polygon_gets_polygon_schema() {
        let mut store = store_with_input();
        let report = run(&mut store, "out", GeometryKind::Polygon).unwrap();
        assert_eq!(report.schema, "JNCC polygon");
        let names = field_names(&store, "out");
        for field in JNCC_POLYGON_FIELDS {
            assert!(names.iter().any(|n| n == field), "missing {field}");
        }
        let table = store.read_collection("out").unwrap();
        let survey = vec![Some("S1".to_string()), Some("S2".to_string())];
        assert_eq!(table.text_values("SNCB_UID").unwrap(), survey);
        assert_eq!(table.text_values("EMODnetGUI").unwrap(), survey);
    }

    #[test]
    fn test_point_like_kinds_get_points_schema() {
        for (output, kind) in [
            ("p", GeometryKind::Point),
            ("l", GeometryKind::Line),
            ("pl", GeometryKind::PointLine),
        ] {
            let mut store = store_with_input();
            let report = run(&mut store, output, kind).unwrap();
            assert_eq!(report.schema, "JNCC points");
            let names = field_names(&store, output);
            for field in JNCC_POINT_FIELDS {
                assert!(names.iter().any(|n| n == field), "missing {field}");
            }
            assert!(!names.iter().any(|n| n == "SNCB_UID"));
            assert!(!names.iter().any(|n| n == "EMODnetGUI"));
        }
    }

    #[test]
    fn test_constants_populated_on_every_record() {
        let mut store = store_with_input();
        let report = run(&mut store, "out", GeometryKind::Point).unwrap();
        let table = store.read_collection("out").unwrap();
        let expect = |value: &str| vec![Some(value.to_string()); 2];
        assert_eq!(table.text_values("SNCB_Auth").unwrap(), expect("NatureScot"));
        assert_eq!(table.text_values("FeaturCode").unwrap(), expect("XXX"));
        assert_eq!(table.text_values("TranRelate").unwrap(), expect(">"));
        assert_eq!(table.text_values("SourceComp").unwrap(), expect("GeMS(2024-06-14)"));
        assert_eq!(
            table.text_values("OrigClass").unwrap(),
            expect("Marine Habitat Classification for Britain and Ireland v04.05")
        );
        assert!(report.populated.contains(&"FeaDetName".to_string()));
        assert!(!report.populated.contains(&"SNCB_UID".to_string()));
    }

    #[test]
    fn test_fields_without_values_stay_null() {
        let mut store = store_with_input();
        let report = run(&mut store, "out", GeometryKind::Point).unwrap();
        assert_eq!(report.left_null, vec!["TranComm".to_string(), "Comments".to_string()]);
        let table = store.read_collection("out").unwrap();
        for field in ["TranComm", "Comments"] {
            assert_eq!(table.text_values(field).unwrap(), vec![None, None]);
            assert_eq!(table.field(field).unwrap().field_type, FieldType::Text);
            assert!(table.field(field).unwrap().nullable);
        }
    }

    #[test]
    fn test_existing_output_is_untouched() {
        let mut store = store_with_input();
        run(&mut store, "out", GeometryKind::Point).unwrap();
        let before = store.get("out").unwrap().batch().clone();

        let err = run(&mut store, "out", GeometryKind::Polygon).unwrap_err();
        assert!(matches!(err, SchemaMapError::Store(StoreError::CollectionExists { .. })));
        assert_eq!(store.get("out").unwrap().batch(), &before);
    }

    #[test]
    fn test_missing_source_field_aborts_before_output() {
        let mut store = store_with_input();
        let mapping = FieldMapping::new([("Polygon", "GEMS_ID"), ("Habitat", "HAB_TYPE")]).unwrap();
        let err = map_to_schema(
            &mut store,
            "gems",
            "out",
            GeometryKind::Point,
            &mapping,
            &ConstantFieldMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaMapError::Store(StoreError::FieldNotFound { .. })));
        assert!(!store.contains("out").unwrap());
    }

    #[test]
    fn test_failed_calculation_leaves_partial_output() {
        let mut store = store_with_input();
        let constants = ConstantFieldMap::new()
            .with("SNCB_Auth", FieldExpression::literal("NatureScot"))
            .with("FeaturCode", FieldExpression::field("NoSuchField"));
        let err = map_to_schema(
            &mut store,
            "gems",
            "out",
            GeometryKind::Point,
            &FieldMapping::gems_to_jncc(false),
            &constants,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaMapError::Store(StoreError::FieldNotFound { .. })));

        let table = store.read_collection("out").unwrap();
        assert!(table.has_field("Comments"));
        assert_eq!(
            table.text_values("SNCB_Auth").unwrap(),
            vec![Some("NatureScot".to_string()); 2]
        );
    }

    #[test]
    fn test_values_for_other_schema_are_skipped() {
        let mut store = store_with_input();
        let constants = ConstantFieldMap::new()
            .with("SNCB_Auth", FieldExpression::literal("JNCC"))
            .with("EMODnetGUI", FieldExpression::field("SurveyKey"));
        let report = map_to_schema(
            &mut store,
            "gems",
            "out",
            GeometryKind::Point,
            &FieldMapping::gems_to_jncc(false),
            &constants,
        )
        .unwrap();
        assert_eq!(report.populated, vec!["SNCB_Auth".to_string()]);
        assert!(!field_names(&store, "out").iter().any(|n| n == "EMODnetGUI"));
    }

    #[test]
    fn test_lagoon_mapping_uses_annex_i_ph() {
        let mut store = store_with_input();
        let options = MappingOptions::default().with_lagoon(true);
        map_to_schema(
            &mut store,
            "gems",
            "lagoon",
            GeometryKind::Polygon,
            &options.field_mapping(),
            &options.constant_map(),
        )
        .unwrap();
        let table = store.read_collection("lagoon").unwrap();
        assert_eq!(
            table.text_values("FeaturName").unwrap(),
            vec![Some("Coastal lagoons".to_string()); 2]
        );
    }

    #[test]
    fn test_report_lists_renames_in_order() {
        let mut store = store_with_input();
        let report = run(&mut store, "out", GeometryKind::Point).unwrap();
        assert_eq!(report.output, "out");
        assert_eq!(report.renamed.len(), 8);
        assert_eq!(report.renamed[0].target, "Polygon");
        assert_eq!(report.renamed[0].source, "GEMS_ID");
        assert!(!report.added.contains(&"Occurrence".to_string()));
    }
}
