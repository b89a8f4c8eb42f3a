//! Display utilities for formatting CLI output.
//!
//! This module provides table row structures and formatting functions
//! for presenting collections, schemas and mapping reports.

use tabled::{Table, Tabled};

use schemamap_core::config::MappingPlan;
use schemamap_core::mapper::MappingReport;
use schemamap_core::schema::GeometryKind;
use schemamap_core::types::{CollectionInfo, FieldInfo};

/// Table row representation for displaying field information.
#[derive(Tabled)]
pub struct FieldRow {
    /// Name of the field.
    #[tabled(rename = "Field")]
    pub name: String,
    /// Display alias of the field.
    #[tabled(rename = "Alias")]
    pub alias: String,
    /// Field type label.
    #[tabled(rename = "Type")]
    pub field_type: String,
    /// Whether the field can contain null values.
    #[tabled(rename = "Nullable")]
    pub nullable: String,
}

impl From<&FieldInfo> for FieldRow {
    fn from(field: &FieldInfo) -> Self {
        Self {
            name: field.name.clone(),
            alias: field.display_alias().to_string(),
            field_type: field.field_type.to_string(),
            nullable: yes_no(field.nullable),
        }
    }
}

/// Table row representation for displaying a collection in a workspace.
#[derive(Tabled)]
pub struct CollectionRow {
    /// Collection name.
    #[tabled(rename = "Collection")]
    pub name: String,
    /// Number of records.
    #[tabled(rename = "Records")]
    pub records: usize,
    /// Number of fields, geometry included.
    #[tabled(rename = "Fields")]
    pub fields: usize,
}

/// Table row representation for one target schema field.
#[derive(Tabled)]
pub struct SchemaRow {
    /// Schema field name.
    #[tabled(rename = "Field")]
    pub name: String,
    /// Where the field's values come from.
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Table row representation for a mapping report entry.
#[derive(Tabled)]
pub struct ReportRow {
    /// Output field name.
    #[tabled(rename = "Field")]
    pub name: String,
    /// What the mapping did to the field.
    #[tabled(rename = "Action")]
    pub action: String,
}

fn yes_no(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}

/// Rows describing how each field of the selected schema is filled.
pub fn schema_rows(plan: &MappingPlan, kind: GeometryKind) -> Vec<SchemaRow> {
    plan.schemas
        .for_kind(kind)
        .fields()
        .iter()
        .map(|field| {
            let value = match (plan.constants.get(field), plan.field_mapping.source_for(field)) {
                (Some(expression), _) => expression.to_string(),
                (None, Some(source)) => format!("copied from {source}"),
                (None, None) => "(null)".to_string(),
            };
            SchemaRow {
                name: field.clone(),
                value,
            }
        })
        .collect()
}

/// Rows describing every action of a mapping run.
pub fn report_rows(report: &MappingReport) -> Vec<ReportRow> {
    let mut rows: Vec<ReportRow> = report
        .renamed
        .iter()
        .map(|rename| ReportRow {
            name: rename.target.clone(),
            action: format!("renamed from {}", rename.source),
        })
        .collect();
    rows.extend(report.added.iter().map(|field| ReportRow {
        name: field.clone(),
        action: if report.populated.contains(field) {
            "added, populated".to_string()
        } else {
            "added, left null".to_string()
        },
    }));
    rows.extend(
        report
            .populated
            .iter()
            .filter(|field| !report.added.contains(field))
            .map(|field| ReportRow {
                name: field.clone(),
                action: "populated".to_string(),
            }),
    );
    rows
}

/// Display the fields of a collection in a formatted table.
pub fn display_collection_info(info: &CollectionInfo) {
    println!("\nCollection: {}", info.name);
    println!("Records: {}", info.records);

    if !info.fields.is_empty() {
        println!("\n=== Fields ===");
        let rows: Vec<FieldRow> = info.fields.iter().map(FieldRow::from).collect();
        println!("{}", Table::new(rows));
    }
}

/// Display the collections of a workspace.
pub fn display_collections(workspace: &str, collections: &[CollectionInfo]) {
    println!("\nWorkspace: {workspace} ({} collections)\n", collections.len());

    let rows: Vec<CollectionRow> = collections
        .iter()
        .map(|c| CollectionRow {
            name: c.name.clone(),
            records: c.records,
            fields: c.fields.len(),
        })
        .collect();
    println!("{}", Table::new(rows));
}

/// Display the schema a geometry kind maps onto.
pub fn display_schema(plan: &MappingPlan, kind: GeometryKind) {
    let schema = plan.schemas.for_kind(kind);
    println!("\nSchema: {} ({kind} layers)\n", schema.name());
    println!("{}", Table::new(schema_rows(plan, kind)));
}

/// Display a mapping report.
pub fn display_report(report: &MappingReport) {
    println!(
        "\nMapped to '{}' using {} ({} layer)\n",
        report.output, report.schema, report.kind
    );
    println!("{}", Table::new(report_rows(report)));

    if !report.left_null.is_empty() {
        println!("\nFields left null: {}", report.left_null.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemamap_core::schema::FieldRename;
    use schemamap_core::types::FieldType;

    fn report() -> MappingReport {
        MappingReport {
            output: "jncc".to_string(),
            kind: GeometryKind::Polygon,
            schema: "JNCC polygon".to_string(),
            renamed: vec![FieldRename {
                target: "Polygon".to_string(),
                source: "GEMS_ID".to_string(),
            }],
            added: vec!["SNCB_Auth".to_string(), "Comments".to_string()],
            populated: vec!["SNCB_Auth".to_string(), "Polygon".to_string()],
            left_null: vec!["Comments".to_string()],
        }
    }

    #[test]
    fn test_field_row_from_info() {
        let info = FieldInfo::new("SurveyKey", FieldType::Text).with_alias("Survey key");
        let row = FieldRow::from(&info);
        assert_eq!(row.name, "SurveyKey");
        assert_eq!(row.alias, "Survey key");
        assert_eq!(row.field_type, "TEXT");
        assert_eq!(row.nullable, "Yes");
    }

    #[test]
    fn test_report_rows_cover_every_action() {
        let rows = report_rows(&report());
        let actions: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.name.as_str(), r.action.as_str()))
            .collect();
        assert_eq!(
            actions,
            vec![
                ("Polygon", "renamed from GEMS_ID"),
                ("SNCB_Auth", "added, populated"),
                ("Comments", "added, left null"),
                ("Polygon", "populated"),
            ]
        );
    }

    #[test]
    fn test_schema_rows_show_value_sources() {
        let plan = MappingPlan::default();
        let rows = schema_rows(&plan, GeometryKind::Polygon);
        let value = |name: &str| {
            rows.iter()
                .find(|r| r.name == name)
                .map(|r| r.value.clone())
                .unwrap()
        };
        assert_eq!(value("SNCB_Auth"), "'NatureScot'");
        assert_eq!(value("SNCB_UID"), "!SurveyKey!");
        assert_eq!(value("Polygon"), "copied from GEMS_ID");
        assert_eq!(value("Comments"), "(null)");
    }

    #[test]
    fn test_display_functions_run() {
        let info = CollectionInfo {
            name: "reefs".to_string(),
            records: 2,
            fields: vec![FieldInfo::new("GEMS_ID", FieldType::Text), FieldInfo::geometry()],
        };
        display_collection_info(&info);
        display_collections("ws", std::slice::from_ref(&info));
        display_schema(&MappingPlan::default(), GeometryKind::Point);
        display_report(&report());
    }
}
