//! `GeoJSON` encoding of feature tables.
//!
//! A collection is stored as a `FeatureCollection`. Attribute fields become
//! feature properties and the geometry field becomes the feature geometry.
//! Field types and aliases are kept in a `"fields"` foreign member so they
//! survive a write/read cycle; collections without it have their schema
//! inferred from the property values.

use std::collections::HashMap;
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::{Float64Type, Int64Type};
use arrow_array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow_cast::cast::cast;
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue};

use crate::error::{FormatError, Result, SchemaMapError};
use crate::table::FeatureTable;
use crate::types::{FieldInfo, FieldType, GEOMETRY_FIELD};

/// Foreign member of the `FeatureCollection` carrying the field schema.
pub const FIELDS_MEMBER: &str = "fields";

const FORMAT: &str = "GeoJSON";

static NULL: JsonValue = JsonValue::Null;

fn parse_error(message: impl Into<String>) -> SchemaMapError {
    FormatError::Parse {
        format: FORMAT.to_string(),
        message: message.into(),
    }
    .into()
}

/// Decodes `GeoJSON` text into a feature table called `name`.
///
/// # Errors
///
/// Returns a [`FormatError`] when the text is not a `FeatureCollection`, the
/// `"fields"` member is malformed, a property does not match its declared
/// type, or a property is named like the geometry field.
pub fn table_from_geojson(name: &str, text: &str) -> Result<FeatureTable> {
    let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| parse_error(e.to_string()))?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(parse_error("expected a FeatureCollection"));
    };

    let declared = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get(FIELDS_MEMBER))
        .map(|value| serde_json::from_value::<Vec<FieldInfo>>(value.clone()))
        .transpose()
        .map_err(|e| parse_error(format!("invalid \"{FIELDS_MEMBER}\" member: {e}")))?;

    let mut fields: Vec<FieldInfo> = match declared {
        Some(declared) => {
            let mut fields: Vec<FieldInfo> =
                declared.into_iter().filter(|f| !f.is_geometry()).collect();
            // Properties the member does not list are inferred like an undeclared collection
            for inferred in infer_fields(&collection.features) {
                if !fields.iter().any(|f| f.name == inferred.name) {
                    fields.push(inferred);
                }
            }
            fields
        },
        None => infer_fields(&collection.features),
    };
    if fields.iter().any(|f| f.name == GEOMETRY_FIELD) {
        return Err(parse_error(format!(
            "property '{GEOMETRY_FIELD}' collides with the geometry field"
        )));
    }

    let features = &collection.features;
    let mut columns = Vec::with_capacity(fields.len() + 1);
    for field in &fields {
        columns.push(property_column(field, features)?);
    }
    columns.push(geometry_column(features)?);
    fields.push(FieldInfo::geometry());

    let table = FeatureTable::try_new(name, &fields, columns, features.len())?;
    let ids: Vec<Option<Id>> = features.iter().map(|f| f.id.clone()).collect();
    if ids.iter().any(Option::is_some) {
        table.with_feature_ids(ids)
    } else {
        Ok(table)
    }
}

#[derive(Debug, Default)]
struct Observed {
    integer: bool,
    float: bool,
    boolean: bool,
    text: bool,
}

impl Observed {
    fn field_type(&self) -> FieldType {
        let numeric = self.integer || self.float;
        if self.text || (self.boolean && numeric) {
            FieldType::Text
        } else if self.boolean {
            FieldType::Boolean
        } else if self.float {
            FieldType::Double
        } else if self.integer {
            FieldType::Long
        } else {
            FieldType::Text
        }
    }
}

fn infer_fields(features: &[Feature]) -> Vec<FieldInfo> {
    let mut order: Vec<String> = Vec::new();
    let mut observed: HashMap<String, Observed> = HashMap::new();

    for properties in features.iter().filter_map(|f| f.properties.as_ref()) {
        for (key, value) in properties {
            let entry = observed.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                Observed::default()
            });
            match value {
                JsonValue::Null => {},
                JsonValue::Bool(_) => entry.boolean = true,
                JsonValue::Number(n) if n.as_i64().is_some() => entry.integer = true,
                JsonValue::Number(_) => entry.float = true,
                _ => entry.text = true,
            }
        }
    }

    order
        .into_iter()
        .map(|name| {
            let field_type = observed
                .get(&name)
                .map_or(FieldType::Text, Observed::field_type);
            FieldInfo::new(name, field_type)
        })
        .collect()
}

fn property<'a>(feature: &'a Feature, name: &str) -> &'a JsonValue {
    feature
        .properties
        .as_ref()
        .and_then(|p| p.get(name))
        .unwrap_or(&NULL)
}

fn property_column(field: &FieldInfo, features: &[Feature]) -> Result<ArrayRef> {
    let mismatch = |index: usize, value: &JsonValue| {
        parse_error(format!(
            "feature {index}: property '{}' expected {}, found {value}",
            field.name, field.field_type
        ))
    };

    let array: ArrayRef = match field.field_type {
        FieldType::Text | FieldType::Geometry => {
            let values: Vec<Option<String>> = features
                .iter()
                .map(|f| match property(f, &field.name) {
                    JsonValue::Null => None,
                    JsonValue::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect();
            Arc::new(StringArray::from(values))
        },
        FieldType::Long => {
            let mut values = Vec::with_capacity(features.len());
            for (index, feature) in features.iter().enumerate() {
                let value = property(feature, &field.name);
                values.push(match value {
                    JsonValue::Null => None,
                    JsonValue::Number(n) => Some(
                        n.as_i64()
                            .or_else(|| whole_number(n.as_f64()?))
                            .ok_or_else(|| mismatch(index, value))?,
                    ),
                    _ => return Err(mismatch(index, value)),
                });
            }
            Arc::new(Int64Array::from(values))
        },
        FieldType::Double => {
            let mut values = Vec::with_capacity(features.len());
            for (index, feature) in features.iter().enumerate() {
                let value = property(feature, &field.name);
                values.push(match value {
                    JsonValue::Null => None,
                    JsonValue::Number(n) => Some(n.as_f64().ok_or_else(|| mismatch(index, value))?),
                    _ => return Err(mismatch(index, value)),
                });
            }
            Arc::new(Float64Array::from(values))
        },
        FieldType::Boolean => {
            let mut values = Vec::with_capacity(features.len());
            for (index, feature) in features.iter().enumerate() {
                let value = property(feature, &field.name);
                values.push(match value {
                    JsonValue::Null => None,
                    JsonValue::Bool(b) => Some(*b),
                    _ => return Err(mismatch(index, value)),
                });
            }
            Arc::new(BooleanArray::from(values))
        },
    };
    Ok(array)
}

#[allow(clippy::cast_possible_truncation)]
fn whole_number(value: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.fract() == 0.0 && in_range).then_some(value as i64)
}

fn geometry_column(features: &[Feature]) -> Result<ArrayRef> {
    let mut values = Vec::with_capacity(features.len());
    for (index, feature) in features.iter().enumerate() {
        let text = feature
            .geometry
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| FormatError::InvalidGeometry {
                format: FORMAT.to_string(),
                message: e.to_string(),
                feature: Some(index),
            })?;
        values.push(text);
    }
    Ok(Arc::new(StringArray::from(values)))
}

/// Encodes a feature table as pretty-printed `GeoJSON`.
///
/// # Errors
///
/// Returns a [`FormatError`] when a stored geometry is not valid `GeoJSON`
/// geometry or the collection cannot be serialized.
pub fn table_to_geojson(table: &FeatureTable) -> Result<String> {
    let batch = table.batch();
    let fields = table.fields();

    let mut attributes: Vec<(&FieldInfo, ArrayRef)> = Vec::new();
    let mut geometry: Option<ArrayRef> = None;
    for (idx, field) in fields.iter().enumerate() {
        let column = canonical_column(batch.column(idx), field.field_type)?;
        if field.is_geometry() {
            geometry = Some(column);
        } else {
            attributes.push((field, column));
        }
    }

    let mut features = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let mut properties = JsonObject::new();
        for (field, column) in &attributes {
            properties.insert(field.name.clone(), cell_value(column, field.field_type, row));
        }
        let geometry = match &geometry {
            Some(column) if !column.is_null(row) => {
                Some(decode_geometry(column.as_string::<i32>().value(row), row)?)
            },
            _ => None,
        };
        features.push(Feature {
            bbox: None,
            geometry,
            id: table.feature_id(row).cloned(),
            properties: Some(properties),
            foreign_members: None,
        });
    }

    let declared: Vec<&FieldInfo> = attributes.iter().map(|(field, _)| *field).collect();
    let mut members = JsonObject::new();
    members.insert(
        FIELDS_MEMBER.to_string(),
        serde_json::to_value(&declared).map_err(serialize_error)?,
    );

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(members),
    };
    serde_json::to_string_pretty(&collection).map_err(serialize_error)
}

fn serialize_error(e: serde_json::Error) -> SchemaMapError {
    FormatError::Serialize {
        format: FORMAT.to_string(),
        message: e.to_string(),
    }
    .into()
}

fn canonical_column(column: &ArrayRef, field_type: FieldType) -> Result<ArrayRef> {
    let data_type = field_type.data_type();
    if column.data_type() == &data_type {
        Ok(Arc::clone(column))
    } else {
        Ok(cast(column.as_ref(), &data_type)?)
    }
}

fn cell_value(column: &ArrayRef, field_type: FieldType, row: usize) -> JsonValue {
    if column.is_null(row) {
        return JsonValue::Null;
    }
    match field_type {
        FieldType::Text | FieldType::Geometry => {
            JsonValue::String(column.as_string::<i32>().value(row).to_string())
        },
        FieldType::Long => JsonValue::from(column.as_primitive::<Int64Type>().value(row)),
        FieldType::Double => {
            serde_json::Number::from_f64(column.as_primitive::<Float64Type>().value(row))
                .map_or(JsonValue::Null, JsonValue::Number)
        },
        FieldType::Boolean => JsonValue::Bool(column.as_boolean().value(row)),
    }
}

fn decode_geometry(text: &str, row: usize) -> Result<Geometry> {
    let invalid = |message: String| FormatError::InvalidGeometry {
        format: FORMAT.to_string(),
        message,
        feature: Some(row),
    };
    let value: JsonValue = serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;
    Geometry::from_json_value(value).map_err(|e| invalid(e.to_string()).into())
}
