//! In-memory feature collections backed by Arrow record batches.
//!
//! A [`FeatureTable`] holds one record batch whose columns are the
//! collection's fields. The geometry is an opaque `GeoJSON` text column
//! tagged through field metadata (see [`crate::types::GEOMETRY_METADATA_KEY`]).
//! The field-level GIS primitives (select, rename, add, calculate) are
//! implemented here; stores load a table, apply one primitive and save it.

use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, RecordBatchOptions,
    StringArray, new_null_array,
};
use arrow_cast::cast::{CastOptions, cast, cast_with_options};
use arrow_schema::{ArrowError, DataType, Field, Schema};
use geojson::feature::Id;
use log::debug;

use crate::error::{Result, StoreError};
use crate::expression::FieldExpression;
use crate::types::{FieldInfo, FieldType};

/// A named feature collection held in memory.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    name: String,
    batch: RecordBatch,
    // One entry per record when present
    feature_ids: Option<Vec<Option<Id>>>,
}

impl FeatureTable {
    /// Builds a table from field descriptions and matching columns.
    ///
    /// # Errors
    ///
    /// Returns an Arrow error when a column does not match its field (type,
    /// length or nullability).
    pub fn try_new(
        name: impl Into<String>,
        fields: &[FieldInfo],
        columns: Vec<ArrayRef>,
        num_rows: usize,
    ) -> Result<Self> {
        let schema = Schema::new(fields.iter().map(FieldInfo::to_arrow).collect::<Vec<_>>());
        let batch = RecordBatch::try_new_with_options(
            Arc::new(schema),
            columns,
            &RecordBatchOptions::new().with_row_count(Some(num_rows)),
        )?;
        Ok(Self {
            name: name.into(),
            batch,
            feature_ids: None,
        })
    }

    /// Wraps an existing record batch.
    #[must_use]
    pub fn from_batch(name: impl Into<String>, batch: RecordBatch) -> Self {
        Self {
            name: name.into(),
            batch,
            feature_ids: None,
        }
    }

    /// Attaches an identifier to each record.
    ///
    /// Identifiers ride along with their records through every field
    /// operation, including [`FeatureTable::select`].
    ///
    /// # Errors
    ///
    /// Returns an Arrow error when the number of identifiers differs from
    /// the number of records.
    pub fn with_feature_ids(mut self, ids: Vec<Option<Id>>) -> Result<Self> {
        if ids.len() != self.num_rows() {
            return Err(ArrowError::InvalidArgumentError(format!(
                "{} feature id(s) for {} record(s) in '{}'",
                ids.len(),
                self.num_rows(),
                self.name
            ))
            .into());
        }
        self.feature_ids = Some(ids);
        Ok(self)
    }

    /// Identifier of a record, if it has one.
    #[must_use]
    pub fn feature_id(&self, row: usize) -> Option<&Id> {
        self.feature_ids.as_ref()?.get(row)?.as_ref()
    }

    /// Collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying record batch.
    #[must_use]
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of records.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Field descriptions in column order, geometry included.
    #[must_use]
    pub fn fields(&self) -> Vec<FieldInfo> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| FieldInfo::from_arrow(f))
            .collect()
    }

    /// Description of one field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<FieldInfo> {
        self.batch
            .schema()
            .field_with_name(name)
            .ok()
            .map(FieldInfo::from_arrow)
    }

    /// Returns `true` if the table has a field called `name`.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.batch.schema().index_of(name).ok()
    }

    fn require_index(&self, field: &str) -> Result<usize> {
        self.index_of(field).ok_or_else(|| {
            StoreError::FieldNotFound {
                collection: self.name.clone(),
                field: field.to_string(),
            }
            .into()
        })
    }

    fn geometry_index(&self) -> Option<usize> {
        self.fields().iter().position(FieldInfo::is_geometry)
    }

    fn geometry_error(&self, field: &str, operation: &str) -> StoreError {
        StoreError::GeometryField {
            collection: self.name.clone(),
            field: field.to_string(),
            operation: operation.to_string(),
        }
    }

    fn arrow_fields(&self) -> Vec<Field> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect()
    }

    fn rebuild(&mut self, fields: Vec<Field>, columns: Vec<ArrayRef>) -> Result<()> {
        let schema = Schema::new_with_metadata(fields, self.batch.schema().metadata().clone());
        self.batch = RecordBatch::try_new_with_options(
            Arc::new(schema),
            columns,
            &RecordBatchOptions::new().with_row_count(Some(self.batch.num_rows())),
        )?;
        Ok(())
    }

    /// Copies the listed fields, in list order, into a new table named
    /// `output`. The geometry field is always carried, after the listed ones.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::FieldNotFound`] for a missing field and
    /// [`StoreError::FieldExists`] when a field is listed twice.
    pub fn select(&self, output: &str, fields: &[&str]) -> Result<FeatureTable> {
        let mut indices = Vec::with_capacity(fields.len() + 1);
        for field in fields {
            let idx = self.require_index(field)?;
            if indices.contains(&idx) {
                return Err(StoreError::FieldExists {
                    collection: output.to_string(),
                    field: (*field).to_string(),
                }
                .into());
            }
            indices.push(idx);
        }
        if let Some(geometry) = self.geometry_index()
            && !indices.contains(&geometry)
        {
            indices.push(geometry);
        }

        debug!(
            "Copying {} field(s) from '{}' into '{output}'",
            indices.len(),
            self.name
        );
        let batch = self.batch.project(&indices)?;
        Ok(FeatureTable {
            name: output.to_string(),
            batch,
            feature_ids: self.feature_ids.clone(),
        })
    }

    /// Renames a field and sets its alias. Values are untouched.
    ///
    /// # Errors
    ///
    /// Returns an error when the field is missing, is the geometry field, or
    /// `new_name` is already taken by another field.
    pub fn rename_field(&mut self, field: &str, new_name: &str, new_alias: &str) -> Result<()> {
        let idx = self.require_index(field)?;
        let mut info = self.fields().swap_remove(idx);
        if info.is_geometry() {
            return Err(self.geometry_error(field, "renamed").into());
        }
        if new_name != field && self.has_field(new_name) {
            return Err(StoreError::FieldExists {
                collection: self.name.clone(),
                field: new_name.to_string(),
            }
            .into());
        }

        debug!("Renaming '{field}' to '{new_name}' on '{}'", self.name);
        info.name = new_name.to_string();
        info.alias = Some(new_alias.to_string());

        let mut fields = self.arrow_fields();
        fields[idx] = info.to_arrow();
        let columns = self.batch.columns().to_vec();
        self.rebuild(fields, columns)
    }

    /// Appends a field with every value null.
    ///
    /// # Errors
    ///
    /// Returns an error when the name is taken, the type is
    /// [`FieldType::Geometry`], or a non-nullable field is added to a
    /// collection that already has records.
    pub fn add_field(&mut self, name: &str, field_type: FieldType, nullable: bool) -> Result<()> {
        if self.has_field(name) {
            return Err(StoreError::FieldExists {
                collection: self.name.clone(),
                field: name.to_string(),
            }
            .into());
        }
        if field_type == FieldType::Geometry {
            return Err(self.geometry_error(name, "added").into());
        }
        if !nullable && self.num_rows() > 0 {
            return Err(StoreError::NotNullable {
                collection: self.name.clone(),
                field: name.to_string(),
            }
            .into());
        }

        debug!("Adding {field_type} field '{name}' to '{}'", self.name);
        let info = FieldInfo::new(name, field_type).with_nullable(nullable);
        let mut fields = self.arrow_fields();
        fields.push(info.to_arrow());
        let mut columns = self.batch.columns().to_vec();
        columns.push(new_null_array(&field_type.data_type(), self.num_rows()));
        self.rebuild(fields, columns)
    }

    /// Sets every record's value of `field` from an expression.
    ///
    /// Literals are converted to the field type; field references are cast
    /// to it.
    ///
    /// # Errors
    ///
    /// Returns an error when the field or referenced field is missing, either
    /// is the geometry field, a value does not convert to the field type, or
    /// nulls would land in a non-nullable field.
    pub fn calculate_field(&mut self, field: &str, expression: &FieldExpression) -> Result<()> {
        let idx = self.require_index(field)?;
        let info = FieldInfo::from_arrow(self.batch.schema().field(idx));
        if info.is_geometry() {
            return Err(self.geometry_error(field, "calculated").into());
        }

        debug!("Calculating '{field}' = {expression} on '{}'", self.name);
        let rows = self.num_rows();
        let values = match expression {
            FieldExpression::Null => new_null_array(&info.field_type.data_type(), rows),
            FieldExpression::Literal(value) => literal_array(&info, value, rows)?,
            FieldExpression::Field(source) => self.cast_field(source, &info)?,
        };

        if !info.nullable && values.null_count() > 0 {
            return Err(StoreError::NotNullable {
                collection: self.name.clone(),
                field: field.to_string(),
            }
            .into());
        }

        let fields = self.arrow_fields();
        let mut columns = self.batch.columns().to_vec();
        columns[idx] = values;
        self.rebuild(fields, columns)
    }

    fn cast_field(&self, source: &str, target: &FieldInfo) -> Result<ArrayRef> {
        let idx = self.require_index(source)?;
        let source_info = FieldInfo::from_arrow(self.batch.schema().field(idx));
        if source_info.is_geometry() {
            return Err(self.geometry_error(source, "referenced").into());
        }

        let column = self.batch.column(idx);
        let data_type = target.field_type.data_type();
        if column.data_type() == &data_type {
            return Ok(Arc::clone(column));
        }

        let options = CastOptions {
            safe: false,
            ..CastOptions::default()
        };
        cast_with_options(column.as_ref(), &data_type, &options).map_err(|_| {
            StoreError::TypeMismatch {
                field: target.name.clone(),
                expected: target.field_type.to_string(),
                found: format!("{} field '{source}'", source_info.field_type),
            }
            .into()
        })
    }

    /// Values of a field rendered as text, nulls as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::FieldNotFound`] if the field does not exist.
    pub fn text_values(&self, field: &str) -> Result<Vec<Option<String>>> {
        let idx = self.require_index(field)?;
        let column = self.batch.column(idx);
        let text = if column.data_type() == &DataType::Utf8 {
            Arc::clone(column)
        } else {
            cast(column.as_ref(), &DataType::Utf8)?
        };
        Ok(text
            .as_string::<i32>()
            .iter()
            .map(|v| v.map(str::to_string))
            .collect())
    }
}

fn literal_array(field: &FieldInfo, value: &str, rows: usize) -> Result<ArrayRef> {
    let mismatch = || StoreError::TypeMismatch {
        field: field.name.clone(),
        expected: field.field_type.to_string(),
        found: format!("'{value}'"),
    };

    let array: ArrayRef = match field.field_type {
        FieldType::Text | FieldType::Geometry => Arc::new(StringArray::from(vec![value; rows])),
        FieldType::Long => {
            let parsed = value.trim().parse::<i64>().map_err(|_| mismatch())?;
            Arc::new(Int64Array::from(vec![parsed; rows]))
        },
        FieldType::Double => {
            let parsed = value.trim().parse::<f64>().map_err(|_| mismatch())?;
            Arc::new(Float64Array::from(vec![parsed; rows]))
        },
        FieldType::Boolean => {
            let parsed = match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => return Err(mismatch().into()),
            };
            Arc::new(BooleanArray::from(vec![parsed; rows]))
        },
    };
    Ok(array)
}
