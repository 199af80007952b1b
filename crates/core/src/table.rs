//! Columnar table value type.
//!
//! A `Table` is an eager columnar value backed by one or more Arrow
//! `RecordBatch` values sharing a schema. It is the value type of the table
//! store and the unit the table serializer encodes to the Arrow IPC file
//! format.

use arrow::compute::concat_batches;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::json::ReaderBuilder;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::shape::{ContentShape, Property};

/// An eager columnar table backed by Arrow record batches.
#[derive(Debug, Clone)]
pub struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Table {
    /// Conventional name of a persisted row-index column.
    ///
    /// Tables themselves carry no implicit index; tooling that persists one
    /// writes it as a plain column under this name, and the table store drops
    /// it on put unless asked to keep it.
    pub const INDEX_COLUMN: &'static str = "index";

    /// Return an empty table (no columns, no rows).
    pub fn empty() -> Self {
        Self {
            schema: Arc::new(Schema::empty()),
            batches: Vec::new(),
        }
    }

    /// Construct a table from record batches (all batches must share the same
    /// schema).
    pub fn from_batches(batches: Vec<RecordBatch>) -> Result<Self> {
        if batches.is_empty() {
            return Ok(Self::empty());
        }

        let schema = batches[0].schema();
        for (i, batch) in batches.iter().enumerate().skip(1) {
            if batch.schema().as_ref() != schema.as_ref() {
                return Err(Error::Schema(format!(
                    "schema mismatch between batches: batch 0 != batch {i}"
                )));
            }
        }

        Ok(Self { schema, batches })
    }

    /// Construct a table from JSON object rows, inferring the schema.
    ///
    /// Integers infer as Int64, floats as Float64, strings as Utf8 and
    /// booleans as Boolean; a mix of integer and float in one column promotes
    /// to Float64.
    pub fn from_rows(rows: &[serde_json::Value]) -> Result<Self> {
        if rows.is_empty() {
            return Ok(Self::empty());
        }

        let schema: SchemaRef = Arc::new(infer_json_schema_from_iterator(rows.iter().map(Ok))?);
        let mut decoder = ReaderBuilder::new(schema.clone()).build_decoder()?;
        decoder.serialize(rows)?;
        let batch = decoder
            .flush()?
            .unwrap_or_else(|| RecordBatch::new_empty(schema.clone()));

        Ok(Self {
            schema,
            batches: vec![batch],
        })
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    /// Number of columns.
    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    /// The table schema.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// The underlying record batches.
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Structural shape summary: row count, column count, and the ordered
    /// (name, dtype) pairs.
    pub fn shape(&self) -> ContentShape {
        ContentShape {
            number_of_rows: self.num_rows() as u64,
            number_of_properties: self.num_columns() as u64,
            properties: Some(
                self.schema
                    .fields()
                    .iter()
                    .map(|field| Property {
                        name: field.name().clone(),
                        dtype: field.data_type().to_string(),
                    })
                    .collect(),
            ),
        }
    }

    /// Append the rows of `other` to this table, returning the combined table.
    ///
    /// Concatenation with a column-less table adopts the other side; any other
    /// schema difference is an error.
    pub fn concat(&self, other: &Table) -> Result<Table> {
        if self.num_columns() == 0 {
            return Ok(other.clone());
        }
        if other.num_columns() == 0 {
            return Ok(self.clone());
        }
        if self.schema.as_ref() != other.schema.as_ref() {
            return Err(Error::Schema(format!(
                "cannot concat tables with different schemas: {:?} != {:?}",
                self.schema.fields(),
                other.schema.fields()
            )));
        }

        let mut batches = self.batches.clone();
        batches.extend(other.batches.iter().cloned());
        Ok(Table {
            schema: self.schema.clone(),
            batches,
        })
    }

    /// Return a copy of this table without the named column. A table that does
    /// not have the column is returned unchanged.
    pub fn drop_column(&self, name: &str) -> Result<Table> {
        let index = match self.schema.index_of(name) {
            Ok(index) => index,
            Err(_) => return Ok(self.clone()),
        };

        let keep: Vec<usize> = (0..self.num_columns()).filter(|i| *i != index).collect();
        let schema = Arc::new(self.schema.project(&keep)?);
        let batches = self
            .batches
            .iter()
            .map(|batch| batch.project(&keep))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Table { schema, batches })
    }

    /// Concatenate all batches into a single batch. Useful for comparisons and
    /// row-wise access.
    pub fn to_batch(&self) -> Result<RecordBatch> {
        Ok(concat_batches(&self.schema, self.batches.iter())?)
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        if self.schema.as_ref() != other.schema.as_ref() {
            return false;
        }
        match (self.to_batch(), other.to_batch()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
