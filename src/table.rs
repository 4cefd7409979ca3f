// src/table.rs

use anyhow::{bail, Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, Int32Array, StringArray},
    datatypes::{DataType as ArrowDataType, Field, Schema as ArrowSchema},
    record_batch::RecordBatch,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::Indicator;

/// Inclusive year range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(i32, i32)", into = "(i32, i32)")]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Result<Self> {
        if start > end {
            bail!("year range start {} is after end {}", start, end);
        }
        Ok(Self { start, end })
    }

    pub fn single(year: i32) -> Self {
        Self {
            start: year,
            end: year,
        }
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start <= year && year <= self.end
    }

    pub fn is_single_year(&self) -> bool {
        self.start == self.end
    }
}

impl TryFrom<(i32, i32)> for YearRange {
    type Error = anyhow::Error;

    fn try_from((start, end): (i32, i32)) -> Result<Self> {
        Self::new(start, end)
    }
}

impl From<YearRange> for (i32, i32) {
    fn from(r: YearRange) -> Self {
        (r.start, r.end)
    }
}

/// One (region, year) row with a value slot per table column.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub region_code: String,
    pub country: String,
    pub year: i32,
    /// Aligned with `ObservationTable::indicators`.
    pub values: Vec<Option<f64>>,
}

/// The tidy dataset the renderer reads. Replaced wholesale on every refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationTable {
    indicators: Vec<Indicator>,
    rows: Vec<Observation>,
}

impl ObservationTable {
    pub fn new(indicators: Vec<Indicator>, rows: Vec<Observation>) -> Result<Self> {
        for row in &rows {
            if row.values.len() != indicators.len() {
                bail!(
                    "row {}/{} has {} values for {} indicators",
                    row.region_code,
                    row.year,
                    row.values.len(),
                    indicators.len()
                );
            }
        }
        Ok(Self { indicators, rows })
    }

    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column position of `indicator`, if the table carries it.
    pub fn column(&self, indicator: &Indicator) -> Option<usize> {
        self.indicators.iter().position(|i| i.code == indicator.code)
    }

    /// Columnar view: `region_code`, `country`, `year`, then one nullable
    /// Float64 column per indicator, named by its label.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![
            Field::new("region_code", ArrowDataType::Utf8, false),
            Field::new("country", ArrowDataType::Utf8, false),
            Field::new("year", ArrowDataType::Int32, false),
        ];
        fields.extend(
            self.indicators
                .iter()
                .map(|i| Field::new(i.label, ArrowDataType::Float64, true)),
        );
        let schema = Arc::new(ArrowSchema::new(fields));

        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                self.rows.iter().map(|r| r.region_code.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                self.rows.iter().map(|r| r.country.as_str()),
            )),
            Arc::new(Int32Array::from_iter_values(self.rows.iter().map(|r| r.year))),
        ];
        for col in 0..self.indicators.len() {
            let values: Float64Array = self.rows.iter().map(|r| r.values[col]).collect();
            columns.push(Arc::new(values));
        }

        RecordBatch::try_new(schema, columns).context("building observation record batch")
    }
}
