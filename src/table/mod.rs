//! Tabular backing store boundary
//!
//! The editing engine only needs cell reads and writes, row enumeration,
//! row append/delete, column lookup by name and the read-only flag.
//! Geometry cells hold WKT text.

mod memory;

pub use memory::MemoryTable;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::FeatureId;
use crate::error::EditResult;

/// Storage type of a column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    /// WKT text
    Geometry,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Value of a single cell
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Integer(v) => write!(f, "{v}"),
            CellValue::Real(v) => write!(f, "{v}"),
            CellValue::Text(v) => f.write_str(v),
        }
    }
}

/// Row/column store a vector layer is edited through. Rows are addressed by
/// their feature id.
pub trait Table {
    fn columns(&self) -> &[Column];

    fn column_by_name(&self, name: &str) -> Option<usize> {
        self.columns().iter().position(|c| c.name == name)
    }

    /// Feature ids in storage order
    fn rows(&self) -> Vec<FeatureId>;

    fn contains_row(&self, row: FeatureId) -> bool {
        self.rows().contains(&row)
    }

    fn cell_value(&self, column: usize, row: FeatureId) -> Option<CellValue>;

    fn set_cell_value(&mut self, column: usize, row: FeatureId, value: CellValue)
    -> EditResult<()>;

    /// Append an empty row and return its id
    fn append_row(&mut self) -> EditResult<FeatureId>;

    fn delete_row(&mut self, row: FeatureId) -> EditResult<()>;

    fn is_read_only(&self) -> bool;
}
