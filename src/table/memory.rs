//! In-memory table with JSON persistence

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{CellValue, Column, Table};
use crate::domain::FeatureId;
use crate::error::{EditError, EditResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Row {
    id: FeatureId,
    cells: Vec<CellValue>,
}

/// Table kept entirely in memory; row ids are never reused
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryTable {
    columns: Vec<Column>,
    rows: Vec<Row>,
    next_id: i64,
    #[serde(default)]
    read_only: bool,
}

impl MemoryTable {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            next_id: 1,
            read_only: false,
        }
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn row(&self, id: FeatureId) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id)
    }

    /// Load a table previously written by [`MemoryTable::save_json`]
    pub fn load_json(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read table file: {}", path.display()))?;
        let mut table: MemoryTable = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse table file: {}", path.display()))?;
        // Rows written by hand may lack trailing cells
        let width = table.columns.len();
        for row in &mut table.rows {
            row.cells.resize(width, CellValue::Null);
        }
        let max_id = table.rows.iter().map(|r| r.id.0).max().unwrap_or(0);
        table.next_id = table.next_id.max(max_id + 1);
        log::debug!("Loaded {} rows from {}", table.rows.len(), path.display());
        Ok(table)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write table file: {}", path.display()))?;
        Ok(())
    }
}

impl Table for MemoryTable {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn rows(&self) -> Vec<FeatureId> {
        self.rows.iter().map(|r| r.id).collect()
    }

    fn contains_row(&self, row: FeatureId) -> bool {
        self.row(row).is_some()
    }

    fn cell_value(&self, column: usize, row: FeatureId) -> Option<CellValue> {
        self.row(row)?.cells.get(column).cloned()
    }

    fn set_cell_value(
        &mut self,
        column: usize,
        row: FeatureId,
        value: CellValue,
    ) -> EditResult<()> {
        if self.read_only {
            return Err(EditError::ReadOnlyTable);
        }
        let name = match self.columns.get(column) {
            Some(c) => c.name.clone(),
            None => return Err(EditError::UnknownColumn(format!("#{column}"))),
        };
        let cells = &mut self
            .rows
            .iter_mut()
            .find(|r| r.id == row)
            .ok_or(EditError::UnknownFeature(row))?
            .cells;
        match cells.get_mut(column) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(EditError::UnknownColumn(name)),
        }
    }

    fn append_row(&mut self) -> EditResult<FeatureId> {
        if self.read_only {
            return Err(EditError::ReadOnlyTable);
        }
        let id = FeatureId(self.next_id);
        self.next_id += 1;
        self.rows.push(Row {
            id,
            cells: vec![CellValue::Null; self.columns.len()],
        });
        Ok(id)
    }

    fn delete_row(&mut self, row: FeatureId) -> EditResult<()> {
        if self.read_only {
            return Err(EditError::ReadOnlyTable);
        }
        let at = self
            .rows
            .iter()
            .position(|r| r.id == row)
            .ok_or(EditError::UnknownFeature(row))?;
        self.rows.remove(at);
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
