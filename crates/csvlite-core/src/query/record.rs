//! Records and cells.

use crate::value::{Primary, NULL};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

/// One value, or one value per member row while the owning view is grouped.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell(Vec<Primary>);

impl Cell {
    pub fn new(value: Primary) -> Self {
        Cell(vec![value])
    }

    pub fn grouped(values: Vec<Primary>) -> Self {
        Cell(values)
    }

    /// The representative value. An empty group cell reads as NULL.
    pub fn value(&self) -> &Primary {
        self.0.first().unwrap_or(&NULL)
    }

    pub fn values(&self) -> &[Primary] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drops every value but the first.
    pub fn collapse(&mut self) {
        self.0.truncate(1);
        if self.0.is_empty() {
            self.0.push(Primary::Null);
        }
    }
}

/// A row of cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    cells: Vec<Cell>,
}

impl Record {
    pub fn new(values: Vec<Primary>) -> Self {
        Record {
            cells: values.into_iter().map(Cell::new).collect(),
        }
    }

    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Record { cells }
    }

    /// A record of `len` NULLs, used to pad outer joins.
    pub fn nulls(len: usize) -> Self {
        Record::new(vec![Primary::Null; len])
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut Vec<Cell> {
        &mut self.cells
    }

    /// Representative value of a column; NULL if out of range.
    pub fn value(&self, index: usize) -> &Primary {
        self.cells.get(index).map(Cell::value).unwrap_or(&NULL)
    }

    /// Representative values of every column.
    pub fn values(&self) -> Vec<Primary> {
        self.cells.iter().map(|c| c.value().clone()).collect()
    }

    pub fn push(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    /// Concatenates two records.
    pub fn merge(left: &Record, right: &Record) -> Record {
        let mut cells = Vec::with_capacity(left.len() + right.len());
        cells.extend(left.cells.iter().cloned());
        cells.extend(right.cells.iter().cloned());
        Record { cells }
    }

    /// Keeps only the given columns, in the given order.
    pub fn project(&self, indices: &[usize]) -> Record {
        Record {
            cells: indices
                .iter()
                .map(|&i| self.cells.get(i).cloned().unwrap_or_else(|| Cell::new(Primary::Null)))
                .collect(),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.cells.len()))?;
        for cell in &self.cells {
            seq.serialize_element(cell.value())?;
        }
        seq.end()
    }
}
