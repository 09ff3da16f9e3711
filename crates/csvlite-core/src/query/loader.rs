//! Sources of table data.

use super::header::Header;
use super::record::Record;
use crate::error::{Error, Result};
use crate::value::Primary;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use tracing::debug;

/// Anything that can hand the engine a header and its rows.
pub trait TableLoader: Send + Sync + fmt::Debug {
    /// Loads the table named by `identifier`. The header's reference name is
    /// the identifier itself; callers re-label it for aliases.
    fn load_table(&self, identifier: &str) -> Result<(Header, Vec<Record>)>;

    /// Loads the rows read from standard input.
    fn load_external_input(&self) -> Result<(Header, Vec<Record>)> {
        Err(Error::TableNotExist("STDIN".to_string()))
    }
}

#[derive(Debug, Clone)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Primary>>,
}

/// Tables held in memory, keyed case-insensitively.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tables: RwLock<HashMap<String, Table>>,
    stdin: RwLock<Option<Table>>,
}

fn validate(name: &str, columns: &[String], rows: &[Vec<Primary>]) -> Result<()> {
    if let Some((i, _)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
        return Err(Error::FieldLengthNotMatch(format!(
            "row {} of {} has {} fields, header has {}",
            i + 1,
            name,
            rows[i].len(),
            columns.len()
        )));
    }
    Ok(())
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a table. Every row must be as wide as `columns`.
    pub fn insert<S: AsRef<str>>(&self, name: &str, columns: &[S], rows: Vec<Vec<Primary>>) -> Result<()> {
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        validate(name, &columns, &rows)?;
        debug!(table = name, rows = rows.len(), "registered table");
        let mut tables = self.tables.write().map_err(|_| Error::LockPoisoned)?;
        tables.insert(name.to_uppercase(), Table { columns, rows });
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut tables = self.tables.write().map_err(|_| Error::LockPoisoned)?;
        Ok(tables.remove(&name.to_uppercase()).is_some())
    }

    /// Sets the table returned for `STDIN`.
    pub fn set_external_input<S: AsRef<str>>(&self, columns: &[S], rows: Vec<Vec<Primary>>) -> Result<()> {
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        validate("STDIN", &columns, &rows)?;
        let mut stdin = self.stdin.write().map_err(|_| Error::LockPoisoned)?;
        *stdin = Some(Table { columns, rows });
        Ok(())
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let tables = self.tables.read().map_err(|_| Error::LockPoisoned)?;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

fn materialize(reference: &str, table: &Table) -> (Header, Vec<Record>) {
    let header = Header::new(reference, &table.columns[..]);
    let records = table.rows.iter().cloned().map(Record::new).collect();
    (header, records)
}

impl TableLoader for InMemoryCatalog {
    fn load_table(&self, identifier: &str) -> Result<(Header, Vec<Record>)> {
        let tables = self.tables.read().map_err(|_| Error::LockPoisoned)?;
        let table = tables
            .get(&identifier.to_uppercase())
            .ok_or_else(|| Error::TableNotExist(identifier.to_string()))?;
        Ok(materialize(identifier, table))
    }

    fn load_external_input(&self) -> Result<(Header, Vec<Record>)> {
        let stdin = self.stdin.read().map_err(|_| Error::LockPoisoned)?;
        let table = stdin
            .as_ref()
            .ok_or_else(|| Error::TableNotExist("STDIN".to_string()))?;
        Ok(materialize("STDIN", table))
    }
}
