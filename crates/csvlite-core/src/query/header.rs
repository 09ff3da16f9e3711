//! Column metadata of a view.

use crate::error::{Error, Result};
use serde::Serialize;

/// Metadata of one column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HeaderField {
    /// Reference name of the owning table; empty for computed columns
    pub view: String,
    /// Column name; computed columns use their canonical expression text
    pub column: String,
    /// Names given with AS
    pub aliases: Vec<String>,
    /// 1-based ordinal within the source table, 0 for computed columns
    pub number: usize,
    /// Physical column of a loaded table
    pub is_from_table: bool,
    /// Coalesced column produced by NATURAL or USING joins
    pub is_join_column: bool,
    /// Excluded from unqualified lookup and `*` expansion
    #[serde(skip)]
    pub hidden: bool,
    /// Appears literally in GROUP BY
    pub is_group_key: bool,
}

impl HeaderField {
    /// The name this column is presented under.
    pub fn label(&self) -> &str {
        self.aliases.first().unwrap_or(&self.column)
    }

    fn matches_column(&self, column: &str) -> bool {
        self.column.eq_ignore_ascii_case(column)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(column))
    }
}

/// Ordered column metadata; always as wide as every record of its view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Header {
    pub fields: Vec<HeaderField>,
}

impl Header {
    /// Header of a loaded table.
    pub fn new<S: AsRef<str>>(reference: &str, columns: &[S]) -> Self {
        let fields = columns
            .iter()
            .enumerate()
            .map(|(i, c)| HeaderField {
                view: reference.to_string(),
                column: c.as_ref().to_string(),
                number: i + 1,
                is_from_table: true,
                ..Default::default()
            })
            .collect();
        Header { fields }
    }

    /// Header of the single-row DUAL table; its one column is never expanded by `*`.
    pub fn dual() -> Self {
        Header {
            fields: vec![HeaderField::default()],
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Concatenates two headers.
    pub fn merge(left: &Header, right: &Header) -> Header {
        let mut fields = Vec::with_capacity(left.len() + right.len());
        fields.extend(left.fields.iter().cloned());
        fields.extend(right.fields.iter().cloned());
        Header { fields }
    }

    /// Appends a computed column and returns its index.
    pub fn add_computed(&mut self, column: String, alias: Option<String>) -> usize {
        self.fields.push(HeaderField {
            column,
            aliases: alias.into_iter().collect(),
            ..Default::default()
        });
        self.fields.len() - 1
    }

    /// Finds a column, failing if the name matches more than one.
    ///
    /// A qualified name matches table columns of that reference, never a
    /// coalesced join column. An unqualified name matches column names and
    /// aliases of visible columns.
    pub fn find(&self, table: Option<&str>, column: &str) -> Result<Option<usize>> {
        let mut found = None;

        for (i, field) in self.fields.iter().enumerate() {
            let matched = match table {
                Some(t) => {
                    !field.is_join_column
                        && field.view.eq_ignore_ascii_case(t)
                        && field.column.eq_ignore_ascii_case(column)
                }
                None => !field.hidden && field.matches_column(column),
            };
            if !matched {
                continue;
            }
            if found.is_some() {
                return Err(Error::FieldAmbiguous(identifier(table, column)));
            }
            found = Some(i);
        }

        Ok(found)
    }

    /// Like [`Header::find`] but a missing column is an error.
    pub fn contains(&self, table: Option<&str>, column: &str) -> Result<usize> {
        self.find(table, column)?
            .ok_or_else(|| Error::FieldNotExist(identifier(table, column)))
    }

    /// Index of the computed column named by `text`, if any.
    pub fn find_computed(&self, text: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| !f.is_from_table && !f.column.is_empty() && f.column == text)
    }

    /// Columns expanded by `*`.
    pub fn table_columns(&self) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_from_table && !f.hidden)
            .map(|(i, _)| i)
            .collect()
    }

    /// Columns expanded by `table.*`.
    pub fn columns_of(&self, table: &str) -> Result<Vec<usize>> {
        let columns: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_from_table && !f.is_join_column && f.view.eq_ignore_ascii_case(table))
            .map(|(i, _)| i)
            .collect();
        if columns.is_empty() {
            return Err(Error::FieldNotExist(format!("{}.*", table)));
        }
        Ok(columns)
    }

    /// Labels of every column, in order.
    pub fn labels(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.label().to_string()).collect()
    }

    /// Re-labels this header as the columns of a table named `reference`.
    ///
    /// Used when a subquery, inline table or temporary view is read as a table.
    pub fn as_table(&self, reference: &str, columns: &[String]) -> Header {
        let fields = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| HeaderField {
                view: reference.to_string(),
                column: columns
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| f.label().to_string()),
                number: i + 1,
                is_from_table: true,
                ..Default::default()
            })
            .collect();
        Header { fields }
    }

    /// Keeps only the given columns, in the given order.
    pub fn project(&self, indices: &[usize]) -> Header {
        Header {
            fields: indices
                .iter()
                .filter_map(|&i| self.fields.get(i).cloned())
                .collect(),
        }
    }
}

fn identifier(table: Option<&str>, column: &str) -> String {
    match table {
        Some(t) => format!("{}.{}", t, column),
        None => column.to_string(),
    }
}
