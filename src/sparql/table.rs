//! Solution tables
//!
//! A table is an ordered list of unique variable columns plus rows of
//! nullable encoded terms. Two flags travel with the whole table and tell the
//! combiner how to fold it against its left neighbour.

use crate::rdf::Term;
use indexmap::IndexSet;
use rustc_hash::FxHashSet;

/// One table cell: `None` is unbound, `Some` holds an encoded term
pub type Cell = Option<String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolutionTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    /// Outer-join this table against its left neighbour
    pub is_optional: bool,
    /// Combine with the left neighbour as alternative solutions
    pub join_as_union: bool,
}

impl SolutionTable {
    /// Empty table with the given columns (duplicates collapse to the first)
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: IndexSet<String> = columns.into_iter().map(Into::into).collect();
        Self {
            columns: columns.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Build a table from rows already aligned to `columns`
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Cell>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn with_flags(mut self, is_optional: bool, join_as_union: bool) -> Self {
        self.is_optional = is_optional;
        self.join_as_union = join_as_union;
        self
    }

    pub fn clear_flags(&mut self) {
        self.is_optional = false;
        self.join_as_union = false;
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Add a column (if missing) and return its index; existing rows get nulls
    pub fn add_column(&mut self, column: impl Into<String>) -> usize {
        let column = column.into();
        if let Some(index) = self.column_index(&column) {
            return index;
        }
        self.columns.push(column);
        for row in &mut self.rows {
            row.push(None);
        }
        self.columns.len() - 1
    }

    /// Append a row; short rows are padded with nulls, long rows truncated
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: Cell) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value;
        }
    }

    /// Row view at `index`
    pub fn solution(&self, index: usize) -> Option<Solution<'_>> {
        self.rows.get(index).map(|row| Solution {
            columns: &self.columns,
            row,
        })
    }

    pub fn solutions(&self) -> impl Iterator<Item = Solution<'_>> {
        self.rows.iter().map(move |row| Solution {
            columns: &self.columns,
            row,
        })
    }

    /// Distinct bound values of a column, in first-appearance order
    pub fn column_values(&self, column: &str) -> Vec<String> {
        let Some(index) = self.column_index(column) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row[index].clone())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// Keep only the rows for which `keep` returns true
    pub fn retain_rows(&mut self, mut keep: impl FnMut(Solution<'_>) -> bool) {
        let columns = &self.columns;
        self.rows.retain(|row| keep(Solution { columns, row }));
    }

    /// Table restricted to `columns`; a column the table lacks becomes all-null
    pub fn project(&self, columns: &[String]) -> SolutionTable {
        let mut projected = SolutionTable::new(columns.iter().cloned());
        let indices: Vec<Option<usize>> = projected
            .columns
            .iter()
            .map(|c| self.column_index(c))
            .collect();
        for row in &self.rows {
            projected.rows.push(
                indices
                    .iter()
                    .map(|index| index.and_then(|i| row[i].clone()))
                    .collect(),
            );
        }
        projected
    }

    /// Remove duplicate rows, keeping the first occurrence
    pub fn distinct(&mut self) {
        let mut seen: FxHashSet<Vec<Cell>> = FxHashSet::default();
        self.rows.retain(|row| seen.insert(row.clone()));
    }

    /// Skip `offset` rows then keep at most `limit`
    pub fn slice(&mut self, offset: Option<usize>, limit: Option<usize>) {
        let offset = offset.unwrap_or(0).min(self.rows.len());
        self.rows.drain(..offset);
        if let Some(limit) = limit {
            self.rows.truncate(limit);
        }
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Vec<Cell>> {
        &mut self.rows
    }
}

/// Read-only view of one table row
#[derive(Debug, Clone, Copy)]
pub struct Solution<'a> {
    columns: &'a [String],
    row: &'a [Cell],
}

impl<'a> Solution<'a> {
    /// Encoded value bound to `variable`, if any
    pub fn get(&self, variable: &str) -> Option<&'a str> {
        let index = self.columns.iter().position(|c| c == variable)?;
        self.row.get(index)?.as_deref()
    }

    /// Decoded term bound to `variable`, if any
    pub fn term(&self, variable: &str) -> Option<Term> {
        self.get(variable).map(Term::decode)
    }

    pub fn has_column(&self, variable: &str) -> bool {
        self.columns.iter().any(|c| c == variable)
    }

    pub fn columns(&self) -> &'a [String] {
        self.columns
    }
}
