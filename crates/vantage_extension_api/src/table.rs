//! Tabular values returned by table providers.

use crate::types::Icon;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Most columns a table may have.
pub const MAX_COLUMNS: usize = 5;

/// A named table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    pub name: String,
    pub icon: Icon,
}

/// A table of text cells.
///
/// Built with [`Table::builder`]. Every row has exactly as many cells as the
/// table has columns.
///
/// ```rust
/// use vantage_extension_api::{Icon, Table};
///
/// let table = Table::builder()
///     .column_one("first", Some(Icon::called("gavel")))
///     .column_two("second", None)
///     .add_row(&[&"value", &3, &0.5, &400])
///     .build();
///
/// assert_eq!(table.columns().len(), 2);
/// assert_eq!(table.rows()[0], vec!["value".to_string(), "3".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<TableColumn>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn builder() -> TableBuilder {
        TableBuilder::default()
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Builder for [`Table`].
#[derive(Debug, Default)]
pub struct TableBuilder {
    columns: [Option<TableColumn>; MAX_COLUMNS],
    rows: Vec<Vec<String>>,
}

impl TableBuilder {
    fn column(mut self, index: usize, name: impl Into<String>, icon: Option<Icon>) -> Self {
        let icon = match icon {
            Some(icon) if !icon.name.is_empty() => icon,
            _ => Icon::called("question"),
        };
        self.columns[index] = Some(TableColumn {
            name: name.into(),
            icon,
        });
        self
    }

    pub fn column_one(self, name: impl Into<String>, icon: Option<Icon>) -> Self {
        self.column(0, name, icon)
    }

    pub fn column_two(self, name: impl Into<String>, icon: Option<Icon>) -> Self {
        self.column(1, name, icon)
    }

    pub fn column_three(self, name: impl Into<String>, icon: Option<Icon>) -> Self {
        self.column(2, name, icon)
    }

    pub fn column_four(self, name: impl Into<String>, icon: Option<Icon>) -> Self {
        self.column(3, name, icon)
    }

    pub fn column_five(self, name: impl Into<String>, icon: Option<Icon>) -> Self {
        self.column(4, name, icon)
    }

    /// Adds a row. Values past the last column are dropped when the table is built.
    pub fn add_row(mut self, values: &[&dyn Display]) -> Self {
        self.rows
            .push(values.iter().map(|value| value.to_string()).collect());
        self
    }

    /// Columns after the first missing one are ignored.
    pub fn build(self) -> Table {
        let columns: Vec<TableColumn> = self.columns.into_iter().map_while(|column| column).collect();
        let width = columns.len();
        let rows = if width == 0 {
            Vec::new()
        } else {
            self.rows
                .into_iter()
                .map(|mut row| {
                    row.resize(width, String::new());
                    row
                })
                .collect()
        };
        Table { columns, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Color;

    #[test]
    fn test_column_after_gap_is_ignored() {
        let table = Table::builder()
            .column_one("first", Some(Icon::called("gavel").of(Color::Amber)))
            .column_two("second", Some(Icon::called("what").of(Color::Brown)))
            .column_three("third", None)
            .column_five("five", Some(Icon::called("")))
            .add_row(&[&"value", &3, &0.5, &400])
            .build();

        let names: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(table.columns()[2].icon.name, "question");
        assert_eq!(table.rows(), &[vec!["value", "3", "0.5"]]);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = Table::builder()
            .column_one("a", None)
            .column_two("b", None)
            .add_row(&[&"only"])
            .build();
        assert_eq!(table.rows()[0], vec!["only".to_string(), String::new()]);
    }

    #[test]
    fn test_table_without_columns_has_no_rows() {
        let table = Table::builder().add_row(&[&1]).build();
        assert!(table.is_empty());
        assert!(table.rows().is_empty());
    }
}
