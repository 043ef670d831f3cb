//! Customer record table

use crate::error::{ClvError, Result};

/// A single column of the customer table
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Every cell parsed as a number (or was encoded to one)
    Numeric(Vec<f64>),
    /// Raw text cells, typically categorical fields before encoding
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    fn select(&self, rows: &[usize]) -> Column {
        match self {
            Column::Numeric(values) => Column::Numeric(rows.iter().map(|&r| values[r]).collect()),
            Column::Text(values) => Column::Text(rows.iter().map(|&r| values[r].clone()).collect()),
        }
    }
}

/// Customers as rows, named attributes as columns.
///
/// The customer index (first column of the source file) is kept as string ids
/// and never takes part in model fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerTable {
    ids: Vec<String>,
    names: Vec<String>,
    columns: Vec<Column>,
}

impl CustomerTable {
    /// Build a table, checking that every column has one cell per customer
    pub fn new(ids: Vec<String>, names: Vec<String>, columns: Vec<Column>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(ClvError::ColumnLength {
                column: "<header>".to_string(),
                expected: names.len(),
                actual: columns.len(),
            });
        }
        for (name, column) in names.iter().zip(&columns) {
            if column.len() != ids.len() {
                return Err(ClvError::ColumnLength {
                    column: name.clone(),
                    expected: ids.len(),
                    actual: column.len(),
                });
            }
        }
        Ok(Self { ids, names, columns })
    }

    /// Number of customers
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|idx| &self.columns[idx])
    }

    /// Numeric view of a column, failing if it is absent or still text
    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.column(name) {
            Some(Column::Numeric(values)) => Ok(values),
            Some(Column::Text(_)) => Err(ClvError::NonNumericColumn {
                column: name.to_string(),
            }),
            None => Err(ClvError::MissingColumn {
                column: name.to_string(),
            }),
        }
    }

    /// Replace an existing column or append a new one
    pub fn set_column(&mut self, name: &str, column: Column) -> Result<()> {
        if column.len() != self.len() {
            return Err(ClvError::ColumnLength {
                column: name.to_string(),
                expected: self.len(),
                actual: column.len(),
            });
        }
        match self.position(name) {
            Some(idx) => self.columns[idx] = column,
            None => {
                self.names.push(name.to_string());
                self.columns.push(column);
            }
        }
        Ok(())
    }

    /// Iterate over `(name, column)` pairs in file order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Copy of the table restricted to the given row indices, in that order
    pub fn select_rows(&self, rows: &[usize]) -> CustomerTable {
        CustomerTable {
            ids: rows.iter().map(|&r| self.ids[r].clone()).collect(),
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
        }
    }

    /// First `n` customers (or all of them if the table is shorter)
    pub fn head(&self, n: usize) -> CustomerTable {
        let rows: Vec<usize> = (0..n.min(self.len())).collect();
        self.select_rows(&rows)
    }

    /// Distinct values of a numeric column in order of first appearance
    pub fn distinct_values(&self, name: &str) -> Result<Vec<f64>> {
        let values = self.numeric(name)?;
        let mut distinct: Vec<f64> = Vec::new();
        for &v in values {
            if !distinct.iter().any(|d| d.total_cmp(&v).is_eq()) {
                distinct.push(v);
            }
        }
        Ok(distinct)
    }

    /// Rows whose numeric column `name` equals `value`
    pub fn filter_eq(&self, name: &str, value: f64) -> Result<CustomerTable> {
        let values = self.numeric(name)?;
        let rows: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.total_cmp(&value).is_eq())
            .map(|(i, _)| i)
            .collect();
        Ok(self.select_rows(&rows))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CustomerTable {
        CustomerTable::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec!["tenure".into(), "region".into()],
            vec![
                Column::Numeric(vec![3.0, 10.0, 7.0]),
                Column::Numeric(vec![1.0, 0.0, 1.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = CustomerTable::new(
            vec!["a".into(), "b".into()],
            vec!["tenure".into()],
            vec![Column::Numeric(vec![1.0])],
        );
        assert!(matches!(result, Err(ClvError::ColumnLength { .. })));
    }

    #[test]
    fn test_numeric_lookup_errors() {
        let mut table = sample();
        table
            .set_column("gender", Column::Text(vec!["Male".into(), "Female".into(), "Male".into()]))
            .unwrap();

        assert!(matches!(table.numeric("missing"), Err(ClvError::MissingColumn { .. })));
        assert!(matches!(table.numeric("gender"), Err(ClvError::NonNumericColumn { .. })));
        assert_eq!(table.numeric("tenure").unwrap(), &[3.0, 10.0, 7.0]);
    }

    #[test]
    fn test_distinct_and_filter() {
        let table = sample();
        assert_eq!(table.distinct_values("region").unwrap(), vec![1.0, 0.0]);

        let zone = table.filter_eq("region", 1.0).unwrap();
        assert_eq!(zone.len(), 2);
        assert_eq!(zone.ids(), &["a".to_string(), "c".to_string()]);
        assert_eq!(zone.numeric("tenure").unwrap(), &[3.0, 7.0]);
    }

    #[test]
    fn test_head_is_clamped() {
        let table = sample();
        assert_eq!(table.head(2).len(), 2);
        assert_eq!(table.head(10).len(), 3);
    }
}
