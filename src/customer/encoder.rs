//! Categorical field encoding
//!
//! Each known categorical column has an explicit label → code table. Encoding
//! is strict: a label outside the table is an error rather than being passed
//! through, and a column that is already numeric must hold only known codes.

use super::data::{Column, CustomerTable};
use crate::error::{ClvError, Result};
use serde::Serialize;

/// Total, injective label → code mapping for one categorical column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryMap {
    column: String,
    entries: Vec<(String, u32)>,
}

impl CategoryMap {
    /// Build a mapping, rejecting duplicate labels or codes
    pub fn new(column: &str, entries: Vec<(String, u32)>) -> Result<Self> {
        for (i, (label, code)) in entries.iter().enumerate() {
            for (other_label, other_code) in &entries[..i] {
                if other_code == code {
                    return Err(ClvError::DuplicateCategoryCode {
                        column: column.to_string(),
                        code: *code,
                    });
                }
                if other_label == label {
                    return Err(ClvError::InvalidConfig {
                        field: column.to_string(),
                        reason: format!("label '{}' is mapped twice", label),
                    });
                }
            }
        }
        Ok(Self {
            column: column.to_string(),
            entries,
        })
    }

    fn fixed(column: &str, entries: &[(&str, u32)]) -> Self {
        Self {
            column: column.to_string(),
            entries: entries.iter().map(|(l, c)| (l.to_string(), *c)).collect(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn code_for(&self, label: &str) -> Option<u32> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, c)| *c)
    }

    pub fn label_for(&self, code: u32) -> Option<&str> {
        self.entries.iter().find(|(_, c)| *c == code).map(|(l, _)| l.as_str())
    }

    fn has_code(&self, value: f64) -> bool {
        self.entries.iter().any(|(_, c)| f64::from(*c) == value)
    }

    /// Encode a single column
    pub fn encode_column(&self, column: &Column) -> Result<Column> {
        match column {
            Column::Text(values) => values
                .iter()
                .enumerate()
                .map(|(row, value)| {
                    self.code_for(value).map(f64::from).ok_or_else(|| ClvError::UnmappedCategory {
                        column: self.column.clone(),
                        value: value.clone(),
                        row,
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Column::Numeric),
            Column::Numeric(values) => {
                if let Some(row) = values.iter().position(|v| !self.has_code(*v)) {
                    return Err(ClvError::UnmappedCategory {
                        column: self.column.clone(),
                        value: values[row].to_string(),
                        row,
                    });
                }
                Ok(column.clone())
            }
        }
    }
}

/// The full set of categorical mappings applied to a customer file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Encoder {
    maps: Vec<CategoryMap>,
}

impl Default for Encoder {
    fn default() -> Self {
        let yes_no = [("Yes", 1), ("No", 0)];
        Self {
            maps: vec![
                CategoryMap::fixed("marital", &[("Married", 1), ("Unmarried", 0)]),
                CategoryMap::fixed("retire", &yes_no),
                CategoryMap::fixed("gender", &[("Male", 0), ("Female", 1)]),
                CategoryMap::fixed("voice", &yes_no),
                CategoryMap::fixed("internet", &yes_no),
                CategoryMap::fixed("forward", &yes_no),
                CategoryMap::fixed("churn", &yes_no),
                CategoryMap::fixed(
                    "ed",
                    &[
                        ("Post-undergraduate degree", 4),
                        ("College degree", 3),
                        ("Some college", 2),
                        ("High school degree", 1),
                        ("Did not complete high school", 0),
                    ],
                ),
                CategoryMap::fixed("region", &[("Zone 3", 2), ("Zone 2", 1), ("Zone 1", 0)]),
                CategoryMap::fixed(
                    "custcat",
                    &[
                        ("Total service", 3),
                        ("Plus service", 2),
                        ("E-service", 1),
                        ("Basic service", 0),
                    ],
                ),
            ],
        }
    }
}

impl Encoder {
    /// Build an encoder, rejecting two maps for the same column
    pub fn new(maps: Vec<CategoryMap>) -> Result<Self> {
        for (i, map) in maps.iter().enumerate() {
            if maps[..i].iter().any(|other| other.column == map.column) {
                return Err(ClvError::InvalidConfig {
                    field: map.column.clone(),
                    reason: "column has more than one category map".to_string(),
                });
            }
        }
        Ok(Self { maps })
    }

    pub fn maps(&self) -> &[CategoryMap] {
        &self.maps
    }

    pub fn map_for(&self, column: &str) -> Option<&CategoryMap> {
        self.maps.iter().find(|m| m.column == column)
    }

    /// Replace every known categorical column with its integer codes
    pub fn encode(&self, mut table: CustomerTable) -> Result<CustomerTable> {
        for map in &self.maps {
            let encoded = match table.column(&map.column) {
                Some(column) => map.encode_column(column)?,
                None => {
                    log::debug!("Categorical column '{}' not present, skipping", map.column);
                    continue;
                }
            };
            table.set_column(&map.column, encoded)?;
        }
        Ok(table)
    }

    /// Human-readable label for a code, falling back to the number itself
    pub fn describe_value(&self, column: &str, value: f64) -> String {
        let label = if value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) {
            self.map_for(column).and_then(|m| m.label_for(value as u32))
        } else {
            None
        };
        match label {
            Some(label) => label.to_string(),
            None => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_table() -> CustomerTable {
        CustomerTable::new(
            vec!["1".into(), "2".into(), "3".into()],
            vec!["ed".into(), "region".into(), "gender".into(), "age".into()],
            vec![
                Column::Text(vec![
                    "Post-undergraduate degree".into(),
                    "Did not complete high school".into(),
                    "Some college".into(),
                ]),
                Column::Text(vec!["Zone 3".into(), "Zone 1".into(), "Zone 2".into()]),
                Column::Text(vec!["Male".into(), "Female".into(), "Female".into()]),
                Column::Numeric(vec![44.0, 33.0, 52.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_documented_codes() {
        let encoded = Encoder::default().encode(raw_table()).unwrap();

        assert_eq!(encoded.numeric("ed").unwrap(), &[4.0, 0.0, 2.0]);
        assert_eq!(encoded.numeric("region").unwrap(), &[2.0, 0.0, 1.0]);
        assert_eq!(encoded.numeric("gender").unwrap(), &[0.0, 1.0, 1.0]);
        // Non-categorical columns are untouched
        assert_eq!(encoded.numeric("age").unwrap(), &[44.0, 33.0, 52.0]);
    }

    #[test]
    fn test_encoding_is_idempotent() {
        let encoder = Encoder::default();
        let once = encoder.encode(raw_table()).unwrap();
        let twice = encoder.encode(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let mut table = raw_table();
        table
            .set_column("region", Column::Text(vec!["Zone 3".into(), "Zone 9".into(), "Zone 1".into()]))
            .unwrap();

        match Encoder::default().encode(table) {
            Err(ClvError::UnmappedCategory { column, value, row }) => {
                assert_eq!(column, "region");
                assert_eq!(value, "Zone 9");
                assert_eq!(row, 1);
            }
            other => panic!("expected UnmappedCategory, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        let mut table = raw_table();
        table.set_column("gender", Column::Numeric(vec![0.0, 1.0, 2.0])).unwrap();
        assert!(matches!(
            Encoder::default().encode(table),
            Err(ClvError::UnmappedCategory { .. })
        ));
    }

    #[test]
    fn test_default_maps_are_injective() {
        for map in Encoder::default().maps() {
            assert!(CategoryMap::new(map.column(), map.entries.clone()).is_ok(), "{}", map.column());
        }
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let result = CategoryMap::new("plan", vec![("Gold".into(), 1), ("Silver".into(), 1)]);
        assert!(matches!(result, Err(ClvError::DuplicateCategoryCode { code: 1, .. })));
    }

    #[test]
    fn test_describe_value_uses_labels() {
        let encoder = Encoder::default();
        assert_eq!(encoder.describe_value("custcat", 3.0), "Total service");
        assert_eq!(encoder.describe_value("tenure", 12.0), "12");
    }

    #[test]
    fn test_custom_encoder_rejects_repeated_column() {
        let gold = CategoryMap::new("plan", vec![("Gold".into(), 1), ("Basic".into(), 0)]).unwrap();
        let silver = CategoryMap::new("plan", vec![("Silver".into(), 1)]).unwrap();

        let result = Encoder::new(vec![gold.clone(), silver]);
        assert!(matches!(result, Err(ClvError::InvalidConfig { field, .. }) if field == "plan"));

        let encoder = Encoder::new(vec![gold]).unwrap();
        assert_eq!(encoder.describe_value("plan", 1.0), "Gold");
    }
}
