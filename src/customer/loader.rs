//! CSV customer file loading
//!
//! The first column of the file is the customer index; every other column is
//! typed on load: numeric if every cell parses as a number, text otherwise.

use super::data::{Column, CustomerTable};
use super::encoder::Encoder;
use crate::error::{ClvError, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Load a customer table from a CSV file
pub fn load_customers(path: &Path) -> Result<CustomerTable> {
    let file = File::open(path)?;
    let table = load_customers_from_reader(file)?;
    log::info!(
        "Loaded {} customers with {} columns from {}",
        table.len(),
        table.column_names().len(),
        path.display()
    );
    Ok(table)
}

/// Load a customer table from any CSV reader
pub fn load_customers_from_reader<R: Read>(reader: R) -> Result<CustomerTable> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(ClvError::EmptyTable);
    }
    let names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut ids = Vec::new();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];
    for result in reader.records() {
        let record = result?;
        ids.push(record[0].to_string());
        for (j, column) in cells.iter_mut().enumerate() {
            column.push(record.get(j + 1).unwrap_or_default().to_string());
        }
    }

    if ids.is_empty() {
        return Err(ClvError::EmptyTable);
    }

    let columns = names
        .iter()
        .zip(cells)
        .map(|(name, column)| infer_column(name, column))
        .collect::<Result<Vec<_>>>()?;

    CustomerTable::new(ids, names, columns)
}

/// Load a customer file and encode its categorical fields
pub fn load_encoded(path: &Path, encoder: &Encoder) -> Result<CustomerTable> {
    let table = load_customers(path)?;
    encoder.encode(table)
}

/// Write a table back out as CSV, customer index first
pub fn write_customers<W: Write>(table: &CustomerTable, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    let mut header = vec![String::new()];
    header.extend(table.column_names().iter().cloned());
    writer.write_record(&header)?;

    for (row, id) in table.ids().iter().enumerate() {
        let mut record = vec![id.clone()];
        for (_, column) in table.iter() {
            record.push(match column {
                Column::Numeric(values) => values[row].to_string(),
                Column::Text(values) => values[row].clone(),
            });
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn infer_column(name: &str, cells: Vec<String>) -> Result<Column> {
    if let Some(row) = cells.iter().position(|c| c.is_empty()) {
        return Err(ClvError::MissingValue {
            column: name.to_string(),
            row,
        });
    }

    let parsed: Option<Vec<f64>> = cells.iter().map(|c| c.parse::<f64>().ok()).collect();
    Ok(match parsed {
        Some(values) => Column::Numeric(values),
        None => Column::Text(cells),
    })
}
