// Catalog and outlet loading: raw tables -> engine input rows.

use std::path::Path;

use repricer_config::ColumnSettings;
use repricer_engine::{CatalogRow, FieldValue, OutletRow, OutletTable};

use crate::error::IoError;
use crate::table::{read_table, RawTable};

/// Blank cells read as 0; numeric text is parsed; anything else becomes NaN
/// and is rejected by the engine when it reaches classification.
pub fn price_value(cell: &FieldValue) -> f64 {
    match cell {
        FieldValue::Empty => 0.0,
        FieldValue::Number(n) => *n,
        FieldValue::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
    }
}

/// Text of a price cell that [`price_value`] could not read as a number.
pub fn rejected_price_text(cell: &FieldValue) -> Option<String> {
    match cell {
        FieldValue::Text(s) if price_value(cell).is_nan() => Some(s.clone()),
        _ => None,
    }
}

/// Ids compare as text; integral numbers drop their `.0`.
pub fn item_id_value(cell: &FieldValue) -> String {
    cell.as_text().trim().to_string()
}

fn require(table: &RawTable, name: &str, which: &'static str, path: &Path) -> Result<usize, IoError> {
    table.column(name).ok_or_else(|| IoError::MissingColumn {
        table: which,
        path: path.to_path_buf(),
        column: name.to_string(),
    })
}

pub fn load_catalog(path: &Path, header_row: usize, columns: &ColumnSettings) -> Result<Vec<CatalogRow>, IoError> {
    let table = read_table(path, header_row)?;
    catalog_rows(&table, columns, path)
}

pub fn catalog_rows(table: &RawTable, columns: &ColumnSettings, path: &Path) -> Result<Vec<CatalogRow>, IoError> {
    let id_idx = require(table, &columns.item_id, "catalog", path)?;
    let reference_idx = require(table, &columns.reference_price, "catalog", path)?;
    let fallback_idx = require(table, &columns.fallback_price, "catalog", path)?;

    Ok((0..table.rows.len())
        .map(|row| CatalogRow {
            item_id: item_id_value(table.cell(row, id_idx)),
            reference_price: price_value(table.cell(row, reference_idx)),
            fallback_price: price_value(table.cell(row, fallback_idx)),
        })
        .collect())
}

pub fn load_outlet(path: &Path, header_row: usize, columns: &ColumnSettings) -> Result<OutletTable, IoError> {
    let table = read_table(path, header_row)?;
    outlet_rows(&table, columns, path)
}

/// Outlet rows plus passthrough columns: every outlet column except the
/// dropped ones, with the outlet id column renamed to the catalog id name.
pub fn outlet_rows(table: &RawTable, columns: &ColumnSettings, path: &Path) -> Result<OutletTable, IoError> {
    let id_idx = require(table, &columns.outlet_item_id, "outlet", path)?;
    let price_idx = require(table, &columns.current_price, "outlet", path)?;

    let kept: Vec<usize> = (0..table.headers.len())
        .filter(|&i| !columns.drop.contains(&table.headers[i]))
        .collect();
    let names = kept
        .iter()
        .map(|&i| {
            if i == id_idx {
                columns.item_id.clone()
            } else {
                table.headers[i].clone()
            }
        })
        .collect();

    let rows = (0..table.rows.len())
        .map(|row| OutletRow {
            item_id: item_id_value(table.cell(row, id_idx)),
            current_price: price_value(table.cell(row, price_idx)),
            price_text: rejected_price_text(table.cell(row, price_idx)),
            fields: kept
                .iter()
                .map(|&col| match table.cell(row, col) {
                    // Blank cells become 0 in the export, matching the price coercion.
                    FieldValue::Empty if col == price_idx => FieldValue::Number(0.0),
                    cell => cell.clone(),
                })
                .collect(),
        })
        .collect();

    Ok(OutletTable { columns: names, rows })
}
