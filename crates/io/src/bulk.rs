// Bulk-update export (.xlsx)

use std::path::Path;

use repricer_engine::{Dataset, Evaluation, FieldValue, ItemRecord, Pass};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::error::IoError;

pub const QC_ID: &str = "QC ID";
pub const PG_ID: &str = "PG ID";
pub const TARGET_PRICE: &str = "Target Price";
pub const NEW_PRICE: &str = "New Price CP (E,C)";
pub const CATEGORY: &str = "Category";
pub const PERCENTAGE_DIFF: &str = "Percentage Diff";
pub const REPRICE_MARK: &str = "re-price mark";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub rows: usize,
    pub columns: usize,
    pub repriced: usize,
}

/// Identifiers, passthrough outlet columns, then the computed columns.
pub fn bulk_headers(dataset: &Dataset) -> Vec<String> {
    let mut headers = vec![QC_ID.to_string(), PG_ID.to_string()];
    headers.extend(dataset.columns.iter().cloned());
    headers.extend(
        [TARGET_PRICE, NEW_PRICE, CATEGORY, PERCENTAGE_DIFF, REPRICE_MARK]
            .iter()
            .map(|h| h.to_string()),
    );
    headers
}

/// Write one sheet with a header row and one row per item.
pub fn write_bulk(path: &Path, dataset: &Dataset) -> Result<BulkSummary, IoError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let price_format = Format::new().set_num_format("0.00");
    let percent_format = Format::new().set_num_format("0.00%");

    let headers = bulk_headers(dataset);
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("bulk")
        .map_err(|e| IoError::write(path, e))?;

    for (col, header) in headers.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, header, &header_format)
            .map_err(|e| IoError::write(path, e))?;
    }
    worksheet
        .set_freeze_panes(1, 0)
        .map_err(|e| IoError::write(path, e))?;

    let mut summary = BulkSummary {
        columns: headers.len(),
        ..Default::default()
    };

    for (idx, item) in dataset.items.iter().enumerate() {
        let row = (idx + 1) as u32;
        let mut cells = RowWriter {
            worksheet: &mut *worksheet,
            row,
            col: 0,
            path,
        };
        cells.text(&dataset.identifiers.qc_id)?;
        cells.text(&dataset.identifiers.pg_id)?;
        for field in &item.fields {
            cells.field(field)?;
        }
        cells.number(item.target_price(), &price_format)?;
        cells.number(item.corrected_price(), &price_format)?;
        cells.text(item.band().map(|b| b.label()).unwrap_or(""))?;
        let latest = latest_evaluation(item);
        cells.number(latest.map(|e| e.deviation), &percent_format)?;
        cells.number(latest.map(|e| if e.flagged { 1.0 } else { 0.0 }), &Format::new())?;

        summary.rows += 1;
        if item.needs_reprice() {
            summary.repriced += 1;
        }
    }

    workbook.save(path).map_err(|e| IoError::write(path, e))?;
    Ok(summary)
}

/// After correction when available, else before. Deviation and mark always
/// come from the same pass.
fn latest_evaluation(item: &ItemRecord) -> Option<Evaluation> {
    item.evaluation(Pass::After).or_else(|| item.evaluation(Pass::Before))
}

struct RowWriter<'a> {
    worksheet: &'a mut Worksheet,
    row: u32,
    col: u16,
    path: &'a Path,
}

impl RowWriter<'_> {
    fn text(&mut self, value: &str) -> Result<(), IoError> {
        if !value.is_empty() {
            self.worksheet
                .write_string(self.row, self.col, value)
                .map_err(|e| IoError::write(self.path, e))?;
        }
        self.col += 1;
        Ok(())
    }

    fn number(&mut self, value: Option<f64>, format: &Format) -> Result<(), IoError> {
        if let Some(n) = value.filter(|n| n.is_finite()) {
            self.worksheet
                .write_number_with_format(self.row, self.col, n, format)
                .map_err(|e| IoError::write(self.path, e))?;
        }
        self.col += 1;
        Ok(())
    }

    fn field(&mut self, value: &FieldValue) -> Result<(), IoError> {
        match value {
            FieldValue::Empty => {
                self.col += 1;
                Ok(())
            }
            FieldValue::Number(n) => self.number(Some(*n), &Format::new()),
            FieldValue::Text(s) => self.text(s),
        }
    }
}
