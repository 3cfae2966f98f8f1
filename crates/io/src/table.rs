// Raw table reading: xlsx/xls/xlsb/ods via calamine, csv via csv.
//
// Both paths skip a fixed preamble and treat the row at `header_row` as the
// column header. Cells come back as FieldValue; blank strings read as Empty.

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use repricer_engine::FieldValue;

use crate::error::IoError;

/// Extensions accepted as input tables.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods", "csv"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl RawTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> &FieldValue {
        static EMPTY: FieldValue = FieldValue::Empty;
        self.rows.get(row).and_then(|r| r.get(col)).unwrap_or(&EMPTY)
    }
}

pub fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Read the first sheet of a workbook, or a CSV file.
pub fn read_table(path: &Path, header_row: usize) -> Result<RawTable, IoError> {
    let grid = match extension(path).as_deref() {
        Some("csv") => read_csv_grid(path)?,
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext) => read_workbook_grid(path)?,
        _ => return Err(IoError::UnsupportedFormat(path.to_path_buf())),
    };
    split_header(path, grid, header_row)
}

fn split_header(path: &Path, mut grid: Vec<Vec<FieldValue>>, header_row: usize) -> Result<RawTable, IoError> {
    if header_row >= grid.len() {
        return Err(IoError::HeaderRowMissing {
            path: path.to_path_buf(),
            row: header_row,
            rows: grid.len(),
        });
    }
    let mut body = grid.split_off(header_row);
    let header_cells = body.remove(0);

    let headers = header_cells
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell.as_text().trim() {
            "" => format!("Unnamed: {i}"),
            name => name.to_string(),
        })
        .collect::<Vec<_>>();

    let rows = body
        .into_iter()
        .filter(|row| row.iter().any(|c| *c != FieldValue::Empty))
        .map(|mut row| {
            row.resize(headers.len(), FieldValue::Empty);
            row
        })
        .collect();

    Ok(RawTable { headers, rows })
}

// ---------------------------------------------------------------------------
// Workbooks
// ---------------------------------------------------------------------------

fn read_workbook_grid(path: &Path) -> Result<Vec<Vec<FieldValue>>, IoError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| IoError::read(path, e))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IoError::read(path, "workbook contains no sheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| IoError::read(path, format!("sheet '{sheet_name}': {e}")))?;

    // Range may not begin at A1; pad so row/col indices are absolute.
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut grid: Vec<Vec<FieldValue>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![FieldValue::Empty; start_col as usize];
        cells.extend(row.iter().map(cell_value));
        grid.push(cells);
    }
    Ok(grid)
}

fn cell_value(cell: &Data) -> FieldValue {
    match cell {
        Data::Empty | Data::Error(_) => FieldValue::Empty,
        Data::Int(i) => FieldValue::Number(*i as f64),
        Data::Float(f) => FieldValue::Number(*f),
        Data::Bool(b) => FieldValue::Text(b.to_string()),
        Data::DateTime(dt) => FieldValue::Number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => text_value(s),
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn read_csv_grid(path: &Path) -> Result<Vec<Vec<FieldValue>>, IoError> {
    let content = read_file_as_utf8(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(&content))
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IoError::read(path, e))?;
        grid.push(record.iter().map(csv_value).collect());
    }
    Ok(grid)
}

/// CSV cells are untyped: numeric-looking text becomes a number.
fn csv_value(field: &str) -> FieldValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        FieldValue::Empty
    } else if let Ok(n) = trimmed.parse::<f64>() {
        FieldValue::Number(n)
    } else {
        FieldValue::Text(trimmed.to_string())
    }
}

fn text_value(s: &str) -> FieldValue {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        FieldValue::Empty
    } else {
        FieldValue::Text(trimmed.to_string())
    }
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(30).collect();

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Preamble lines often hold a single field, so score on the widest row.
        let widest = counts.iter().copied().max().unwrap_or(0);
        if widest <= 1 {
            continue;
        }
        let consistent = counts.iter().filter(|&&c| c == widest).count() as u64;
        let score = consistent * widest as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (Excel-exported CSVs are often Windows-1252).
fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let mut file = std::fs::File::open(path).map_err(|e| IoError::read(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| IoError::read(path, e))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.trim_start_matches('\u{feff}').to_string()),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}
