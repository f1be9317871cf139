//! In-memory tables loaded from CSV sources.
//!
//! A [`Table`] is read fully into memory when the tabular engine is
//! created. [`Table::profile`] summarizes each column (inferred type,
//! numeric range, distinct values) so a prompt can describe the table
//! without listing every row.

use std::path::Path;

use csv::ReaderBuilder;

use crate::error::FolioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Empty,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Text => "text",
            ColumnType::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub name: String,
    pub column_type: ColumnType,
    pub non_empty: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub distinct: usize,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Read a CSV file with a header row. Short rows are padded with empty
    /// cells; rows longer than the header are rejected.
    pub fn from_csv_path(path: &Path) -> Result<Self, FolioError> {
        let read_err = |detail: String| FolioError::SourceRead {
            path: path.to_path_buf(),
            detail,
        };

        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| read_err(e.to_string()))?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| read_err(format!("missing headers: {}", e)))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(read_err("missing headers".to_string()));
        }

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| read_err(format!("invalid row {}: {}", i + 1, e)))?;
            if record.len() > headers.len() {
                return Err(read_err(format!(
                    "invalid row {}: {} fields, header has {}",
                    i + 1,
                    record.len(),
                    headers.len()
                )));
            }
            let mut row: Vec<String> = record.iter().map(|cell| cell.to_string()).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn profile(&self) -> Vec<ColumnProfile> {
        self.headers
            .iter()
            .enumerate()
            .map(|(col, name)| self.profile_column(col, name))
            .collect()
    }

    fn profile_column(&self, col: usize, name: &str) -> ColumnProfile {
        let values: Vec<&str> = self
            .rows
            .iter()
            .filter_map(|r| r.get(col))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect();

        let mut distinct: Vec<&str> = values.clone();
        distinct.sort_unstable();
        distinct.dedup();

        let numbers: Vec<f64> = values
            .iter()
            .filter_map(|v| parse_number(v))
            .collect();

        let column_type = if values.is_empty() {
            ColumnType::Empty
        } else if numbers.len() == values.len() {
            if values.iter().all(|v| v.replace(',', "").parse::<i64>().is_ok()) {
                ColumnType::Integer
            } else {
                ColumnType::Float
            }
        } else {
            ColumnType::Text
        };

        let (min, max) = match column_type {
            ColumnType::Integer | ColumnType::Float => (
                numbers.iter().cloned().reduce(f64::min),
                numbers.iter().cloned().reduce(f64::max),
            ),
            _ => (None, None),
        };

        ColumnProfile {
            name: name.to_string(),
            column_type,
            non_empty: values.len(),
            min,
            max,
            distinct: distinct.len(),
        }
    }

    /// Render up to `max_rows` rows as a markdown table.
    pub fn to_markdown(&self, max_rows: usize) -> String {
        let mut out = String::new();
        out.push('|');
        for header in &self.headers {
            out.push(' ');
            out.push_str(&sanitize_cell(header));
            out.push_str(" |");
        }
        out.push('\n');
        out.push('|');
        for _ in &self.headers {
            out.push_str(" --- |");
        }
        out.push('\n');
        for row in self.rows.iter().take(max_rows) {
            out.push('|');
            for cell in row {
                out.push(' ');
                out.push_str(&sanitize_cell(cell));
                out.push_str(" |");
            }
            out.push('\n');
        }
        out
    }
}

// Accepts thousands separators ("38,781,291").
fn parse_number(value: &str) -> Option<f64> {
    value.replace(',', "").parse::<f64>().ok().filter(|n| n.is_finite())
}

fn sanitize_cell(value: &str) -> String {
    value
        .replace('|', "\\|")
        .replace('\n', " ")
        .trim()
        .to_string()
}
