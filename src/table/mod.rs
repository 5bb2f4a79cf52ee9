//! Tabular view engine: filter, sort and render lists of API records.
//!
//! Rows are JSON objects taken straight from a list response. Filters and
//! sorts address fields by dotted path (`query.source`). Rendering maps each
//! column through its formatter and draws a bordered, centered text table.

pub mod format;
pub mod schema;

use crate::error::{ApiError, Result};
use comfy_table::{CellAlignment, ContentArrangement, Table};
use schema::Column;
use serde_json::{Map, Value};
use std::cmp::Ordering;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Equal to one of the values after normalization.
    Eq,
    /// Contains one of the values as a case-sensitive substring.
    Like,
    /// Member of the value set.
    In,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub field: String,
    pub kind: FilterKind,
    pub values: Vec<String>,
    /// Compare trimmed, lowercased text on both sides.
    pub ignore_case: bool,
}

impl FilterSpec {
    pub fn eq(field: &str, value: impl Into<String>) -> Self {
        Self::new(field, FilterKind::Eq, vec![value.into()])
    }

    pub fn like(field: &str, value: impl Into<String>) -> Self {
        Self::new(field, FilterKind::Like, vec![value.into()])
    }

    pub fn is_in(field: &str, values: Vec<String>) -> Self {
        Self::new(field, FilterKind::In, values)
    }

    fn new(field: &str, kind: FilterKind, values: Vec<String>) -> Self {
        Self {
            field: field.to_string(),
            kind,
            values,
            ignore_case: false,
        }
    }

    /// Match regardless of case and surrounding whitespace (API status words).
    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    /// Whether `row` passes. A missing or null field never does.
    pub fn matches(&self, row: &Row) -> bool {
        let Some(actual) = lookup(row, &self.field).and_then(normalize) else {
            return false;
        };
        let fold = |text: &str| {
            if self.ignore_case {
                text.trim().to_lowercase()
            } else {
                text.to_string()
            }
        };
        let actual = fold(&actual);
        let mut wanted = self.values.iter().map(|v| fold(v));
        match self.kind {
            FilterKind::Eq | FilterKind::In => wanted.any(|v| v == actual),
            FilterKind::Like => wanted.any(|v| actual.contains(v.as_str())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: Direction,
}

impl SortSpec {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Desc,
        }
    }
}

/// Resolve a dotted path inside a row.
pub fn lookup<'r>(row: &'r Row, path: &str) -> Option<&'r Value> {
    let mut parts = path.split('.');
    let mut current = row.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Text form used for comparisons. Null has none; integral floats read as
/// integers so `2.0` equals `2`.
fn normalize(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", f as i64)),
            _ => Some(n.to_string()),
        },
        other => Some(other.to_string()),
    }
}

/// Keep the rows that satisfy every filter.
pub fn filter_rows(rows: Vec<Row>, filters: &[FilterSpec]) -> Vec<Row> {
    rows.into_iter()
        .filter(|row| filters.iter().all(|f| f.matches(row)))
        .collect()
}

/// Apply the sort specs one after another with a stable sort, so the last
/// spec is the primary key and earlier ones break its ties.
pub fn sort_rows(rows: &mut [Row], sorts: &[SortSpec]) {
    for spec in sorts {
        rows.sort_by(|a, b| {
            let ordering = compare_values(lookup(a, &spec.field), lookup(b, &spec.field));
            match spec.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            }
        });
    }
}

/// Missing and null sort first, then booleans, numbers, strings, containers.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            }
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) if rank(a) == 4 && rank(b) == 4 => x.to_string().cmp(&y.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// A filtered and sorted snapshot of rows, ready to render.
pub struct TableView<'c> {
    rows: Vec<Row>,
    columns: &'c [Column],
}

impl<'c> TableView<'c> {
    /// Validate `data` as a list of objects, then filter and sort it.
    pub fn build(
        data: &Value,
        columns: &'c [Column],
        filters: &[FilterSpec],
        sorts: &[SortSpec],
    ) -> Result<Self> {
        let rows = rows_from(data)?;
        let mut rows = filter_rows(rows, filters);
        sort_rows(&mut rows, sorts);
        Ok(Self { rows, columns })
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn render(&self) -> String {
        let headers: Vec<String> = self.columns.iter().map(|c| c.header.to_string()).collect();
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| (c.format)(lookup(row, c.field)))
                    .collect()
            })
            .collect();
        render_table(&headers, &cells)
    }
}

fn rows_from(data: &Value) -> Result<Vec<Row>> {
    let Value::Array(items) = data else {
        return Err(ApiError::RenderingInput(format!(
            "expected a list of records, got {}",
            kind_of(data)
        )));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map.clone()),
            other => Err(ApiError::RenderingInput(format!(
                "record {} is {}, not an object",
                i,
                kind_of(other)
            ))),
        })
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// `+-|` borders, a rule under the header and none between body rows.
const ASCII_GRID: &str = "||--+-++|    ++++++";

/// Draw a bordered table with centered cells and no trailing newline.
///
/// Columns are as wide as their widest cell; an odd leftover space goes on
/// the left of a centered cell.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut table = Table::new();
    table
        .load_preset(ASCII_GRID)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(headers);
    for row in rows {
        table.add_row(row);
    }
    for column in table.column_iter_mut() {
        column.set_cell_alignment(CellAlignment::Center);
    }
    table.to_string()
}
