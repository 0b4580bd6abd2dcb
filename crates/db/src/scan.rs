//! Row scanner: rebuilds typed records from backend rows.
//!
//! A row arrives in one of two shapes (see [`RowRef`]):
//!
//! - **Named**: the handle reports its column names, so each value is
//!   routed to its field by name. Immune to backends that return columns
//!   in a different order than the `SELECT` listed them.
//! - **Positional**: only values are available, so they are matched
//!   against [`Record::COLUMNS`] in declaration order. The query must
//!   select exactly those columns in exactly that order.
//!
//! Both paths run every value through the normalizer in [`crate::wire`]
//! and fail the whole row on the first bad field.

use thiserror::Error;

use crate::wire::{NormalizeError, WireValue};

/// A single field could not be normalised.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("column `{column}`: {source}")]
pub struct ScanError {
    pub column: String,
    #[source]
    pub source: NormalizeError,
}

/// Borrowed view of one result row.
#[derive(Debug, Clone, Copy)]
pub enum RowRef<'a> {
    Named {
        columns: &'a [String],
        values: &'a [WireValue],
    },
    Positional(&'a [WireValue]),
}

/// A record that can be reconstructed column by column.
pub trait Record: Default {
    /// Columns in the order queries select them.
    const COLUMNS: &'static [&'static str];

    /// Store one normalised column value. Unknown columns must be ignored.
    fn set_column(&mut self, column: &str, value: &WireValue) -> Result<(), NormalizeError>;
}

/// Scan a row into `T`, choosing the strategy from the row's shape.
pub fn scan<T: Record>(row: RowRef<'_>) -> Result<T, ScanError> {
    match row {
        RowRef::Named { columns, values } => {
            scan_pairs(columns.iter().map(String::as_str).zip(values))
        }
        RowRef::Positional(values) => scan_pairs(T::COLUMNS.iter().copied().zip(values)),
    }
}

// Nulls are skipped, so fields keep their defaults: zero for required
// columns, `None` for optional ones. Missing columns behave the same way.
fn scan_pairs<'v, T: Record>(
    pairs: impl Iterator<Item = (&'v str, &'v WireValue)>,
) -> Result<T, ScanError> {
    let mut record = T::default();
    for (column, value) in pairs {
        if value.is_null() {
            continue;
        }
        record
            .set_column(column, value)
            .map_err(|source| ScanError {
                column: column.to_owned(),
                source,
            })?;
    }
    Ok(record)
}

/// Comma-separated column list for `T`, optionally qualified by a table alias.
pub fn select_list<T: Record>(alias: Option<&str>) -> String {
    T::COLUMNS
        .iter()
        .map(|c| match alias {
            Some(a) => format!("{a}.{c}"),
            None => (*c).to_owned(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
