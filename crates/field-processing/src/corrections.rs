//! Column-level corrections applied to the Working Table.
//!
//! These are plain functions over a polars `DataFrame`; the processor owns the
//! table and decides the order. Each function checks that the columns it
//! touches exist and have a usable dtype before changing anything.

use crate::error::{FieldDataError, JoinSide, Result, ResultExt};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};

/// Seed for the placeholder label used while swapping two columns.
pub const SWAP_PLACEHOLDER: &str = "__temp_name_for_swap__";

/// Look up a column, reporting a missing one as a schema error.
pub(crate) fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| FieldDataError::ColumnNotFound(name.to_string()))
}

fn column_names(df: &DataFrame) -> HashSet<String> {
    df.get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

/// Build a column label that collides with nothing in `df`.
pub fn placeholder_label(df: &DataFrame) -> String {
    let existing = column_names(df);
    let mut label = SWAP_PLACEHOLDER.to_string();
    while existing.contains(&label) {
        label.push('_');
    }
    label
}

/// Swap the labels of two columns, leaving the data where it is.
///
/// The data previously reachable as `first` becomes reachable as `second`
/// and vice versa. Column order is unchanged.
pub fn swap_column_labels(df: &mut DataFrame, first: &str, second: &str) -> Result<()> {
    require_column(df, first)?;
    require_column(df, second)?;

    if first == second {
        return Ok(());
    }

    let placeholder = placeholder_label(df);

    df.rename(first, placeholder.as_str().into())
        .context("Failed to swap column labels")?;
    df.rename(second, first.into())
        .context("Failed to swap column labels")?;
    df.rename(&placeholder, second.into())
        .context("Failed to swap column labels")?;
    Ok(())
}

/// Replace every value in a numeric column with its absolute value.
///
/// Nulls stay null and the column keeps its dtype. Unsigned columns are
/// already non-negative and are left as they are.
pub fn absolute_values(df: &mut DataFrame, column: &str) -> Result<()> {
    let series = require_column(df, column)?.as_materialized_series().clone();
    let dtype = series.dtype().clone();

    let corrected = if dtype.is_float() {
        let values: Vec<Option<f64>> = series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.map(f64::abs))
            .collect();
        Series::new(series.name().clone(), values).cast(&dtype)?
    } else if dtype.is_signed_integer() {
        let values: Vec<Option<i64>> = series
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.map(i64::saturating_abs))
            .collect();
        Series::new(series.name().clone(), values).cast(&dtype)?
    } else if dtype.is_unsigned_integer() || dtype == DataType::Null {
        return Ok(());
    } else {
        return Err(FieldDataError::InvalidColumnType {
            column: column.to_string(),
            expected: "numeric".to_string(),
            found: dtype.to_string(),
        });
    };

    df.replace(column, corrected)?;
    Ok(())
}

fn string_values<'a>(df: &'a DataFrame, column: &str) -> Result<&'a StringChunked> {
    let series = require_column(df, column)?.as_materialized_series();
    if series.dtype() != &DataType::String {
        return Err(FieldDataError::InvalidColumnType {
            column: column.to_string(),
            expected: "str".to_string(),
            found: series.dtype().to_string(),
        });
    }
    Ok(series.str()?)
}

/// Replace values of a string column through `mapping`.
///
/// Values without an entry pass through unchanged; matching is exact, so
/// keys must match the raw (unstripped) source values. Returns the number of
/// values that were replaced.
pub fn remap_values(
    df: &mut DataFrame,
    column: &str,
    mapping: &HashMap<String, String>,
) -> Result<usize> {
    let values = string_values(df, column)?;
    let mut replaced = 0;

    let remapped: Vec<Option<String>> = values
        .into_iter()
        .map(|opt_val| {
            opt_val.map(|val| match mapping.get(val) {
                Some(canonical) => {
                    replaced += 1;
                    canonical.clone()
                }
                None => val.to_string(),
            })
        })
        .collect();

    df.replace(column, Series::new(column.into(), remapped))?;
    Ok(replaced)
}

/// Strip leading and trailing whitespace from every value of a string column.
pub fn strip_whitespace(df: &mut DataFrame, column: &str) -> Result<()> {
    let values = string_values(df, column)?;
    let stripped: Vec<Option<String>> = values
        .into_iter()
        .map(|opt_val| opt_val.map(|val| val.trim().to_string()))
        .collect();

    df.replace(column, Series::new(column.into(), stripped))?;
    Ok(())
}

/// Result of a left join against a lookup table.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub df: DataFrame,
    /// Left rows whose key had no match on the right.
    pub unmatched_rows: usize,
}

/// Left outer join of `left` against `right` on `key`.
///
/// Every left row is kept, in order; unmatched rows get nulls in the right
/// columns and duplicated right keys duplicate the matching left rows. The
/// right key is cast to the left key's dtype first so an integer key read
/// from SQL still matches the same key parsed from CSV. Right columns whose
/// names clash with left columns get the `_right` suffix.
pub fn left_join_on(left: DataFrame, right: DataFrame, key: &str) -> Result<JoinOutcome> {
    let left_key = left.column(key).map_err(|_| FieldDataError::JoinKeyMissing {
        key: key.to_string(),
        side: JoinSide::Left,
    })?;
    let right_key = right.column(key).map_err(|_| FieldDataError::JoinKeyMissing {
        key: key.to_string(),
        side: JoinSide::Right,
    })?;

    let key_dtype = left_key.dtype().clone();
    let right_key = right_key
        .cast(&key_dtype)
        .context(format!("Failed to align join key '{key}'"))?
        .take_materialized_series();

    let unmatched_rows = count_unmatched(left_key.as_materialized_series(), &right_key)?;

    let mut right = right;
    right.replace(key, right_key)?;

    let mut args = JoinArgs::new(JoinType::Left);
    args.maintain_order = MaintainOrderJoin::Left;

    let df = left
        .lazy()
        .join(right.lazy(), [col(key)], [col(key)], args)
        .collect()
        .context(format!("Failed to join on '{key}'"))?;

    Ok(JoinOutcome { df, unmatched_rows })
}

fn count_unmatched(left_key: &Series, right_key: &Series) -> Result<usize> {
    let right_text = right_key.cast(&DataType::String)?;
    let right_keys: HashSet<&str> = right_text.str()?.into_iter().flatten().collect();

    let left_text = left_key.cast(&DataType::String)?;
    let unmatched = left_text
        .str()?
        .into_iter()
        .filter(|key| key.is_none_or(|k| !right_keys.contains(k)))
        .count();
    Ok(unmatched)
}

/// Remove a column, reporting a missing one as a schema error.
pub fn drop_column(df: DataFrame, column: &str) -> Result<DataFrame> {
    require_column(&df, column)?;
    Ok(df.drop(column)?)
}
