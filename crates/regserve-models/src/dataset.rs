//! Conversion of client-supplied rows into ndarray records and targets.
//!
//! Requests carry plain nested vectors; the linfa estimators want dense
//! `Array2`/`Array1` values. Everything the estimators would otherwise panic
//! on (ragged rows, empty input, NaN/inf) is rejected here.
use ndarray::{Array1, Array2};

use crate::error::ModelError;

/// Build a row-major feature matrix from `x`.
pub fn records(x: &[Vec<f64>]) -> Result<Array2<f64>, ModelError> {
    let n_rows = x.len();
    if n_rows == 0 {
        return Err(ModelError::InvalidInput("X must contain at least one row".into()));
    }
    let n_cols = x[0].len();
    if n_cols == 0 {
        return Err(ModelError::InvalidInput("rows of X must not be empty".into()));
    }

    let mut flat = Vec::with_capacity(n_rows * n_cols);
    for (i, row) in x.iter().enumerate() {
        if row.len() != n_cols {
            return Err(ModelError::InvalidInput(format!(
                "row {} of X has {} values, expected {}",
                i,
                row.len(),
                n_cols
            )));
        }
        if let Some(j) = row.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::InvalidInput(format!(
                "X[{}][{}] is not a finite number",
                i, j
            )));
        }
        flat.extend_from_slice(row);
    }

    Array2::from_shape_vec((n_rows, n_cols), flat)
        .map_err(|e| ModelError::InvalidInput(e.to_string()))
}

/// Build the target vector, checking it lines up with `n_rows` records.
pub fn targets(y: &[f64], n_rows: usize) -> Result<Array1<f64>, ModelError> {
    if y.len() != n_rows {
        return Err(ModelError::InvalidInput(format!(
            "y has {} values but X has {} rows",
            y.len(),
            n_rows
        )));
    }
    if let Some(i) = y.iter().position(|v| !v.is_finite()) {
        return Err(ModelError::InvalidInput(format!("y[{}] is not a finite number", i)));
    }
    Ok(Array1::from(y.to_vec()))
}
