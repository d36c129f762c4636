//! COPY statement compilation.
//!
//! Pure functions of a [`TableSpec`] and its resolved column list. Identifiers,
//! filters and transformation fragments are trusted operator SQL and are
//! inserted verbatim.

use crate::config::TableSpec;
use crate::error::{CopyError, Result};
use crate::transform::expand_transformation;

/// The extraction/load statement pair for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQueries {
    /// `COPY (SELECT ...) TO STDOUT` run against the source.
    pub extraction: String,
    /// `COPY schema.table (...) FROM STDIN` run against the target.
    pub load: String,
}

impl CompiledQueries {
    /// Compile both statements.
    pub fn compile(spec: &TableSpec, columns: &[String]) -> Result<Self> {
        Ok(Self {
            extraction: build_extraction_statement(spec, columns)?,
            load: build_load_statement(spec, columns)?,
        })
    }
}

/// Build the source statement, applying transformations and the row filter.
pub fn build_extraction_statement(spec: &TableSpec, columns: &[String]) -> Result<String> {
    ensure_columns(spec, columns)?;

    let projection: Vec<String> = columns
        .iter()
        .map(|col| match spec.transform.get(col) {
            Some(token) => format!("{} AS {}", expand_transformation(token, col), col),
            None => col.clone(),
        })
        .collect();

    let mut select = format!("SELECT {} FROM {}", format_columns(&projection), spec.full_name());
    if let Some(filter) = spec.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        select.push_str(" WHERE ");
        select.push_str(filter);
    }

    Ok(format!("COPY ({}) TO STDOUT", select))
}

/// Build the target statement. Always uses the raw column names.
pub fn build_load_statement(spec: &TableSpec, columns: &[String]) -> Result<String> {
    ensure_columns(spec, columns)?;

    Ok(format!(
        "COPY {} ({}) FROM STDIN",
        spec.full_name(),
        format_columns(columns)
    ))
}

/// `TRUNCATE TABLE schema.table CASCADE`.
pub fn build_truncate_statement(spec: &TableSpec) -> String {
    format!("TRUNCATE TABLE {} CASCADE", spec.full_name())
}

/// Join column fragments with `, `.
pub fn format_columns<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}

fn ensure_columns(spec: &TableSpec, columns: &[String]) -> Result<()> {
    if columns.is_empty() {
        return Err(CopyError::NoColumns {
            table: spec.full_name(),
        });
    }
    Ok(())
}
