//! Column resolution against the source catalog.

use tracing::debug;

use crate::config::TableSpec;
use crate::error::Result;
use crate::session::SourceSession;

/// Transferable columns of a table in ordinal order, minus ignored ones.
///
/// May return an empty list; the caller decides whether that is fatal.
pub async fn resolve_columns<S>(source: &S, spec: &TableSpec) -> Result<Vec<String>>
where
    S: SourceSession + ?Sized,
{
    let all = source.table_columns(&spec.schema, &spec.table).await?;
    let total = all.len();

    let mut columns: Vec<String> = Vec::with_capacity(total);
    for col in all {
        if !spec.is_ignored(&col) && !columns.contains(&col) {
            columns.push(col);
        }
    }

    debug!(
        schema = %spec.schema,
        table = %spec.table,
        "Resolved {} of {} columns",
        columns.len(),
        total
    );
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conduit::ConduitWriter;
    use crate::error::CopyError;
    use async_trait::async_trait;

    struct Catalog(std::result::Result<Vec<&'static str>, &'static str>);

    #[async_trait]
    impl SourceSession for Catalog {
        async fn table_columns(&self, schema: &str, table: &str) -> Result<Vec<String>> {
            match &self.0 {
                Ok(cols) => Ok(cols.iter().map(|c| c.to_string()).collect()),
                Err(msg) => Err(CopyError::catalog(format!("{}.{}", schema, table), msg)),
            }
        }

        async fn copy_out(&self, _statement: &str, _writer: &mut ConduitWriter) -> Result<u64> {
            unreachable!("resolver never streams")
        }
    }

    #[tokio::test]
    async fn test_ignored_columns_are_removed_in_order() {
        let source = Catalog(Ok(vec!["id", "password_hash", "name", "email", "ssn"]));
        let spec = TableSpec::new("public", "users").with_ignore(["ssn", "password_hash"]);
        let cols = resolve_columns(&source, &spec).await.unwrap();
        assert_eq!(cols, vec!["id", "name", "email"]);
    }

    #[tokio::test]
    async fn test_everything_ignored_yields_empty_list() {
        let source = Catalog(Ok(vec!["id"]));
        let spec = TableSpec::new("public", "users").with_ignore(["id"]);
        assert!(resolve_columns(&source, &spec).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_failure_propagates() {
        let source = Catalog(Err("permission denied for schema secret"));
        let spec = TableSpec::new("secret", "keys");
        let err = resolve_columns(&source, &spec).await.unwrap_err();
        assert!(matches!(err, CopyError::Catalog { .. }));
        assert!(err.to_string().contains("secret.keys"));
    }
}
