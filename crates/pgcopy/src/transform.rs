//! Column transformation tokens and their SQL expansions.
//!
//! Built-in tokens match exactly (case-sensitive). Anything else is a custom
//! SQL fragment in which every `$1` is replaced by the column name. Fragments
//! are operator-supplied SQL and are used as-is.

/// Placeholder substituted by the column name in custom fragments.
pub const COLUMN_PLACEHOLDER: &str = "$1";

/// A parsed transformation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformation {
    /// Hex SHA-256 of the value's text form.
    Hash,
    /// Fixed `'***REDACTED***'` literal.
    Redact,
    /// `anon-` followed by the hex SHA-256.
    Anonymize,
    /// SQL `NULL`.
    Nullify,
    /// `COALESCE(col, NULL)`, i.e. the value unchanged.
    Default,
    /// Operator-supplied SQL with `$1` placeholders.
    Custom(String),
}

impl Transformation {
    /// Classify a token.
    pub fn parse(token: &str) -> Self {
        match token {
            "hash" => Self::Hash,
            "redact" => Self::Redact,
            "anonymize" => Self::Anonymize,
            "nullify" => Self::Nullify,
            "default" => Self::Default,
            custom => Self::Custom(custom.to_string()),
        }
    }

    /// SQL value expression for `column`.
    pub fn expand(&self, column: &str) -> String {
        match self {
            Self::Hash => format!("encode(sha256({}::text::bytea), 'hex')", column),
            Self::Redact => "'***REDACTED***'".to_string(),
            Self::Anonymize => format!("'anon-' || encode(sha256({}::text::bytea), 'hex')", column),
            Self::Nullify => "NULL".to_string(),
            // Literal expansion kept as-is; it does not look up the column's declared default.
            Self::Default => format!("COALESCE({}, NULL)", column),
            Self::Custom(fragment) => fragment.replace(COLUMN_PLACEHOLDER, column),
        }
    }
}

/// Expand `token` for `column`. Never fails.
pub fn expand_transformation(token: &str, column: &str) -> String {
    Transformation::parse(token).expand(column)
}
