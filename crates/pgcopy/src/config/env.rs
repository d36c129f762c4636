//! Environment variable expansion for configuration values.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static ENV_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("env reference pattern is valid")
});

/// Replace `${VAR}` and `$VAR` with the variable's value.
///
/// Unset variables expand to the empty string.
pub fn expand_env(value: &str) -> String {
    if !value.contains('$') {
        return value.to_string();
    }

    ENV_REF
        .replace_all(value, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            std::env::var(name).unwrap_or_default()
        })
        .into_owned()
}
