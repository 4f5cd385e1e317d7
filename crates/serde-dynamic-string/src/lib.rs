//! A `String`-like wrapper that expands environment variable placeholders
//! before handing the result to the inner type's [`FromStr`] implementation.
//!
//! Two placeholder syntaxes are recognized, matching what the gateway's
//! configuration examples use interchangeably:
//!
//! - `{{ env.VAR_NAME }}` (whitespace around `env.VAR_NAME` is optional)
//! - `${VAR_NAME}`
//!
//! Both are expanded against [`std::env::var`]; a referenced variable that is
//! not set is an error, not a silent empty-string substitution, so that a
//! misconfigured deployment fails fast at startup rather than sending an
//! empty API key upstream.

use std::{fmt, ops::Deref, str::FromStr};

use regex::Regex;
use serde::{Deserialize, Deserializer, de};
use serde_with::{DeserializeAs, SerializeAs};
use std::sync::OnceLock;

fn brace_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex"))
}

fn dollar_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"))
}

/// Error returned when a referenced environment variable is missing, or the
/// expanded string fails to parse as `T`.
#[derive(Debug)]
pub enum DynamicStringError<E> {
    /// The placeholder referenced a variable that isn't set in the process
    /// environment.
    MissingEnvVar(String),
    /// Expansion succeeded but the inner type rejected the resulting string.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for DynamicStringError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEnvVar(name) => write!(f, "environment variable '{name}' is not set"),
            Self::Inner(err) => write!(f, "{err}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for DynamicStringError<E> {}

/// Expands every `{{ env.VAR }}` / `${VAR}` placeholder in `input` against
/// the process environment.
fn expand(input: &str) -> Result<String, DynamicStringError<std::convert::Infallible>> {
    let mut missing = None;

    let expanded = brace_pattern().replace_all(input, |caps: &regex::Captures<'_>| {
        let name = &caps[1];

        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    if let Some(name) = missing {
        return Err(DynamicStringError::MissingEnvVar(name));
    }

    let expanded = dollar_pattern().replace_all(&expanded, |caps: &regex::Captures<'_>| {
        let name = &caps[1];

        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    if let Some(name) = missing {
        return Err(DynamicStringError::MissingEnvVar(name));
    }

    Ok(expanded.into_owned())
}

/// A value of type `T` that was parsed from a string after environment
/// placeholder expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DynamicString<T>(T);

impl<T> DynamicString<T> {
    /// Unwraps the expanded, parsed inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for DynamicString<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: FromStr> FromStr for DynamicString<T> {
    type Err = DynamicStringError<T::Err>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expanded = expand(s).map_err(|err| match err {
            DynamicStringError::MissingEnvVar(name) => DynamicStringError::MissingEnvVar(name),
            DynamicStringError::Inner(never) => match never {},
        })?;

        expanded.parse::<T>().map(DynamicString).map_err(DynamicStringError::Inner)
    }
}

impl<'de, T> Deserialize<'de> for DynamicString<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DynamicString::from_str(&raw).map_err(de::Error::custom)
    }
}

/// A [`serde_with`] adapter so fields can stay typed as the plain inner type
/// while opting into placeholder expansion via `#[serde_as(as = "DynamicStringAs")]`.
pub struct DynamicStringAs;

impl<'de, T> DeserializeAs<'de, T> for DynamicStringAs
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize_as<D>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
    {
        DynamicString::<T>::deserialize(deserializer).map(DynamicString::into_inner)
    }
}

impl<T> SerializeAs<T> for DynamicStringAs
where
    T: fmt::Display,
{
    fn serialize_as<S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_brace_env_syntax() {
        temp_env::with_var("DYNAMIC_STRING_TEST_A", Some("hello"), || {
            let value: DynamicString<String> = "{{ env.DYNAMIC_STRING_TEST_A }}".parse().unwrap();
            assert_eq!(value.into_inner(), "hello");
        });
    }

    #[test]
    fn expands_dollar_brace_syntax() {
        temp_env::with_var("DYNAMIC_STRING_TEST_B", Some("world"), || {
            let value: DynamicString<String> = "${DYNAMIC_STRING_TEST_B}".parse().unwrap();
            assert_eq!(value.into_inner(), "world");
        });
    }

    #[test]
    fn passes_through_plain_strings() {
        let value: DynamicString<String> = "sk-plain-value".parse().unwrap();
        assert_eq!(value.into_inner(), "sk-plain-value");
    }

    #[test]
    fn errors_on_missing_variable() {
        temp_env::with_var_unset("DYNAMIC_STRING_TEST_MISSING", || {
            let result: Result<DynamicString<String>, _> = "{{ env.DYNAMIC_STRING_TEST_MISSING }}".parse();
            assert!(result.is_err());
        });
    }

    #[test]
    fn parses_inner_numeric_type_after_expansion() {
        temp_env::with_var("DYNAMIC_STRING_TEST_PORT", Some("8080"), || {
            let value: DynamicString<u16> = "{{ env.DYNAMIC_STRING_TEST_PORT }}".parse().unwrap();
            assert_eq!(value.into_inner(), 8080);
        });
    }
}
