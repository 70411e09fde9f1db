//! Environment variable resolution for configuration values.
//!
//! [`LiteralOrEnv`] lets a configuration file hold either a literal value or
//! a reference to an environment variable, keeping secrets such as
//! facilitator API keys out of the file:
//!
//! ```json
//! {
//!   "url": "https://x402.org/facilitator",
//!   "headers": {
//!     "Authorization": "$FACILITATOR_AUTH",
//!     "X-Api-Key": "${FACILITATOR_API_KEY}"
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::str::FromStr;

/// A value resolved from an environment variable during deserialization.
///
/// - Literal: `"Bearer abc"`
/// - Simple env var: `"$FACILITATOR_AUTH"`
/// - Braced env var: `"${FACILITATOR_AUTH}"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Returns the variable name if `s` is `$VAR` or `${VAR}`.
fn env_var_name(s: &str) -> Option<&str> {
    if let Some(braced) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        return Some(braced);
    }
    let name = s.strip_prefix('$')?;
    let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then_some(name)
}

/// Resolves `s` to its literal value or the value of the variable it names.
pub fn resolve_env(s: &str) -> Result<String, String> {
    match env_var_name(s) {
        Some(name) => std::env::var(name).map_err(|_| {
            format!("Environment variable '{name}' not found (referenced as '{s}')")
        }),
        None => Ok(s.to_string()),
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = resolve_env(&s).map_err(serde::de::Error::custom)?;
        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {e}")))?;
        Ok(LiteralOrEnv(parsed))
    }
}

impl<T: Serialize> Serialize for LiteralOrEnv<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_syntax() {
        assert_eq!(env_var_name("$API_KEY"), Some("API_KEY"));
        assert_eq!(env_var_name("${API_KEY}"), Some("API_KEY"));
        assert_eq!(env_var_name("Bearer $API_KEY"), None);
        assert_eq!(env_var_name("$"), None);
        assert_eq!(env_var_name("$A-B"), None);
    }

    #[test]
    fn test_literal_passes_through() {
        let value: LiteralOrEnv<String> = serde_json::from_str("\"Bearer abc\"").unwrap();
        assert_eq!(value.inner(), "Bearer abc");
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let err = serde_json::from_str::<LiteralOrEnv<String>>("\"${X402_TYPES_SURELY_UNSET}\"")
            .unwrap_err();
        assert!(err.to_string().contains("X402_TYPES_SURELY_UNSET"));
    }

    #[test]
    fn test_resolves_present_variable() {
        // PATH is set in every test environment.
        let expected = std::env::var("PATH").unwrap();
        let value: LiteralOrEnv<String> = serde_json::from_str("\"$PATH\"").unwrap();
        assert_eq!(value.into_inner(), expected);
    }
}
