//! Environment-driven configuration helpers
//!
//! Crates in the workspace build their configuration from defaults and then
//! apply overrides read from environment variables through these helpers.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading configuration from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable is set but cannot be parsed
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Read a string variable, treating empty values as unset
pub fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a variable
///
/// Returns `Ok(None)` when the variable is unset.
pub fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = env_string(key) else {
        return Ok(None);
    };

    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        })
}

/// Read a boolean flag (`1/0`, `true/false`, `yes/no`, `on/off`)
pub fn env_flag(key: &str) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = env_string(key) else {
        return Ok(None);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable name; the process environment is shared.

    #[test]
    fn test_unset_is_none() {
        assert_eq!(env_parse::<u32>("AGENT_UTILS_TEST_UNSET_VAR"), Ok(None));
        assert_eq!(env_flag("AGENT_UTILS_TEST_UNSET_FLAG"), Ok(None));
    }

    #[test]
    fn test_parse_number() {
        // SAFETY: single-threaded access to a test-only variable
        unsafe { env::set_var("AGENT_UTILS_TEST_NUMBER", " 42 ") };
        assert_eq!(env_parse::<u32>("AGENT_UTILS_TEST_NUMBER"), Ok(Some(42)));
    }

    #[test]
    fn test_parse_error_reports_key() {
        unsafe { env::set_var("AGENT_UTILS_TEST_BAD_NUMBER", "many") };
        let err = env_parse::<u32>("AGENT_UTILS_TEST_BAD_NUMBER").unwrap_err();
        assert!(err.to_string().contains("AGENT_UTILS_TEST_BAD_NUMBER"));
    }

    #[test]
    fn test_flag_values() {
        unsafe { env::set_var("AGENT_UTILS_TEST_FLAG", "Yes") };
        assert_eq!(env_flag("AGENT_UTILS_TEST_FLAG"), Ok(Some(true)));

        unsafe { env::set_var("AGENT_UTILS_TEST_FLAG_BAD", "maybe") };
        assert!(env_flag("AGENT_UTILS_TEST_FLAG_BAD").is_err());
    }

    #[test]
    fn test_empty_string_is_unset() {
        unsafe { env::set_var("AGENT_UTILS_TEST_EMPTY", "   ") };
        assert_eq!(env_string("AGENT_UTILS_TEST_EMPTY"), None);
    }
}
