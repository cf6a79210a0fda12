//! Environment variable loading utilities
//!
//! Thin wrappers over `std::env` that turn unreadable or unparsable values
//! into [`DispatchError::Config`] instead of silently ignoring them.

use crate::{DispatchError, Result};
use std::env;
use std::str::FromStr;

/// Load an environment variable as a string
///
/// # Returns
///
/// * `Ok(Some(value))` if variable exists
/// * `Ok(None)` if variable doesn't exist
/// * `Err` if variable exists but has invalid UTF-8
pub fn get_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(DispatchError::Config(format!(
            "Environment variable {} contains invalid UTF-8",
            key
        ))),
    }
}

/// Load an environment variable with a default value
pub fn get_env_or(key: &str, default: impl Into<String>) -> Result<String> {
    Ok(get_env(key)?.unwrap_or_else(|| default.into()))
}

/// Load and parse an environment variable
///
/// ```rust,ignore
/// let port: Option<u16> = get_env_parse("DISPATCH_SERVER_PORT")?;
/// ```
pub fn get_env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env(key)? {
        Some(val) => {
            let parsed = val.trim().parse::<T>().map_err(|e| {
                DispatchError::Config(format!(
                    "Failed to parse environment variable {}: {}",
                    key, e
                ))
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Load a boolean environment variable
///
/// Recognizes "true", "1", "yes", "on" and "false", "0", "no", "off",
/// case-insensitively.
pub fn get_env_bool(key: &str) -> Result<Option<bool>> {
    match get_env(key)? {
        Some(val) => {
            let result = match val.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => {
                    return Err(DispatchError::Config(format!(
                        "Invalid boolean value for {}: {}",
                        key, val
                    )))
                }
            };
            Ok(Some(result))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_missing() {
        assert_eq!(get_env("DISPATCH_TEST_MISSING_VAR_12345").unwrap(), None);
        assert_eq!(
            get_env_or("DISPATCH_TEST_MISSING_VAR_12345", "default").unwrap(),
            "default"
        );
    }

    #[test]
    fn test_get_env_parse() {
        env::set_var("DISPATCH_TEST_NUMBER", " 42 ");
        let result: Option<u16> = get_env_parse("DISPATCH_TEST_NUMBER").unwrap();
        assert_eq!(result, Some(42));
        env::remove_var("DISPATCH_TEST_NUMBER");
    }

    #[test]
    fn test_get_env_parse_invalid() {
        env::set_var("DISPATCH_TEST_INVALID_NUMBER", "not_a_number");
        let result: Result<Option<u64>> = get_env_parse("DISPATCH_TEST_INVALID_NUMBER");
        assert!(matches!(result, Err(DispatchError::Config(_))));
        env::remove_var("DISPATCH_TEST_INVALID_NUMBER");
    }

    #[test]
    fn test_get_env_bool() {
        env::set_var("DISPATCH_TEST_BOOL_ON", "Yes");
        env::set_var("DISPATCH_TEST_BOOL_OFF", "0");
        env::set_var("DISPATCH_TEST_BOOL_BAD", "maybe");

        assert_eq!(get_env_bool("DISPATCH_TEST_BOOL_ON").unwrap(), Some(true));
        assert_eq!(get_env_bool("DISPATCH_TEST_BOOL_OFF").unwrap(), Some(false));
        assert!(get_env_bool("DISPATCH_TEST_BOOL_BAD").is_err());
        assert_eq!(get_env_bool("DISPATCH_TEST_BOOL_MISSING").unwrap(), None);

        env::remove_var("DISPATCH_TEST_BOOL_ON");
        env::remove_var("DISPATCH_TEST_BOOL_OFF");
        env::remove_var("DISPATCH_TEST_BOOL_BAD");
    }
}
