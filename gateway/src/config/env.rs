//! Environment variable readers.

use std::env;
use std::str::FromStr;

/// Read a variable, treating empty values as unset.
pub(super) fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Read the first non-empty variable among `names`.
pub(super) fn first_env_var(names: &[&str]) -> Option<(String, String)> {
    names
        .iter()
        .find_map(|name| env_var(name).map(|value| (name.to_string(), value)))
}

/// Parse a variable, failing on values that do not parse.
pub(super) fn parse_env_var<T>(names: &[&str]) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match first_env_var(names) {
        Some((name, value)) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: '{value}' ({e})")),
        None => Ok(None),
    }
}
