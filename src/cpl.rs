//! Common Portability Library helpers
//!
//! [`CslStringList`] is the `KEY=VALUE` list used throughout the drivers for
//! creation options, metadata domains and ENVI header entries.

use std::fmt::{Debug, Formatter};

use crate::errors::{GdalError, Result};

/// An ordered list of `KEY=VALUE` pairs.
///
/// Keys are compared case-insensitively, values are kept verbatim. Setting an
/// existing key replaces its value in place, so the original order is preserved.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CslStringList {
    entries: Vec<(String, String)>,
}

impl CslStringList {
    /// Creates an empty string list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `value` to `name`.
    ///
    /// Overwrites duplicate `name`s.
    ///
    /// Returns `Ok<()>` on success, `Err<GdalError>` if `name` has non alphanumeric
    /// characters, or `value` has newline characters.
    pub fn set_name_value(&mut self, name: &str, value: &str) -> Result<()> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(GdalError::BadArgument(format!(
                "Invalid characters in name: '{}'",
                name
            )));
        }
        if value.contains(|c| c == '\n' || c == '\r' || c == '\0') {
            return Err(GdalError::BadArgument(format!(
                "Invalid characters in value: '{}'",
                value.escape_debug()
            )));
        }
        self.set_unchecked(name, value);
        Ok(())
    }

    /// Same as [`set_name_value`](Self::set_name_value) but without validation,
    /// for keys coming from file formats (ENVI headers, PNG text chunks).
    pub(crate) fn set_unchecked(&mut self, name: &str, value: &str) {
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    /// Looks up the value corresponding to `key`.
    pub fn fetch_name_value(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Looks up the value corresponding to `key`, returning `default` if absent.
    pub fn fetch_name_value_def<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.fetch_name_value(key).unwrap_or(default)
    }

    /// Removes `key` from the list, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.entries.remove(idx).1)
    }

    /// Determine the number of entries in the list.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Determine if the list has any values
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an iterator over the name/value elements of the list.
    pub fn iter(&self) -> CslStringListIterator<'_> {
        CslStringListIterator {
            inner: self.entries.iter(),
        }
    }
}

/// State for iterator over [`CslStringList`] entries.
pub struct CslStringListIterator<'a> {
    inner: std::slice::Iter<'a, (String, String)>,
}

impl<'a> Iterator for CslStringListIterator<'a> {
    type Item = (String, String);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().cloned()
    }
}

impl Debug for CslStringList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (k, v) in self.iter() {
            f.write_fmt(format_args!("{k}={v}\n"))?;
        }
        Ok(())
    }
}

/// Convenience shorthand for specifying an empty `CslStringList` to functions accepting
/// `Into<CslStringList>`.
impl From<()> for CslStringList {
    fn from(_: ()) -> Self {
        CslStringList::default()
    }
}

/// Creates a [`CslStringList`] from a slice of _key_/_value_ tuples.
impl<const N: usize> From<&[(&str, &str); N]> for CslStringList {
    fn from(pairs: &[(&str, &str); N]) -> Self {
        let mut result = Self::default();
        for (k, v) in pairs {
            result.set_name_value(k, v).expect("valid key/value pair");
        }
        result
    }
}

impl<const N: usize> From<[(&str, &str); N]> for CslStringList {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self::from(&pairs)
    }
}
