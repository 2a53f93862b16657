//! Naming conventions shared by collection, option naming and reassembly.
//!
//! Three kinds of names flow through the conversion pipeline:
//!
//! - [`DottedName`]: a field and all of its ancestors joined with `.`
//!   (`bar.baz.c`). It is the join key between every stage.
//! - [`OptionName`]: what the user types (`--bar-baz-c`, `--x/--no-x`).
//! - [`ArgumentName`]: a valid identifier (`bar_baz_c`) used as the key of
//!   parsed keyword values.
//!
//! # Examples
//!
//! ```
//! use schemaclap_core::{DottedName, camel_to_snake, snake_to_kebab};
//!
//! assert_eq!(camel_to_snake("TrainingConfig"), "training_config");
//! assert_eq!(snake_to_kebab("bar.baz_qux"), "bar-baz-qux");
//!
//! let path = DottedName::from_parts(["bar", "baz", "c"]);
//! assert!(DottedName::from("bar.baz").is_prefix_of(&path));
//! assert!(!DottedName::from("ba").is_prefix_of(&path));
//! ```

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Converts a CamelCase name to snake_case.
///
/// ```
/// assert_eq!(schemaclap_core::camel_to_snake("FooBar"), "foo_bar");
/// ```
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Converts a snake_case or dotted name to kebab-case.
pub fn snake_to_kebab(name: &str) -> String {
    name.to_lowercase().replace(['_', '.'], "-")
}

/// Converts a kebab-case name to snake_case.
pub fn kebab_to_snake(name: &str) -> String {
    name.replace('-', "_")
}

/// Strips leading and trailing dashes from an option name.
///
/// ```
/// assert_eq!(schemaclap_core::strip_option_name("--foo-bar-"), "foo-bar");
/// assert_eq!(schemaclap_core::strip_option_name("-a"), "a");
/// ```
pub fn strip_option_name(name: &str) -> &str {
    name.trim_matches('-')
}

/// Full ancestor-qualified field name, segments joined by `.`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DottedName(String);

impl DottedName {
    /// Builds a dotted name from its segments.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = parts
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(".");
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the `.`-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Returns `true` if `self` equals `other` or is a dot-delimited prefix of it.
    pub fn is_prefix_of(&self, other: &DottedName) -> bool {
        match other.0.strip_prefix(self.0.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('.'),
            None => false,
        }
    }

    /// Returns every ancestor path from the longest (the name itself) to the
    /// shortest (the first segment).
    pub fn ancestors(&self) -> Vec<DottedName> {
        let parts: Vec<&str> = self.segments().collect();
        (1..=parts.len())
            .rev()
            .map(|i| DottedName::from_parts(&parts[..i]))
            .collect()
    }
}

impl fmt::Display for DottedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DottedName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DottedName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for DottedName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Command-line option name (`--foo-bar`, `-f`, or a dual `--x/--no-x` form).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionName(String);

impl OptionName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for dual boolean names such as `--on/--off`.
    pub fn is_dual(&self) -> bool {
        self.0.contains('/')
    }

    /// Splits a dual name into its enabling and disabling forms.
    ///
    /// ```
    /// use schemaclap_core::OptionName;
    ///
    /// let name = OptionName::from("--shout/--no-shout");
    /// assert_eq!(name.dual_parts(), Some(("--shout", "--no-shout")));
    /// assert_eq!(OptionName::from("--shout").dual_parts(), None);
    /// ```
    pub fn dual_parts(&self) -> Option<(&str, &str)> {
        self.0.split_once('/')
    }

    /// Normalizes a user supplied long name to start with two dashes.
    pub fn long(name: &str) -> Self {
        if name.is_empty() {
            return Self(String::new());
        }
        Self(format!("--{}", strip_option_name(name)))
    }
}

impl fmt::Display for OptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OptionName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OptionName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier-shaped key for a parsed option value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentName(String);

impl ArgumentName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArgumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArgumentName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ArgumentName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ArgumentName {
    fn borrow(&self) -> &str {
        &self.0
    }
}
