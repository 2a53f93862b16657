//! Attribute documentation extracted from schema docstrings.
//!
//! A schema's doc text may carry an attribute section describing its fields.
//! Three layouts are recognized:
//!
//! ```text
//! Google                 NumPy                    Sphinx
//!
//! Attributes:            Attributes               :ivar epochs: number of epochs
//!     epochs: number     ----------               :var lr: learning rate
//!         of epochs      epochs : int
//!     lr (float): rate       number of epochs
//! ```
//!
//! # Examples
//!
//! ```
//! use schemaclap_core::{DocstringStyle, parse_attribute_docs};
//!
//! let doc = "Training config.\n\nAttributes:\n    epochs: number of epochs\n    lr: learning rate\n";
//! let docs = parse_attribute_docs(doc, DocstringStyle::Google);
//! assert_eq!(docs.get("epochs").map(String::as_str), Some("number of epochs"));
//! assert_eq!(docs.len(), 2);
//! ```

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Layout of the attribute section in a schema docstring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocstringStyle {
    #[default]
    Google,
    Numpy,
    Sphinx,
}

static GOOGLE_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[A-Z][A-Za-z ]*:\s*$").expect("static regex must compile"));
static GOOGLE_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*(\([^)]*\))?\s*:\s*(?P<text>.*)$")
        .expect("static regex must compile")
});
static NUMPY_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*(:\s*.*)?$").expect("static regex must compile")
});
static SPHINX_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*:(?:ivar|var|cvar)\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*:\s*(?P<text>.*)$")
        .expect("static regex must compile")
});

/// Parses the attribute section of `doc` into a field-name → text mapping.
///
/// Only documented attributes are present. Continuation lines are joined
/// with single spaces.
pub fn parse_attribute_docs(doc: &str, style: DocstringStyle) -> BTreeMap<String, String> {
    let lines: Vec<&str> = doc.lines().collect();
    match style {
        DocstringStyle::Google => parse_google(&lines),
        DocstringStyle::Numpy => parse_numpy(&lines),
        DocstringStyle::Sphinx => parse_sphinx(&lines),
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn push_entry(docs: &mut BTreeMap<String, String>, entry: Option<(String, Vec<String>)>) {
    if let Some((name, parts)) = entry {
        let text = parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !text.is_empty() {
            docs.insert(name, text);
        }
    }
}

fn parse_google(lines: &[&str]) -> BTreeMap<String, String> {
    let mut docs = BTreeMap::new();
    let mut in_section = false;
    let mut section_indent = 0;
    let mut entry_indent: Option<usize> = None;
    let mut current: Option<(String, Vec<String>)> = None;

    for line in lines {
        let trimmed = line.trim();
        if !in_section {
            if matches!(trimmed, "Attributes:" | "Attributes :") {
                in_section = true;
                section_indent = indent_of(line);
                entry_indent = None;
            }
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }
        let indent = indent_of(line);
        if indent <= section_indent {
            push_entry(&mut docs, current.take());
            in_section = GOOGLE_SECTION.is_match(line) && trimmed.starts_with("Attributes");
            section_indent = indent;
            entry_indent = None;
            continue;
        }

        let level = *entry_indent.get_or_insert(indent);
        if indent == level {
            if let Some(caps) = GOOGLE_ENTRY.captures(trimmed) {
                push_entry(&mut docs, current.take());
                current = Some((caps["name"].to_string(), vec![caps["text"].to_string()]));
                continue;
            }
        }
        if let Some((_, parts)) = current.as_mut() {
            parts.push(trimmed.to_string());
        }
    }
    push_entry(&mut docs, current.take());
    docs
}

fn parse_numpy(lines: &[&str]) -> BTreeMap<String, String> {
    let mut docs = BTreeMap::new();
    let mut current: Option<(String, Vec<String>)> = None;
    let mut i = 0;

    while i < lines.len() {
        let is_header = lines[i].trim() == "Attributes"
            && lines
                .get(i + 1)
                .map(|next| {
                    let t = next.trim();
                    !t.is_empty() && t.chars().all(|c| c == '-')
                })
                .unwrap_or(false);
        if !is_header {
            i += 1;
            continue;
        }

        let base_indent = indent_of(lines[i]);
        i += 2;
        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim();
            let underline_follows = lines
                .get(i + 1)
                .map(|n| {
                    let t = n.trim();
                    !t.is_empty() && t.chars().all(|c| c == '-')
                })
                .unwrap_or(false);
            if !trimmed.is_empty() && indent_of(line) <= base_indent && underline_follows {
                break;
            }
            if trimmed.is_empty() {
                i += 1;
                continue;
            }
            if indent_of(line) <= base_indent {
                match NUMPY_ENTRY.captures(trimmed) {
                    Some(caps) => {
                        push_entry(&mut docs, current.take());
                        current = Some((caps["name"].to_string(), Vec::new()));
                    }
                    None => {
                        push_entry(&mut docs, current.take());
                    }
                }
            } else if let Some((_, parts)) = current.as_mut() {
                parts.push(trimmed.to_string());
            }
            i += 1;
        }
        push_entry(&mut docs, current.take());
    }
    docs
}

fn parse_sphinx(lines: &[&str]) -> BTreeMap<String, String> {
    let mut docs = BTreeMap::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in lines {
        let trimmed = line.trim();
        if let Some(caps) = SPHINX_ENTRY.captures(line) {
            push_entry(&mut docs, current.take());
            current = Some((caps["name"].to_string(), vec![caps["text"].to_string()]));
        } else if trimmed.is_empty() || trimmed.starts_with(':') {
            push_entry(&mut docs, current.take());
        } else if let Some((_, parts)) = current.as_mut() {
            parts.push(trimmed.to_string());
        }
    }
    push_entry(&mut docs, current.take());
    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_with_types_and_continuation() {
        let doc = "Loss configuration.

    Attributes:
        func (str): loss function
        from_logits: if True, interpret `y`
            as logits

    Examples:
        not_a_field: ignored
";
        let docs = parse_attribute_docs(doc, DocstringStyle::Google);
        assert_eq!(docs.get("func").map(String::as_str), Some("loss function"));
        assert_eq!(
            docs.get("from_logits").map(String::as_str),
            Some("if True, interpret `y` as logits")
        );
        assert!(!docs.contains_key("not_a_field"));
    }

    #[test]
    fn test_google_empty_section() {
        let doc = "Simple training config.\n\n    Attributes:\n    ";
        assert!(parse_attribute_docs(doc, DocstringStyle::Google).is_empty());
    }

    #[test]
    fn test_numpy_section() {
        let doc = "Obj.

Attributes
----------
foo : Foo
    foo attribute
bar
    bar attribute
    spanning lines

Notes
-----
nothing
";
        let docs = parse_attribute_docs(doc, DocstringStyle::Numpy);
        assert_eq!(docs.get("foo").map(String::as_str), Some("foo attribute"));
        assert_eq!(
            docs.get("bar").map(String::as_str),
            Some("bar attribute spanning lines")
        );
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_sphinx_fields() {
        let doc = "Logging.

:ivar level: logging level
:var filename: name of
    log file
:param ignored: not an attribute
";
        let docs = parse_attribute_docs(doc, DocstringStyle::Sphinx);
        assert_eq!(docs.get("level").map(String::as_str), Some("logging level"));
        assert_eq!(
            docs.get("filename").map(String::as_str),
            Some("name of log file")
        );
        assert!(!docs.contains_key("ignored"));
    }

    #[test]
    fn test_no_docstring() {
        assert!(parse_attribute_docs("", DocstringStyle::Google).is_empty());
    }
}
