//! Reassembling parsed keyword values into nested model data.
//!
//! Flat values keyed by argument name are renamed to their dotted names,
//! unflattened into nested mappings, and the columns collected for unpacked
//! `list<Schema>` fields are regrouped into rows:
//!
//! ```text
//! {"foos": {"a": [2, 3], "b": [false]}}  ->  {"foos": [{"a": 2, "b": false}, {"a": 3}]}
//! ```

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use schemaclap_core::{DottedName, Schema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::fields::NameMapping;
use crate::options::Kwargs;

/// Removes this model's values from `kwargs`, keyed by dotted name.
///
/// `null` values are dropped so the schema engine applies the default.
pub fn parse_options(kwargs: &mut Kwargs, mapping: &NameMapping) -> BTreeMap<DottedName, Value> {
    mapping
        .arguments
        .iter()
        .filter_map(|(argument, dotted)| {
            kwargs
                .remove(argument.as_str())
                .filter(|value| !value.is_null())
                .map(|value| (dotted.clone(), value))
        })
        .collect()
}

/// Builds nested mappings from dotted names.
///
/// # Errors
///
/// Returns [`Error::EmptyKey`] if a dotted name has an empty segment.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use schemaclap::unflatten;
/// use schemaclap_core::DottedName;
/// use serde_json::json;
///
/// let flat = BTreeMap::from([
///     (DottedName::from("a"), json!(1)),
///     (DottedName::from("bar.baz.c"), json!("x")),
/// ]);
/// assert_eq!(unflatten(flat).unwrap(), json!({"a": 1, "bar": {"baz": {"c": "x"}}}));
/// ```
pub fn unflatten(flat: BTreeMap<DottedName, Value>) -> Result<Value> {
    let mut root = Map::new();
    for (dotted, value) in flat {
        let segments: Vec<&str> = dotted.segments().collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(Error::EmptyKey(dotted.to_string()));
        }
        insert_path(&mut root, &segments, value);
    }
    Ok(Value::Object(root))
}

/// A scalar already sitting where a mapping is needed is replaced.
fn insert_path(node: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            node.insert((*leaf).to_string(), value);
        }
        [head, rest @ ..] => {
            let slot = node
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(child) = slot {
                insert_path(child, rest, value);
            }
        }
    }
}

/// Transposes columns into rows.
///
/// Row `i` holds every column's `i`-th element; a short column leaves its
/// key out of the trailing rows. Nested mappings of columns are transposed
/// recursively.
///
/// ```
/// use schemaclap::pack_columns;
/// use serde_json::json;
///
/// let columns = json!({"a": [1, 2], "b": [true]});
/// let rows = pack_columns(columns.as_object().unwrap());
/// assert_eq!(rows, vec![json!({"a": 1, "b": true}), json!({"a": 2})]);
/// ```
pub fn pack_columns(columns: &Map<String, Value>) -> Vec<Value> {
    let columns: Vec<(&String, Vec<Value>)> = columns
        .iter()
        .map(|(key, column)| {
            let cells = match column {
                Value::Array(cells) => cells.clone(),
                Value::Object(nested) => pack_columns(nested),
                // Forwarded defaults of repeatable options are always lists, so a
                // scalar here comes from hand-built kwargs and stands for one row.
                other => vec![other.clone()],
            };
            (key, cells)
        })
        .collect();

    let height = columns.iter().map(|(_, cells)| cells.len()).max().unwrap_or(0);
    (0..height)
        .map(|row| {
            let entries = columns
                .iter()
                .filter_map(|(key, cells)| cells.get(row).map(|cell| ((*key).clone(), cell.clone())))
                .collect();
            Value::Object(entries)
        })
        .collect()
}

fn lookup_mut<'a>(root: &'a mut Value, dotted: &DottedName) -> Option<&'a mut Value> {
    dotted
        .segments()
        .try_fold(root, |node, segment| node.as_object_mut()?.get_mut(segment))
}

fn remove_at(root: &mut Value, dotted: &DottedName) {
    let segments: Vec<&str> = dotted.segments().collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };
    let parent = parents
        .iter()
        .try_fold(&mut *root, |node, segment| node.as_object_mut()?.get_mut(*segment));
    if let Some(Value::Object(map)) = parent {
        map.remove(*leaf);
    }
}

/// Rebuilds nested raw data from this model's keyword values.
///
/// Unpacked columns become rows; an unpacked field with no rows is removed so
/// the schema engine applies its default. An explicitly empty list therefore
/// cannot be told apart from no value at all.
///
/// # Errors
///
/// Returns [`Error::EmptyKey`] for a malformed dotted name.
pub fn assemble(kwargs: &mut Kwargs, mapping: &NameMapping) -> Result<Value> {
    let flat = parse_options(kwargs, mapping);
    let mut data = unflatten(flat)?;

    for unpacked in &mapping.unpacked {
        let rows = match lookup_mut(&mut data, unpacked) {
            Some(Value::Object(columns)) => pack_columns(columns),
            _ => continue,
        };
        if rows.is_empty() {
            remove_at(&mut data, unpacked);
        } else if let Some(slot) = lookup_mut(&mut data, unpacked) {
            *slot = Value::Array(rows);
        }
    }
    Ok(data)
}

/// Builds validated models from keyword values.
///
/// Holds the name mapping captured when the options were built; every call
/// works on its own [`Kwargs`] and shares no mutable state.
#[derive(Debug)]
pub struct Validator<T> {
    schema: Arc<Schema>,
    mapping: Arc<NameMapping>,
    _model: PhantomData<fn() -> T>,
}

impl<T> Clone for Validator<T> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            mapping: Arc::clone(&self.mapping),
            _model: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Validator<T> {
    pub fn new(schema: Arc<Schema>, mapping: Arc<NameMapping>) -> Self {
        Self {
            schema,
            mapping,
            _model: PhantomData,
        }
    }

    pub fn mapping(&self) -> &NameMapping {
        &self.mapping
    }

    /// Consumes this model's values from `kwargs` and builds the model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the data does not satisfy the schema.
    pub fn extract(&self, kwargs: &mut Kwargs) -> Result<T> {
        let data = assemble(kwargs, &self.mapping)?;
        debug!(model = %self.schema.name, data = %data, "Validating assembled data");
        Ok(self.schema.instantiate(&data)?)
    }

    /// Builds the model without consuming anything from `kwargs`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the data does not satisfy the schema.
    pub fn validate(&self, kwargs: &Kwargs) -> Result<T> {
        let mut scratch = Kwargs::new();
        for argument in self.mapping.arguments.keys() {
            if let Some(value) = kwargs.get(argument.as_str()) {
                scratch.insert(argument.as_str(), value.clone());
            }
        }
        self.extract(&mut scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaclap_core::ArgumentName;
    use serde_json::json;

    fn mapping(entries: &[(&str, &str)], unpacked: &[&str]) -> NameMapping {
        NameMapping {
            arguments: entries
                .iter()
                .map(|(a, d)| (ArgumentName::from(*a), DottedName::from(*d)))
                .collect(),
            unpacked: unpacked.iter().map(|d| DottedName::from(*d)).collect(),
        }
    }

    #[test]
    fn test_parse_options_consumes_and_drops_null() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("bar_a", json!(1));
        kwargs.insert("bar_b", Value::Null);
        kwargs.insert("unrelated", json!("keep"));
        let map = mapping(&[("bar_a", "bar.a"), ("bar_b", "bar.b")], &[]);

        let flat = parse_options(&mut kwargs, &map);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[&DottedName::from("bar.a")], json!(1));
        assert!(!kwargs.contains_key("bar_a"));
        assert!(!kwargs.contains_key("bar_b"));
        assert_eq!(kwargs.get("unrelated"), Some(&json!("keep")));
    }

    #[test]
    fn test_unflatten_rejects_empty_segment() {
        let flat = BTreeMap::from([(DottedName::from("a..b"), json!(1))]);
        assert!(matches!(unflatten(flat), Err(Error::EmptyKey(_))));
    }

    #[test]
    fn test_pack_columns_pads_by_omission() {
        let columns = json!({"a": [2, 3], "b": [false]});
        let rows = pack_columns(columns.as_object().unwrap());
        assert_eq!(rows, vec![json!({"a": 2, "b": false}), json!({"a": 3})]);
    }

    #[test]
    fn test_pack_nested_columns() {
        let columns = json!({"a": [1, 2], "inner": {"x": ["p", "q"]}});
        let rows = pack_columns(columns.as_object().unwrap());
        assert_eq!(
            rows,
            vec![
                json!({"a": 1, "inner": {"x": "p"}}),
                json!({"a": 2, "inner": {"x": "q"}}),
            ]
        );
    }

    #[test]
    fn test_assemble_unpacked_rows() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("foos_a", json!([2, 3]));
        kwargs.insert("name", json!("x"));
        let map = mapping(&[("foos_a", "foos.a"), ("foos_b", "foos.b"), ("name", "name")], &["foos"]);
        let data = assemble(&mut kwargs, &map).unwrap();
        assert_eq!(data, json!({"foos": [{"a": 2}, {"a": 3}], "name": "x"}));
    }

    #[test]
    fn test_assemble_nested_unpacked_path() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("outer_foos_a", json!([1]));
        let map = mapping(&[("outer_foos_a", "outer.foos.a")], &["outer.foos"]);
        let data = assemble(&mut kwargs, &map).unwrap();
        assert_eq!(data, json!({"outer": {"foos": [{"a": 1}]}}));
    }

    #[test]
    fn test_assemble_removes_empty_unpacked_field() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("foos_a", json!([]));
        let map = mapping(&[("foos_a", "foos.a")], &["foos"]);
        let data = assemble(&mut kwargs, &map).unwrap();
        assert_eq!(data, json!({}));
    }
}
