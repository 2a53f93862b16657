//! Flattening a schema tree into leaf field descriptors.
//!
//! Nested schemas (directly or behind an optional wrapper) are expanded into
//! their fields with the ancestor chain extended. Schema members of a union
//! are expanded too, and the union field is still yielded as a leaf of its
//! own. With unpacking enabled, a `list<Schema>` field is replaced by the
//! fields of its item schema, each marked as repeatable; unpacking is only
//! applied one level deep.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use schemaclap_core::{DocstringStyle, DottedName, FieldInfo, Schema};
use tracing::debug;

use crate::error::{Error, Result};

/// One leaf of the flattened schema.
#[derive(Debug, Clone)]
pub struct FieldDescriptor<'a> {
    /// Local field name.
    pub name: String,
    /// Ancestors and name joined by `.`.
    pub dotted_name: DottedName,
    /// Names of the ancestor fields, outermost first.
    pub parents: Vec<String>,
    pub field: &'a FieldInfo,
    /// Help text resolved from the declaring schema's docstring.
    pub documentation: Option<String>,
    /// Dotted name of the unpacked `list<Schema>` field this leaf came from.
    pub unpacked_from: Option<DottedName>,
}

impl FieldDescriptor<'_> {
    /// Unpacked leaves are repeatable options.
    pub fn is_multiple(&self) -> bool {
        self.unpacked_from.is_some()
    }
}

struct Walk {
    parse_docstring: bool,
    style: DocstringStyle,
    unpack_list: bool,
}

/// Collects the leaf fields of `schema` in declaration order, depth first.
///
/// Descriptors whose dotted name equals or lies under one of `exclude` are
/// dropped after the traversal.
///
/// # Errors
///
/// Returns [`Error::UnnamedField`] if a schema declares a field with an
/// empty name.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use schemaclap::collect_fields;
/// use schemaclap_core::{DocstringStyle, FieldInfo, FieldShape, Schema};
///
/// let baz = Schema::new("Baz").field(FieldInfo::new("c", FieldShape::integer()));
/// let bar = Schema::new("Bar")
///     .field(FieldInfo::new("a", FieldShape::string()))
///     .field(FieldInfo::new("baz", FieldShape::nested(baz)));
///
/// let fields = collect_fields(&bar, &BTreeSet::new(), true, DocstringStyle::Google, false).unwrap();
/// let names: Vec<&str> = fields.iter().map(|f| f.dotted_name.as_str()).collect();
/// assert_eq!(names, ["a", "baz.c"]);
/// assert_eq!(fields[1].parents, ["baz"]);
/// ```
pub fn collect_fields<'a>(
    schema: &'a Schema,
    exclude: &BTreeSet<DottedName>,
    parse_docstring: bool,
    style: DocstringStyle,
    unpack_list: bool,
) -> Result<Vec<FieldDescriptor<'a>>> {
    let walk = Walk {
        parse_docstring,
        style,
        unpack_list,
    };
    let mut fields = Vec::new();
    walk.schema(schema, &[], None, &mut fields)?;

    let mut seen = HashSet::new();
    fields.retain(|descriptor| {
        let fresh = seen.insert(descriptor.dotted_name.clone());
        if !fresh {
            debug!(field = %descriptor.dotted_name, "Dropping duplicate field path from union member");
        }
        fresh
    });

    debug!(schema = %schema.name, fields = fields.len(), "Collected fields");
    Ok(exclude_fields(fields, exclude))
}

/// Drops descriptors whose dotted name equals or lies under an excluded name.
pub fn exclude_fields<'a>(
    fields: Vec<FieldDescriptor<'a>>,
    exclude: &BTreeSet<DottedName>,
) -> Vec<FieldDescriptor<'a>> {
    fields
        .into_iter()
        .filter(|d| !exclude.iter().any(|e| e.is_prefix_of(&d.dotted_name)))
        .collect()
}

impl Walk {
    fn schema<'a>(
        &self,
        schema: &'a Schema,
        parents: &[String],
        unpacked_from: Option<&DottedName>,
        out: &mut Vec<FieldDescriptor<'a>>,
    ) -> Result<()> {
        let docs = if self.parse_docstring {
            schema.attribute_docs(self.style)
        } else {
            BTreeMap::new()
        };

        for field in &schema.fields {
            if field.name.is_empty() {
                return Err(Error::UnnamedField(parents.join(".")));
            }
            let mut path = parents.to_vec();
            path.push(field.name.clone());
            let dotted = DottedName::from_parts(&path);

            if let Some(nested) = field.shape.nested_schema() {
                self.schema(nested, &path, unpacked_from, out)?;
                continue;
            }

            if self.unpack_list && unpacked_from.is_none() {
                if let Some(item) = field.shape.list_item_schema() {
                    self.schema(item, &path, Some(&dotted), out)?;
                    continue;
                }
            }

            for member in field.shape.union_schemas() {
                self.schema(member, &path, unpacked_from, out)?;
            }

            out.push(FieldDescriptor {
                name: field.name.clone(),
                dotted_name: dotted,
                parents: parents.to_vec(),
                field,
                documentation: docs.get(&field.name).cloned(),
                unpacked_from: unpacked_from.cloned(),
            });
        }
        Ok(())
    }
}
