//! Option and argument names for collected fields.

use std::collections::BTreeMap;

use schemaclap_core::{
    ArgumentName, DottedName, OptionName, kebab_to_snake, snake_to_kebab, strip_option_name,
};

use crate::error::{Error, Result};

/// Derives the option name of a field.
///
/// The longest ancestor of `dotted` (the name itself included) with an entry
/// in `aliases` wins; the remaining segments are appended to the alias as a
/// kebab-case suffix. Without a matching alias the name is built from the
/// prefix and the dotted name. Boolean fields get a dual `--x/--no-x` name
/// unless the alias already is one.
///
/// # Errors
///
/// Returns [`Error::InvalidBooleanAlias`] if a dual alias would need a suffix.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use schemaclap::option_name;
/// use schemaclap_core::{DottedName, OptionName};
///
/// let aliases = BTreeMap::from([(DottedName::from("bar"), OptionName::from("--baz"))]);
/// let name = option_name(&DottedName::from("bar.a_b"), &aliases, false, None).unwrap();
/// assert_eq!(name.as_str(), "--baz-a-b");
///
/// let flag = option_name(&DottedName::from("early_stopping"), &BTreeMap::new(), true, None).unwrap();
/// assert_eq!(flag.as_str(), "--early-stopping/--no-early-stopping");
///
/// let prefixed = option_name(&DottedName::from("level"), &BTreeMap::new(), false, Some("--log")).unwrap();
/// assert_eq!(prefixed.as_str(), "--log-level");
/// ```
pub fn option_name(
    dotted: &DottedName,
    aliases: &BTreeMap<DottedName, OptionName>,
    is_boolean: bool,
    prefix: Option<&str>,
) -> Result<OptionName> {
    let aliased = dotted
        .ancestors()
        .into_iter()
        .find_map(|ancestor| aliases.get(&ancestor).map(|alias| (ancestor, alias)));

    let name = match aliased {
        Some((ancestor, alias)) => {
            let depth = ancestor.segments().count();
            let suffix: Vec<&str> = dotted.segments().skip(depth).collect();
            if suffix.is_empty() {
                alias.clone()
            } else if alias.is_dual() {
                return Err(Error::InvalidBooleanAlias {
                    field: dotted.clone(),
                    ancestor,
                    alias: alias.clone(),
                    suffix: suffix.join("."),
                });
            } else {
                OptionName::from(format!("{alias}-{}", snake_to_kebab(&suffix.join("-"))))
            }
        }
        None => match prefix.map(strip_option_name).filter(|p| !p.is_empty()) {
            Some(prefix) => OptionName::from(format!(
                "--{}",
                snake_to_kebab(&format!("{prefix}.{dotted}"))
            )),
            None => OptionName::from(format!("--{}", snake_to_kebab(dotted.as_str()))),
        },
    };

    if is_boolean && !name.is_dual() {
        let base = strip_option_name(name.as_str());
        return Ok(OptionName::from(format!("--{base}/--no-{base}")));
    }
    Ok(name)
}

/// Derives the argument name of a field: the snake-cased prefix followed by
/// the dotted name with `.` replaced by `_`.
///
/// ```
/// use schemaclap::argument_name;
/// use schemaclap_core::DottedName;
///
/// assert_eq!(argument_name(&DottedName::from("bar.baz"), None).as_str(), "bar_baz");
/// assert_eq!(argument_name(&DottedName::from("level"), Some("--my-log")).as_str(), "my_log_level");
/// ```
pub fn argument_name(dotted: &DottedName, prefix: Option<&str>) -> ArgumentName {
    let base = dotted.segments().collect::<Vec<_>>().join("_");
    match prefix.map(strip_option_name).filter(|p| !p.is_empty()) {
        Some(prefix) => ArgumentName::from(format!("{}_{base}", kebab_to_snake(prefix))),
        None => ArgumentName::from(base),
    }
}
