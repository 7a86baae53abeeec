use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};

use cfg_core::{CfgError, Problem, Problems};
use cfg_parser::XmlElementNode;
use tracing::trace;

use crate::collection::{BindContext, CollectionTally, SharedBinding};
use crate::entities::decode;
use crate::environment::ENVIRONMENTS_ELEMENT;
use crate::placeholder::{substitute, Parameters};
use crate::registry::describe;
use crate::schema::{normalize_name, SchemaDescriptor};
use crate::CfgNode;

pub(crate) const ADD_ELEMENT: &str = "add";

/// A freshly loaded collection element, before its hooks have run.
pub(crate) struct LoadedNode<T> {
    pub value: T,
    pub hits: HashSet<String>,
    pub unique: BTreeMap<String, String>,
    pub problems: Problems,
}

#[derive(Debug, Default)]
pub(crate) struct BoundAttributes {
    /// Keys of the scalar fields that were set from the document.
    pub hits: HashSet<String>,
    /// Final rendered values of unique fields, by key.
    pub unique: BTreeMap<String, String>,
}

pub(crate) fn load_node<T: CfgNode>(
    node: &XmlElementNode,
    parent: Option<&str>,
    parameters: &Parameters,
) -> LoadedNode<T> {
    let descriptor = describe::<T>();
    let mut value = T::default();
    descriptor.apply_defaults(&mut value);
    let mut problems = Problems::new();
    let bound = bind_node(&descriptor, &mut value, node, parent, parameters, &mut problems);
    LoadedNode {
        value,
        hits: bound.hits,
        unique: bound.unique,
        problems,
    }
}

/// Binds the attributes and then the collection children of `node` onto
/// `target`. `parent` is the name of the enclosing wrapper, `None` at the
/// document root.
pub(crate) fn bind_node<T: CfgNode>(
    descriptor: &SchemaDescriptor<T>,
    target: &mut T,
    node: &XmlElementNode,
    parent: Option<&str>,
    parameters: &Parameters,
    problems: &mut Problems,
) -> BoundAttributes {
    let bound = bind_attributes(descriptor, target, node, parent, parameters, problems);
    bind_collections(descriptor, target, node, parent, parameters, problems);
    bound
}

/// Substitutes placeholders, then decodes entities. Unresolved keys are
/// reported once for the whole attribute and left in the text.
pub(crate) fn resolve_attribute_text<'a>(
    text: &'a str,
    parameters: &Parameters,
    problems: &mut Problems,
) -> Cow<'a, str> {
    let substitution = substitute(text, parameters);
    if !substitution.missing.is_empty() {
        problems.push(Problem::MissingPlaceholderValues {
            keys: substitution.missing,
        });
    }
    match substitution.value {
        Cow::Borrowed(text) => decode(text),
        Cow::Owned(text) if text.contains('&') => Cow::Owned(decode(&text).into_owned()),
        Cow::Owned(text) => Cow::Owned(text),
    }
}

fn bind_attributes<T: CfgNode>(
    descriptor: &SchemaDescriptor<T>,
    target: &mut T,
    node: &XmlElementNode,
    parent: Option<&str>,
    parameters: &Parameters,
    problems: &mut Problems,
) -> BoundAttributes {
    let mut bound = BoundAttributes::default();

    for attribute in &node.attributes {
        let key = normalize_name(&attribute.name);
        let Some(field) = descriptor.scalar(&key) else {
            problems.push(Problem::InvalidAttribute {
                parent: parent.map(str::to_string),
                node: node.name.clone(),
                attribute: attribute.name.clone(),
                valid: descriptor.scalar_keys().join(", "),
            });
            continue;
        };

        let text = resolve_attribute_text(&attribute.value, parameters, problems);
        let converted = field.convert(&text).and_then(|value| {
            if field.set(target, value) {
                Ok(())
            } else {
                Err(CfgError::new(
                    "VALUE_TYPE_MISMATCH",
                    format!("The value does not fit the '{}' field.", field.name()),
                ))
            }
        });
        if let Err(error) = converted {
            problems.push(Problem::SettingValue {
                attribute: attribute.name.clone(),
                value: text.into_owned(),
                parent: parent.map(str::to_string),
                node: node.name.clone(),
                message: error.message,
            });
            continue;
        }
        bound.hits.insert(key.clone());

        // Setters may normalize, so checks run against the stored value.
        let Some(stored) = field.get(target) else {
            continue;
        };
        let rendered = stored.to_string();
        if let Some(domain) = field.domain() {
            if !domain.contains(&rendered) {
                problems.push(match parent {
                    Some(parent) => Problem::ValueNotInDomain {
                        parent: parent.to_string(),
                        node: node.name.clone(),
                        attribute: attribute.name.clone(),
                        value: rendered.clone(),
                        domain: domain.to_string(),
                    },
                    None => Problem::RootValueNotInDomain {
                        attribute: attribute.name.clone(),
                        value: rendered.clone(),
                        domain: domain.to_string(),
                    },
                });
            }
        }
        if field.is_unique() {
            bound.unique.insert(key, rendered);
        }
    }

    for field in descriptor.fields() {
        if field.is_required() && !field.is_collection() && !bound.hits.contains(field.key()) {
            problems.push(Problem::MissingAttribute {
                parent: parent.map(str::to_string),
                node: node.name.clone(),
                attribute: field.key().to_string(),
            });
        }
    }

    bound
}

fn bind_collections<T: CfgNode>(
    descriptor: &SchemaDescriptor<T>,
    target: &mut T,
    node: &XmlElementNode,
    parent: Option<&str>,
    parameters: &Parameters,
    problems: &mut Problems,
) {
    let mut tallies: HashMap<String, CollectionTally> = HashMap::new();

    for child in &node.children {
        let key = normalize_name(&child.name);
        let Some((field, binder)) = descriptor
            .collection(&key)
            .and_then(|field| Some((field, field.binder()?)))
        else {
            if parent.is_none() && child.name == ENVIRONMENTS_ELEMENT {
                continue;
            }
            problems.push(match parent {
                Some(parent) => Problem::InvalidNestedElement {
                    parent: parent.to_string(),
                    node: node.name.clone(),
                    element: child.name.clone(),
                },
                None => Problem::InvalidElement {
                    node: node.name.clone(),
                    element: child.name.clone(),
                },
            });
            continue;
        };
        trace!(
            collection = %key,
            element = binder.element_type(),
            adds = child.children.len(),
            "binding collection"
        );
        let context = BindContext {
            owner: &node.name,
            parameters,
            shared: field.shared_key().map(|shared_key| SharedBinding {
                key: shared_key,
                default: field.shared_default(),
            }),
        };
        let tally = tallies.entry(key).or_default();
        tally.element_hit = true;
        binder.bind(target, child, &context, tally, problems);
    }

    for key in descriptor.collection_keys() {
        let Some(field) = descriptor.field(key) else {
            continue;
        };
        let tally = tallies.remove(key).unwrap_or_default();
        if tally.count > 1 {
            if let Some(binder) = field.binder() {
                report_duplicates(key, &binder.unique_keys(), &tally, problems);
            }
        } else if tally.count == 0 && field.is_required() {
            problems.push(if tally.element_hit && !tally.add_hit {
                Problem::MissingAddElement {
                    element: key.clone(),
                }
            } else {
                match parent {
                    Some(parent) => Problem::MissingNestedElement {
                        parent: parent.to_string(),
                        node: node.name.clone(),
                        element: key.clone(),
                    },
                    None => Problem::MissingElement {
                        node: node.name.clone(),
                        element: key.clone(),
                    },
                }
            });
        }
        problems.nest(tally.children);
    }
}

/// One problem per repeated value of each unique key, in order of first
/// appearance.
fn report_duplicates(
    collection: &str,
    unique_keys: &[String],
    tally: &CollectionTally,
    problems: &mut Problems,
) {
    for unique_key in unique_keys {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for value in tally
            .unique_values
            .iter()
            .filter_map(|values| values.get(unique_key))
        {
            match counts.iter_mut().find(|(seen, _)| *seen == value.as_str()) {
                Some((_, count)) => *count += 1,
                None => counts.push((value.as_str(), 1)),
            }
        }
        for (value, count) in counts {
            if count > 1 {
                problems.push(Problem::DuplicateSet {
                    key: unique_key.clone(),
                    value: value.to_string(),
                    element: collection.to_string(),
                });
            }
        }
    }
}
