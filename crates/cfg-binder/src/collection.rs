use std::any::TypeId;
use std::collections::{BTreeMap, HashSet};

use cfg_core::{CfgValue, FieldValue, Problem, Problems, ValueType};
use cfg_parser::XmlElementNode;

use crate::loader::{load_node, resolve_attribute_text, ADD_ELEMENT};
use crate::placeholder::Parameters;
use crate::registry::{describe, is_describing};
use crate::schema::{normalize_name, short_type_name, FieldSpec};
use crate::CfgNode;

/// Result of asking a nested schema for the type of a shared property.
pub(crate) enum SharedLookup {
    Found(ValueType),
    Missing,
    /// The nested type is still being described further up the stack.
    Deferred,
}

pub(crate) struct SharedBinding<'a> {
    pub key: &'a str,
    pub default: Option<&'a CfgValue>,
}

pub(crate) struct BindContext<'a> {
    /// Name of the element that owns the collection wrapper.
    pub owner: &'a str,
    pub parameters: &'a Parameters,
    pub shared: Option<SharedBinding<'a>>,
}

#[derive(Debug, Default)]
pub(crate) struct CollectionTally {
    pub element_hit: bool,
    pub add_hit: bool,
    pub count: usize,
    pub unique_values: Vec<BTreeMap<String, String>>,
    /// Problems of the loaded elements, kept apart so each collection's
    /// children are reported together in declaration order.
    pub children: Problems,
}

/// Loads the `<add>` children of one collection wrapper into a field of `T`.
pub(crate) trait CollectionBinder<T>: Send + Sync {
    fn element_type(&self) -> &'static str;

    /// Describes the element type ahead of the first load.
    fn prepare(&self);

    fn shared_field_type(&self, key: &str) -> SharedLookup;

    fn unique_keys(&self) -> Vec<String>;

    fn collect_schema_problems(&self, visited: &mut HashSet<TypeId>, out: &mut Vec<Problem>);

    fn bind(
        &self,
        target: &mut T,
        wrapper: &XmlElementNode,
        context: &BindContext<'_>,
        tally: &mut CollectionTally,
        problems: &mut Problems,
    );
}

pub(crate) struct NodeCollection<T, C> {
    lens: fn(&mut T) -> &mut Vec<C>,
}

impl<T, C> NodeCollection<T, C> {
    pub fn new(lens: fn(&mut T) -> &mut Vec<C>) -> Self {
        Self { lens }
    }
}

impl<T: CfgNode, C: CfgNode> CollectionBinder<T> for NodeCollection<T, C> {
    fn element_type(&self) -> &'static str {
        short_type_name::<C>()
    }

    fn prepare(&self) {
        if !is_describing::<C>() {
            describe::<C>();
        }
    }

    fn shared_field_type(&self, key: &str) -> SharedLookup {
        if is_describing::<C>() {
            return SharedLookup::Deferred;
        }
        match describe::<C>().scalar(key).and_then(FieldSpec::value_type) {
            Some(value_type) => SharedLookup::Found(value_type),
            None => SharedLookup::Missing,
        }
    }

    fn unique_keys(&self) -> Vec<String> {
        describe::<C>().unique_keys().to_vec()
    }

    fn collect_schema_problems(&self, visited: &mut HashSet<TypeId>, out: &mut Vec<Problem>) {
        describe::<C>().collect_problems(visited, out);
    }

    fn bind(
        &self,
        target: &mut T,
        wrapper: &XmlElementNode,
        context: &BindContext<'_>,
        tally: &mut CollectionTally,
        problems: &mut Problems,
    ) {
        let descriptor = describe::<C>();
        let shared = context.shared.as_ref().and_then(|shared| {
            // An undeclared shared property was reported when the schema was described.
            let field = descriptor.scalar(shared.key)?;
            let value = wrapper_value(field, wrapper, context, problems)
                .or_else(|| shared.default.cloned())?;
            Some((field, value))
        });

        for add in &wrapper.children {
            if add.name != ADD_ELEMENT {
                problems.push(Problem::UnexpectedElement {
                    element: add.name.clone(),
                    wrapper: wrapper.name.clone(),
                });
                continue;
            }
            tally.add_hit = true;

            let mut loaded = load_node::<C>(add, Some(&wrapper.name), context.parameters);
            if let Some((field, value)) = &shared {
                if !loaded.hits.contains(field.key()) {
                    field.set(&mut loaded.value, value.clone());
                }
            }
            loaded.value.modify();
            loaded.value.validate(&mut loaded.problems);

            tally.count += 1;
            tally.unique_values.push(loaded.unique);
            tally.children.nest(loaded.problems);
            (self.lens)(target).push(loaded.value);
        }
    }
}

/// Reads the wrapper's own attribute for the shared property, if present.
fn wrapper_value<C: CfgNode>(
    field: &FieldSpec<C>,
    wrapper: &XmlElementNode,
    context: &BindContext<'_>,
    problems: &mut Problems,
) -> Option<CfgValue> {
    let attribute = wrapper
        .attributes
        .iter()
        .find(|attribute| normalize_name(&attribute.name) == field.key())?;
    let text = resolve_attribute_text(&attribute.value, context.parameters, problems);
    match field.convert(&text) {
        Ok(value) => Some(value),
        Err(error) => {
            problems.push(Problem::SettingValue {
                attribute: attribute.name.clone(),
                value: text.into_owned(),
                parent: Some(context.owner.to_string()),
                node: wrapper.name.clone(),
                message: error.message,
            });
            None
        }
    }
}

pub(crate) struct ValueCollection<T, F> {
    lens: fn(&mut T) -> &mut Vec<F>,
}

impl<T, F> ValueCollection<T, F> {
    pub fn new(lens: fn(&mut T) -> &mut Vec<F>) -> Self {
        Self { lens }
    }
}

impl<T: CfgNode, F: FieldValue> CollectionBinder<T> for ValueCollection<T, F> {
    fn element_type(&self) -> &'static str {
        F::VALUE_TYPE.type_name()
    }

    fn prepare(&self) {}

    fn shared_field_type(&self, _key: &str) -> SharedLookup {
        SharedLookup::Missing
    }

    fn unique_keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn collect_schema_problems(&self, _visited: &mut HashSet<TypeId>, _out: &mut Vec<Problem>) {}

    fn bind(
        &self,
        target: &mut T,
        wrapper: &XmlElementNode,
        context: &BindContext<'_>,
        tally: &mut CollectionTally,
        problems: &mut Problems,
    ) {
        for add in &wrapper.children {
            if add.name != ADD_ELEMENT {
                problems.push(Problem::UnexpectedElement {
                    element: add.name.clone(),
                    wrapper: wrapper.name.clone(),
                });
                continue;
            }
            tally.add_hit = true;

            let [attribute] = add.attributes.as_slice() else {
                problems.push(Problem::OnlyOneAttributeAllowed {
                    parent: Some(context.owner.to_string()),
                    element: wrapper.name.clone(),
                    count: add.attributes.len(),
                });
                continue;
            };

            let text = resolve_attribute_text(&attribute.value, context.parameters, problems);
            match F::VALUE_TYPE.parse(&text) {
                Ok(value) => {
                    if let Some(value) = F::from_value(value) {
                        (self.lens)(target).push(value);
                        tally.count += 1;
                    }
                }
                Err(error) => problems.push(Problem::SettingValue {
                    attribute: wrapper.name.clone(),
                    value: text.into_owned(),
                    parent: Some(context.owner.to_string()),
                    node: wrapper.name.clone(),
                    message: error.message,
                }),
            }
        }
    }
}
