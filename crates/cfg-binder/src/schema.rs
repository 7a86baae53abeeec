use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;

use cfg_core::{CfgError, CfgValue, FieldValue, Problem, ValueType};

use crate::collection::{CollectionBinder, NodeCollection, SharedLookup, ValueCollection};
use crate::CfgNode;

const DEFAULT_DOMAIN_DELIMITER: char = ',';

/// Canonical field key: alphanumerics only, lower-cased. `connection-string`,
/// `connectionString` and `Connection_String` all map to `connectionstring`.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// The set of textual values a field accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    values: Vec<String>,
    ignore_case: bool,
}

impl Domain {
    pub fn parse(values: &str, delimiter: char) -> Self {
        Self {
            values: values.split(delimiter).map(str::to_string).collect(),
            ignore_case: false,
        }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn ignores_case(&self) -> bool {
        self.ignore_case
    }

    pub fn contains(&self, value: &str) -> bool {
        if self.ignore_case {
            let value = value.to_lowercase();
            self.values
                .iter()
                .any(|allowed| allowed.to_lowercase() == value)
        } else {
            self.values.iter().any(|allowed| allowed == value)
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.values.join(", "))
    }
}

type Getter<T> = Box<dyn Fn(&mut T) -> CfgValue + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, CfgValue) -> bool + Send + Sync>;

pub(crate) enum FieldKind<T> {
    Scalar {
        value_type: ValueType,
        get: Getter<T>,
        set: Setter<T>,
    },
    Collection(Box<dyn CollectionBinder<T>>),
}

/// Constraints and accessors for one field of a schema type.
pub struct FieldSpec<T> {
    name: String,
    key: String,
    required: bool,
    unique: bool,
    ignore_case: bool,
    domain: Option<Domain>,
    default: Option<CfgValue>,
    shared_name: Option<String>,
    shared_key: Option<String>,
    shared_default: Option<CfgValue>,
    kind: FieldKind<T>,
}

impl<T> FieldSpec<T> {
    fn new(name: &str, kind: FieldKind<T>) -> Self {
        Self {
            name: name.to_string(),
            key: normalize_name(name),
            required: false,
            unique: false,
            ignore_case: false,
            domain: None,
            default: None,
            shared_name: None,
            shared_key: None,
            shared_default: None,
            kind,
        }
    }

    /// The name as declared in the schema.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Declared type of a scalar field; `None` for collections.
    pub fn value_type(&self) -> Option<ValueType> {
        match &self.kind {
            FieldKind::Scalar { value_type, .. } => Some(*value_type),
            FieldKind::Collection(_) => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, FieldKind::Collection(_))
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn domain(&self) -> Option<&Domain> {
        self.domain.as_ref()
    }

    pub fn default_value(&self) -> Option<&CfgValue> {
        self.default.as_ref()
    }

    pub fn shared_property(&self) -> Option<&str> {
        self.shared_name.as_deref()
    }

    pub fn shared_default(&self) -> Option<&CfgValue> {
        self.shared_default.as_ref()
    }

    pub(crate) fn shared_key(&self) -> Option<&str> {
        self.shared_key.as_deref()
    }

    pub(crate) fn binder(&self) -> Option<&dyn CollectionBinder<T>> {
        match &self.kind {
            FieldKind::Collection(binder) => Some(binder.as_ref()),
            FieldKind::Scalar { .. } => None,
        }
    }

    pub(crate) fn convert(&self, text: &str) -> Result<CfgValue, CfgError> {
        match &self.kind {
            FieldKind::Scalar { value_type, .. } => value_type.parse(text),
            FieldKind::Collection(binder) => Err(CfgError::new(
                "FIELD_NOT_SCALAR",
                format!("'{}' is a collection of {}.", self.name, binder.element_type()),
            )),
        }
    }

    /// Reads a scalar field. Collections read as `None`.
    pub fn get(&self, target: &mut T) -> Option<CfgValue> {
        match &self.kind {
            FieldKind::Scalar { get, .. } => Some(get(target)),
            FieldKind::Collection(_) => None,
        }
    }

    /// Writes a scalar field; `false` when the value has the wrong type or
    /// the field is a collection.
    pub fn set(&self, target: &mut T, value: CfgValue) -> bool {
        match &self.kind {
            FieldKind::Scalar { set, .. } => set(target, value),
            FieldKind::Collection(_) => false,
        }
    }

    fn type_label(&self) -> String {
        match &self.kind {
            FieldKind::Scalar { value_type, .. } => value_type.to_string(),
            FieldKind::Collection(binder) => format!("Vec<{}>", binder.element_type()),
        }
    }
}

/// Chainable constraint setters returned by the `SchemaBuilder` methods.
pub struct FieldBuilder<'a, T> {
    spec: &'a mut FieldSpec<T>,
}

impl<'a, T> FieldBuilder<'a, T> {
    pub fn required(self) -> Self {
        self.spec.required = true;
        self
    }

    /// Siblings in the same collection may not share a value for this field.
    pub fn unique(self) -> Self {
        self.spec.unique = true;
        self
    }

    pub fn domain(self, values: &str) -> Self {
        self.domain_with_delimiter(values, DEFAULT_DOMAIN_DELIMITER)
    }

    pub fn domain_with_delimiter(self, values: &str, delimiter: char) -> Self {
        let mut domain = Domain::parse(values, delimiter);
        domain.ignore_case = self.spec.ignore_case;
        self.spec.domain = Some(domain);
        self
    }

    pub fn ignore_case(self) -> Self {
        self.spec.ignore_case = true;
        if let Some(domain) = self.spec.domain.as_mut() {
            domain.ignore_case = true;
        }
        self
    }

    pub fn default_value(self, value: impl Into<CfgValue>) -> Self {
        self.spec.default = Some(value.into());
        self
    }

    /// Lets the collection wrapper element carry a value for `property`
    /// that every child inherits unless it sets the property itself.
    pub fn shared(self, property: &str) -> Self {
        self.spec.shared_name = Some(property.to_string());
        self.spec.shared_key = Some(normalize_name(property));
        self
    }

    /// Value inherited by children when neither they nor the wrapper set the
    /// shared property.
    pub fn shared_value(self, value: impl Into<CfgValue>) -> Self {
        self.spec.shared_default = Some(value.into());
        self
    }
}

/// Collects the field declarations of a schema type.
pub struct SchemaBuilder<T> {
    fields: Vec<FieldSpec<T>>,
}

impl<T: CfgNode> SchemaBuilder<T> {
    pub(crate) fn build() -> SchemaDescriptor<T> {
        let mut builder = Self { fields: Vec::new() };
        T::describe(&mut builder);
        builder.finish()
    }

    /// A scalar field reached through a lens such as `|site| &mut site.name`.
    pub fn field<F: FieldValue>(
        &mut self,
        name: &str,
        lens: fn(&mut T) -> &mut F,
    ) -> FieldBuilder<'_, T> {
        self.push(
            name,
            FieldKind::Scalar {
                value_type: F::VALUE_TYPE,
                get: Box::new(move |target: &mut T| lens(target).to_value()),
                set: Box::new(move |target: &mut T, value: CfgValue| match F::from_value(value) {
                    Some(value) => {
                        *lens(target) = value;
                        true
                    }
                    None => false,
                }),
            },
        )
    }

    /// A scalar field with its own getter and setter. The loader re-reads
    /// the value after setting it, so setters may normalize what they store.
    pub fn property<F: FieldValue>(
        &mut self,
        name: &str,
        get: fn(&T) -> F,
        set: fn(&mut T, F),
    ) -> FieldBuilder<'_, T> {
        self.push(
            name,
            FieldKind::Scalar {
                value_type: F::VALUE_TYPE,
                get: Box::new(move |target: &mut T| get(target).to_value()),
                set: Box::new(move |target: &mut T, value: CfgValue| match F::from_value(value) {
                    Some(value) => {
                        set(target, value);
                        true
                    }
                    None => false,
                }),
            },
        )
    }

    /// A repeated nested element: `<name><add .../><add .../></name>`.
    pub fn collection<C: CfgNode>(
        &mut self,
        name: &str,
        lens: fn(&mut T) -> &mut Vec<C>,
    ) -> FieldBuilder<'_, T> {
        self.push(
            name,
            FieldKind::Collection(Box::new(NodeCollection::new(lens))),
        )
    }

    /// A repeated scalar: each `<add>` carries exactly one attribute whose
    /// value is converted to `F`.
    pub fn list<F: FieldValue>(
        &mut self,
        name: &str,
        lens: fn(&mut T) -> &mut Vec<F>,
    ) -> FieldBuilder<'_, T> {
        self.push(
            name,
            FieldKind::Collection(Box::new(ValueCollection::new(lens))),
        )
    }

    fn push(&mut self, name: &str, kind: FieldKind<T>) -> FieldBuilder<'_, T> {
        self.fields.push(FieldSpec::new(name, kind));
        let index = self.fields.len() - 1;
        FieldBuilder {
            spec: &mut self.fields[index],
        }
    }

    fn finish(self) -> SchemaDescriptor<T> {
        let type_name = short_type_name::<T>();
        let mut descriptor = SchemaDescriptor {
            type_name,
            fields: Vec::with_capacity(self.fields.len()),
            index: HashMap::new(),
            scalar_keys: Vec::new(),
            collection_keys: Vec::new(),
            unique_keys: Vec::new(),
            problems: Vec::new(),
        };

        for mut spec in self.fields {
            if descriptor.index.contains_key(&spec.key) {
                descriptor.problems.push(Problem::DuplicateFieldKey {
                    type_name: type_name.to_string(),
                    key: spec.key.clone(),
                });
                continue;
            }

            if let Some(default) = &spec.default {
                if spec.value_type() != Some(default.value_type()) {
                    descriptor.problems.push(Problem::TypeMismatch {
                        key: spec.key.clone(),
                        default_type: default.value_type().to_string(),
                        field_type: spec.type_label(),
                    });
                    spec.default = None;
                }
            }

            match &spec.kind {
                FieldKind::Scalar { .. } => {
                    descriptor.scalar_keys.push(spec.key.clone());
                    if spec.unique {
                        descriptor.unique_keys.push(spec.key.clone());
                    }
                }
                FieldKind::Collection(binder) => {
                    descriptor.collection_keys.push(spec.key.clone());
                    binder.prepare();
                    let lookup = spec
                        .shared_key
                        .as_deref()
                        .map(|key| binder.shared_field_type(key));
                    match lookup {
                        Some(SharedLookup::Found(field_type)) => {
                            if let Some(default) = &spec.shared_default {
                                if default.value_type() != field_type {
                                    descriptor.problems.push(Problem::TypeMismatch {
                                        key: spec.shared_key.clone().unwrap_or_default(),
                                        default_type: default.value_type().to_string(),
                                        field_type: field_type.to_string(),
                                    });
                                    spec.shared_default = None;
                                }
                            }
                        }
                        Some(SharedLookup::Missing) => {
                            descriptor.problems.push(Problem::SharedPropertyMissing {
                                element: spec.key.clone(),
                                property: spec.shared_name.clone().unwrap_or_default(),
                                type_name: binder.element_type().to_string(),
                            });
                        }
                        Some(SharedLookup::Deferred) | None => {}
                    }
                }
            }

            descriptor
                .index
                .insert(spec.key.clone(), descriptor.fields.len());
            descriptor.fields.push(spec);
        }

        descriptor
    }
}

/// Everything the loader needs to know about a schema type. Built once per
/// type by the registry and immutable afterwards.
pub struct SchemaDescriptor<T> {
    type_name: &'static str,
    fields: Vec<FieldSpec<T>>,
    index: HashMap<String, usize>,
    scalar_keys: Vec<String>,
    collection_keys: Vec<String>,
    unique_keys: Vec<String>,
    problems: Vec<Problem>,
}

impl<T: CfgNode> SchemaDescriptor<T> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[FieldSpec<T>] {
        &self.fields
    }

    /// Looks a field up by element or attribute name, normalizing it first.
    pub fn lookup(&self, name: &str) -> Option<&FieldSpec<T>> {
        self.field(&normalize_name(name))
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec<T>> {
        self.index.get(key).map(|index| &self.fields[*index])
    }

    pub fn scalar(&self, key: &str) -> Option<&FieldSpec<T>> {
        self.field(key).filter(|field| !field.is_collection())
    }

    pub fn collection(&self, key: &str) -> Option<&FieldSpec<T>> {
        self.field(key).filter(|field| field.is_collection())
    }

    pub fn scalar_keys(&self) -> &[String] {
        &self.scalar_keys
    }

    pub fn collection_keys(&self) -> &[String] {
        &self.collection_keys
    }

    pub fn unique_keys(&self) -> &[String] {
        &self.unique_keys
    }

    /// Problems found while describing this type (not its nested types).
    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn apply_defaults(&self, target: &mut T) {
        for field in &self.fields {
            if let Some(default) = &field.default {
                field.set(target, default.clone());
            }
        }
    }

    pub(crate) fn collect_problems(&self, visited: &mut HashSet<TypeId>, out: &mut Vec<Problem>) {
        if !visited.insert(TypeId::of::<T>()) {
            return;
        }
        out.extend(self.problems.iter().cloned());
        for field in &self.fields {
            if let Some(binder) = field.binder() {
                binder.collect_schema_problems(visited, out);
            }
        }
    }
}
