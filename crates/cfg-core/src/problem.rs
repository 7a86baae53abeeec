use thiserror::Error;

/// One non-fatal diagnostic found while describing a schema or loading a
/// document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Problem {
    #[error("You set a duplicate '{key}' value '{value}' in '{element}'.")]
    DuplicateSet {
        key: String,
        value: String,
        element: String,
    },
    #[error(
        "{} element contains an invalid '{attribute}' attribute.  Valid attributes are: {valid}.",
        element_label(.parent, .node)
    )]
    InvalidAttribute {
        parent: Option<String>,
        node: String,
        attribute: String,
        valid: String,
    },
    #[error("The '{node}' element has an invalid '{element}' element.")]
    InvalidElement { node: String, element: String },
    #[error(
        "{} '{parent}' '{node}' element has an invalid '{element}' element.",
        article(.parent, true)
    )]
    InvalidNestedElement {
        parent: String,
        node: String,
        element: String,
    },
    #[error("{} element is missing a '{attribute}' attribute.", element_label(.parent, .node))]
    MissingAttribute {
        parent: Option<String>,
        node: String,
        attribute: String,
    },
    #[error(
        "The '{node}' element is missing {} '{element}' element.",
        article(.element, false)
    )]
    MissingElement { node: String, element: String },
    #[error(
        "{} '{parent}' '{node}' element is missing {} '{element}' element.",
        article(.parent, true),
        article(.element, false)
    )]
    MissingNestedElement {
        parent: String,
        node: String,
        element: String,
    },
    #[error("{} '{element}' element is missing an 'add' element.", article(.element, true))]
    MissingAddElement { element: String },
    #[error(
        "You're missing {} for {}.",
        value_count(.keys),
        placeholder_list(.keys)
    )]
    MissingPlaceholderValues { keys: Vec<String> },
    #[error(
        "Could not set '{attribute}' to '{value}' inside {}. {message}",
        element_path(.parent, .node)
    )]
    SettingValue {
        attribute: String,
        value: String,
        parent: Option<String>,
        node: String,
        message: String,
    },
    #[error("Invalid element '{element}' in '{wrapper}'.  Only 'add' elements are allowed here.")]
    UnexpectedElement { element: String, wrapper: String },
    #[error(
        "{} '{parent}' '{node}' element has an invalid value of '{value}' in the '{attribute}' attribute.  The valid domain is: {domain}.",
        article(.parent, true)
    )]
    ValueNotInDomain {
        parent: String,
        node: String,
        attribute: String,
        value: String,
        domain: String,
    },
    #[error(
        "The root element has an invalid value of '{value}' in the '{attribute}' attribute.  The valid domain is: {domain}."
    )]
    RootValueNotInDomain {
        attribute: String,
        value: String,
        domain: String,
    },
    #[error(
        "{} '{element}' shared property '{property}' is missing in '{type_name}'.  Make sure it is declared on the nested schema.",
        article(.element, true)
    )]
    SharedPropertyMissing {
        element: String,
        property: String,
        type_name: String,
    },
    #[error("You must have exactly 1 attribute in {}.  You have {count}.", element_path(.parent, .element))]
    OnlyOneAttributeAllowed {
        parent: Option<String>,
        element: String,
        count: usize,
    },
    #[error(
        "The '{key}' attribute's default value's type ({default_type}) does not match the property type ({field_type})."
    )]
    TypeMismatch {
        key: String,
        default_type: String,
        field_type: String,
    },
    #[error("The '{type_name}' schema declares more than one field named '{key}'.")]
    DuplicateFieldKey { type_name: String, key: String },
    #[error("Could not parse the configuration. {message}")]
    XmlParse { message: String },
    #[error("{0}")]
    Custom(String),
}

fn starts_with_vowel(word: &str) -> bool {
    matches!(
        word.chars().next(),
        Some('a' | 'e' | 'i' | 'o' | 'u' | 'A' | 'E' | 'I' | 'O' | 'U')
    )
}

fn article(word: &str, capitalized: bool) -> &'static str {
    match (starts_with_vowel(word), capitalized) {
        (true, true) => "An",
        (true, false) => "an",
        (false, true) => "A",
        (false, false) => "a",
    }
}

fn element_label(parent: &Option<String>, node: &str) -> String {
    match parent {
        Some(parent) => format!("{} '{}' '{}'", article(parent, true), parent, node),
        None => format!("The '{}'", node),
    }
}

fn element_path(parent: &Option<String>, node: &str) -> String {
    match parent {
        Some(parent) => format!("'{}' '{}'", parent, node),
        None => format!("'{}'", node),
    }
}

fn value_count(keys: &[String]) -> &'static str {
    if keys.len() == 1 {
        "a value"
    } else {
        "values"
    }
}

fn placeholder_list(keys: &[String]) -> String {
    keys.iter()
        .map(|key| format!("@({})", key))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Problems found for one node, plus the problems of the children it loaded.
///
/// Flattening is depth-first: a node's own entries come before those of
/// its children, and children keep their load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Problems {
    entries: Vec<Problem>,
    children: Vec<Problems>,
}

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, problem: Problem) {
        self.entries.push(problem);
    }

    /// Records a free-form problem, typically from a `validate` hook.
    pub fn add(&mut self, message: impl Into<String>) {
        self.entries.push(Problem::Custom(message.into()));
    }

    pub fn nest(&mut self, child: Problems) {
        if !child.is_empty() {
            self.children.push(child);
        }
    }

    pub fn own(&self) -> &[Problem] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.children.iter().all(Problems::is_empty)
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.children.iter().map(Problems::len).sum::<usize>()
    }

    pub fn flatten(&self) -> Vec<&Problem> {
        let mut out = Vec::with_capacity(self.len());
        self.collect_into(&mut out);
        out
    }

    pub fn messages(&self) -> Vec<String> {
        self.flatten()
            .into_iter()
            .map(|problem| problem.to_string())
            .collect()
    }

    fn collect_into<'a>(&'a self, out: &mut Vec<&'a Problem>) {
        out.extend(self.entries.iter());
        for child in &self.children {
            child.collect_into(out);
        }
    }
}

impl Extend<Problem> for Problems {
    fn extend<I: IntoIterator<Item = Problem>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}
