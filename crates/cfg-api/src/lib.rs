use std::ops::Deref;

pub use cfg_binder::entities::{decode, encode};
pub use cfg_binder::placeholder::{substitute, Substitution};
pub use cfg_binder::{
    default_of, default_of_with, describe, load, load_into, schema_problems, CfgError, CfgNode,
    CfgValue, Domain, EnvironmentOptions, FieldBuilder, FieldSpec, FieldValue, LoadOptions,
    Parameters, Problem, Problems, SchemaBuilder, SchemaDescriptor, ValueType,
};

/// A configuration root of type `T` together with the problems found by the
/// most recent load.
#[derive(Debug, Clone)]
pub struct Cfg<T: CfgNode> {
    root: T,
    problems: Problems,
}

impl<T: CfgNode> Cfg<T> {
    /// A root holding only declared defaults.
    pub fn new() -> Self {
        Self {
            root: default_of::<T>(),
            problems: Problems::new(),
        }
    }

    pub fn from_xml(xml: &str, parameters: Option<&Parameters>) -> Self {
        let mut cfg = Self::new();
        cfg.load(xml, parameters);
        cfg
    }

    /// Resets the root and loads `xml` into it. Returns `true` when the
    /// document produced no problems.
    pub fn load(&mut self, xml: &str, parameters: Option<&Parameters>) -> bool {
        let options = LoadOptions {
            parameters: parameters.cloned().unwrap_or_default(),
            ..LoadOptions::default()
        };
        self.load_with(xml, &options)
    }

    pub fn load_with(&mut self, xml: &str, options: &LoadOptions) -> bool {
        self.problems = load_into(&mut self.root, xml, options);
        self.problems.is_empty()
    }

    /// Problem messages, parent problems before those of its children.
    pub fn problems(&self) -> Vec<String> {
        self.problems.messages()
    }

    pub fn issues(&self) -> Vec<&Problem> {
        self.problems.flatten()
    }

    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn root(&self) -> &T {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut T {
        &mut self.root
    }

    pub fn into_inner(self) -> T {
        self.root
    }
}

impl<T: CfgNode> Default for Cfg<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CfgNode> Deref for Cfg<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone)]
    struct Settings {
        name: String,
        retries: i32,
    }

    impl CfgNode for Settings {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.field("name", |s| &mut s.name).required();
            schema.field("retries", |s| &mut s.retries).default_value(5);
        }
    }

    #[test]
    fn new_cfg_holds_defaults_and_no_problems() {
        let cfg = Cfg::<Settings>::new();
        assert_eq!(cfg.retries, 5);
        assert!(cfg.is_valid());
        assert!(cfg.problems().is_empty());
    }

    #[test]
    fn load_reports_validity_and_keeps_problems() {
        let mut cfg = Cfg::<Settings>::new();
        assert!(!cfg.load(r#"<settings retries="2"/>"#, None));
        assert_eq!(cfg.retries, 2);
        assert_eq!(
            cfg.problems(),
            vec!["The 'settings' element is missing a 'name' attribute."]
        );
        assert!(matches!(
            cfg.issues().as_slice(),
            [Problem::MissingAttribute { attribute, .. }] if attribute == "name"
        ));

        let mut parameters = Parameters::new();
        parameters.insert("name".to_string(), "svc".to_string());
        assert!(cfg.load(r#"<settings name="@(name)"/>"#, Some(&parameters)));
        assert_eq!(cfg.root().name, "svc");
        assert_eq!(cfg.retries, 5);
    }

    #[test]
    fn root_mut_and_into_inner_expose_the_bound_value() {
        let mut cfg = Cfg::<Settings>::from_xml(r#"<settings name="a"/>"#, None);
        cfg.root_mut().retries = 9;
        let settings = cfg.into_inner();
        assert_eq!(settings.name, "a");
        assert_eq!(settings.retries, 9);
    }
}
