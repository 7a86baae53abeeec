use cfg_core::{Problem, Problems};
use cfg_parser::parse_xml_document;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::environment::{apply_environment, EnvironmentOptions};
use crate::loader::bind_node;
use crate::placeholder::Parameters;
use crate::registry::{describe, schema_problems};
use crate::CfgNode;

/// Caller-supplied inputs to a load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadOptions {
    pub parameters: Parameters,
    pub environment: EnvironmentOptions,
}

impl LoadOptions {
    pub fn with_parameters(parameters: Parameters) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }
}

/// Loads `xml` into `target`, replacing whatever it held.
///
/// The returned problems are never fatal: `target` always ends up holding
/// the defaults plus whatever could be bound. A malformed document yields a
/// single parse problem and leaves `target` at its defaults.
pub fn load_into<T: CfgNode>(target: &mut T, xml: &str, options: &LoadOptions) -> Problems {
    let descriptor = describe::<T>();
    *target = T::default();
    descriptor.apply_defaults(target);

    let mut problems = Problems::new();
    let document = match parse_xml_document(xml) {
        Ok(document) => document,
        Err(error) => {
            warn!(
                schema = descriptor.type_name(),
                error = %error,
                "configuration is not well-formed xml"
            );
            problems.push(Problem::XmlParse {
                message: error.message,
            });
            return problems;
        }
    };

    problems.extend(schema_problems::<T>());
    let parameters = apply_environment(&document.root, &options.parameters, &options.environment);
    bind_node(
        &descriptor,
        target,
        &document.root,
        None,
        &parameters,
        &mut problems,
    );
    target.modify();
    target.validate(&mut problems);

    debug!(
        schema = descriptor.type_name(),
        root = %document.root.name,
        parameters = parameters.len(),
        problems = problems.len(),
        "configuration loaded"
    );
    problems
}

pub fn load<T: CfgNode>(xml: &str, options: &LoadOptions) -> (T, Problems) {
    let mut target = T::default();
    let problems = load_into(&mut target, xml, options);
    (target, problems)
}

/// A fresh `T` holding its declared defaults, after `modify` has run.
pub fn default_of<T: CfgNode>() -> T {
    default_of_with(|_| {})
}

/// Like [`default_of`], with `customize` applied before `modify`.
pub fn default_of_with<T: CfgNode>(customize: impl FnOnce(&mut T)) -> T {
    let mut value = T::default();
    describe::<T>().apply_defaults(&mut value);
    customize(&mut value);
    value.modify();
    value
}
