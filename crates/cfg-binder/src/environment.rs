use cfg_parser::XmlElementNode;
use serde::Deserialize;

use crate::placeholder::{substitute, Parameters};

pub const ENVIRONMENTS_ELEMENT: &str = "environments";
pub const PARAMETERS_ELEMENT: &str = "parameters";
pub const DEFAULT_ENVIRONMENT_ATTRIBUTE: &str = "default";
pub const ENVIRONMENT_NAME_ATTRIBUTE: &str = "name";

/// Attribute names read from each child of a `<parameters>` block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnvironmentOptions {
    pub name_attribute: String,
    pub value_attribute: String,
}

impl Default for EnvironmentOptions {
    fn default() -> Self {
        Self {
            name_attribute: "name".to_string(),
            value_attribute: "value".to_string(),
        }
    }
}

/// Reads the parameter defaults declared by the document's `<environments>`
/// block.
///
/// With several environments, the one named by the `default` attribute is
/// used; the attribute itself may be a placeholder resolved against
/// `parameters`. With a single environment, its `<parameters>` child is used.
pub fn resolve_environment(
    root: &XmlElementNode,
    parameters: &Parameters,
    options: &EnvironmentOptions,
) -> Vec<(String, String)> {
    for environments in root
        .children
        .iter()
        .filter(|child| child.name == ENVIRONMENTS_ELEMENT)
    {
        if !environments.has_children() {
            break;
        }

        if environments.children.len() > 1 {
            let Some(default_name) = environments.attribute(DEFAULT_ENVIRONMENT_ATTRIBUTE) else {
                continue;
            };
            let selected = substitute(default_name, parameters).value;
            let chosen = environments.children.iter().find(|environment| {
                environment.attribute(ENVIRONMENT_NAME_ATTRIBUTE) == Some(&*selected)
                    && environment.has_children()
            });
            if let Some(environment) = chosen {
                return read_parameters(&environment.children[0], options);
            }
        }

        let Some(parameters_node) = environments.children[0].children.first() else {
            break;
        };
        if parameters_node.name != PARAMETERS_ELEMENT || !parameters_node.has_children() {
            break;
        }
        return read_parameters(parameters_node, options);
    }

    Vec::new()
}

/// Merges environment defaults under the caller's parameters: a key the
/// caller already supplied is never overwritten.
pub fn apply_environment(
    root: &XmlElementNode,
    parameters: &Parameters,
    options: &EnvironmentOptions,
) -> Parameters {
    let mut merged = parameters.clone();
    for (name, value) in resolve_environment(root, parameters, options) {
        merged.entry(name).or_insert(value);
    }
    merged
}

fn read_parameters(
    parameters_node: &XmlElementNode,
    options: &EnvironmentOptions,
) -> Vec<(String, String)> {
    parameters_node
        .children
        .iter()
        .filter_map(|parameter| {
            let name = parameter.attribute(&options.name_attribute)?;
            let value = parameter.attribute(&options.value_attribute)?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfg_parser::parse_xml_document;

    fn root(source: &str) -> XmlElementNode {
        parse_xml_document(source).expect("xml should parse").root
    }

    #[test]
    fn single_environment_supplies_its_parameters() {
        let node = root(
            r#"<cfg>
  <environments>
    <add name="one">
      <parameters>
        <add name="server" value="localhost"/>
        <add name="incomplete"/>
        <add name="port" value="1433"/>
      </parameters>
    </add>
  </environments>
</cfg>"#,
        );
        let resolved =
            resolve_environment(&node, &Parameters::new(), &EnvironmentOptions::default());
        assert_eq!(
            resolved,
            vec![
                ("server".to_string(), "localhost".to_string()),
                ("port".to_string(), "1433".to_string()),
            ]
        );
    }

    #[test]
    fn default_attribute_selects_environment_and_may_be_a_placeholder() {
        let source = r#"<cfg>
  <environments default="@(env)">
    <add name="dev"><parameters><add name="server" value="dev-box"/></parameters></add>
    <add name="prod"><parameters><add name="server" value="prod-box"/></parameters></add>
  </environments>
</cfg>"#;
        let node = root(source);
        let mut parameters = Parameters::new();
        parameters.insert("env".to_string(), "prod".to_string());

        let merged = apply_environment(&node, &parameters, &EnvironmentOptions::default());
        assert_eq!(merged.get("server").map(String::as_str), Some("prod-box"));
        assert_eq!(merged.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn unmatched_default_falls_back_to_first_environment() {
        let node = root(
            r#"<cfg><environments default="qa">
  <add name="dev"><parameters><add name="server" value="dev-box"/></parameters></add>
  <add name="prod"><parameters><add name="server" value="prod-box"/></parameters></add>
</environments></cfg>"#,
        );
        let resolved =
            resolve_environment(&node, &Parameters::new(), &EnvironmentOptions::default());
        assert_eq!(resolved, vec![("server".to_string(), "dev-box".to_string())]);
    }

    #[test]
    fn caller_parameters_win_over_environment_defaults() {
        let node = root(
            r#"<cfg><environments>
  <add name="x"><parameters><add name="server" value="env"/></parameters></add>
</environments></cfg>"#,
        );
        let mut parameters = Parameters::new();
        parameters.insert("server".to_string(), "caller".to_string());
        let merged = apply_environment(&node, &parameters, &EnvironmentOptions::default());
        assert_eq!(merged.get("server").map(String::as_str), Some("caller"));
    }

    #[test]
    fn custom_attribute_names_are_honoured() {
        let node = root(
            r#"<cfg><environments>
  <add name="x"><parameters><add key="server" text="box"/></parameters></add>
</environments></cfg>"#,
        );
        let options = EnvironmentOptions {
            name_attribute: "key".to_string(),
            value_attribute: "text".to_string(),
        };
        let resolved = resolve_environment(&node, &Parameters::new(), &options);
        assert_eq!(resolved, vec![("server".to_string(), "box".to_string())]);
    }

    #[test]
    fn documents_without_environments_resolve_nothing() {
        let node = root(r#"<cfg><sites/></cfg>"#);
        let resolved =
            resolve_environment(&node, &Parameters::new(), &EnvironmentOptions::default());
        assert!(resolved.is_empty());
    }

    #[test]
    fn environment_options_deserialize_with_defaults() {
        let options: EnvironmentOptions =
            serde_json::from_str(r#"{ "valueAttribute": "text" }"#).expect("options should parse");
        assert_eq!(options.name_attribute, "name");
        assert_eq!(options.value_attribute, "text");
    }
}
