use cfg_core::CfgError;
use roxmltree::{Document, Node};

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: XmlElementNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: String,
    pub value: String,
}

/// An element with its attributes and child elements in document order.
/// Text, comments and processing instructions are not kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElementNode {
    pub name: String,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlElementNode>,
}

impl XmlElementNode {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| attribute.value.as_str())
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

pub fn parse_xml_document(source: &str) -> Result<XmlDocument, CfgError> {
    let document = Document::parse(source)
        .map_err(|error| CfgError::new("XML_PARSE_ERROR", error.to_string()))?;

    let Some(root) = document.root().children().find(|node| node.is_element()) else {
        return Err(CfgError::new(
            "XML_PARSE_ERROR",
            "XML document must contain a root element.",
        ));
    };

    Ok(XmlDocument {
        root: parse_element(root),
    })
}

fn parse_element(node: Node<'_, '_>) -> XmlElementNode {
    let attributes = node
        .attributes()
        .map(|attribute| XmlAttribute {
            name: attribute.name().to_string(),
            value: attribute.value().to_string(),
        })
        .collect();

    let children = node
        .children()
        .filter(|child| child.is_element())
        .map(parse_element)
        .collect();

    XmlElementNode {
        name: node.tag_name().name().to_string(),
        attributes,
        children,
    }
}
