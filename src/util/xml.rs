//! Minimal XML support for the resource document format.
//!
//! Emission is plain string building with escaping; parsing goes through
//! `quick-xml` into a lightweight node tree that the domain layer walks.

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("malformed xml: {0}")]
    Malformed(#[from] quick_xml::Error),
    #[error("malformed xml attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError)
,
    #[error("xml document has no root element")]
    MissingRoot,
    #[error("unexpected closing element `{0}`")]
    UnbalancedElement(String),
    #[error("xml content is not valid utf-8")]
    Encoding,
}

/// A parsed XML element with its attributes, child elements and text content.
#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    /// Parse a document into its root element.
    pub fn parse(input: &str) -> Result<XmlNode, XmlError> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    stack.push(node_from_start(&start)?);
                }
                Event::Empty(start) => {
                    let node = node_from_start(&start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => return Ok(node),
                    }
                }
                Event::End(end) => {
                    let name = String::from_utf8(end.name().as_ref().to_vec())
                        .map_err(|_| XmlError::Encoding)?;
                    let node = stack.pop().ok_or(XmlError::UnbalancedElement(name))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => return Ok(node),
                    }
                }
                Event::Text(text) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(node) = stack.last_mut() {
                        let raw = data.into_inner();
                        let content = std::str::from_utf8(&raw).map_err(|_| XmlError::Encoding)?;
                        node.text.push_str(content);
                    }
                }
                Event::Eof => return Err(XmlError::MissingRoot),
                _ => {}
            }
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Trimmed text content of a direct child element.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|child| child.text.trim())
    }
}

fn node_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<XmlNode, XmlError> {
    let name =
        String::from_utf8(start.name().as_ref().to_vec()).map_err(|_| XmlError::Encoding)?;
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = String::from_utf8(attribute.key.as_ref().to_vec())
            .map_err(|_| XmlError::Encoding)?;
        let value = attribute.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(XmlNode {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

/// Escape text for inclusion in an XML document.
pub fn escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
