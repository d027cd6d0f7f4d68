//! Page content: composers holding ordered pagelets.

use std::collections::BTreeMap;

use crate::util::xml::{self, XmlNode};

use super::error::DomainError;

/// Reserved name of the stage composer, the main slot of a page template.
pub const STAGE_COMPOSER: &str = "#stage#";

/// Property name that references another resource by identifier. Publishing
/// validates these references against the live index.
pub const PROPERTY_RESOURCE_ID: &str = "resourceid";

/// A typed content fragment placed inside a composer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pagelet {
    module: String,
    id: String,
    properties: BTreeMap<String, String>,
    elements: BTreeMap<String, String>,
}

impl Pagelet {
    pub fn new(module: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            id: id.into(),
            properties: BTreeMap::new(),
            elements: BTreeMap::new(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn set_element(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.elements.insert(name.into(), value.into());
    }

    pub fn element(&self, name: &str) -> Option<&str> {
        self.elements.get(name).map(String::as_str)
    }

    pub fn elements(&self) -> impl Iterator<Item = (&str, &str)> {
        self.elements
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn to_xml(&self) -> String {
        let mut out = format!(
            "<pagelet module=\"{}\" id=\"{}\">",
            xml::escape(&self.module),
            xml::escape(&self.id)
        );
        for (name, value) in &self.properties {
            out.push_str(&format!(
                "<property name=\"{}\">{}</property>",
                xml::escape(name),
                xml::escape(value)
            ));
        }
        for (name, value) in &self.elements {
            out.push_str(&format!(
                "<element name=\"{}\">{}</element>",
                xml::escape(name),
                xml::escape(value)
            ));
        }
        out.push_str("</pagelet>");
        out
    }

    pub fn from_xml(node: &XmlNode) -> Result<Self, DomainError> {
        let module = node
            .attribute("module")
            .ok_or_else(|| DomainError::validation("pagelet is missing its module attribute"))?;
        let id = node
            .attribute("id")
            .ok_or_else(|| DomainError::validation("pagelet is missing its id attribute"))?;
        let mut pagelet = Pagelet::new(module, id);
        for property in node.children_named("property") {
            let name = property
                .attribute("name")
                .ok_or_else(|| DomainError::validation("pagelet property without a name"))?;
            pagelet.set_property(name, property.text.trim());
        }
        for element in node.children_named("element") {
            let name = element
                .attribute("name")
                .ok_or_else(|| DomainError::validation("pagelet element without a name"))?;
            pagelet.set_element(name, element.text.trim());
        }
        Ok(pagelet)
    }
}

/// A named slot on a page holding an ordered list of pagelets.
#[derive(Debug, Clone, PartialEq)]
pub struct Composer {
    name: String,
    pagelets: Vec<Pagelet>,
}

impl Composer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pagelets: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add(&mut self, pagelet: Pagelet) {
        self.pagelets.push(pagelet);
    }

    pub fn pagelets(&self) -> &[Pagelet] {
        &self.pagelets
    }

    pub fn to_xml(&self) -> String {
        let mut out = format!("<composer id=\"{}\">", xml::escape(&self.name));
        for pagelet in &self.pagelets {
            out.push_str(&pagelet.to_xml());
        }
        out.push_str("</composer>");
        out
    }

    pub fn from_xml(node: &XmlNode) -> Result<Self, DomainError> {
        let name = node
            .attribute("id")
            .ok_or_else(|| DomainError::validation("composer is missing its id attribute"))?;
        let mut composer = Composer::new(name);
        for pagelet in node.children_named("pagelet") {
            composer.add(Pagelet::from_xml(pagelet)?);
        }
        Ok(composer)
    }
}

/// The editable content of a page resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageBody {
    title: Option<String>,
    composers: Vec<Composer>,
}

impl PageBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn composers(&self) -> &[Composer] {
        &self.composers
    }

    pub fn composer(&self, name: &str) -> Option<&Composer> {
        self.composers.iter().find(|c| c.name() == name)
    }

    /// Composer to write into, created on first use.
    pub fn composer_mut(&mut self, name: &str) -> &mut Composer {
        if let Some(index) = self.composers.iter().position(|c| c.name() == name) {
            return &mut self.composers[index];
        }
        self.composers.push(Composer::new(name));
        self.composers.last_mut().expect("composer just added")
    }

    pub fn stage_mut(&mut self) -> &mut Composer {
        self.composer_mut(STAGE_COMPOSER)
    }

    /// All pagelets across all composers, in document order.
    pub fn pagelets(&self) -> impl Iterator<Item = &Pagelet> {
        self.composers
            .iter()
            .flat_map(|composer| composer.pagelets().iter())
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from("<body>");
        if let Some(title) = &self.title {
            out.push_str(&format!("<title>{}</title>", xml::escape(title)));
        }
        for composer in &self.composers {
            out.push_str(&composer.to_xml());
        }
        out.push_str("</body>");
        out
    }

    pub fn from_xml(node: &XmlNode) -> Result<Self, DomainError> {
        let mut body = PageBody::new();
        if let Some(title) = node.child_text("title")
            && !title.is_empty()
        {
            body.title = Some(title.to_string());
        }
        for composer in node.children_named("composer") {
            body.composers.push(Composer::from_xml(composer)?);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> PageBody {
        let mut body = PageBody::new();
        body.set_title("Welcome");
        let stage = body.stage_mut();
        let mut paragraph = Pagelet::new("text", "paragraph");
        paragraph.set_element("body", "Hello & welcome");
        paragraph.set_property(PROPERTY_RESOURCE_ID, "01234567-0000-0000-0000-000000000000");
        stage.add(paragraph);
        body
    }

    #[test]
    fn body_round_trips_through_xml() {
        let body = sample_body();
        let node = XmlNode::parse(&body.to_xml()).expect("parse");
        let parsed = PageBody::from_xml(&node).expect("body");
        assert_eq!(parsed, body);
    }

    #[test]
    fn composer_mut_creates_on_first_use() {
        let mut body = PageBody::new();
        assert!(body.composer("sidebar").is_none());
        body.composer_mut("sidebar").add(Pagelet::new("nav", "menu"));
        assert_eq!(body.composer("sidebar").expect("composer").pagelets().len(), 1);
    }

    #[test]
    fn pagelets_iterates_in_document_order() {
        let mut body = PageBody::new();
        body.composer_mut("a").add(Pagelet::new("m", "first"));
        body.composer_mut("b").add(Pagelet::new("m", "second"));
        let ids: Vec<&str> = body.pagelets().map(Pagelet::id).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }
}
