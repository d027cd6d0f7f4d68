//! Users as they appear in contexts, locks and XML documents.

use serde::{Deserialize, Serialize};

use crate::util::xml::{self, XmlNode};

use super::error::DomainError;

/// Default realm assigned to users without an explicit one.
pub const DEFAULT_REALM: &str = "pressroom";

/// A user reference.
///
/// Identity is the `(login, realm)` pair; the display name is carried along
/// for presentation and serialization but does not participate in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    login: String,
    realm: String,
    name: Option<String>,
}

impl User {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            realm: DEFAULT_REALM.to_string(),
            name: None,
        }
    }

    pub fn with_realm(login: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            realm: realm.into(),
            name: None,
        }
    }

    pub fn named(
        login: impl Into<String>,
        realm: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            login: login.into(),
            realm: realm.into(),
            name: Some(name.into()),
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Serialize as a `<user id=".." realm="..">Name</user>` element.
    pub fn to_xml(&self) -> String {
        match &self.name {
            Some(name) => format!(
                "<user id=\"{}\" realm=\"{}\">{}</user>",
                xml::escape(&self.login),
                xml::escape(&self.realm),
                xml::escape(name)
            ),
            None => format!(
                "<user id=\"{}\" realm=\"{}\"/>",
                xml::escape(&self.login),
                xml::escape(&self.realm)
            ),
        }
    }

    /// Read a user back from a `<user>` element.
    pub fn from_xml(node: &XmlNode) -> Result<Self, DomainError> {
        let login = node
            .attribute("id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DomainError::validation("user element is missing its id attribute"))?;
        let realm = node.attribute("realm").unwrap_or(DEFAULT_REALM);
        let name = node.text.trim();
        Ok(Self {
            login: login.to_string(),
            realm: realm.to_string(),
            name: (!name.is_empty()).then(|| name.to_string()),
        })
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.login == other.login && self.realm == other.realm
    }
}

impl Eq for User {}

impl std::hash::Hash for User {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.login.hash(state);
        self.realm.hash(state);
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.login, self.realm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_display_name() {
        let a = User::named("jdoe", "test", "John Doe");
        let b = User::with_realm("jdoe", "test");
        assert_eq!(a, b);
        assert_ne!(a, User::with_realm("jdoe", "other"));
    }

    #[test]
    fn xml_round_trip_preserves_identity_and_name() {
        let user = User::named("jdoe", "test", "John <Doe>");
        let node = XmlNode::parse(&user.to_xml()).expect("parse");
        let parsed = User::from_xml(&node).expect("user");
        assert_eq!(parsed, user);
        assert_eq!(parsed.name(), Some("John <Doe>"));
    }

    #[test]
    fn missing_id_is_rejected() {
        let node = XmlNode::parse(r#"<user realm="test">Jane</user>"#).expect("parse");
        assert!(User::from_xml(&node).is_err());
    }
}
