//! Creation, modification and publishing contexts.
//!
//! Each context is a `(date, user)` value object with millisecond-truncated
//! timestamps. Contexts serialize into the `<created>`, `<modified>` and
//! `<published>` blocks of a resource XML document and parse back without
//! loss:
//!
//! ```xml
//! <created>
//!   <user id="jdoe" realm="pressroom">John Doe</user>
//!   <date>2026/01/07 08:52:52.000 GMT</date>
//! </created>
//! <published>
//!   <user id="amelie" realm="pressroom"/>
//!   <from>2026/01/07 09:00:00.000 GMT</from>
//!   <to>2026/02/01 00:00:00.000 GMT</to>
//! </published>
//! ```

use time::OffsetDateTime;

use crate::util::dates::{format_xml_date, parse_xml_date, truncate_to_millis};
use crate::util::xml::XmlNode;

use super::error::DomainError;
use super::user::User;

#[derive(Debug, Clone, PartialEq)]
pub struct CreationContext {
    creator: Option<User>,
    date: OffsetDateTime,
}

impl CreationContext {
    pub fn new(creator: Option<User>, date: OffsetDateTime) -> Self {
        Self {
            creator,
            date: truncate_to_millis(date),
        }
    }

    pub fn now(creator: Option<User>) -> Self {
        Self::new(creator, OffsetDateTime::now_utc())
    }

    pub fn creator(&self) -> Option<&User> {
        self.creator.as_ref()
    }

    pub fn date(&self) -> OffsetDateTime {
        self.date
    }

    pub fn set_created(&mut self, creator: Option<User>, date: OffsetDateTime) {
        self.creator = creator;
        self.date = truncate_to_millis(date);
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from("<created>");
        if let Some(creator) = &self.creator {
            out.push_str(&creator.to_xml());
        }
        out.push_str(&format!("<date>{}</date>", format_xml_date(self.date)));
        out.push_str("</created>");
        out
    }

    pub fn from_xml(node: &XmlNode) -> Result<Self, DomainError> {
        let (user, date) = parse_dated_block(node, "created")?;
        let date =
            date.ok_or_else(|| DomainError::validation("created block is missing its date"))?;
        Ok(Self::new(user, date))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModificationContext {
    modifier: Option<User>,
    date: OffsetDateTime,
}

impl ModificationContext {
    pub fn new(modifier: Option<User>, date: OffsetDateTime) -> Self {
        Self {
            modifier,
            date: truncate_to_millis(date),
        }
    }

    pub fn now(modifier: Option<User>) -> Self {
        Self::new(modifier, OffsetDateTime::now_utc())
    }

    pub fn modifier(&self) -> Option<&User> {
        self.modifier.as_ref()
    }

    pub fn date(&self) -> OffsetDateTime {
        self.date
    }

    pub fn set_modified(&mut self, modifier: Option<User>, date: OffsetDateTime) {
        self.modifier = modifier;
        self.date = truncate_to_millis(date);
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from("<modified>");
        if let Some(modifier) = &self.modifier {
            out.push_str(&modifier.to_xml());
        }
        out.push_str(&format!("<date>{}</date>", format_xml_date(self.date)));
        out.push_str("</modified>");
        out
    }

    pub fn from_xml(node: &XmlNode) -> Result<Self, DomainError> {
        let (user, date) = parse_dated_block(node, "modified")?;
        let date =
            date.ok_or_else(|| DomainError::validation("modified block is missing its date"))?;
        Ok(Self::new(user, date))
    }
}

/// Publication window and the user who opened it.
///
/// An empty `from` means "published since forever", an empty `to` means
/// "published forever". A context without a publisher is considered
/// unpublished and serializes to nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishingContext {
    publisher: Option<User>,
    from: Option<OffsetDateTime>,
    to: Option<OffsetDateTime>,
}

impl PublishingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publisher(&self) -> Option<&User> {
        self.publisher.as_ref()
    }

    pub fn publish_from(&self) -> Option<OffsetDateTime> {
        self.from
    }

    pub fn publish_to(&self) -> Option<OffsetDateTime> {
        self.to
    }

    /// Open a publication window.
    ///
    /// Rejects windows where the start lies after the end.
    pub fn set_published(
        &mut self,
        publisher: User,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> Result<(), DomainError> {
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Err(DomainError::validation(
                "publishing start date is after the end date",
            ));
        }
        self.publisher = Some(publisher);
        self.from = from.map(truncate_to_millis);
        self.to = to.map(truncate_to_millis);
        Ok(())
    }

    /// Clear publisher and window.
    pub fn clear(&mut self) {
        self.publisher = None;
        self.from = None;
        self.to = None;
    }

    pub fn is_published_at(&self, date: OffsetDateTime) -> bool {
        if self.publisher.is_none() {
            return false;
        }
        let from_ok = self.from.is_none_or(|from| from <= date);
        let to_ok = self.to.is_none_or(|to| date < to);
        from_ok && to_ok
    }

    pub fn is_published_now(&self) -> bool {
        self.is_published_at(OffsetDateTime::now_utc())
    }

    pub fn to_xml(&self) -> String {
        let Some(publisher) = &self.publisher else {
            return String::new();
        };
        let mut out = String::from("<published>");
        out.push_str(&publisher.to_xml());
        if let Some(from) = self.from {
            out.push_str(&format!("<from>{}</from>", format_xml_date(from)));
        }
        if let Some(to) = self.to {
            out.push_str(&format!("<to>{}</to>", format_xml_date(to)));
        }
        out.push_str("</published>");
        out
    }

    pub fn from_xml(node: &XmlNode) -> Result<Self, DomainError> {
        if node.name != "published" {
            return Err(DomainError::validation(format!(
                "expected a published block, found `{}`",
                node.name
            )));
        }
        let publisher = node
            .child("user")
            .map(User::from_xml)
            .transpose()?
            .ok_or_else(|| DomainError::validation("published block is missing its user"))?;
        let from = node
            .child_text("from")
            .map(parse_xml_date)
            .transpose()
            .map_err(|err| {
                DomainError::validation(format!("publishing start date cannot be parsed: {err}"))
            })?;
        let to = node
            .child_text("to")
            .map(parse_xml_date)
            .transpose()
            .map_err(|err| {
                DomainError::validation(format!("publishing end date cannot be parsed: {err}"))
            })?;
        let mut context = Self::new();
        context
            .set_published(publisher, from, to)
            .map_err(|_| DomainError::validation("publishing window is inverted"))?;
        Ok(context)
    }
}

fn parse_dated_block(
    node: &XmlNode,
    expected: &str,
) -> Result<(Option<User>, Option<OffsetDateTime>), DomainError> {
    if node.name != expected {
        return Err(DomainError::validation(format!(
            "expected a `{expected}` block, found `{}`",
            node.name
        )));
    }
    let user = node.child("user").map(User::from_xml).transpose()?;
    let date = node
        .child_text("date")
        .map(parse_xml_date)
        .transpose()
        .map_err(|err| DomainError::validation(format!("date cannot be parsed: {err}")))?;
    Ok((user, date))
}
