//! Ordered element trees for parsed protocol commands.
//!
//! An [`Entity`] is one XML element with its attributes, its accumulated text
//! and its child elements in document order. Commands are parsed into an
//! entity tree by the incremental builder and then handed, by value, to the
//! command executor, so a tree never outlives the command that produced it.

use std::borrow::Cow;

use quick_xml::escape::escape;

/// One element of a parsed command document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entity {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Entity>,
    text: String,
}

impl Entity {
    /// Creates an element with no attributes, children or text.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates an element carrying the given attributes in order.
    ///
    /// Later duplicates of a key replace the earlier value in place.
    #[must_use]
    pub fn with_attributes<I, K, V>(name: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entity = Self::new(name);
        for (key, value) in attributes {
            entity.set_attribute(key, value);
        }
        entity
    }

    /// Element name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Sets an attribute, keeping the position of an existing key.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Value of the named attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Appends a child after any existing children.
    pub fn append_child(&mut self, child: Self) {
        self.children.push(child);
    }

    /// Appends to the accumulated text.
    pub fn append_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// First child with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Children in document order.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Accumulated text, empty when the element had none.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    /// Serializes the tree back to XML.
    ///
    /// Text is written before the children, which is the only ordering the
    /// tree preserves.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_xml(value));
            out.push('"');
        }
        if self.text.is_empty() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        out.push_str(&escape_xml(&self.text));
        for child in &self.children {
            child.write_xml(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Escapes markup characters for attribute values and text content.
pub(crate) fn escape_xml(raw: &str) -> Cow<'_, str> {
    escape(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket_command() -> Entity {
        let mut root = Entity::with_attributes("modify_ticket", [("ticket_id", "T1")]);
        let mut comment = Entity::new("comment");
        comment.append_text("first ");
        comment.append_text("second");
        root.append_child(comment);
        root.append_child(Entity::new("status"));
        root
    }

    #[test]
    fn attributes_keep_insertion_order_and_unique_keys() {
        let mut entity = Entity::with_attributes("get_tickets", [("filter", "a"), ("trash", "0")]);
        entity.set_attribute("filter", "b");
        entity.set_attribute("ticket_id", "T1");

        let attributes: Vec<_> = entity.attributes().collect();
        assert_eq!(
            attributes,
            vec![("filter", "b"), ("trash", "0"), ("ticket_id", "T1")]
        );
    }

    #[test]
    fn text_accumulates_in_arrival_order() {
        let root = ticket_command();
        let comment = root.child("comment").expect("comment child");
        assert_eq!(comment.text(), "first second");
    }

    #[test]
    fn child_lookup_returns_first_match() {
        let mut root = Entity::new("create_ticket");
        root.append_child(Entity::with_attributes("result", [("id", "R1")]));
        root.append_child(Entity::with_attributes("result", [("id", "R2")]));

        let result = root.child("result").expect("result child");
        assert_eq!(result.attribute("id"), Some("R1"));
        assert!(root.child("copy").is_none());
    }

    #[test]
    fn serializes_with_escaping() {
        let mut root = Entity::with_attributes("create_ticket", [("note", "a\"b")]);
        let mut comment = Entity::new("comment");
        comment.append_text("x < y & z");
        root.append_child(comment);

        assert_eq!(
            root.to_xml(),
            "<create_ticket note=\"a&quot;b\"><comment>x &lt; y &amp; z</comment></create_ticket>"
        );
    }

    #[test]
    fn empty_elements_serialize_self_closing() {
        assert_eq!(ticket_command().children()[1].to_xml(), "<status/>");
    }
}
