//! Minimal XML tree for the OnTrac tracking payload
//!
//! OnTrac is the one carrier answering in XML. Its responses arrive
//! inside a service-generated envelope whose exact wrapper elements are
//! not worth modelling, so instead of serde-mapping the document we walk
//! it into a small element tree and search by local name, the same way
//! the payload's consumers navigate it: find the `Shipment`, read child
//! texts, iterate `Event` elements.

use quick_xml::Reader;
use quick_xml::events::Event;

/// One parsed XML element: local name, accumulated text, child elements.
/// Attributes and namespaces are ignored; the OnTrac
/// payload carries everything as element text.
#[derive(Debug, Default)]
pub(crate) struct XmlNode {
    pub name: String,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// First direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the named direct child; `None` when the child is
    /// absent or empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        let text = self.child(name)?.text.trim();
        if text.is_empty() { None } else { Some(text) }
    }

    /// Depth-first search for the first descendant with the given name.
    pub fn descendant(&self, name: &str) -> Option<&XmlNode> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.descendant(name) {
                return Some(found);
            }
        }
        None
    }
}

/// Parse a document into a synthetic root node holding the top-level
/// elements as children.
pub(crate) fn parse(xml: &str) -> Result<XmlNode, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // stack[0] is the synthetic root; real elements push/pop above it
    let mut stack: Vec<XmlNode> = vec![XmlNode::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(XmlNode {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..XmlNode::default()
                });
            }
            Ok(Event::Empty(e)) => {
                let node = XmlNode {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..XmlNode::default()
                };
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err("unbalanced XML document".into());
                }
                let node = stack.pop().expect("stack checked non-empty");
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }

    if stack.len() != 1 {
        return Err("unbalanced XML document".into());
    }
    Ok(stack.pop().expect("synthetic root always present"))
}
