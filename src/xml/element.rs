use super::{Node, QName};

/// An owned, mutable output element built by the compiler.
///
/// Uses the same text/tail model as the source [`Node`](super::Node).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<(QName, String)>,
    pub text: String,
    pub children: Vec<Element>,
    pub tail: String,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// Copies the tag and attributes of a source node, nothing else.
    pub fn shell(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            attributes: node.attributes.clone(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attribute(&QName::local(local))
    }

    /// Sets an attribute, replacing any existing value in place.
    pub fn set_attribute(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Appends character data after the current last child (or into `text`).
    pub fn push_text(&mut self, text: &str) {
        match self.children.last_mut() {
            Some(last) => last.tail.push_str(text),
            None => self.text.push_str(text),
        }
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// This element followed by all descendants, in document order.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.descendants());
        }
        out
    }

    pub fn find_all(&self, name: &QName) -> Vec<&Element> {
        self.descendants()
            .into_iter()
            .filter(|e| e.name == *name)
            .collect()
    }

    /// Concatenated character data of this subtree, excluding its own tail.
    pub fn text_content(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.text_content());
            out.push_str(&child.tail);
        }
        out
    }
}
