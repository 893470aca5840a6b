use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{PrefixDeclaration, ResolveResult};
use quick_xml::reader::NsReader;

use super::{Element, QName, XML_NS};
use crate::error::XmlError;

/// Index of a node inside its [`Document`]. Nodes are numbered in document order.
pub type NodeId = usize;

/// One element of a parsed source document.
///
/// `text` is the character data before the first child; `tail` is the
/// character data between this element's end tag and the next sibling.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: QName,
    pub attributes: Vec<(QName, String)>,
    pub text: String,
    pub tail: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Stable address of this element within its file, e.g. `/tei:TEI/tei:text[1]`.
    pub path: String,
}

impl Node {
    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Looks up an attribute in no namespace.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.namespace.is_none() && key.local == local)
            .map(|(_, value)| value.as_str())
    }

    pub fn corresp(&self) -> Option<&str> {
        self.attr("corresp")
    }

    pub fn xml_id(&self) -> Option<&str> {
        self.attribute(&QName::xml("id"))
    }
}

/// An immutable parsed XML tree for one (project, file).
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    paths: HashMap<String, NodeId>,
    namespaces: Vec<(Option<String>, String)>,
}

impl Document {
    pub fn from_file(path: &Path) -> Result<Self, XmlError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut reader = NsReader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut builder = Builder::default();
        loop {
            let (resolved, event) = reader.read_resolved_event()?;
            let namespace = element_namespace(resolved)?;
            match event {
                Event::Start(start) => builder.open(&reader, namespace, &start)?,
                Event::Empty(start) => {
                    builder.open(&reader, namespace, &start)?;
                    builder.close();
                }
                Event::End(_) => builder.close(),
                Event::Text(text) => builder.text(&text.unescape()?),
                Event::CData(data) => builder.text(std::str::from_utf8(&data)?),
                Event::Eof => break,
                _ => {}
            }
        }

        builder.finish()
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate()
    }

    pub fn by_path(&self, path: &str) -> Option<NodeId> {
        self.paths.get(path).copied()
    }

    /// First node in document order matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&Node) -> bool) -> Option<NodeId> {
        self.nodes.iter().position(predicate)
    }

    /// Namespace declarations seen in the source, first declaration of each prefix wins.
    pub fn namespaces(&self) -> &[(Option<String>, String)] {
        &self.namespaces
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id].parent, move |&p| self.nodes[p].parent)
    }

    /// True when `id` is `ancestor` or lies beneath it.
    pub fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
        id == ancestor || self.ancestors(id).any(|a| a == ancestor)
    }

    /// The `xml:lang` in scope at `id` (nearest ancestor-or-self declaring one).
    pub fn lang(&self, id: NodeId) -> Option<&str> {
        let lang = QName::xml("lang");
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|n| self.nodes[n].attribute(&lang))
    }

    /// Deep copy of the subtree at `id` as an owned output element.
    pub fn to_element(&self, id: NodeId) -> Element {
        let node = &self.nodes[id];
        let mut element = Element::shell(node);
        element.text = node.text.clone();
        element.tail = node.tail.clone();
        element.children = node.children.iter().map(|&c| self.to_element(c)).collect();
        element
    }
}

fn utf8(bytes: &[u8]) -> Result<String, XmlError> {
    Ok(std::str::from_utf8(bytes)?.to_string())
}

fn element_namespace(resolved: ResolveResult) -> Result<Option<String>, XmlError> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(utf8(ns.as_ref())?)),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) if prefix == b"xml" => Ok(Some(XML_NS.to_string())),
        ResolveResult::Unknown(prefix) => Err(XmlError::UnknownPrefix(utf8(&prefix)?)),
    }
}

#[derive(Default)]
struct Builder {
    nodes: Vec<Node>,
    open: Vec<NodeId>,
    paths: HashMap<String, NodeId>,
    namespaces: Vec<(Option<String>, String)>,
}

impl Builder {
    fn open(
        &mut self,
        reader: &NsReader<&[u8]>,
        namespace: Option<String>,
        start: &BytesStart,
    ) -> Result<(), XmlError> {
        let local = utf8(start.local_name().as_ref())?;
        let prefix = start
            .name()
            .prefix()
            .map(|p| utf8(p.as_ref()))
            .transpose()?;
        let name = QName { namespace, local };

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            if let Some(binding) = attr.key.as_namespace_binding() {
                let declared = match binding {
                    PrefixDeclaration::Default => None,
                    PrefixDeclaration::Named(p) => Some(utf8(p)?),
                };
                let uri = attr.unescape_value()?.into_owned();
                if !self.namespaces.iter().any(|(p, _)| *p == declared) {
                    self.namespaces.push((declared, uri));
                }
                continue;
            }
            let (resolved, local) = reader.resolve_attribute(attr.key);
            let namespace = match resolved {
                ResolveResult::Bound(ns) => Some(utf8(ns.as_ref())?),
                ResolveResult::Unbound => None,
                ResolveResult::Unknown(p) if p == b"xml" => Some(XML_NS.to_string()),
                ResolveResult::Unknown(p) => return Err(XmlError::UnknownPrefix(utf8(&p)?)),
            };
            let key = QName {
                namespace,
                local: utf8(local.as_ref())?,
            };
            attributes.push((key, attr.unescape_value()?.into_owned()));
        }

        let parent = self.open.last().copied();
        if parent.is_none() && !self.nodes.is_empty() {
            return Err(XmlError::MultipleRoots);
        }

        let segment = match &prefix {
            Some(p) => format!("{}:{}", p, name.local),
            None => name.local.clone(),
        };
        let path = match parent {
            Some(p) => {
                let position = 1 + self.nodes[p]
                    .children
                    .iter()
                    .filter(|&&c| self.nodes[c].name == name)
                    .count();
                format!("{}/{}[{}]", self.nodes[p].path, segment, position)
            }
            None => format!("/{}", segment),
        };

        let id = self.nodes.len();
        self.paths.insert(path.clone(), id);
        self.nodes.push(Node {
            name,
            attributes,
            text: String::new(),
            tail: String::new(),
            parent,
            children: Vec::new(),
            path,
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(id);
        }
        self.open.push(id);
        Ok(())
    }

    fn close(&mut self) {
        self.open.pop();
    }

    fn text(&mut self, text: &str) {
        // Character data outside the root element is dropped.
        let Some(&current) = self.open.last() else {
            return;
        };
        match self.nodes[current].children.last().copied() {
            Some(last) => self.nodes[last].tail.push_str(text),
            None => self.nodes[current].text.push_str(text),
        }
    }

    fn finish(self) -> Result<Document, XmlError> {
        if let Some(&unclosed) = self.open.last() {
            return Err(XmlError::Unclosed(self.nodes[unclosed].name.local.clone()));
        }
        if self.nodes.is_empty() {
            return Err(XmlError::NoRoot);
        }
        Ok(Document {
            nodes: self.nodes,
            paths: self.paths,
            namespaces: self.namespaces,
        })
    }
}
