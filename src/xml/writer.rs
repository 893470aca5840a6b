use quick_xml::escape::escape;

use super::{Element, QName, JLPTEI_NS, PROCESSING_NS, TEI_NS, XML_NS};

const CONVENTIONAL_PREFIXES: &[(&str, &str)] =
    &[("tei", TEI_NS), ("j", JLPTEI_NS), ("p", PROCESSING_NS)];

/// Serializes an output tree, declaring every namespace it uses once on the root.
pub struct Serializer {
    hints: Vec<(Option<String>, String)>,
    declaration: bool,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            hints: CONVENTIONAL_PREFIXES
                .iter()
                .map(|(p, ns)| (Some(p.to_string()), ns.to_string()))
                .collect(),
            declaration: true,
        }
    }

    /// Prefers the given (prefix, namespace) declarations over the conventional ones.
    pub fn with_declarations(mut self, declarations: &[(Option<String>, String)]) -> Self {
        let mut hints = declarations.to_vec();
        hints.append(&mut self.hints);
        self.hints = hints;
        self
    }

    pub fn without_declaration(mut self) -> Self {
        self.declaration = false;
        self
    }

    pub fn serialize(&self, root: &Element) -> String {
        let bindings = self.bind(root);
        let mut out = String::new();
        if self.declaration {
            out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        }
        write_element(&mut out, root, &bindings, true);
        out
    }

    fn bind(&self, root: &Element) -> Bindings {
        let mut element_namespaces: Vec<&str> = Vec::new();
        let mut attribute_namespaces: Vec<&str> = Vec::new();
        let mut unqualified = false;
        for element in root.descendants() {
            match &element.name.namespace {
                Some(ns) => push_unique(&mut element_namespaces, ns),
                None => unqualified = true,
            }
            for (key, _) in &element.attributes {
                if let Some(ns) = key.namespace.as_deref().filter(|ns| *ns != XML_NS) {
                    push_unique(&mut attribute_namespaces, ns);
                }
            }
        }

        let mut order = element_namespaces;
        for ns in &attribute_namespaces {
            push_unique(&mut order, ns);
        }

        let mut prefixes: Vec<(String, Option<String>)> = Vec::new();
        let mut generated = 0;
        for ns in order {
            // A default namespace would capture unqualified elements and cannot apply to attributes.
            let needs_prefix = unqualified || attribute_namespaces.contains(&ns);
            let hinted = self
                .hints
                .iter()
                .filter(|(prefix, uri)| uri == ns && !(needs_prefix && prefix.is_none()))
                .map(|(prefix, _)| prefix.clone())
                .find(|prefix| prefix.as_deref() != Some("xml") && !is_taken(&prefixes, prefix));
            let prefix = match hinted {
                Some(prefix) => prefix,
                None => loop {
                    let candidate = Some(format!("ns{}", generated));
                    generated += 1;
                    if !is_taken(&prefixes, &candidate) {
                        break candidate;
                    }
                },
            };
            prefixes.push((ns.to_string(), prefix));
        }

        Bindings { prefixes }
    }
}

fn push_unique<'a>(list: &mut Vec<&'a str>, ns: &'a str) {
    if !list.contains(&ns) {
        list.push(ns);
    }
}

fn is_taken(prefixes: &[(String, Option<String>)], prefix: &Option<String>) -> bool {
    prefixes.iter().any(|(_, bound)| bound == prefix)
}

struct Bindings {
    prefixes: Vec<(String, Option<String>)>,
}

impl Bindings {
    fn qualify(&self, name: &QName) -> String {
        let Some(ns) = name.namespace.as_deref() else {
            return name.local.clone();
        };
        if ns == XML_NS {
            return format!("xml:{}", name.local);
        }
        match self.prefixes.iter().find(|(uri, _)| uri == ns) {
            Some((_, Some(prefix))) => format!("{}:{}", prefix, name.local),
            _ => name.local.clone(),
        }
    }
}

fn write_element(out: &mut String, element: &Element, bindings: &Bindings, is_root: bool) {
    let tag = bindings.qualify(&element.name);
    out.push('<');
    out.push_str(&tag);

    if is_root {
        for (ns, prefix) in &bindings.prefixes {
            match prefix {
                Some(p) => out.push_str(&format!(" xmlns:{}=\"{}\"", p, escape(ns.as_str()))),
                None => out.push_str(&format!(" xmlns=\"{}\"", escape(ns.as_str()))),
            }
        }
    }
    for (key, value) in &element.attributes {
        out.push_str(&format!(
            " {}=\"{}\"",
            bindings.qualify(key),
            escape(value.as_str())
        ));
    }

    if element.text.is_empty() && element.children.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    out.push_str(&escape(element.text.as_str()));
    for child in &element.children {
        write_element(out, child, bindings, false);
        out.push_str(&escape(child.tail.as_str()));
    }
    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
}
