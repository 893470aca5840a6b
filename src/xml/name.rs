use std::fmt;

use serde::{Deserialize, Serialize};

pub const TEI_NS: &str = "http://www.tei-c.org/ns/1.0";
pub const JLPTEI_NS: &str = "http://jewishliturgy.org/ns/jlptei/2";
pub const PROCESSING_NS: &str = "http://jewishliturgy.org/ns/processing";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Scheme prefix of every corpus URN.
pub const URN_PREFIX: &str = "urn:x-opensiddur:";

/// A namespace-qualified element or attribute name.
///
/// Displayed (and stored in the index) in Clark notation: `{namespace}local`,
/// or bare `local` when the name has no namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: &str, local: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            local: local.to_string(),
        }
    }

    /// A name in no namespace (ordinary attributes such as `target`).
    pub fn local(local: &str) -> Self {
        Self {
            namespace: None,
            local: local.to_string(),
        }
    }

    pub fn tei(local: &str) -> Self {
        Self::new(TEI_NS, local)
    }

    pub fn jlptei(local: &str) -> Self {
        Self::new(JLPTEI_NS, local)
    }

    pub fn processing(local: &str) -> Self {
        Self::new(PROCESSING_NS, local)
    }

    pub fn xml(local: &str) -> Self {
        Self::new(XML_NS, local)
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local == local
    }

    pub fn clark(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}
