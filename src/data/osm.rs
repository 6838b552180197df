use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Node,
    Way,
}

impl ElementKind {
    pub fn from_name(name: &[u8]) -> Option<ElementKind> {
        match name {
            b"node" => Some(ElementKind::Node),
            b"way" => Some(ElementKind::Way),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
        }
    }
}

/// Attributes of one markup element, unescaped and in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(pub Vec<(String, String)>);

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Looks up `name` on a top-level `element`. The error names the element's id when it has one.
    pub fn require(&self, element: &str, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| {
            let described = match self.get("id") {
                Some(id) => format!("<{} id=\"{}\">", element, id),
                None => format!("<{}>", element),
            };
            Error::missing_attribute(&described, name)
        })
    }

    /// Looks up `name` on a `child` element (`tag`, `nd`) of the element with id `parent_id`.
    pub fn require_child(&self, child: &str, parent_id: &str, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| {
            Error::missing_attribute(&format!("<{}> of element {}", child, parent_id), name)
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Attributes(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A top-level `node` or `way` as read from the input document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub kind: ElementKind,
    pub attributes: Attributes,
    /// `tag` children, document order.
    pub tags: Vec<Attributes>,
    /// `nd` children, document order. Always empty for nodes in well-formed input.
    pub nds: Vec<Attributes>,
}

impl Element {
    pub fn new(kind: ElementKind, attributes: Attributes) -> Element {
        Element {
            kind,
            attributes,
            tags: Vec::new(),
            nds: Vec::new(),
        }
    }
}
