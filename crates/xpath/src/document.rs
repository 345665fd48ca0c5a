use crate::ParseError;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Expanded name: namespace URI plus local part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: Option<&str>, local: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local: local.to_string(),
        }
    }
}

/// A namespace binding in scope on an element. `prefix` is `None` for the
/// default namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: QName,
    pub prefix: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: QName,
    pub prefix: Option<String>,
    pub attributes: Vec<Attribute>,
    /// Every binding in scope, inherited ones included.
    pub namespaces: Vec<NamespaceDecl>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| &a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.children.iter().filter_map(|child| match child {
            Node::Text(text) => Some(text.as_str()),
            Node::Element(_) => None,
        })
    }

    /// XPath string value: concatenation of all descendant text.
    pub fn string_value(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Serialize this element as a standalone fragment. All bindings in scope
    /// are declared on the fragment root so the markup parses on its own.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        write_element(&mut out, self, &[]);
        out
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => collect_text(el, out),
        }
    }
}

/// An owned, parsed XML document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let parsed = roxmltree::Document::parse(text)?;
        let root = convert_element(parsed.root_element());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn to_xml_string(&self) -> String {
        self.root.to_xml_string()
    }
}

fn convert_element(node: roxmltree::Node<'_, '_>) -> Element {
    let tag = node.tag_name();
    let prefix = tag
        .namespace()
        .and_then(|uri| node.lookup_prefix(uri))
        .map(str::to_string);

    let attributes = node
        .attributes()
        .map(|attr| Attribute {
            name: QName::new(attr.namespace(), attr.name()),
            prefix: attr
                .namespace()
                .and_then(|uri| node.lookup_prefix(uri))
                .map(str::to_string),
            value: attr.value().to_string(),
        })
        .collect();

    let namespaces = node
        .namespaces()
        .map(|ns| NamespaceDecl {
            prefix: ns.name().map(str::to_string),
            uri: ns.uri().to_string(),
        })
        .collect();

    let mut children = Vec::new();
    for child in node.children() {
        if child.is_element() {
            children.push(Node::Element(convert_element(child)));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                children.push(Node::Text(text.to_string()));
            }
        }
    }

    Element {
        name: QName::new(tag.namespace(), tag.name()),
        prefix,
        attributes,
        namespaces,
        children,
    }
}

fn qualified(prefix: &Option<String>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

fn write_element(out: &mut String, element: &Element, inherited: &[NamespaceDecl]) {
    let name = qualified(&element.prefix, &element.name.local);
    out.push('<');
    out.push_str(&name);

    for ns in &element.namespaces {
        if ns.uri == XML_NAMESPACE || inherited.contains(ns) {
            continue;
        }
        match &ns.prefix {
            Some(p) => out.push_str(&format!(" xmlns:{}=\"", p)),
            None => out.push_str(" xmlns=\""),
        }
        out.push_str(&escape_attribute(&ns.uri));
        out.push('"');
    }

    for attr in &element.attributes {
        out.push(' ');
        out.push_str(&qualified(&attr.prefix, &attr.name.local));
        out.push_str("=\"");
        out.push_str(&escape_attribute(&attr.value));
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in &element.children {
        match child {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Element(el) => write_element(out, el, &element.namespaces),
        }
    }
    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
