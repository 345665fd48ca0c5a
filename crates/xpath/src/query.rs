use crate::document::{escape_text, Document, Element, Node, QName};
use crate::QueryError;
use std::collections::{BTreeMap, HashSet};

/// Prefix bindings available to query expressions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespaces {
    bindings: BTreeMap<String, String>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, prefix: &str, uri: &str) -> Self {
        self.add(prefix, uri);
        self
    }

    pub fn add(&mut self, prefix: &str, uri: &str) {
        self.bindings.insert(prefix.to_string(), uri.to_string());
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for Namespaces {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut namespaces = Namespaces::new();
        for (prefix, uri) in iter {
            namespaces.add(prefix.as_ref(), uri.as_ref());
        }
        namespaces
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq)]
enum NameTest {
    Any,
    Name(QName),
}

impl NameTest {
    fn accepts(&self, name: &QName) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Name(expected) => expected == name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Element(NameTest),
    Text,
    Attribute(NameTest),
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    AttributeExists(NameTest),
    AttributeEquals(NameTest, String),
    ChildExists(NameTest),
    ChildEquals(NameTest, String),
    TextEquals(String),
    Position(usize),
}

impl Predicate {
    fn accepts(&self, element: &Element) -> bool {
        match self {
            Predicate::AttributeExists(test) => {
                element.attributes.iter().any(|a| test.accepts(&a.name))
            }
            Predicate::AttributeEquals(test, value) => element
                .attributes
                .iter()
                .any(|a| test.accepts(&a.name) && &a.value == value),
            Predicate::ChildExists(test) => element.child_elements().any(|c| test.accepts(&c.name)),
            Predicate::ChildEquals(test, value) => element
                .child_elements()
                .any(|c| test.accepts(&c.name) && &c.string_value() == value),
            Predicate::TextEquals(value) => element.texts().any(|t| t == value),
            Predicate::Position(_) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

/// A node selected by a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selected<'a> {
    Element(&'a Element),
    Text(&'a str),
    Attribute(&'a str),
}

impl Selected<'_> {
    /// The node rendered as markup: element fragments, escaped text, or the
    /// raw attribute value.
    pub fn serialize(&self) -> String {
        match self {
            Selected::Element(el) => el.to_xml_string(),
            Selected::Text(text) => escape_text(text),
            Selected::Attribute(value) => value.to_string(),
        }
    }

    pub fn string_value(&self) -> String {
        match self {
            Selected::Element(el) => el.string_value(),
            Selected::Text(text) => text.to_string(),
            Selected::Attribute(value) => value.to_string(),
        }
    }
}

/// A compiled location path.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    expression: String,
    steps: Vec<Step>,
}

impl Query {
    pub fn compile(expression: &str, namespaces: &Namespaces) -> Result<Self, QueryError> {
        let steps = Parser::new(expression, namespaces).parse()?;
        tracing::trace!("Compiled query '{}' into {} steps", expression, steps.len());
        Ok(Self {
            expression: expression.to_string(),
            steps,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Evaluate against `document`, returning each match once, in document
    /// order.
    pub fn select<'a>(&self, document: &'a Document) -> Vec<Selected<'a>> {
        let root = document.root();
        // `None` stands for the document node above the root element.
        let mut contexts: Vec<Option<&'a Element>> = vec![None];

        for (index, step) in self.steps.iter().enumerate() {
            let last = index + 1 == self.steps.len();
            match &step.test {
                NodeTest::Element(test) => {
                    let mut next: Vec<&'a Element> = Vec::new();
                    for parent in parents(&contexts, root, step.axis) {
                        let named: Vec<&'a Element> = children(parent, root)
                            .into_iter()
                            .filter(|el| test.accepts(&el.name))
                            .collect();
                        next.extend(apply_predicates(named, &step.predicates));
                    }
                    let next = in_document_order(root, next);
                    if last {
                        return next.into_iter().map(Selected::Element).collect();
                    }
                    contexts = next.into_iter().map(Some).collect();
                }
                NodeTest::Text => {
                    let wanted = pointers(&owners(&contexts, root, step.axis));
                    let mut texts = Vec::new();
                    texts_in_order(root, &wanted, &mut texts);
                    return texts
                        .into_iter()
                        .filter(|text| match_text_predicates(text, &step.predicates))
                        .map(Selected::Text)
                        .collect();
                }
                NodeTest::Attribute(test) => {
                    return owners(&contexts, root, step.axis)
                        .into_iter()
                        .flat_map(|el| el.attributes.iter())
                        .filter(|attr| test.accepts(&attr.name))
                        .map(|attr| Selected::Attribute(attr.value.as_str()))
                        .collect();
                }
            }
        }
        Vec::new()
    }

    pub fn matches(&self, document: &Document) -> bool {
        !self.select(document).is_empty()
    }
}

/// Nodes whose children a step tests. `//x` is
/// `descendant-or-self::node()/child::x`, so a descendant step tests the
/// children of every context and of everything below it.
fn parents<'a>(
    contexts: &[Option<&'a Element>],
    root: &'a Element,
    axis: Axis,
) -> Vec<Option<&'a Element>> {
    match axis {
        Axis::Child => contexts.to_vec(),
        Axis::Descendant => {
            let mut out = Vec::new();
            for context in contexts {
                out.push(*context);
                let mut below = Vec::new();
                match *context {
                    None => {
                        below.push(root);
                        descendants(root, &mut below);
                    }
                    Some(el) => descendants(el, &mut below),
                }
                out.extend(below.into_iter().map(Some));
            }
            // Overlapping contexts yield the same parent more than once.
            let mut seen: HashSet<*const Element> = HashSet::new();
            let mut document_node = false;
            out.retain(|parent| match parent {
                None => !std::mem::replace(&mut document_node, true),
                Some(el) => seen.insert(*el as *const Element),
            });
            out
        }
    }
}

fn children<'a>(parent: Option<&'a Element>, root: &'a Element) -> Vec<&'a Element> {
    match parent {
        None => vec![root],
        Some(el) => el.child_elements().collect(),
    }
}

/// Elements whose text or attribute children a terminal step reads from,
/// each once and in document order.
fn owners<'a>(contexts: &[Option<&'a Element>], root: &'a Element, axis: Axis) -> Vec<&'a Element> {
    let elements = parents(contexts, root, axis).into_iter().flatten().collect();
    in_document_order(root, elements)
}

fn descendants<'a>(element: &'a Element, out: &mut Vec<&'a Element>) {
    for child in &element.children {
        if let Node::Element(el) = child {
            out.push(el);
            descendants(el, out);
        }
    }
}

fn pointers(nodes: &[&Element]) -> HashSet<*const Element> {
    nodes.iter().map(|el| *el as *const Element).collect()
}

/// Deduplicate `nodes` and sort them by a pre-order walk from `root`.
fn in_document_order<'a>(root: &'a Element, nodes: Vec<&'a Element>) -> Vec<&'a Element> {
    if nodes.len() < 2 {
        return nodes;
    }
    let wanted = pointers(&nodes);
    let mut all = vec![root];
    descendants(root, &mut all);
    all.retain(|el| wanted.contains(&(*el as *const Element)));
    all
}

/// Text children of the `owners` elements, interleaved with nested content
/// the way they appear in the document.
fn texts_in_order<'a>(element: &'a Element, owners: &HashSet<*const Element>, out: &mut Vec<&'a str>) {
    let owned = owners.contains(&(element as *const Element));
    for child in &element.children {
        match child {
            Node::Text(text) if owned => out.push(text.as_str()),
            Node::Text(_) => {}
            Node::Element(el) => texts_in_order(el, owners, out),
        }
    }
}

/// Predicates filter in order; a position counts within the nodes that
/// survived the predicates before it.
fn apply_predicates<'a>(mut nodes: Vec<&'a Element>, predicates: &[Predicate]) -> Vec<&'a Element> {
    for predicate in predicates {
        nodes = match predicate {
            Predicate::Position(n) => nodes.get(n - 1).copied().into_iter().collect(),
            other => nodes.into_iter().filter(|el| other.accepts(el)).collect(),
        };
    }
    nodes
}

fn match_text_predicates(text: &str, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|predicate| match predicate {
        Predicate::TextEquals(value) => text == value,
        _ => true,
    })
}

const TEXT_TEST: &[char] = &['t', 'e', 'x', 't', '(', ')'];

struct Parser<'a> {
    expression: &'a str,
    chars: Vec<char>,
    pos: usize,
    namespaces: &'a Namespaces,
}

impl<'a> Parser<'a> {
    fn new(expression: &'a str, namespaces: &'a Namespaces) -> Self {
        Self {
            expression,
            chars: expression.chars().collect(),
            pos: 0,
            namespaces,
        }
    }

    fn parse(mut self) -> Result<Vec<Step>, QueryError> {
        self.skip_whitespace();
        if self.pos == self.chars.len() {
            return Err(QueryError::Empty);
        }
        if self.peek() != Some('/') {
            return Err(QueryError::NotAbsolute(self.expression.to_string()));
        }

        let mut steps: Vec<Step> = Vec::new();
        while self.peek() == Some('/') {
            if let Some(previous) = steps.last() {
                if previous.test == NodeTest::Text || matches!(previous.test, NodeTest::Attribute(_)) {
                    return Err(QueryError::TerminalStep {
                        step: self.describe(&previous.test),
                        expression: self.expression.to_string(),
                    });
                }
            }
            self.pos += 1;
            let axis = if self.peek() == Some('/') {
                self.pos += 1;
                Axis::Descendant
            } else {
                Axis::Child
            };
            steps.push(self.step(axis)?);
            self.skip_whitespace();
        }

        if self.pos < self.chars.len() {
            return Err(self.unexpected());
        }
        Ok(steps)
    }

    fn step(&mut self, axis: Axis) -> Result<Step, QueryError> {
        let test = match self.peek() {
            Some('@') => {
                self.pos += 1;
                NodeTest::Attribute(self.name_test()?)
            }
            Some(_) if self.lookahead(TEXT_TEST) => {
                self.pos += TEXT_TEST.len();
                NodeTest::Text
            }
            Some(_) => NodeTest::Element(self.name_test()?),
            None => return Err(self.unexpected()),
        };

        let mut predicates = Vec::new();
        while self.peek() == Some('[') {
            self.pos += 1;
            self.skip_whitespace();
            predicates.push(self.predicate()?);
            self.skip_whitespace();
            match self.peek() {
                Some(']') => self.pos += 1,
                Some(_) => return Err(self.unexpected()),
                None => {
                    return Err(QueryError::Unterminated {
                        what: "predicate",
                        expression: self.expression.to_string(),
                    })
                }
            }
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn predicate(&mut self) -> Result<Predicate, QueryError> {
        match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                match digits.parse::<usize>() {
                    Ok(n) if n > 0 => Ok(Predicate::Position(n)),
                    _ => {
                        self.pos = start;
                        Err(self.unexpected())
                    }
                }
            }
            Some('@') => {
                self.pos += 1;
                let test = self.name_test()?;
                match self.comparison()? {
                    Some(value) => Ok(Predicate::AttributeEquals(test, value)),
                    None => Ok(Predicate::AttributeExists(test)),
                }
            }
            Some(_) if self.lookahead(TEXT_TEST) => {
                self.pos += TEXT_TEST.len();
                match self.comparison()? {
                    Some(value) => Ok(Predicate::TextEquals(value)),
                    None => Err(self.unexpected()),
                }
            }
            Some(_) => {
                let test = self.name_test()?;
                match self.comparison()? {
                    Some(value) => Ok(Predicate::ChildEquals(test, value)),
                    None => Ok(Predicate::ChildExists(test)),
                }
            }
            None => Err(QueryError::Unterminated {
                what: "predicate",
                expression: self.expression.to_string(),
            }),
        }
    }

    fn comparison(&mut self) -> Result<Option<String>, QueryError> {
        self.skip_whitespace();
        if self.peek() != Some('=') {
            return Ok(None);
        }
        self.pos += 1;
        self.skip_whitespace();
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let literal = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(Some(literal));
            }
            self.pos += 1;
        }
        Err(QueryError::Unterminated {
            what: "string literal",
            expression: self.expression.to_string(),
        })
    }

    fn name_test(&mut self) -> Result<NameTest, QueryError> {
        if self.peek() == Some('*') {
            self.pos += 1;
            return Ok(NameTest::Any);
        }
        let first = self.ncname()?;
        if self.peek() == Some(':') {
            self.pos += 1;
            let local = self.ncname()?;
            let uri = self
                .namespaces
                .get(&first)
                .ok_or_else(|| QueryError::UnknownPrefix {
                    prefix: first.clone(),
                    expression: self.expression.to_string(),
                })?;
            return Ok(NameTest::Name(QName::new(Some(uri), &local)));
        }
        // Unprefixed names never pick up a default namespace.
        Ok(NameTest::Name(QName::new(None, &first)))
    }

    fn ncname(&mut self) -> Result<String, QueryError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let valid = if self.pos == start {
                c.is_alphabetic() || c == '_'
            } else {
                c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
            };
            if !valid {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn describe(&self, test: &NodeTest) -> String {
        match test {
            NodeTest::Text => "text()".to_string(),
            NodeTest::Attribute(_) => "@attribute".to_string(),
            NodeTest::Element(_) => "element".to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn lookahead(&self, token: &[char]) -> bool {
        self.chars[self.pos..].starts_with(token)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> QueryError {
        QueryError::Unexpected {
            found: self
                .peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string()),
            offset: self.pos,
            expression: self.expression.to_string(),
        }
    }
}
