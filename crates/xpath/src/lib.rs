//! Structural queries over XML message bodies.
//!
//! `Document` is an owned element tree built from `roxmltree`, so it can be
//! cloned along with the message that carries it. `Query` compiles the subset
//! of XPath 1.0 location paths used by filter and split stages.

pub mod document;
pub mod query;

pub use document::{Attribute, Document, Element, NamespaceDecl, Node, QName};
pub use query::{Namespaces, Query, Selected};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed XML document: {0}")]
    Malformed(#[from] roxmltree::Error),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    #[error("Empty query expression")]
    Empty,
    #[error("Only absolute location paths are supported: '{0}'")]
    NotAbsolute(String),
    #[error("Unknown namespace prefix '{prefix}' in '{expression}'")]
    UnknownPrefix { prefix: String, expression: String },
    #[error("Unexpected '{found}' at offset {offset} in '{expression}'")]
    Unexpected {
        found: String,
        offset: usize,
        expression: String,
    },
    #[error("Unterminated {what} in '{expression}'")]
    Unterminated {
        what: &'static str,
        expression: String,
    },
    #[error("'{step}' must be the last step in '{expression}'")]
    TerminalStep { step: String, expression: String },
}
