use courier_xpath::Document;
use serde::Deserialize;
use thiserror::Error;

/// The shapes a message body can take. `ConvertBody` stages move between
/// them explicitly; nothing converts implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    Bytes,
    Text,
    Xml,
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("Body is not well-formed XML: {0}")]
    MalformedXml(#[from] courier_xpath::ParseError),
    #[error("Cannot convert an empty body to {0:?}")]
    EmptyBody(Representation),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    Text(String),
    Xml(Document),
}

impl Body {
    pub fn representation(&self) -> Option<Representation> {
        match self {
            Body::Empty => None,
            Body::Bytes(_) => Some(Representation::Bytes),
            Body::Text(_) => Some(Representation::Text),
            Body::Xml(_) => Some(Representation::Xml),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Body::Xml(doc) => Some(doc),
            _ => None,
        }
    }

    /// Convert into `target`. An empty body stays empty for `Bytes` and `Text`
    /// but cannot become a document.
    pub fn convert(self, target: Representation) -> Result<Body, ConversionError> {
        let converted = match (self, target) {
            (Body::Empty, Representation::Xml) => {
                return Err(ConversionError::EmptyBody(Representation::Xml))
            }
            (Body::Empty, _) => Body::Empty,

            (Body::Bytes(bytes), Representation::Bytes) => Body::Bytes(bytes),
            (Body::Bytes(bytes), Representation::Text) => Body::Text(String::from_utf8(bytes)?),
            (Body::Bytes(bytes), Representation::Xml) => {
                let text = String::from_utf8(bytes)?;
                Body::Xml(Document::parse(&text)?)
            }

            (Body::Text(text), Representation::Bytes) => Body::Bytes(text.into_bytes()),
            (Body::Text(text), Representation::Text) => Body::Text(text),
            (Body::Text(text), Representation::Xml) => Body::Xml(Document::parse(&text)?),

            (Body::Xml(doc), Representation::Bytes) => Body::Bytes(doc.to_xml_string().into_bytes()),
            (Body::Xml(doc), Representation::Text) => Body::Text(doc.to_xml_string()),
            (Body::Xml(doc), Representation::Xml) => Body::Xml(doc),
        };
        Ok(converted)
    }

    /// Text view used by capture queries. `None` for an empty body.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Body::Empty => None,
            Body::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Body::Text(text) => Some(text.clone()),
            Body::Xml(doc) => Some(doc.to_xml_string()),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Body::Empty => Vec::new(),
            Body::Bytes(bytes) => bytes,
            Body::Text(text) => text.into_bytes(),
            Body::Xml(doc) => doc.to_xml_string().into_bytes(),
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Document> for Body {
    fn from(doc: Document) -> Self {
        Body::Xml(doc)
    }
}

impl<T: Into<Body>> From<Option<T>> for Body {
    fn from(body: Option<T>) -> Self {
        body.map(Into::into).unwrap_or_default()
    }
}
