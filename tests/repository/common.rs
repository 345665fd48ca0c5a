#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
pub const REPOSITORY_NS: &str = "http://fedora.info/definitions/v4/repository#";

pub const TURTLE_DOCUMENT: &str = "@prefix dc: <http://purl.org/dc/elements/1.1/> .\n\n\
    <> dc:title \"some title & other\" .";

pub const RDF_DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <rdf:Description rdf:about="">
    <dc:title>posted &amp; fetched</dc:title>
    <dc:creator>courier</dc:creator>
  </rdf:Description>
</rdf:RDF>"#;

pub const PATCH_DOCUMENT: &str = "PREFIX dc: <http://purl.org/dc/elements/1.1/>\n\n\
    INSERT { <> dc:title \"some other title\" } WHERE {}";

/// A request as the mock repository saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone)]
struct Resource {
    binary: bool,
    /// RDF/XML stored verbatim and served back as is.
    document: Option<String>,
    titles: Vec<String>,
    gone: bool,
}

#[derive(Default)]
struct Repository {
    base_url: String,
    next_id: usize,
    resources: HashMap<String, Resource>,
    requests: Vec<Recorded>,
}

type Shared = Arc<Mutex<Repository>>;

/// In-memory stand-in for an LDP repository mounted at `/rest`.
pub struct MockRepository {
    pub base_url: String,
    state: Shared,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockRepository {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(Repository::default()));
        let app = Router::new()
            .route("/rest", any(handle))
            .route("/rest/{*path}", any(handle))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/rest", addr);
        state.lock().unwrap().base_url = base_url.clone();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            state,
            _handle: handle,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("no request recorded")
    }
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Every quoted literal following `dc:title`.
fn titles(document: &str) -> Vec<String> {
    document
        .split("dc:title")
        .skip(1)
        .filter_map(|rest| {
            let start = rest.find('"')? + 1;
            let len = rest[start..].find('"')?;
            Some(rest[start..start + len].to_string())
        })
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn rdf_xml(uri: &str, resource: &Resource) -> String {
    let kind = if resource.binary { "Binary" } else { "Container" };
    let titles: String = resource
        .titles
        .iter()
        .map(|t| format!("\n    <dc:title>{}</dc:title>", escape(t)))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="{RDF_NS}" xmlns:dc="{DC_NS}">
  <rdf:Description rdf:about="{uri}">
    <rdf:type rdf:resource="{REPOSITORY_NS}{kind}"/>{titles}
  </rdf:Description>
</rdf:RDF>"#
    )
}

const RDF_XML: &str = "application/rdf+xml";

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_end_matches('/').to_string();
    let content_type = header_value(&headers, header::CONTENT_TYPE);
    let text = String::from_utf8_lossy(&body).into_owned();

    let mut repo = state.lock().unwrap();
    repo.requests.push(Recorded {
        method: method.to_string(),
        path: path.clone(),
        accept: header_value(&headers, header::ACCEPT),
        content_type: content_type.clone(),
        body: text.clone(),
    });

    let base = repo.base_url.trim_end_matches("/rest").to_string();
    let resource_uri = format!("{}{}", base, path);

    match method {
        Method::POST => {
            repo.next_id += 1;
            let child = format!("{}/{}", path, repo.next_id);
            let turtle = content_type.as_deref() == Some("text/turtle");
            let rdf = content_type.as_deref() == Some(RDF_XML);
            repo.resources.insert(
                child.clone(),
                Resource {
                    binary: !(turtle || rdf),
                    document: rdf.then(|| text.clone()),
                    titles: if turtle { titles(&text) } else { Vec::new() },
                    gone: false,
                },
            );
            let location = format!("{}{}", base, child);
            (
                StatusCode::CREATED,
                [
                    (header::LOCATION, location.clone()),
                    (header::CONTENT_TYPE, "text/plain".to_string()),
                ],
                location,
            )
                .into_response()
        }
        Method::GET => match repo.resources.get(&path) {
            None => StatusCode::NOT_FOUND.into_response(),
            Some(resource) if resource.gone => (
                StatusCode::GONE,
                [(header::CONTENT_TYPE, RDF_XML)],
                "Discovered tombstone resource",
            )
                .into_response(),
            Some(resource) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, RDF_XML)],
                resource
                    .document
                    .clone()
                    .unwrap_or_else(|| rdf_xml(&resource_uri, resource)),
            )
                .into_response(),
        },
        Method::PATCH => {
            if content_type.as_deref() != Some("application/sparql-update") {
                return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
            }
            match repo.resources.get_mut(&path) {
                Some(resource) if !resource.gone => {
                    resource.titles.extend(titles(&text));
                    StatusCode::NO_CONTENT.into_response()
                }
                Some(_) => StatusCode::GONE.into_response(),
                None => StatusCode::NOT_FOUND.into_response(),
            }
        }
        Method::DELETE => match repo.resources.get_mut(&path) {
            Some(resource) if !resource.gone => {
                resource.gone = true;
                StatusCode::NO_CONTENT.into_response()
            }
            Some(_) => StatusCode::GONE.into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}
