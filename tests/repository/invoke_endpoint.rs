mod common;

use common::{MockRepository, PATCH_DOCUMENT, TURTLE_DOCUMENT};
use courier::models::endpoints::config::RepositoryConfig;
use courier::models::endpoints::{InvokeError, InvokeOptions, Invoker, RepositoryEndpoint};
use courier::models::message::{headers, Body, Message};

fn endpoint(repo: &MockRepository) -> RepositoryEndpoint {
    RepositoryEndpoint::new("repository", &RepositoryConfig::new(repo.base_url.clone())).unwrap()
}

async fn create(endpoint: &RepositoryEndpoint) -> Message {
    let message = Message::new(TURTLE_DOCUMENT)
        .with_header(headers::HTTP_METHOD, "POST")
        .with_header(headers::CONTENT_TYPE, "text/turtle");
    endpoint.invoke(message, &InvokeOptions::default()).await.unwrap()
}

#[tokio::test]
async fn test_post_sets_location_and_status() {
    let repo = MockRepository::start().await;
    let endpoint = endpoint(&repo);

    let reply = create(&endpoint).await;
    assert_eq!(reply.response_code(), Some(201));
    assert_eq!(reply.header_str(headers::CONTENT_TYPE), Some("text/plain"));

    let location = reply.header_str(headers::LOCATION).unwrap().to_string();
    assert!(location.starts_with(&repo.base_url));
    assert_eq!(reply.body.to_text(), Some(location));

    let request = repo.last_request();
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/rest");
    assert_eq!(request.content_type.as_deref(), Some("text/turtle"));
    assert_eq!(request.body, TURTLE_DOCUMENT);
}

#[tokio::test]
async fn test_get_is_default_and_sends_accept() {
    let repo = MockRepository::start().await;
    let endpoint = endpoint(&repo);
    let location = create(&endpoint).await.header_str(headers::LOCATION).unwrap().to_string();
    let identifier = location.replace(&repo.base_url, "");

    // A body on a GET is not sent.
    let message = Message::new("ignored").with_header(headers::RESOURCE_ID, identifier.as_str());
    let reply = endpoint.invoke(message, &InvokeOptions::default()).await.unwrap();

    assert_eq!(reply.response_code(), Some(200));
    assert_eq!(reply.header_str(headers::CONTENT_TYPE), Some("application/rdf+xml"));
    assert!(reply.body.to_text().unwrap().contains("some title &amp; other"));

    let request = repo.last_request();
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, format!("/rest{}", identifier));
    assert_eq!(request.accept.as_deref(), Some("application/rdf+xml"));
    assert!(request.body.is_empty());
}

#[tokio::test]
async fn test_stage_options_override_headers() {
    let repo = MockRepository::start().await;
    let endpoint = endpoint(&repo);
    let location = create(&endpoint).await.header_str(headers::LOCATION).unwrap().to_string();
    let identifier = location.replace(&repo.base_url, "");

    let message = Message::default()
        .with_header(headers::RESOURCE_ID, identifier.as_str())
        .with_header(headers::HTTP_METHOD, "DELETE")
        .with_header(headers::ACCEPT, "text/turtle");
    let options = InvokeOptions::default().method("get").accept("application/ld+json");
    endpoint.invoke(message, &options).await.unwrap();

    let request = repo.last_request();
    assert_eq!(request.method, "GET");
    assert_eq!(request.accept.as_deref(), Some("application/ld+json"));
}

#[tokio::test]
async fn test_patch_defaults_to_sparql_update() {
    let repo = MockRepository::start().await;
    let endpoint = endpoint(&repo);
    let location = create(&endpoint).await.header_str(headers::LOCATION).unwrap().to_string();
    let identifier = location.replace(&repo.base_url, "");

    let message = Message::new(PATCH_DOCUMENT)
        .with_header(headers::RESOURCE_ID, identifier.as_str())
        .with_header(headers::HTTP_METHOD, "PATCH")
        .with_header(headers::CONTENT_TYPE, "text/turtle");
    let reply = endpoint.invoke(message.clone(), &InvokeOptions::default()).await;
    // An explicit content type wins, and the mock rejects it.
    assert!(matches!(
        reply,
        Err(InvokeError::FailedStatus { status: 415, .. })
    ));

    let mut message = message;
    message.remove_header(headers::CONTENT_TYPE);
    let reply = endpoint.invoke(message, &InvokeOptions::default()).await.unwrap();
    assert_eq!(reply.response_code(), Some(204));
    assert_eq!(reply.body, Body::Empty);
    assert!(reply.header(headers::CONTENT_TYPE).is_none());
    assert_eq!(
        repo.last_request().content_type.as_deref(),
        Some("application/sparql-update")
    );
}

#[tokio::test]
async fn test_failure_status_error_or_passthrough() {
    let repo = MockRepository::start().await;
    let endpoint = endpoint(&repo);
    let missing = Message::default().with_header(headers::RESOURCE_ID, "/missing");

    let err = endpoint
        .invoke(missing.clone(), &InvokeOptions::default())
        .await
        .unwrap_err();
    match err {
        InvokeError::FailedStatus { method, url, status, .. } => {
            assert_eq!(method, "GET");
            assert_eq!(url, format!("{}/missing", repo.base_url));
            assert_eq!(status, 404);
        }
        other => panic!("unexpected error: {}", other),
    }

    let reply = endpoint
        .invoke(missing, &InvokeOptions::default().throw_on_failure(false))
        .await
        .unwrap();
    assert_eq!(reply.response_code(), Some(404));
}

#[tokio::test]
async fn test_unreachable_repository_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = RepositoryEndpoint::new(
        "repository",
        &RepositoryConfig::new(format!("http://{}/rest", addr)),
    )
    .unwrap();
    let err = endpoint
        .invoke(Message::default(), &InvokeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::Transport(_)));
}
