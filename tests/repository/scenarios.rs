mod common;

use common::{MockRepository, PATCH_DOCUMENT, RDF_DOCUMENT, REPOSITORY_NS, TURTLE_DOCUMENT};
use courier::config::Config;
use courier::models::message::{headers, Body, Headers, Message, Representation};
use courier::pipeline::PipelineContext;
use serde_json::json;
use std::time::Duration;

fn routes(base_url: &str) -> String {
    format!(
        r#"
        [expectations]
        timeout_ms = 2000

        [namespaces]
        rdf = "http://www.w3.org/1999/02/22-rdf-syntax-ns#"
        dc = "http://purl.org/dc/elements/1.1/"

        [endpoints.repository]
        type = "http"
        base_url = "{base_url}"

        [endpoints.created]
        type = "capture"

        [endpoints.operation]
        type = "capture"

        [endpoints.filter]
        type = "capture"

        [endpoints.title]
        type = "capture"

        [endpoints.verifyGone]
        type = "capture"

        [pipelines.create]
        stages = [
            {{ type = "invoke", endpoint = "repository" }},
            {{ type = "capture", endpoint = "created" }},
        ]

        [pipelines.patch]
        stages = [
            {{ type = "set_header", key = "HTTP_METHOD", value = "PATCH" }},
            {{ type = "invoke", endpoint = "repository" }},
            {{ type = "capture", endpoint = "operation" }},
        ]

        [pipelines.title]
        stages = [
            {{ type = "invoke", endpoint = "repository" }},
            {{ type = "convert_body", to = "xml" }},
            {{ type = "filter", xpath = "/rdf:RDF/rdf:Description/rdf:type[@rdf:resource='{REPOSITORY_NS}Container']" }},
            {{ type = "capture", endpoint = "filter" }},
            {{ type = "split", xpath = "/rdf:RDF/rdf:Description/dc:title/text()" }},
            {{ type = "capture", endpoint = "title" }},
        ]

        [pipelines.fetch]
        stages = [
            {{ type = "invoke", endpoint = "repository" }},
            {{ type = "convert_body", to = "xml" }},
        ]

        [pipelines.delete]
        stages = [
            {{ type = "set_header", key = "HTTP_METHOD", value = "DELETE" }},
            {{ type = "invoke", endpoint = "repository" }},
            {{ type = "capture", endpoint = "operation" }},
            {{ type = "set_header", key = "HTTP_METHOD", value = "GET" }},
            {{ type = "invoke", endpoint = "repository", throw_on_failure = false }},
            {{ type = "capture", endpoint = "verifyGone" }},
        ]
        "#
    )
}

async fn context(repo: &MockRepository) -> PipelineContext {
    let config = Config::from_toml(&routes(&repo.base_url)).unwrap();
    PipelineContext::from_config(&config).unwrap()
}

fn identifier_headers(identifier: &str) -> Headers {
    let mut headers = Headers::new();
    headers.insert(headers::RESOURCE_ID.to_string(), json!(identifier));
    headers
}

async fn create_container(context: &PipelineContext, repo: &MockRepository, content_type: &str) -> String {
    let mut headers = Headers::new();
    headers.insert(headers::HTTP_METHOD.to_string(), json!("POST"));
    headers.insert(headers::CONTENT_TYPE.to_string(), json!(content_type));

    let created = context
        .submit("create", TURTLE_DOCUMENT, headers)
        .await
        .unwrap();
    let full_path = created.body.to_text().unwrap();
    full_path.replace(&repo.base_url, "")
}

#[tokio::test]
async fn test_patch_container_lifecycle() {
    let repo = MockRepository::start().await;
    let context = context(&repo).await;

    let created = context.capture("created").unwrap();
    created.expect_message_count(1);
    created.expect_header_received(headers::HTTP_RESPONSE_CODE, 201);

    let operation = context.capture("operation").unwrap();
    operation.expect_message_count(2);
    operation.expect_bodies_received([None::<&str>, None]);
    operation.expect_header_received(headers::HTTP_RESPONSE_CODE, 204);

    let title = context.capture("title").unwrap();
    title.expect_message_count(3);
    title.expect_bodies_received_in_any_order([
        "some title &amp; other",
        "some title &amp; other",
        "some other title",
    ]);
    title.expect_header_received(headers::CONTENT_TYPE, "application/rdf+xml");
    title.expect_header_received(headers::HTTP_RESPONSE_CODE, 200);

    let filter = context.capture("filter").unwrap();
    filter.expect_message_count(2);
    filter.expect_header_received(headers::CONTENT_TYPE, "application/rdf+xml");
    filter.expect_header_received(headers::HTTP_RESPONSE_CODE, 200);

    let gone = context.capture("verifyGone").unwrap();
    gone.expect_message_count(1);
    gone.expect_header_received(headers::HTTP_RESPONSE_CODE, 410);

    let identifier = create_container(&context, &repo, "text/turtle").await;
    assert!(identifier.starts_with('/'));

    context
        .submit("title", Body::Empty, identifier_headers(&identifier))
        .await
        .unwrap();
    context
        .submit("patch", PATCH_DOCUMENT, identifier_headers(&identifier))
        .await
        .unwrap();
    context
        .submit("title", Body::Empty, identifier_headers(&identifier))
        .await
        .unwrap();
    context
        .submit("delete", Body::Empty, identifier_headers(&identifier))
        .await
        .unwrap();

    created.assert_satisfied().await.unwrap();
    filter.assert_satisfied().await.unwrap();
    title.assert_satisfied().await.unwrap();
    gone.assert_satisfied().await.unwrap();
    operation.assert_satisfied().await.unwrap();

    for message in gone.messages() {
        assert!(message
            .header_str(headers::CONTENT_TYPE)
            .unwrap()
            .contains("application/rdf+xml"));
    }
}

#[tokio::test]
async fn test_binary_resource_is_filtered_out() {
    let repo = MockRepository::start().await;
    let context = context(&repo).await;

    let identifier = create_container(&context, &repo, "application/octet-stream").await;
    let result = context
        .submit("title", Body::Empty, identifier_headers(&identifier))
        .await
        .unwrap();

    assert_eq!(result.response_code(), Some(200));
    assert_eq!(context.capture("filter").unwrap().count(), 0);
    assert_eq!(context.capture("title").unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_resource_aborts_title_pipeline() {
    let repo = MockRepository::start().await;
    let context = context(&repo).await;

    let err = context
        .submit("title", Body::Empty, identifier_headers("/does-not-exist"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("404"));
    assert_eq!(context.capture("filter").unwrap().count(), 0);
}

#[tokio::test]
async fn test_unmet_expectation_times_out_with_observed_count() {
    let repo = MockRepository::start().await;
    let context = context(&repo).await;

    let created = context.capture("created").unwrap();
    created.expect_message_count(2);
    create_container(&context, &repo, "text/turtle").await;

    let err = created
        .assert_satisfied_within(Duration::from_millis(100))
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("created"));
    assert!(message.contains("exactly 2 messages"));
    assert!(message.contains("1 messages"));
}

#[tokio::test]
async fn test_created_resource_reads_back_structurally_equal() {
    let repo = MockRepository::start().await;
    let context = context(&repo).await;

    let mut create = Headers::new();
    create.insert(headers::HTTP_METHOD.to_string(), json!("POST"));
    create.insert(headers::CONTENT_TYPE.to_string(), json!("application/rdf+xml"));
    let created = context.submit("create", RDF_DOCUMENT, create).await.unwrap();
    assert_eq!(created.response_code(), Some(201));
    let identifier = created.body.to_text().unwrap().replace(&repo.base_url, "");

    let fetched = context
        .submit("fetch", Body::Empty, identifier_headers(&identifier))
        .await
        .unwrap();
    assert_eq!(fetched.response_code(), Some(200));
    assert_eq!(fetched.header_str(headers::CONTENT_TYPE), Some("application/rdf+xml"));

    let mut posted = Message::new(RDF_DOCUMENT);
    posted.convert_body(Representation::Xml).unwrap();
    let fetched_document = fetched.body.as_document().unwrap();
    assert_eq!(Some(fetched_document), posted.body.as_document());
    assert!(fetched_document.to_xml_string().contains("posted &amp; fetched"));
}
