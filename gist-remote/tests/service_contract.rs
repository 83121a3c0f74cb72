mod common;

use gist_common::{
    CrawlResult, GistError, MarkupPayload, Operation, PageAddress, RemoteResult, SummaryResult,
};
use gist_remote::{RemoteClient, ServiceClient};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn page() -> (MarkupPayload, PageAddress) {
    (
        MarkupPayload::new("<html>hi</html>"),
        PageAddress::from("https://x.test/a"),
    )
}

#[tokio::test]
async fn summarize_posts_html_and_url() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/summarize"))
        .and(body_json(json!({"html": "<html>hi</html>", "url": "https://x.test/a"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "summary": "Hi.",
            "keywords": ["hi"],
            "top_links": ["https://x.test/b"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ServiceClient::new(&server.uri()).unwrap();
    let (markup, address) = page();
    let got = client.summarize(&markup, &address).await.unwrap();
    assert_eq!(
        got,
        SummaryResult {
            summary: "Hi.".into(),
            keywords: vec!["hi".into()],
            top_links: vec!["https://x.test/b".into()],
        }
    );
}

#[tokio::test]
async fn minimal_summary_responder_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/summarize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"summary": "Short."})))
        .mount(&server)
        .await;

    let client = ServiceClient::new(&server.uri()).unwrap();
    let (markup, address) = page();
    let got = client
        .submit(Operation::Summarize, &markup, &address)
        .await
        .unwrap();
    assert_eq!(
        got,
        RemoteResult::Summary(SummaryResult {
            summary: "Short.".into(),
            ..Default::default()
        })
    );
}

#[tokio::test]
async fn crawl_decodes_keywords_and_links() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crawl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keywords": ["rust", "actors"],
            "top_links": ["https://a.test/", "https://b.test/"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ServiceClient::new(&server.uri()).unwrap();
    let (markup, address) = page();
    let got = client.crawl(&markup, &address).await.unwrap();
    assert_eq!(
        got,
        CrawlResult {
            keywords: vec!["rust".into(), "actors".into()],
            top_links: vec!["https://a.test/".into(), "https://b.test/".into()],
        }
    );
}

#[tokio::test]
async fn server_error_is_remote_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ServiceClient::new(&server.uri()).unwrap();
    let (markup, address) = page();
    let err = client.summarize(&markup, &address).await.unwrap_err();
    assert!(matches!(err, GistError::RemoteFailure(ref m) if m.contains("boom")), "{err:?}");
}

#[tokio::test]
async fn malformed_body_is_remote_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let client = ServiceClient::new(&server.uri()).unwrap();
    let (markup, address) = page();
    let err = client.summarize(&markup, &address).await.unwrap_err();
    assert!(matches!(err, GistError::RemoteFailure(_)), "{err:?}");
}

#[tokio::test]
async fn refused_connection_is_transport_failure() {
    let client = ServiceClient::new("http://127.0.0.1:1").unwrap();
    let (markup, address) = page();
    let err = client.summarize(&markup, &address).await.unwrap_err();
    assert!(matches!(err, GistError::TransportFailure(_)), "{err:?}");
}

#[tokio::test]
async fn empty_markup_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = ServiceClient::new(&server.uri()).unwrap();
    let err = client
        .summarize(&MarkupPayload::new("   "), &PageAddress::from("https://x.test/a"))
        .await
        .unwrap_err();
    assert!(matches!(err, GistError::ExtractionUnavailable(_)));
}

#[test]
fn invalid_endpoint_is_config_error() {
    assert!(matches!(
        ServiceClient::new("not a url"),
        Err(GistError::Config(_))
    ));
}
