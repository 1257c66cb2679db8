//! Integration tests for HTTP acquisition
//!
//! These tests use wiremock to stand up mock sites and drive the HTTP
//! fetchers, the rate limiter and the escalator against them.

use std::sync::Arc;
use std::time::{Duration, Instant};
use sumi_harvest::acquire::{
    build_http_client, AcquisitionEscalator, FetchError, Fetcher, HttpFetcher,
    RequiredFieldsEvaluator, RetryPolicy, Tier,
};
use sumi_harvest::config::UserAgentConfig;
use sumi_harvest::limiter::{Quota, RateLimiter};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<html>
<head>
    <title>Riverside Food Bank</title>
    <meta name="description" content="Open Tuesdays and Saturdays">
    <meta property="og:type" content="organization">
</head>
<body>
    <h1>Riverside Food Bank</h1>
    <p>Volunteers welcome.</p>
</body>
</html>"#;

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0".to_string(),
        contact_url: "https://example.com/about".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn required(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn html(body: &str) -> ResponseTemplate {
    // set_body_string would force text/plain over any content-type header
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

fn escalator(retry: RetryPolicy) -> AcquisitionEscalator {
    let client = build_http_client(&user_agent()).expect("Failed to build client");
    let limiter = Arc::new(RateLimiter::new(
        Quota::per_period(50, Duration::from_secs(1)).unwrap(),
    ));

    AcquisitionEscalator::new(
        limiter,
        Arc::new(RequiredFieldsEvaluator),
        Arc::new(HttpFetcher::shallow(client.clone())),
        Arc::new(HttpFetcher::full(client)),
    )
    .with_retry(retry)
}

#[tokio::test]
async fn test_shallow_and_full_fetch() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/org"))
        .respond_with(html(PAGE))
        .mount(&mock_server)
        .await;

    let client = build_http_client(&user_agent()).unwrap();
    let target = format!("{}/org", mock_server.uri());

    let shallow = HttpFetcher::shallow(client.clone())
        .fetch(&target)
        .await
        .unwrap();
    assert_eq!(shallow["status"], 200);
    assert_eq!(shallow["title"], "Riverside Food Bank");
    assert_eq!(shallow["final_url"], target.as_str());
    assert_eq!(shallow["content_type"], "text/html; charset=utf-8");
    assert!(shallow.get("description").is_none());

    let fetched_at = shallow["fetched_at"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(fetched_at).is_ok());

    let full = HttpFetcher::full(client).fetch(&target).await.unwrap();
    assert_eq!(full["description"], "Open Tuesdays and Saturdays");
    assert_eq!(full["og"]["type"], "organization");
    assert_eq!(full["h1"], "Riverside Food Bank");
}

#[tokio::test]
async fn test_user_agent_header_is_sent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header(
            "user-agent",
            "TestBot/1.0 (+https://example.com/about; test@example.com)",
        ))
        .respond_with(html(PAGE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = build_http_client(&user_agent()).unwrap();
    let result = HttpFetcher::shallow(client)
        .fetch(&format!("{}/", mock_server.uri()))
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_status_classification() {
    let mock_server = MockServer::start().await;
    for (route, status) in [("/gone", 404), ("/busy", 503), ("/slow-down", 429)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .mount(&mock_server)
            .await;
    }

    let fetcher = HttpFetcher::shallow(build_http_client(&user_agent()).unwrap());
    let base = mock_server.uri();

    let err = fetcher.fetch(&format!("{}/gone", base)).await.unwrap_err();
    assert!(matches!(err, FetchError::Permanent { .. }));

    let err = fetcher.fetch(&format!("{}/busy", base)).await.unwrap_err();
    assert!(err.is_transient());

    let err = fetcher
        .fetch(&format!("{}/slow-down", base))
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_escalates_when_shallow_fetch_is_insufficient() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/org"))
        .respond_with(html(PAGE))
        .mount(&mock_server)
        .await;

    let target = format!("{}/org", mock_server.uri());
    let result = escalator(RetryPolicy::immediate(1))
        .acquire(&target, &required(&["title", "description"]))
        .await;

    assert!(result.sufficient);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.final_tier, Tier::Tier2);
    assert_eq!(result.data["title"], "Riverside Food Bank");

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_transient_failure_is_retried_within_an_attempt() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(html(PAGE))
        .mount(&mock_server)
        .await;

    let target = format!("{}/flaky", mock_server.uri());
    let result = escalator(RetryPolicy::immediate(3))
        .acquire(&target, &required(&["title"]))
        .await;

    assert!(result.sufficient);
    assert_eq!(result.attempts, 1);
    assert!(result.errors.is_empty());

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_dead_link_becomes_degraded_record() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let target = format!("{}/missing", mock_server.uri());
    let result = escalator(RetryPolicy::immediate(3))
        .acquire(&target, &required(&["title"]))
        .await;

    assert!(!result.sufficient);
    assert_eq!(result.attempts, 3);
    assert_eq!(result.missing_fields, required(&["title"]));

    // Permanent failures are not retried: one request per attempt
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    let record = result.into_record(target.clone());
    assert_eq!(record.id.as_deref(), Some(target.as_str()));
    assert_eq!(record.get("sufficient"), Some(&serde_json::json!(false)));
    assert!(record.get("error").unwrap().as_str().unwrap().contains("HTTP 404"));
}

#[tokio::test]
async fn test_rate_limit_spaces_requests_to_one_host() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(PAGE))
        .mount(&mock_server)
        .await;

    let client = build_http_client(&user_agent()).unwrap();
    let limiter = Arc::new(RateLimiter::new(
        Quota::per_period(1, Duration::from_millis(100)).unwrap(),
    ));
    let escalator = AcquisitionEscalator::new(
        limiter.clone(),
        Arc::new(RequiredFieldsEvaluator),
        Arc::new(HttpFetcher::shallow(client.clone())),
        Arc::new(HttpFetcher::full(client)),
    )
    .with_retry(RetryPolicy::immediate(1));

    let start = Instant::now();
    for page in ["/a", "/b", "/c"] {
        let target = format!("{}{}", mock_server.uri(), page);
        let result = escalator.acquire(&target, &required(&["title"])).await;
        assert!(result.sufficient);
    }

    // Three admissions at one per 100ms need at least two full windows
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert_eq!(limiter.admitted("127.0.0.1").await, 3);
}
