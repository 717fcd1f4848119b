//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use site_harvest::config::{
    AnalysisConfig, Config, CrawlerConfig, OutputConfig, RenderConfig, TargetConfig,
    UserAgentConfig,
};
use site_harvest::crawler::Coordinator;
use site_harvest::storage::{ResourceOrigin, SqliteStorage};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration rooted in a temporary directory
fn create_test_config(seed_url: &str, max_depth: u32, dir: &TempDir) -> Config {
    Config {
        target: TargetConfig {
            seed_url: seed_url.to_string(),
            render_url: None,
        },
        crawler: CrawlerConfig {
            max_depth,
            max_concurrent_requests: 4,
            politeness_delay_ms: 0,
            obey_robots: true,
            request_timeout_secs: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
        },
        output: OutputConfig {
            content_dir: dir.path().join("content").display().to_string(),
            database_path: dir.path().join("index.db").display().to_string(),
            api_endpoints_path: dir.path().join("api_endpoints.json").display().to_string(),
            message_log_path: dir.path().join("messages.json").display().to_string(),
            reports_dir: dir.path().join("reports").display().to_string(),
        },
        render: RenderConfig {
            enabled: false,
            ..RenderConfig::default()
        },
        analysis: AnalysisConfig::default(),
    }
}

fn html(body: &str) -> ResponseTemplate {
    body_as(body, "text/html")
}

fn body_as(body: &str, mime: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), mime)
}

async fn mount_page(server: &MockServer, route: &str, response: ResponseTemplate, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

fn coordinator(config: Config) -> Coordinator {
    Coordinator::with_storage(config, "test-hash", SqliteStorage::new_in_memory().unwrap())
        .expect("Failed to create coordinator")
}

#[tokio::test]
async fn test_zero_depth_stores_seed_and_resources_only() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        html(
            r#"<html><head>
            <link rel="stylesheet" href="/site.css">
            <script src="/app.js"></script>
            </head><body><img src="/logo.png"><a href="/about">About</a></body></html>"#,
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        "/app.js",
        body_as("axios.get('/api/users');fetch(url);", "application/javascript"),
        1,
    )
    .await;
    mount_page(
        &server,
        "/site.css",
        body_as("body{margin:0}", "text/css"),
        1,
    )
    .await;
    mount_page(&server, "/logo.png", body_as("PNG", "image/png"), 1).await;
    mount_page(&server, "/about", html("<p>about</p>"), 0).await;

    let config = create_test_config(&format!("{}/", server.uri()), 0, &dir);
    let endpoints_path = config.output.api_endpoints_path.clone();
    let mut coordinator = coordinator(config);
    let report = coordinator.run().await.expect("Crawl failed");

    assert_eq!(report.counters.pages_stored, 1);
    assert_eq!(report.counters.resources_stored, 3);
    assert_eq!(report.endpoints, vec!["/api/users".to_string()]);

    let store = coordinator.store();
    let corpus = store.list_corpus().unwrap();
    assert_eq!(corpus.len(), 4);
    assert_eq!(corpus[0].path, format!("{}/index.html", store.domain()));
    assert_eq!(corpus[0].origin, ResourceOrigin::Page);

    let mut resources: Vec<&str> = corpus[1..].iter().map(|r| r.path.as_str()).collect();
    resources.sort();
    assert_eq!(
        resources,
        vec![
            format!("{}/app.js", store.domain()),
            format!("{}/logo.png", store.domain()),
            format!("{}/site.css", store.domain())
        ]
    );

    // Scripts are stored beautified
    let script = std::fs::read_to_string(store.absolute(&format!("{}/app.js", store.domain()))).unwrap();
    assert_eq!(script, "axios.get('/api/users');\nfetch(url);\n");

    let written: Vec<String> =
        serde_json::from_str(&std::fs::read_to_string(endpoints_path).unwrap()).unwrap();
    assert_eq!(written, vec!["/api/users".to_string()]);
}

#[tokio::test]
async fn test_each_url_fetched_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let shared = r#"<script src="/shared.js"></script>"#;
    mount_page(
        &server,
        "/",
        html(&format!(r#"{}<a href="/a">a</a><a href="/b">b</a>"#, shared)),
        1,
    )
    .await;
    mount_page(
        &server,
        "/a",
        html(&format!(r#"{}<a href="/">home</a><a href="/b#top">b</a>"#, shared)),
        1,
    )
    .await;
    mount_page(
        &server,
        "/b",
        html(&format!(r#"{}<a href="/a">a</a><a href="/">home</a>"#, shared)),
        1,
    )
    .await;
    mount_page(
        &server,
        "/shared.js",
        body_as("var shared = 1;", "application/javascript"),
        1,
    )
    .await;

    let config = create_test_config(&format!("{}/", server.uri()), 10, &dir);
    let mut coordinator = coordinator(config);
    let report = coordinator.run().await.expect("Crawl failed");

    assert_eq!(report.counters.pages_stored, 3);
    assert_eq!(report.counters.resources_stored, 1);
    assert_eq!(coordinator.store().list_corpus().unwrap().len(), 4);
}

#[tokio::test]
async fn test_url_embedded_and_linked_is_fetched_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        html(r#"<html><head><link rel="next" href="/p2"></head>
            <body><a href="/p2">page two</a></body></html>"#),
        1,
    )
    .await;
    mount_page(&server, "/p2", html(r#"<a href="/">home</a>"#), 1).await;

    let config = create_test_config(&format!("{}/", server.uri()), 3, &dir);
    let mut coordinator = coordinator(config);
    let report = coordinator.run().await.expect("Crawl failed");

    // The embedded reference is claimed first, so /p2 is kept as a resource
    assert_eq!(report.counters.pages_stored, 1);
    assert_eq!(report.counters.resources_stored, 1);
    assert_eq!(coordinator.store().list_corpus().unwrap().len(), 2);
}

#[tokio::test]
async fn test_depth_bound() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", html(r#"<a href="/level1">next</a>"#), 1).await;
    mount_page(&server, "/level1", html(r#"<a href="/level2">next</a>"#), 1).await;
    mount_page(&server, "/level2", html("<p>too deep</p>"), 0).await;

    let config = create_test_config(&format!("{}/", server.uri()), 1, &dir);
    let mut coordinator = coordinator(config);
    let report = coordinator.run().await.expect("Crawl failed");

    assert_eq!(report.counters.pages_stored, 2);
    let corpus = coordinator.store().list_corpus().unwrap();
    assert_eq!(corpus[1].depth, 1);
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        1,
    )
    .await;
    mount_page(
        &server,
        "/",
        html(r#"<a href="/private/secret">no</a><a href="/public">yes</a><img src="/private/pixel.png">"#),
        1,
    )
    .await;
    mount_page(&server, "/public", html("<p>public</p>"), 1).await;
    mount_page(&server, "/private/secret", html("<p>secret</p>"), 0).await;
    mount_page(&server, "/private/pixel.png", ResponseTemplate::new(200), 0).await;

    let config = create_test_config(&format!("{}/", server.uri()), 3, &dir);
    let mut coordinator = coordinator(config);
    let report = coordinator.run().await.expect("Crawl failed");

    assert_eq!(report.counters.pages_stored, 2);
    assert_eq!(report.counters.resources_stored, 0);
}

#[tokio::test]
async fn test_failed_fetches_are_dropped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        html(r#"<a href="/missing">gone</a><a href="/ok">ok</a><script src="/broken.js"></script>"#),
        1,
    )
    .await;
    mount_page(&server, "/ok", html("<p>fine</p>"), 1).await;
    mount_page(&server, "/missing", ResponseTemplate::new(404), 1).await;
    mount_page(&server, "/broken.js", ResponseTemplate::new(500), 1).await;

    let config = create_test_config(&format!("{}/", server.uri()), 2, &dir);
    let mut coordinator = coordinator(config);
    let report = coordinator.run().await.expect("Crawl failed");

    assert_eq!(report.counters.pages_stored, 2);
    assert_eq!(report.counters.fetch_failures, 2);
}

#[tokio::test]
async fn test_unparseable_script_stored_raw() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", html(r#"<script src="/bad.js"></script>"#), 1).await;
    mount_page(
        &server,
        "/bad.js",
        body_as("var s = 'unterminated;", "application/javascript"),
        1,
    )
    .await;

    let config = create_test_config(&format!("{}/", server.uri()), 0, &dir);
    let mut coordinator = coordinator(config);
    let report = coordinator.run().await.expect("Crawl failed");

    assert_eq!(report.counters.transform_failures, 1);
    let store = coordinator.store();
    let raw = std::fs::read_to_string(store.absolute(&format!("{}/bad.js", store.domain()))).unwrap();
    assert_eq!(raw, "var s = 'unterminated;");
}
