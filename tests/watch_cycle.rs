//! End-to-end poll cycle scenarios over mocked feed and webhook servers.
//!
//! Each test creates its own in-memory SQLite database for isolation and
//! drives `run_cycle` against wiremock endpoints, asserting on watermark
//! movement and on the number of delivery attempts the webhook saw.

use relwatch::notify::Notifier;
use relwatch::storage::Database;
use relwatch::watch::{run_cycle, CycleOutcome, WatchError};
use secrecy::SecretString;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn rfc3339(unix: i64) -> String {
    chrono::DateTime::from_timestamp(unix, 0).unwrap().to_rfc3339()
}

/// Build a GitHub-style releases Atom document from (title, updated, link).
fn release_feed(entries: &[(&str, i64, &str)]) -> String {
    let mut doc = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>tag:github.com,2008:https://github.com/octocat/Hello-World/releases</id>
  <title>Release notes from Hello-World</title>
"#,
    );
    let feed_updated = entries.iter().map(|e| e.1).max().unwrap_or(0);
    doc.push_str(&format!("  <updated>{}</updated>\n", rfc3339(feed_updated)));
    for (title, updated, link) in entries {
        doc.push_str(&format!(
            r#"  <entry>
    <id>tag:github.com,2008:Repository/1296269/{title}</id>
    <updated>{updated}</updated>
    <title>{title}</title>
    <link rel="alternate" type="text/html" href="{link}"/>
    <author><name>octocat</name></author>
  </entry>
"#,
            title = title,
            updated = rfc3339(*updated),
            link = link,
        ));
    }
    doc.push_str("</feed>\n");
    doc
}

async fn mount_feed(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/releases.atom"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("Content-Type", "application/atom+xml"),
        )
        .mount(server)
        .await;
}

fn notifier(webhook: &MockServer) -> Notifier {
    Notifier::new(
        reqwest::Client::new(),
        SecretString::from(format!("{}/hook", webhook.uri())),
        Some("#releases".to_string()),
        Some("release-watch".to_string()),
        None,
    )
}

#[tokio::test]
async fn first_run_notifies_and_advances_watermark() {
    let feed = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_feed(
        &feed,
        release_feed(&[("v1.0", 2000, "/octocat/Hello-World/releases/tag/v1.0")]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let db = test_db().await;
    let client = reqwest::Client::new();
    let outcome = run_cycle(
        &client,
        &db,
        &notifier(&webhook),
        &format!("{}/releases.atom", feed.uri()),
    )
    .await
    .unwrap();

    assert_eq!(outcome, CycleOutcome::Notified { updated: 2000 });
    assert_eq!(db.last_updated().await.unwrap(), 2000);
}

#[tokio::test]
async fn newer_release_notifies_exactly_once() {
    // Watermark 1000, entry 2000, webhook 200 → watermark 2000, one delivery
    let feed = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_feed(
        &feed,
        release_feed(&[("v1.1", 2000, "/octocat/Hello-World/releases/tag/v1.1")]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let db = test_db().await;
    db.set_last_updated(1000).await.unwrap();

    let client = reqwest::Client::new();
    let outcome = run_cycle(
        &client,
        &db,
        &notifier(&webhook),
        &format!("{}/releases.atom", feed.uri()),
    )
    .await
    .unwrap();

    assert_eq!(outcome, CycleOutcome::Notified { updated: 2000 });
    assert_eq!(db.last_updated().await.unwrap(), 2000);
}

#[tokio::test]
async fn seen_release_stays_silent() {
    // Watermark equals the newest entry → zero deliveries, watermark unchanged
    let feed = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_feed(
        &feed,
        release_feed(&[("v1.1", 2000, "/octocat/Hello-World/releases/tag/v1.1")]),
    )
    .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&webhook)
        .await;

    let db = test_db().await;
    db.set_last_updated(2000).await.unwrap();

    let client = reqwest::Client::new();
    let outcome = run_cycle(
        &client,
        &db,
        &notifier(&webhook),
        &format!("{}/releases.atom", feed.uri()),
    )
    .await
    .unwrap();

    assert_eq!(outcome, CycleOutcome::UpToDate);
    assert_eq!(db.last_updated().await.unwrap(), 2000);
}

#[tokio::test]
async fn second_cycle_over_unchanged_feed_is_idempotent() {
    let feed = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_feed(
        &feed,
        release_feed(&[("v1.0", 2000, "/octocat/Hello-World/releases/tag/v1.0")]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let db = test_db().await;
    let client = reqwest::Client::new();
    let n = notifier(&webhook);
    let url = format!("{}/releases.atom", feed.uri());

    let first = run_cycle(&client, &db, &n, &url).await.unwrap();
    let second = run_cycle(&client, &db, &n, &url).await.unwrap();

    assert_eq!(first, CycleOutcome::Notified { updated: 2000 });
    assert_eq!(second, CycleOutcome::UpToDate);
}

#[tokio::test]
async fn failed_delivery_keeps_watermark_for_retry() {
    // Watermark 1000, entry 2000, webhook 500 → watermark stays 1000,
    // exactly one delivery attempt recorded
    let feed = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_feed(
        &feed,
        release_feed(&[("v1.1", 2000, "/octocat/Hello-World/releases/tag/v1.1")]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&webhook)
        .await;

    let db = test_db().await;
    db.set_last_updated(1000).await.unwrap();

    let client = reqwest::Client::new();
    let err = run_cycle(
        &client,
        &db,
        &notifier(&webhook),
        &format!("{}/releases.atom", feed.uri()),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, WatchError::Delivery(_)));
    assert_eq!(db.last_updated().await.unwrap(), 1000);
}

#[tokio::test]
async fn retry_succeeds_on_a_later_cycle() {
    // First delivery attempt fails, the webhook recovers, the next cycle
    // delivers the same release and only then does the watermark move.
    let feed = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_feed(
        &feed,
        release_feed(&[("v1.1", 2000, "/octocat/Hello-World/releases/tag/v1.1")]),
    )
    .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&webhook)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&webhook)
        .await;

    let db = test_db().await;
    db.set_last_updated(1000).await.unwrap();

    let client = reqwest::Client::new();
    let n = notifier(&webhook);
    let url = format!("{}/releases.atom", feed.uri());

    assert!(run_cycle(&client, &db, &n, &url).await.is_err());
    assert_eq!(db.last_updated().await.unwrap(), 1000);

    let outcome = run_cycle(&client, &db, &n, &url).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Notified { updated: 2000 });
    assert_eq!(db.last_updated().await.unwrap(), 2000);
}

#[tokio::test]
async fn unparseable_feed_attempts_no_delivery() {
    let feed = MockServer::start().await;
    let webhook = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/releases.atom"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
        .mount(&feed)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&webhook)
        .await;

    let db = test_db().await;
    db.set_last_updated(1000).await.unwrap();

    let client = reqwest::Client::new();
    let err = run_cycle(
        &client,
        &db,
        &notifier(&webhook),
        &format!("{}/releases.atom", feed.uri()),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, WatchError::Fetch(_)));
    assert_eq!(db.last_updated().await.unwrap(), 1000);
}

#[tokio::test]
async fn empty_feed_is_a_defined_error() {
    let feed = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_feed(&feed, release_feed(&[])).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&webhook)
        .await;

    let db = test_db().await;
    let client = reqwest::Client::new();
    let err = run_cycle(
        &client,
        &db,
        &notifier(&webhook),
        &format!("{}/releases.atom", feed.uri()),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, WatchError::EmptyFeed));
    assert_eq!(db.last_updated().await.unwrap(), 0);
}

#[tokio::test]
async fn newest_entry_is_selected_regardless_of_document_order() {
    let feed = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_feed(
        &feed,
        release_feed(&[
            ("v1.0", 1000, "/octocat/Hello-World/releases/tag/v1.0"),
            ("v1.2", 3000, "/octocat/Hello-World/releases/tag/v1.2"),
            ("v1.1", 2000, "/octocat/Hello-World/releases/tag/v1.1"),
        ]),
    )
    .await;
    Mock::given(method("POST"))
        .and(body_string_contains("v1.2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let db = test_db().await;
    let client = reqwest::Client::new();
    let outcome = run_cycle(
        &client,
        &db,
        &notifier(&webhook),
        &format!("{}/releases.atom", feed.uri()),
    )
    .await
    .unwrap();

    assert_eq!(outcome, CycleOutcome::Notified { updated: 3000 });
}

#[tokio::test]
async fn payload_carries_normalized_link_under_form_content_type() {
    let feed = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_feed(
        &feed,
        release_feed(&[("v1.0", 2000, "/octocat/Hello-World/releases/tag/v1.0")]),
    )
    .await;
    // The body is JSON but travels under a form content type; both are part
    // of the webhook's observed contract.
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains(
            "https://github.com/octocat/Hello-World/releases/tag/v1.0",
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let db = test_db().await;
    let client = reqwest::Client::new();
    run_cycle(
        &client,
        &db,
        &notifier(&webhook),
        &format!("{}/releases.atom", feed.uri()),
    )
    .await
    .unwrap();

    let requests = webhook.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["channel"], "#releases");
    assert_eq!(body["username"], "release-watch");
    assert_eq!(body["icon_emoji"], ":fried_shrimp:");
}

#[tokio::test]
async fn consecutive_releases_each_notify_once() {
    let feed = MockServer::start().await;
    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&webhook)
        .await;

    let db = test_db().await;
    let client = reqwest::Client::new();
    let n = notifier(&webhook);

    // v1.0 appears
    mount_feed(
        &feed,
        release_feed(&[("v1.0", 1000, "/octocat/Hello-World/releases/tag/v1.0")]),
    )
    .await;
    let url = format!("{}/releases.atom", feed.uri());
    assert_eq!(
        run_cycle(&client, &db, &n, &url).await.unwrap(),
        CycleOutcome::Notified { updated: 1000 }
    );

    // v1.1 is published on top
    feed.reset().await;
    mount_feed(
        &feed,
        release_feed(&[
            ("v1.1", 2000, "/octocat/Hello-World/releases/tag/v1.1"),
            ("v1.0", 1000, "/octocat/Hello-World/releases/tag/v1.0"),
        ]),
    )
    .await;
    assert_eq!(
        run_cycle(&client, &db, &n, &url).await.unwrap(),
        CycleOutcome::Notified { updated: 2000 }
    );
    assert_eq!(db.last_updated().await.unwrap(), 2000);
}

#[tokio::test]
async fn feed_http_error_attempts_no_delivery() {
    let feed = MockServer::start().await;
    let webhook = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&feed)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&webhook)
        .await;

    let db = test_db().await;
    let client = reqwest::Client::new();
    let err = run_cycle(
        &client,
        &db,
        &notifier(&webhook),
        &format!("{}/releases.atom", feed.uri()),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, WatchError::Fetch(_)));
    assert_eq!(db.last_updated().await.unwrap(), 0);
}
