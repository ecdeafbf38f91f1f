//! GitHub history store against a local HTTP listener.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;

use daily_idea::config::{HistoryConfig, TrackerConfig};
use daily_idea::history::{GitHubHistoryStore, HistoryStore};
use daily_idea::models::{HistoryDocument, HistoryItem};

#[derive(Debug)]
struct Recorded {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: String,
}

impl Recorded {
    fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Serve one canned `(status, body)` response per connection, in order,
/// and hand back what each request carried.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Recorded>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let handle = std::thread::spawn(move || {
        let mut recorded = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().unwrap();
            recorded.push(read_request(&mut stream));
            let reply = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).unwrap();
        }
        recorded
    });

    (base, handle)
}

fn read_request(stream: &mut std::net::TcpStream) -> Recorded {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap().split(' ');
    let method = request_line.next().unwrap().to_string();
    let path = request_line.next().unwrap().to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers
        .get("content-length")
        .map(|v| v.parse().unwrap())
        .unwrap_or(0);
    while buf.len() < head_end + length {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "connection closed before body");
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[head_end..head_end + length]).to_string();

    Recorded {
        method,
        path,
        headers,
        body,
    }
}

fn store(api_base: &str) -> GitHubHistoryStore {
    let tracker = TrackerConfig {
        api_base: api_base.to_string(),
        ..Default::default()
    };
    GitHubHistoryStore::new(
        &tracker,
        &HistoryConfig::default(),
        Some("ghp_test".to_string()),
        Some("octo/ideas"),
    )
    .unwrap()
}

fn new_item(title: &str) -> HistoryItem {
    HistoryItem {
        ts: "2026-10-19T07:00:00.000Z".to_string(),
        label: "tech".to_string(),
        title: title.to_string(),
        tags: vec!["rust".to_string()],
        ..Default::default()
    }
}

const LISTING_PATH: &str = "/repos/octo/ideas/issues?state=all&per_page=100";

#[tokio::test]
async fn test_first_load_creates_the_history_issue() {
    let (base, server) = serve(vec![
        (
            200,
            r#"[{"number": 3, "title": "daily-content-idea-history", "pull_request": {}},
                {"number": 4, "title": "unrelated", "body": "hi"}]"#,
        ),
        (201, r#"{"number": 42, "title": "daily-content-idea-history"}"#),
    ]);

    let doc = store(&base).load().await;
    assert_eq!(doc.issue_number, Some(42));
    assert!(doc.items.is_empty());

    let requests = server.join().unwrap();
    assert_eq!(requests.len(), 2);

    let listing = &requests[0];
    assert_eq!(listing.method, "GET");
    assert_eq!(listing.path, LISTING_PATH);
    assert_eq!(listing.headers["authorization"], "Bearer ghp_test");
    assert_eq!(listing.headers["accept"], "application/vnd.github+json");
    assert_eq!(listing.headers["x-github-api-version"], "2022-11-28");
    assert!(listing.headers["user-agent"].starts_with("daily-idea/"));

    let create = &requests[1];
    assert_eq!(create.method, "POST");
    assert_eq!(create.path, "/repos/octo/ideas/issues");
    let payload = create.json();
    assert_eq!(payload["title"], "daily-content-idea-history");
    let stored: serde_json::Value =
        serde_json::from_str(payload["body"].as_str().unwrap()).unwrap();
    assert_eq!(stored["version"], 1);
    assert_eq!(stored["items"], serde_json::json!([]));
}

#[tokio::test]
async fn test_load_then_save_patches_the_existing_issue() {
    let (base, server) = serve(vec![
        (
            200,
            r#"[{"number": 7, "title": "daily-content-idea-history",
                 "body": "{\"version\":1,\"items\":[{\"chosen_title\":\"Older\",\"video_type\":\"life\"}]}"}]"#,
        ),
        (200, r#"{"number": 7}"#),
    ]);

    let store = store(&base);
    let existing = store.load().await;
    assert_eq!(existing.issue_number, Some(7));
    assert_eq!(existing.items.len(), 1);

    store.save(new_item("Newer"), &existing).await.unwrap();

    let requests = server.join().unwrap();
    let patch = &requests[1];
    assert_eq!(patch.method, "PATCH");
    assert_eq!(patch.path, "/repos/octo/ideas/issues/7");
    assert_eq!(patch.headers["authorization"], "Bearer ghp_test");

    let payload = patch.json();
    assert!(payload.get("title").is_none());
    let stored: serde_json::Value =
        serde_json::from_str(payload["body"].as_str().unwrap()).unwrap();
    let titles: Vec<&str> = stored["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["chosen_title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Newer", "Older"]);
}

#[tokio::test]
async fn test_save_without_issue_number_posts_a_new_issue() {
    let (base, server) = serve(vec![(201, r#"{"number": 9}"#)]);

    store(&base)
        .save(new_item("Fresh"), &HistoryDocument::default())
        .await
        .unwrap();

    let requests = server.join().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/repos/octo/ideas/issues");
    let payload = requests[0].json();
    assert_eq!(payload["title"], "daily-content-idea-history");
    assert!(payload["body"].as_str().unwrap().contains("Fresh"));
}

#[tokio::test]
async fn test_listing_failure_degrades_to_empty_history() {
    let (base, server) = serve(vec![(500, r#"{"message": "boom"}"#)]);

    let doc = store(&base).load().await;
    assert!(doc.items.is_empty());
    assert_eq!(doc.issue_number, None);

    let requests = server.join().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, LISTING_PATH);
}

#[tokio::test]
async fn test_rejected_save_is_not_an_error() {
    let (base, server) = serve(vec![(403, r#"{"message": "Resource not accessible"}"#)]);

    let existing = HistoryDocument::empty_with_issue(Some(5));
    store(&base).save(new_item("Denied"), &existing).await.unwrap();

    let requests = server.join().unwrap();
    assert_eq!(requests[0].method, "PATCH");
    assert_eq!(requests[0].path, "/repos/octo/ideas/issues/5");
}

#[tokio::test]
async fn test_unreachable_api_fails_the_save() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let store = store(&format!("http://127.0.0.1:{}", port));
    let err = store
        .save(new_item("Lost"), &HistoryDocument::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Failed to reach GitHub"));
}
