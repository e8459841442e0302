mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use portal_probe::catalog::parse_catalog_str;
use portal_probe::sweep::sweep;
use tokio::net::TcpListener;

#[tokio::test]
async fn duplicate_entry_ids_are_probed_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        while listener.accept().await.is_ok() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    let doc = format!(
        r#"{{ "environments": [
            {{ "id": "db", "name": "primary", "type": "tcp",
               "url": "127.0.0.1", "port": {port} }},
            {{ "id": "db", "name": "primary (copy)", "type": "tcp",
               "url": "127.0.0.1", "port": {port} }}
        ] }}"#
    );
    let catalog = parse_catalog_str(&doc).unwrap();
    let report = sweep(&catalog.environments, 8).await;

    assert_eq!(report.total, 1);
    assert_eq!(report.healthy, 1);
    assert_eq!(report.entries[0].name, "primary");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mixed_catalog_keeps_order_and_tallies() {
    let addr = common::spawn_http_target().await;
    let closed = common::closed_port().await;
    let doc = format!(
        r#"{{ "environments": [
            {{ "id": "1", "name": "web", "type": "http", "url": "http://{addr}/ok" }},
            {{ "id": "2", "name": "web-down", "type": "http",
               "url": "http://{addr}/unavailable", "httpMethod": "GET" }},
            {{ "id": "3", "name": "db", "type": "tcp", "url": "127.0.0.1", "port": {closed} }},
            {{ "id": "4", "name": "odd", "type": "http", "url": "gopher://x" }}
        ] }}"#
    );
    let catalog = parse_catalog_str(&doc).unwrap();
    // Concurrency of one still completes everything, just serially.
    let report = sweep(&catalog.environments, 1).await;

    assert_eq!(report.total, 4);
    assert_eq!(report.done, 4);
    assert_eq!(
        (report.healthy, report.warning, report.unhealthy, report.error),
        (1, 1, 1, 1)
    );
    let ids: Vec<_> = report.entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
    assert!(report.entries.iter().all(|e| !e.checked_at.is_empty()));
}
