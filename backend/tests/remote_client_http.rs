use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use batchsync::{
    batch::Interval,
    source::{FetchRequest, RecordSource, RemoteClient, SourceError},
    time::parse_timestamp,
};

/// Serves one canned response and hands back the raw request head.
async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/gestiones", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(response.as_bytes()).await.unwrap();
        sock.shutdown().await.ok();
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });

    (url, rx)
}

fn fetch_request() -> FetchRequest {
    FetchRequest {
        limit: 500,
        offset: 1,
        partition_key: "04".into(),
        window: Interval {
            start: parse_timestamp("2024-01-01 00:00:00").unwrap(),
            end: parse_timestamp("2024-01-02 23:59:59").unwrap(),
        },
    }
}

fn client(url: String) -> RemoteClient {
    RemoteClient::new(url, "s3cret".into(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn sends_filters_and_token_and_decodes_results() {
    let (url, head) = serve_once(
        "200 OK",
        r#"{"count":1,"next":null,"previous":null,"results":[{"id_gestion":42,"cartera":"04"}]}"#,
    )
    .await;

    let records = client(url).fetch(&fetch_request()).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].interaction_id, Some(42));

    let head = head.await.unwrap().to_lowercase();
    assert!(head.starts_with("get /gestiones?"), "got: {head}");
    assert!(head.contains("limit=500"), "got: {head}");
    assert!(head.contains("offset=1"), "got: {head}");
    assert!(head.contains("portfolio=04"), "got: {head}");
    assert!(head.contains("start_date=2024-01-01+00%3a00%3a00"), "got: {head}");
    assert!(head.contains("end_date=2024-01-02+23%3a59%3a59"), "got: {head}");
    assert!(head.contains("authorization: token s3cret"), "got: {head}");
}

#[tokio::test]
async fn non_success_status_carries_code_and_body() {
    let (url, _head) = serve_once("503 Service Unavailable", r#"{"detail":"down"}"#).await;

    let err = client(url).fetch(&fetch_request()).await.unwrap_err();

    match err {
        SourceError::Status { status, body } => {
            assert_eq!(status, 503);
            assert!(body.contains("down"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_body_means_no_records() {
    let (url, _head) = serve_once("200 OK", "").await;

    let records = client(url).fetch(&fetch_request()).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn html_error_page_is_a_decode_error() {
    let (url, _head) = serve_once("200 OK", "<html>oops</html>").await;

    let err = client(url).fetch(&fetch_request()).await.unwrap_err();
    assert!(matches!(err, SourceError::Decode(_)));
}
