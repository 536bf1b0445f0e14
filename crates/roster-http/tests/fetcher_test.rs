use roster_core::HttpConfig;
use roster_http::{ClientIdentity, FetchRequest, Fetcher, HttpFetcher, TransportError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn identity() -> ClientIdentity {
    ClientIdentity {
        user_agent: "roster-test-agent/1.0".to_string(),
        accept_language: "en-GB,en;q=0.9".to_string(),
    }
}

/// Read headers plus a `Content-Length` body, however the client splits writes.
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.expect("read request");
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&raw).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if raw.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).to_string()
}

/// Serve one canned response and hand back the raw request text.
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let request = read_request(&mut socket).await;

        let response = format!(
            "{status_line}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        request
    });

    (format!("http://{addr}"), handle)
}

#[tokio::test]
async fn test_fetch_returns_status_and_body() {
    let (base, handle) = serve_once("HTTP/1.1 200 OK", "<html><body>results</body></html>").await;
    let fetcher = HttpFetcher::new(&HttpConfig::default(), Duration::from_secs(5)).expect("fetcher");

    let response = fetcher
        .fetch(&FetchRequest::get(format!("{base}/find?page=1")), &identity())
        .await
        .expect("fetch succeeds");

    assert_eq!(response.status, 200);
    assert!(response.body.contains("results"));

    let raw_request = handle.await.expect("server task").to_lowercase();
    assert!(raw_request.starts_with("get /find?page=1"));
    assert!(raw_request.contains("user-agent: roster-test-agent/1.0"));
    assert!(raw_request.contains("accept-language: en-gb,en;q=0.9"));
}

#[tokio::test]
async fn test_fetch_passes_through_hostile_status() {
    let (base, handle) = serve_once("HTTP/1.1 429 Too Many Requests", "slow down").await;
    let fetcher = HttpFetcher::new(&HttpConfig::default(), Duration::from_secs(5)).expect("fetcher");

    let response = fetcher
        .fetch(&FetchRequest::get(base), &identity())
        .await
        .expect("a 429 is still a response");

    assert_eq!(response.status, 429);
    handle.await.expect("server task");
}

#[tokio::test]
async fn test_post_form_sends_encoded_body() {
    let (base, handle) = serve_once("HTTP/1.1 200 OK", "ok").await;
    let fetcher = HttpFetcher::new(&HttpConfig::default(), Duration::from_secs(5)).expect("fetcher");

    let request = FetchRequest::post_form(
        format!("{base}/search"),
        vec![
            ("city".to_string(), "New York".to_string()),
            ("page".to_string(), "2".to_string()),
        ],
    );
    fetcher.fetch(&request, &identity()).await.expect("fetch succeeds");

    let raw_request = handle.await.expect("server task");
    assert!(raw_request.starts_with("POST /search"));
    assert!(raw_request.contains("city=New+York&page=2"));
}

#[tokio::test]
async fn test_fetch_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");

    // Accept and hold the connection without answering.
    let _server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(socket);
    });

    let fetcher = HttpFetcher::new(&HttpConfig::default(), Duration::from_secs(1)).expect("fetcher");
    let result = fetcher
        .fetch(&FetchRequest::get(format!("http://{addr}/slow")), &identity())
        .await;

    assert!(matches!(result, Err(TransportError::Timeout { .. })));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let fetcher = HttpFetcher::new(&HttpConfig::default(), Duration::from_secs(2)).expect("fetcher");
    let result = fetcher
        .fetch(&FetchRequest::get(format!("http://{addr}/")), &identity())
        .await;

    assert!(result.is_err());
}
