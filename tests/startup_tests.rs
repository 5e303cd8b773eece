//! Tests for serving the app over a real TCP listener.

mod common;

use std::io::{Read, Write};

use common::JWT_SECRET;
use keyturn::{ServerConfig, cli::seed_users, run_server, store::MemoryBackend};
use tokio::net::TcpListener;

/// Send one raw HTTP/1.1 request and read the whole response.
fn http_request(addr: std::net::SocketAddr, request: String) -> String {
    let mut stream = std::net::TcpStream::connect(addr).expect("Failed to connect");
    stream.write_all(request.as_bytes()).unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_server_serves_login() {
    let backend = MemoryBackend::new();
    seed_users(&backend, &[]).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(run_server(ServerConfig::new(backend, JWT_SECRET), listener));

    let body = r#"{"username":"john","password":"123456"}"#;
    let request = format!(
        "POST /login HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let response = tokio::task::spawn_blocking(move || http_request(addr, request))
        .await
        .unwrap();

    // A 200 means the socket address reached the login rate limiter
    assert!(
        response.starts_with("HTTP/1.1 200"),
        "unexpected response: {}",
        response
    );
    let lower = response.to_ascii_lowercase();
    assert!(lower.contains("set-cookie: jid="));
    assert!(lower.contains("set-cookie: at="));
    assert!(response.contains(r#""msg":"logged in""#));

    server.abort();
}
