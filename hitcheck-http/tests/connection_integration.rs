/// End-to-end tests for `handle_connection` and `serve` using a real monoio
/// runtime and real loopback sockets.
use hitcheck_core::area::QuarterDiskRule;
use hitcheck_core::handler::CheckHandler;
use hitcheck_core::history::ResultLog;
use hitcheck_http::connection::{ConnLimits, handle_connection};
use hitcheck_http::worker::serve;
use monoio::io::{AsyncReadRent, AsyncWriteRent, AsyncWriteRentExt};
use monoio::net::{TcpListener, TcpStream};
use std::net::SocketAddr;
use std::rc::Rc;
use std::sync::Arc;

const LIMITS: ConnLimits = ConnLimits {
    read_buffer_bytes: 4096,
    max_body_bytes: 8192,
};

fn make_rt() -> monoio::Runtime<monoio::time::TimeDriver<monoio::LegacyDriver>> {
    monoio::RuntimeBuilder::<monoio::LegacyDriver>::new()
        .enable_timer()
        .build()
        .expect("monoio runtime build failed")
}

fn make_handler() -> Rc<CheckHandler> {
    Rc::new(CheckHandler::new(
        Arc::new(ResultLog::new()),
        QuarterDiskRule::HalfRadius,
        8192,
    ))
}

/// Accept a single connection and serve it.
fn serve_one(handler: Rc<CheckHandler>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    monoio::spawn(async move {
        if let Ok((stream, peer)) = listener.accept().await {
            let _ = handle_connection(stream, peer, handler, LIMITS).await;
        }
    });
    addr
}

fn post(body: &str) -> Vec<u8> {
    format!(
        "POST /check HTTP/1.1\r\nhost: localhost\r\ncontent-type: application/x-www-form-urlencoded\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

async fn connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr.to_string().as_str()).await.unwrap()
}

/// Read until the server closes the connection.
async fn read_to_end(client: &mut TcpStream) -> String {
    let mut out = Vec::new();
    let mut buf = vec![0u8; 4096];
    loop {
        let (res, returned) = client.read(buf).await;
        buf = returned;
        match res {
            Ok(0) | Err(_) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8(out).unwrap()
}

fn status_line(resp: &str) -> &str {
    resp.lines().next().unwrap_or("")
}

fn body(resp: &str) -> serde_json::Value {
    let (_, body) = resp.split_once("\r\n\r\n").expect("response has a body");
    serde_json::from_str(body).unwrap()
}

// ── Valid submission → 200 with history ────────────────────────────────────

#[test]
fn valid_post_returns_history_json() {
    make_rt().block_on(async {
        let handler = make_handler();
        let addr = serve_one(Rc::clone(&handler));

        let mut client = connect(addr).await;
        let (res, _) = client.write_all(post("x=1&y=0.5&r=2")).await;
        res.unwrap();

        let resp = read_to_end(&mut client).await;
        assert!(status_line(&resp).contains("200"), "{resp}");
        assert!(resp.contains("content-type: application/json; charset=utf-8\r\n"));
        let v = body(&resp);
        assert_eq!(v[0]["hit"], true);
        assert_eq!(v[0]["x"], "1");
        assert_eq!(handler.log().len(), 1);
    });
}

// ── Wrong method → 405 ─────────────────────────────────────────────────────

#[test]
fn get_returns_405_with_allow_header() {
    make_rt().block_on(async {
        let addr = serve_one(make_handler());

        let mut client = connect(addr).await;
        let (res, _) = client
            .write_all(b"GET / HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n".to_vec())
            .await;
        res.unwrap();

        let resp = read_to_end(&mut client).await;
        assert!(status_line(&resp).contains("405"), "{resp}");
        assert!(resp.contains("allow: POST\r\n"));
        assert_eq!(body(&resp)["error"], "Method Not Allowed");
    });
}

// ── Invalid HTTP → 400 ─────────────────────────────────────────────────────

#[test]
fn malformed_request_returns_400() {
    make_rt().block_on(async {
        let addr = serve_one(make_handler());

        let mut client = connect(addr).await;
        let (res, _) = client.write_all(b"NOTHTTP GARBAGE\r\n\r\n".to_vec()).await;
        res.unwrap();

        let resp = read_to_end(&mut client).await;
        assert!(status_line(&resp).contains("400"), "{resp}");
    });
}

// ── Body shorter than Content-Length → 400 Incomplete read ────────────────

#[test]
fn truncated_body_returns_incomplete_read() {
    make_rt().block_on(async {
        let handler = make_handler();
        let addr = serve_one(Rc::clone(&handler));

        let mut client = connect(addr).await;
        let req = b"POST / HTTP/1.1\r\ncontent-type: application/x-www-form-urlencoded\r\ncontent-length: 40\r\n\r\nx=1&y=1&r=1".to_vec();
        let (res, _) = client.write_all(req).await;
        res.unwrap();
        client.shutdown().await.unwrap();

        let resp = read_to_end(&mut client).await;
        assert!(status_line(&resp).contains("400"), "{resp}");
        assert!(resp.contains("connection: close\r\n"));
        assert_eq!(body(&resp)["error"], "Incomplete read");
        assert!(handler.log().is_empty());
    });
}

// ── Missing Content-Length → one 400, then close ──────────────────────────

#[test]
fn post_without_content_length_gets_one_reply_and_close() {
    make_rt().block_on(async {
        let handler = make_handler();
        let addr = serve_one(Rc::clone(&handler));

        let mut client = connect(addr).await;
        let req = b"POST / HTTP/1.1\r\ncontent-type: application/x-www-form-urlencoded\r\n\r\nx=1&y=1&r=1".to_vec();
        let (res, _) = client.write_all(req).await;
        res.unwrap();

        let resp = read_to_end(&mut client).await;
        assert_eq!(resp.matches("HTTP/1.1 ").count(), 1, "{resp}");
        assert!(status_line(&resp).contains("400"), "{resp}");
        assert!(resp.contains("connection: close\r\n"));
        assert_eq!(body(&resp)["error"], "Bad Request: Content-Length is missing.");
        assert!(handler.log().is_empty());
    });
}

// ── Body arriving in several segments ──────────────────────────────────────

#[test]
fn body_split_across_writes_is_reassembled() {
    make_rt().block_on(async {
        let addr = serve_one(make_handler());

        let mut client = connect(addr).await;
        let req = post("x=-1&y=%2D1&r=3");
        let (head, rest) = req.split_at(req.len() - 6);
        let (res, _) = client.write_all(head.to_vec()).await;
        res.unwrap();
        monoio::time::sleep(std::time::Duration::from_millis(20)).await;
        let (res, _) = client.write_all(rest.to_vec()).await;
        res.unwrap();

        let resp = read_to_end(&mut client).await;
        assert!(status_line(&resp).contains("200"), "{resp}");
        assert_eq!(body(&resp)[0]["y"], "-1");
    });
}

// ── Keep-alive: two submissions on one connection ─────────────────────────

#[test]
fn keepalive_connection_serves_pipelined_requests() {
    make_rt().block_on(async {
        let handler = make_handler();
        let addr = serve_one(Rc::clone(&handler));

        let first = "x=1&y=1&r=2";
        let mut req = format!(
            "POST / HTTP/1.1\r\ncontent-type: application/x-www-form-urlencoded\r\ncontent-length: {}\r\n\r\n{first}",
            first.len()
        )
        .into_bytes();
        req.extend_from_slice(&post("x=2&y=1&r=2"));

        let mut client = connect(addr).await;
        let (res, _) = client.write_all(req).await;
        res.unwrap();

        let resp = read_to_end(&mut client).await;
        assert_eq!(resp.matches("HTTP/1.1 200 OK").count(), 2, "{resp}");
        let (_, last) = resp.rsplit_once("\r\n\r\n").unwrap();
        let v: serde_json::Value = serde_json::from_str(last).unwrap();
        assert_eq!(v.as_array().unwrap().len(), 2);
        assert_eq!(handler.log().len(), 2);
    });
}

// ── Accept loop keeps serving after a bad client ──────────────────────────

#[test]
fn serve_survives_malformed_client() {
    make_rt().block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = make_handler();
        monoio::spawn(serve(0, listener, Rc::clone(&handler), LIMITS));

        let mut bad = connect(addr).await;
        let (res, _) = bad.write_all(b"NOTHTTP GARBAGE\r\n\r\n".to_vec()).await;
        res.unwrap();
        assert!(status_line(&read_to_end(&mut bad).await).contains("400"));

        let mut good = connect(addr).await;
        let (res, _) = good.write_all(post("x=0&y=0&r=1")).await;
        res.unwrap();
        let resp = read_to_end(&mut good).await;
        assert!(status_line(&resp).contains("200"), "{resp}");
        assert_eq!(handler.log().len(), 1);
    });
}
