use crate::response::{RESP_400, RESP_431, build_response};
use hitcheck_core::config::ServerConfig;
use hitcheck_core::error::CheckError;
use hitcheck_core::handler::{CheckHandler, FormRequest, parse_content_length};
use http::Method;
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use monoio::io::{AsyncReadRent, AsyncWriteRentExt};
use monoio::net::TcpStream;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info};

/// Buffer limits applied to every connection on a worker.
#[derive(Debug, Clone, Copy)]
pub struct ConnLimits {
    /// Size of each socket read and the largest accepted request head.
    pub read_buffer_bytes: usize,
    /// Largest body the transport will buffer.
    pub max_body_bytes: usize,
}

impl ConnLimits {
    pub fn from_config(server: &ServerConfig) -> Self {
        Self {
            read_buffer_bytes: server.read_buffer_bytes.max(512),
            max_body_bytes: server.max_body_bytes,
        }
    }
}

/// Owned copy of the parts of a request head the handler needs.
#[derive(Debug)]
struct RequestHead {
    method: String,
    path: String,
    content_type: Option<String>,
    content_length: Option<String>,
    chunked: bool,
    keep_alive: bool,
    len: usize,
}

/// How many body bytes follow the head.
#[derive(Debug, PartialEq, Eq)]
enum BodyFraming {
    Empty,
    Exact(usize),
    /// Length unknown or refused; the connection cannot be reused.
    Unframed,
}

fn parse_head(buf: &[u8]) -> Result<Option<RequestHead>, httparse::Error> {
    let mut headers_raw = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut headers_raw);

    let len = match req.parse(buf)? {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return Ok(None),
    };

    let mut head = RequestHead {
        method: req.method.unwrap_or("").to_string(),
        path: req.path.unwrap_or("/").to_string(),
        content_type: None,
        content_length: None,
        chunked: false,
        keep_alive: req.version == Some(1),
        len,
    };

    for h in req.headers.iter() {
        if h.name.is_empty() {
            break;
        }
        let val = std::str::from_utf8(h.value).unwrap_or("");
        if h.name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()) {
            head.content_type.get_or_insert_with(|| val.to_string());
        } else if h.name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str()) {
            head.content_length.get_or_insert_with(|| val.to_string());
        } else if h.name.eq_ignore_ascii_case(TRANSFER_ENCODING.as_str()) {
            head.chunked = true;
        } else if h.name.eq_ignore_ascii_case(CONNECTION.as_str()) {
            if val.eq_ignore_ascii_case("close") {
                head.keep_alive = false;
            } else if val.eq_ignore_ascii_case("keep-alive") {
                head.keep_alive = true;
            }
        }
    }
    Ok(Some(head))
}

fn body_framing(head: &RequestHead, max_body_bytes: usize) -> BodyFraming {
    if head.chunked {
        return BodyFraming::Unframed;
    }
    let Some(raw) = head.content_length.as_deref() else {
        // Anything but GET/HEAD may carry a body we cannot delimit.
        return if head.method == Method::GET.as_str() || head.method == Method::HEAD.as_str() {
            BodyFraming::Empty
        } else {
            BodyFraming::Unframed
        };
    };
    match parse_content_length(Some(raw)) {
        Ok(n) if n <= max_body_bytes => BodyFraming::Exact(n),
        Err(CheckError::ContentLengthNotPositive(0)) => BodyFraming::Empty,
        _ => BodyFraming::Unframed,
    }
}

/// Handle a single client connection (HTTP/1.1 with keepalive).
///
/// The request head is buffered until it parses, then exactly
/// Content-Length body bytes (or as many as arrive before EOF) are
/// handed to the [`CheckHandler`]. Bytes past the body stay buffered
/// for the next pipelined request.
pub async fn handle_connection(
    mut client: TcpStream,
    peer_addr: SocketAddr,
    handler: Rc<CheckHandler>,
    limits: ConnLimits,
) -> anyhow::Result<()> {
    // ── Buffers allocated ONCE, reused across keepalive requests ──
    let mut pending: Vec<u8> = Vec::with_capacity(limits.read_buffer_bytes);
    let mut read_buf = vec![0u8; limits.read_buffer_bytes];
    let mut resp_buf = Vec::with_capacity(1024);

    loop {
        // ── Read request head ──
        let head = loop {
            if !pending.is_empty() {
                match parse_head(&pending) {
                    Ok(Some(head)) => break head,
                    Ok(None) if pending.len() >= limits.read_buffer_bytes => {
                        let (res, _) = client.write_all(RESP_431.to_vec()).await;
                        res?;
                        return Ok(());
                    }
                    Ok(None) => {}
                    Err(httparse::Error::TooManyHeaders) => {
                        let (res, _) = client.write_all(RESP_431.to_vec()).await;
                        res?;
                        return Ok(());
                    }
                    Err(e) => {
                        debug!(client = %peer_addr, error = %e, "HTTP parse error");
                        let (res, _) = client.write_all(RESP_400.to_vec()).await;
                        res?;
                        return Ok(());
                    }
                }
            }
            let (res, returned_buf) = client.read(read_buf).await;
            read_buf = returned_buf;
            match res? {
                0 => return Ok(()),
                n => pending.extend_from_slice(&read_buf[..n]),
            }
        };
        pending.drain(..head.len);
        let started = Instant::now();

        // ── Buffer the body ──
        let mut keep_alive = head.keep_alive;
        let body_len = match body_framing(&head, limits.max_body_bytes) {
            BodyFraming::Empty => 0,
            BodyFraming::Exact(n) => {
                while pending.len() < n {
                    let (res, returned_buf) = client.read(read_buf).await;
                    read_buf = returned_buf;
                    match res? {
                        0 => break,
                        m => pending.extend_from_slice(&read_buf[..m]),
                    }
                }
                if pending.len() < n {
                    // Peer hung up mid-body.
                    keep_alive = false;
                }
                n.min(pending.len())
            }
            BodyFraming::Unframed => {
                keep_alive = false;
                pending.len()
            }
        };

        // ── Run the check (sync, no await) ──
        let reply = handler.handle(FormRequest {
            method: &head.method,
            content_type: head.content_type.as_deref(),
            content_length: head.content_length.as_deref(),
            body: &pending[..body_len],
        });
        pending.drain(..body_len);

        info!(
            client = %peer_addr,
            method = %head.method,
            path = %head.path,
            status = reply.status,
            latency_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Access"
        );

        build_response(&mut resp_buf, &reply, keep_alive);
        let (res, returned_buf) = client.write_all(resp_buf).await;
        resp_buf = returned_buf;
        res?;

        if !keep_alive {
            return Ok(());
        }
    }
}
