use hitcheck_core::handler::{JSON_CONTENT_TYPE, Reply};

// ── Pre-built static error responses (zero heap alloc) ────────

pub const RESP_400: &[u8] =
    b"HTTP/1.1 400 Bad Request\r\ncontent-type: application/json; charset=utf-8\r\ncontent-length: 23\r\nconnection: close\r\n\r\n{\"error\":\"Bad Request\"}";

pub const RESP_431: &[u8] =
    b"HTTP/1.1 431 Request Header Fields Too Large\r\ncontent-type: application/json; charset=utf-8\r\ncontent-length: 43\r\nconnection: close\r\n\r\n{\"error\":\"Request Header Fields Too Large\"}";

/// Encode a handler reply as an HTTP/1.1 response (no format! overhead).
pub fn build_response(buf: &mut Vec<u8>, reply: &Reply, keep_alive: bool) {
    buf.clear();
    buf.extend_from_slice(b"HTTP/1.1 ");
    let mut itoa_buf = itoa::Buffer::new();
    buf.extend_from_slice(itoa_buf.format(reply.status).as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(status_text(reply.status).as_bytes());
    buf.extend_from_slice(b"\r\ncontent-type: ");
    buf.extend_from_slice(JSON_CONTENT_TYPE.as_bytes());
    buf.extend_from_slice(b"\r\ncontent-length: ");
    buf.extend_from_slice(itoa_buf.format(reply.body.len()).as_bytes());
    if keep_alive {
        buf.extend_from_slice(b"\r\nconnection: keep-alive\r\n");
    } else {
        buf.extend_from_slice(b"\r\nconnection: close\r\n");
    }
    for (k, v) in &reply.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(&reply.body);
}

pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(status: u16, headers: Vec<(&'static str, &'static str)>, body: &str) -> Reply {
        Reply { status, headers, body: body.as_bytes().to_vec() }
    }

    #[test]
    fn status_text_known_codes() {
        assert_eq!(status_text(200), "OK");
        assert_eq!(status_text(400), "Bad Request");
        assert_eq!(status_text(405), "Method Not Allowed");
        assert_eq!(status_text(413), "Payload Too Large");
        assert_eq!(status_text(500), "Internal Server Error");
    }

    #[test]
    fn status_text_unknown_code_returns_unknown() {
        assert_eq!(status_text(418), "Unknown");
    }

    #[test]
    fn build_response_status_line_and_body() {
        let mut buf = Vec::new();
        build_response(&mut buf, &reply(200, vec![], "[]"), true);
        let s = String::from_utf8(buf).unwrap();
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("content-type: application/json; charset=utf-8\r\n"));
        assert!(s.contains("content-length: 2\r\n"));
        assert!(s.contains("connection: keep-alive\r\n"));
        assert!(s.ends_with("\r\n\r\n[]"));
    }

    #[test]
    fn build_response_close_and_extra_headers() {
        let mut buf = Vec::new();
        build_response(&mut buf, &reply(405, vec![("allow", "POST")], "{}"), false);
        let s = String::from_utf8(buf).unwrap();
        assert!(s.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(s.contains("connection: close\r\n"));
        assert!(s.contains("allow: POST\r\n"));
    }

    #[test]
    fn build_response_clears_buffer_first() {
        let mut buf = b"stale bytes".to_vec();
        build_response(&mut buf, &reply(200, vec![], ""), true);
        assert!(buf.starts_with(b"HTTP/1.1 200"));
    }

    #[test]
    fn static_responses_declare_their_body_length() {
        for resp in [RESP_400, RESP_431] {
            let s = std::str::from_utf8(resp).unwrap();
            let (head, body) = s.split_once("\r\n\r\n").unwrap();
            let declared: usize = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length: "))
                .unwrap()
                .parse()
                .unwrap();
            assert_eq!(declared, body.len());
        }
    }
}
