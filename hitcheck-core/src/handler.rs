use crate::area::QuarterDiskRule;
use crate::config::HitcheckConfig;
use crate::error::CheckError;
use crate::form::FormFields;
use crate::history::ResultLog;
use crate::result::CheckResult;
use crate::validate::validate;
use chrono::Local;
use std::io::{ErrorKind, Read};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Transport-independent view of one incoming request.
///
/// Header values are passed through untouched; the handler owns all
/// checks on them.
pub struct FormRequest<'a, R> {
    pub method: &'a str,
    pub content_type: Option<&'a str>,
    pub content_length: Option<&'a str>,
    pub body: R,
}

/// Status, extra headers and JSON body to send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn ok(body: String) -> Self {
        Self { status: 200, headers: Vec::new(), body: body.into_bytes() }
    }

    pub fn from_error(err: &CheckError) -> Self {
        let mut headers = Vec::new();
        if matches!(err, CheckError::MethodNotAllowed(_)) {
            headers.push(("allow", "POST"));
        }
        Self { status: err.status_code(), headers, body: err.to_json_body() }
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or("")
    }
}

/// Runs one check: framing, decoding, validation, the area test, and the
/// append to the shared log.
pub struct CheckHandler {
    log: Arc<ResultLog>,
    rule: QuarterDiskRule,
    max_body_bytes: usize,
}

impl CheckHandler {
    pub fn new(log: Arc<ResultLog>, rule: QuarterDiskRule, max_body_bytes: usize) -> Self {
        Self { log, rule, max_body_bytes }
    }

    pub fn from_config(log: Arc<ResultLog>, config: &HitcheckConfig) -> Self {
        Self::new(log, config.area.quarter_disk, config.server.max_body_bytes)
    }

    pub fn log(&self) -> &Arc<ResultLog> {
        &self.log
    }

    pub fn rule(&self) -> QuarterDiskRule {
        self.rule
    }

    /// Handle one request. Always produces a reply; faults become 500.
    pub fn handle<R: Read>(&self, req: FormRequest<'_, R>) -> Reply {
        let started = Instant::now();
        let method = req.method.to_string();

        match panic::catch_unwind(AssertUnwindSafe(|| self.process(req, started))) {
            Ok(Ok(json)) => Reply::ok(json),
            Ok(Err(e)) => {
                if e.is_internal() {
                    error!(method = %method, error = %e, "Check failed");
                } else {
                    warn!(method = %method, error = %e, "Check rejected");
                }
                Reply::from_error(&e)
            }
            Err(_) => {
                let e = CheckError::Internal("handler panicked".into());
                error!(method = %method, error = %e, "Check failed");
                Reply::from_error(&e)
            }
        }
    }

    fn process<R: Read>(&self, req: FormRequest<'_, R>, started: Instant) -> Result<String, CheckError> {
        if !req.method.eq_ignore_ascii_case(http::Method::POST.as_str()) {
            return Err(CheckError::MethodNotAllowed(req.method.to_string()));
        }

        match req.content_type {
            Some(ct) if ct.starts_with(FORM_CONTENT_TYPE) => {}
            other => return Err(CheckError::BadContentType(other.map(str::to_string))),
        }

        let length = parse_content_length(req.content_length)?;
        if length > self.max_body_bytes {
            return Err(CheckError::PayloadTooLarge { length, limit: self.max_body_bytes });
        }

        let body = read_exact_body(req.body, length)?;
        let fields = FormFields::parse(&String::from_utf8_lossy(&body));
        let submission = validate(&fields)?;

        let hit = submission.is_hit(self.rule);
        let elapsed = started.elapsed();
        let result = CheckResult::new(submission, hit, Local::now().naive_local(), elapsed);
        debug!(x = %result.x, y = %result.y, r = %result.r, hit, "Check recorded");

        Ok(self.log.record(result)?)
    }
}

/// Parse a Content-Length header value into a positive byte count.
pub fn parse_content_length(raw: Option<&str>) -> Result<usize, CheckError> {
    let raw = raw.ok_or(CheckError::ContentLengthMissing)?;
    let n: i64 = raw
        .trim()
        .parse()
        .map_err(|_| CheckError::ContentLengthInvalid(raw.to_string()))?;
    if n <= 0 {
        return Err(CheckError::ContentLengthNotPositive(n));
    }
    usize::try_from(n).map_err(|_| CheckError::ContentLengthInvalid(raw.to_string()))
}

/// Read exactly `expected` bytes, failing if the stream ends first.
fn read_exact_body<R: Read>(mut body: R, expected: usize) -> Result<Vec<u8>, CheckError> {
    let mut buf = vec![0u8; expected];
    let mut got = 0;
    while got < expected {
        match body.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if got != expected {
        return Err(CheckError::IncompleteRead { expected, got });
    }
    Ok(buf)
}
