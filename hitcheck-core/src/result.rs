use crate::validate::Submission;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use std::time::Duration;

const CURRENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// One recorded check. Never mutated after creation.
///
/// Serialized field order and names are part of the wire format:
/// `x, y, r, hit, currentTime, execTime`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub x: Decimal,
    pub y: Decimal,
    pub r: Decimal,
    pub hit: bool,
    #[serde(rename = "currentTime", serialize_with = "serialize_local_time")]
    pub current_time: NaiveDateTime,
    #[serde(rename = "execTime", serialize_with = "serialize_fixed_ms")]
    pub exec_time_ms: Decimal,
}

impl CheckResult {
    pub fn new(
        submission: Submission,
        hit: bool,
        current_time: NaiveDateTime,
        elapsed: Duration,
    ) -> Self {
        Self {
            x: submission.x,
            y: submission.y,
            r: submission.r,
            hit,
            current_time,
            exec_time_ms: duration_to_ms(elapsed),
        }
    }
}

/// Milliseconds with 4 decimal places.
pub fn duration_to_ms(elapsed: Duration) -> Decimal {
    let nanos = i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX);
    Decimal::new(nanos, 6).round_dp(4)
}

fn serialize_local_time<S: Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&t.format(CURRENT_TIME_FORMAT))
}

// Emitted as a bare JSON number with exactly four decimals, independent of locale.
fn serialize_fixed_ms<S: Serializer>(ms: &Decimal, s: S) -> Result<S::Ok, S::Error> {
    let raw = RawValue::from_string(format!("{ms:.4}")).map_err(serde::ser::Error::custom)?;
    raw.serialize(s)
}
