use crate::area::{QuarterDiskRule, is_hit};
use crate::form::FormFields;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

pub const X_MIN: Decimal = dec!(-5);
pub const X_MAX: Decimal = dec!(3);
pub const Y_MIN: Decimal = dec!(-3);
pub const Y_MAX: Decimal = dec!(5);
pub const R_MIN: Decimal = dec!(1);
pub const R_MAX: Decimal = dec!(5);

/// Most significant fractional digits accepted per parameter. Keeps every
/// product in the area test inside the 96-bit mantissa, so none is rounded.
pub const MAX_SCALE: u32 = 12;

/// A validated (x, y, r) triple, kept exactly as the client wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub x: Decimal,
    pub y: Decimal,
    pub r: Decimal,
}

impl Submission {
    pub fn is_hit(&self, rule: QuarterDiskRule) -> bool {
        is_hit(self.x, self.y, self.r, rule)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("parameter '{0}' is missing or empty")]
    MissingField(&'static str),

    #[error("parameter '{field}' is not a number: {value:?}")]
    MalformedNumber { field: &'static str, value: String },

    #[error("parameter '{field}' out of range: {value}")]
    OutOfRange { field: &'static str, value: Decimal },

    #[error("parameter '{field}' has more than {max} significant decimals: {value}", max = MAX_SCALE)]
    TooPrecise { field: &'static str, value: Decimal },
}

impl ValidationError {
    /// Message sent back to the client.
    pub fn public_message(&self) -> &'static str {
        match self {
            ValidationError::MissingField(_) => "some parameters are empty",
            ValidationError::MalformedNumber { .. }
            | ValidationError::OutOfRange { .. }
            | ValidationError::TooPrecise { .. } => "Invalid parameters",
        }
    }
}

/// Extract, parse and range-check `x`, `y` and `r`.
pub fn validate(fields: &FormFields) -> Result<Submission, ValidationError> {
    let raw_x = require(fields, "x")?;
    let raw_y = require(fields, "y")?;
    let raw_r = require(fields, "r")?;

    let x = parse_field("x", raw_x)?;
    let y = parse_field("y", raw_y)?;
    let r = parse_field("r", raw_r)?;

    check_range("x", x, X_MIN, X_MAX)?;
    check_range("y", y, Y_MIN, Y_MAX)?;
    check_range("r", r, R_MIN, R_MAX)?;

    check_scale("x", x)?;
    check_scale("y", y)?;
    check_scale("r", r)?;

    Ok(Submission { x, y, r })
}

/// Parse decimal text without a floating-point detour.
///
/// Accepts `[+-]digits[.digits][(e|E)[+-]digits]` (either side of the point
/// may be empty, not both) and rejects anything that cannot be represented
/// exactly.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let literal = canonical_literal(text.trim())?;
    if literal.contains('e') {
        Decimal::from_scientific(&literal).ok()
    } else {
        Decimal::from_str_exact(&literal).ok()
    }
}

/// Check `text` against the number grammar and rewrite it in the one form
/// the decimal parser handles: no `+`, no bare point, lowercase exponent.
fn canonical_literal(text: &str) -> Option<String> {
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(i) => (&text[..i], Some(&text[i + 1..])),
        None => (text, None),
    };

    let (negative, unsigned) = split_sign(mantissa);
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }

    let mut out = String::with_capacity(text.len() + 1);
    if negative {
        out.push('-');
    }
    out.push_str(if int_part.is_empty() { "0" } else { int_part });
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }

    if let Some(exp) = exponent {
        let (exp_negative, digits) = split_sign(exp);
        if digits.is_empty() || !all_digits(digits) {
            return None;
        }
        out.push('e');
        if exp_negative {
            out.push('-');
        }
        out.push_str(digits);
    }
    Some(out)
}

fn split_sign(text: &str) -> (bool, &str) {
    match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    }
}

fn all_digits(text: &str) -> bool {
    text.bytes().all(|b| b.is_ascii_digit())
}

fn require<'a>(fields: &'a FormFields, name: &'static str) -> Result<&'a str, ValidationError> {
    match fields.get(name) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(name)),
    }
}

fn parse_field(field: &'static str, raw: &str) -> Result<Decimal, ValidationError> {
    parse_decimal(raw).ok_or_else(|| ValidationError::MalformedNumber {
        field,
        value: raw.to_string(),
    })
}

fn check_range(
    field: &'static str,
    value: Decimal,
    min: Decimal,
    max: Decimal,
) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange { field, value });
    }
    Ok(())
}

// Trailing zeros carry no precision, so "0.50000000000000000" is fine.
fn check_scale(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value.normalize().scale() > MAX_SCALE {
        return Err(ValidationError::TooPrecise { field, value });
    }
    Ok(())
}
