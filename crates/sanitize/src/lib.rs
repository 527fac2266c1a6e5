//! Text cleaning for untrusted catalog and form input.
//!
//! Provides pure functions used by every other crate:
//! - String sanitization (control characters, tag-like substrings, angle brackets)
//! - Slug derivation for category identifiers
//! - Review rating clamping

use serde_json::Value;

/// Maximum length for product titles.
pub const TITLE_MAX: usize = 200;
/// Maximum length for product descriptions and review text.
pub const DESCRIPTION_MAX: usize = 1000;
/// Maximum length for brands, category labels and person names.
pub const LABEL_MAX: usize = 120;

/// Slug used when a label cleans down to nothing.
pub const FALLBACK_SLUG: &str = "uncategorized";

/// Clean a string for display.
///
/// Strips ASCII control characters, removes `<...>` substrings, drops any
/// remaining angle brackets and trims. With `max_len`, the result is cut to
/// that many characters (and trimmed again so the function stays idempotent).
pub fn sanitize_string(value: &str, max_len: Option<usize>) -> String {
    let without_controls: String = value.chars().filter(|c| !is_control(*c)).collect();
    let without_tags = strip_tags(&without_controls);

    let mut sanitized: String = without_tags
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .collect::<String>()
        .trim()
        .to_string();

    if let Some(max) = max_len.filter(|m| *m > 0) {
        if sanitized.chars().count() > max {
            sanitized = sanitized.chars().take(max).collect::<String>().trim_end().to_string();
        }
    }

    sanitized
}

/// Sanitize an untyped JSON value.
///
/// Strings are cleaned as-is, numbers and booleans through their textual
/// form, and anything else (null, arrays, objects) becomes empty.
pub fn sanitize_value(value: Option<&Value>, max_len: Option<usize>) -> String {
    match value {
        Some(Value::String(s)) => sanitize_string(s, max_len),
        Some(Value::Number(n)) => sanitize_string(&n.to_string(), max_len),
        Some(Value::Bool(b)) => sanitize_string(&b.to_string(), max_len),
        _ => String::new(),
    }
}

/// Derive a slug from a display label.
///
/// Lowercases, collapses every run of characters outside `[a-z0-9]` into a
/// single hyphen and trims hyphens from both ends.
pub fn slugify(value: &str) -> String {
    let cleaned = sanitize_string(value, Some(LABEL_MAX)).to_lowercase();

    let mut slug = String::with_capacity(cleaned.len());
    let mut pending_hyphen = false;
    for c in cleaned.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Clamp a review rating into `1..=5`.
///
/// Numbers are truncated, strings parsed by their leading integer.
/// Anything unparsable rates 5.
pub fn clamp_rating(value: Option<&Value>) -> u8 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64),
        Some(Value::String(s)) => leading_integer(s),
        _ => None,
    };

    match parsed {
        None => 5,
        Some(n) if n < 1 => 1,
        Some(n) if n > 5 => 5,
        Some(n) => n as u8,
    }
}

fn is_control(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}')
}

/// Remove every `<` up to and including the next `>`.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                // Unclosed bracket: keep the tail, the bracket itself is dropped later.
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    out
}

fn leading_integer(s: &str) -> Option<i64> {
    let trimmed = s.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(tail) => (-1, tail),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());

    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}
