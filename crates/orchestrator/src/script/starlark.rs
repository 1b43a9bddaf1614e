#![forbid(unsafe_code)]

//! Rendering of JSON data as Starlark source, and decoding of the quoted
//! strings the backend sends back for script values.

use serde_json::Value;
use std::fmt::Write;

/// Render `value` as a Starlark expression that evaluates to the same data.
/// Object keys come out in sorted order.
pub fn literal(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Quote `s` as a Starlark string literal.
pub fn string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    write_string(&mut out, s);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid quoted string at byte {offset}: {reason}")]
pub struct UnquoteError {
    pub offset: usize,
    pub reason: &'static str,
}

impl UnquoteError {
    fn new(offset: usize, reason: &'static str) -> Self {
        Self { offset, reason }
    }
}

/// Decode a Go-style quoted string, as produced by a Starlark value's
/// `String()` form.
///
/// Understands `\xNN`, three-digit octal, `\a \b \f \n \r \t \v`,
/// `\uNNNN` and `\UNNNNNNNN` escapes as well as back-quoted raw strings.
/// Byte escapes may spell out invalid UTF-8; such sequences decode to
/// U+FFFD.
pub fn unquote(quoted: &str) -> Result<String, UnquoteError> {
    if let Some(raw) = quoted.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        if raw.contains('`') {
            return Err(UnquoteError::new(0, "back quote inside raw string"));
        }
        return Ok(raw.replace('\r', ""));
    }
    let inner = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or(UnquoteError::new(0, "not enclosed in double quotes"))?;

    let bytes = inner.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        // Offsets are reported relative to `quoted`.
        let at = i + 1;
        match bytes[i] {
            b'"' => return Err(UnquoteError::new(at, "unescaped double quote")),
            b'\n' => return Err(UnquoteError::new(at, "newline in quoted string")),
            b'\\' => {}
            b => {
                out.push(b);
                i += 1;
                continue;
            }
        }

        let escape = *bytes
            .get(i + 1)
            .ok_or(UnquoteError::new(at, "trailing backslash"))?;
        i += 2;
        match escape {
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0b),
            b'\\' | b'\'' | b'"' => out.push(escape),
            b'x' => {
                out.push(escaped_number(bytes, i, 2, 16, at)? as u8);
                i += 2;
            }
            b'0'..=b'7' => {
                let value = escaped_number(bytes, i - 1, 3, 8, at)?;
                let byte =
                    u8::try_from(value).map_err(|_| UnquoteError::new(at, "octal escape above 255"))?;
                out.push(byte);
                i += 2;
            }
            b'u' | b'U' => {
                let len = if escape == b'u' { 4 } else { 8 };
                let code = escaped_number(bytes, i, len, 16, at)?;
                let c = char::from_u32(code)
                    .ok_or(UnquoteError::new(at, "escape is not a unicode scalar value"))?;
                let mut buf = [0; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                i += len;
            }
            _ => return Err(UnquoteError::new(at, "unknown escape sequence")),
        }
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn escaped_number(
    bytes: &[u8],
    start: usize,
    len: usize,
    radix: u32,
    at: usize,
) -> Result<u32, UnquoteError> {
    let digits = bytes
        .get(start..start + len)
        .ok_or(UnquoteError::new(at, "truncated escape sequence"))?;
    digits
        .iter()
        .try_fold(0u32, |acc, &b| {
            char::from(b).to_digit(radix).map(|d| acc * radix + d)
        })
        .ok_or(UnquoteError::new(at, "bad digit in escape sequence"))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(fields) => {
            let mut fields: Vec<_> = fields.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, key);
                out.push_str(": ");
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn renders_nested_data() {
        let value = json!({
            "b": [1, true, null],
            "a": {"collect_all": false, "expressions": ["x.y"]},
        });
        assert_eq!(
            literal(&value),
            r#"{"a": {"collect_all": False, "expressions": ["x.y"]}, "b": [1, True, None]}"#
        );
    }

    #[test]
    fn escapes_script_breaking_characters() {
        assert_eq!(string("a\"b\\c\nd"), r#""a\"b\\c\nd""#);
        assert_eq!(string("\u{1}"), r#""\x01""#);
    }

    proptest! {
        #[test]
        fn any_string_stays_one_literal(s in any::<String>()) {
            let lit = string(&s);
            prop_assert!(!lit.contains('\n'));
            prop_assert_eq!(unquote(&lit), Ok(s));
        }
    }

    #[test]
    fn unquotes_go_escapes() {
        assert_eq!(unquote(r#""x\ay\vz""#).unwrap(), "x\u{7}y\u{b}z");
        assert_eq!(unquote(r#""\101\x42\u00e9\U0001F600""#).unwrap(), "AB\u{e9}\u{1F600}");
        assert_eq!(unquote(r#""say \"hi\"\\""#).unwrap(), "say \"hi\"\\");
        assert_eq!(unquote("`raw \\n`").unwrap(), "raw \\n");
    }

    #[test]
    fn invalid_utf8_bytes_become_replacement_characters() {
        assert_eq!(unquote(r#""a\xffb.go""#).unwrap(), "a\u{fffd}b.go");
        assert_eq!(unquote(r#""\xe2\x82""#).unwrap(), "\u{fffd}");
    }

    #[test]
    fn rejects_malformed_quoting() {
        assert_eq!(unquote("plain").unwrap_err().reason, "not enclosed in double quotes");
        assert_eq!(unquote("\"").unwrap_err().reason, "not enclosed in double quotes");
        assert_eq!(unquote(r#""a\qb""#).unwrap_err().offset, 2);
        assert!(unquote(r#""\x4""#).is_err());
        assert!(unquote(r#""\400""#).is_err());
        assert!(unquote(r#""\ud800""#).is_err());
        assert!(unquote(r#""a"b""#).is_err());
    }
}
