//! Canonical signing payload
//!
//! A compact JSON object with keys in lexicographic order and Go-style
//! escaping of `<`, `>`, `&`, U+2028 and U+2029. Existing signatures were
//! produced over exactly these bytes, so the encoding must not drift.

use crate::error::Result;
use serde::Serialize;
use serde_json::ser::{CharEscape, CompactFormatter, Formatter};
use std::io;

// Field order is the serialized key order.
#[derive(Serialize)]
struct SigningPayload<'a> {
    amount: u64,
    note: &'a str,
    receiver: &'a str,
    sender: &'a str,
    timestamp: i64,
}

struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            let escaped = match ch {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..idx].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = idx + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn write_char_escape<W>(&mut self, writer: &mut W, char_escape: CharEscape) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        match char_escape {
            CharEscape::Backspace => writer.write_all(b"\\u0008"),
            CharEscape::FormFeed => writer.write_all(b"\\u000c"),
            other => CompactFormatter.write_char_escape(writer, other),
        }
    }
}

pub fn canonical_payload(
    sender: &str,
    receiver: &str,
    amount: u64,
    timestamp: i64,
    note: &str,
) -> Result<Vec<u8>> {
    let payload = SigningPayload {
        amount,
        note,
        receiver,
        sender,
        timestamp,
    };
    let mut buf = Vec::with_capacity(128);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter);
    payload.serialize(&mut serializer)?;
    Ok(buf)
}
