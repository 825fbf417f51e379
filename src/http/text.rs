//! Text helpers shared by the parser and the page code.
//!
//! URI decoding turns `+` into a space and `%XX` into the byte `0xXX`.
//! HTML escaping produces text that is safe to drop into element content
//! and attribute values.

use std::borrow::Cow;

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decodes `input` and appends the result to `out`.
///
/// A `%` that is not followed by two hex digits is copied through as-is,
/// so decoding never reads past the end of the input.
pub fn uri_decode_into(input: &[u8], out: &mut Vec<u8>) {
    out.reserve(input.len());

    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let escape = input
                    .get(i + 1..i + 3)
                    .and_then(|pair| Some((hex_value(pair[0])?, hex_value(pair[1])?)));

                match escape {
                    Some((hi, lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
}

/// Decodes a URI component into a new string.
///
/// Bytes that do not form valid UTF-8 after decoding are replaced with
/// U+FFFD.
///
/// ```
/// # use picohttpd::http::text::uri_decode;
/// assert_eq!(uri_decode("a+b%20c"), "a b c");
/// ```
pub fn uri_decode(input: &str) -> String {
    let mut out = Vec::with_capacity(input.len());
    uri_decode_into(input.as_bytes(), &mut out);
    match String::from_utf8(out) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

fn entity(c: char) -> Option<&'static str> {
    match c {
        '\'' => Some("&apos;"),
        '"' => Some("&quot;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        ' ' => Some("&nbsp;"),
        '\t' => Some("&nbsp;&nbsp;"),
        _ => None,
    }
}

/// Appends the escaped form of `input` to `out` and returns the number of
/// bytes appended.
pub fn html_escape_into(input: &str, out: &mut String) -> usize {
    let before = out.len();
    for c in input.chars() {
        match entity(c) {
            Some(e) => out.push_str(e),
            None => out.push(c),
        }
    }
    out.len() - before
}

/// Length in bytes of the escaped form of `input`, without producing it.
pub fn html_escaped_len(input: &str) -> usize {
    input
        .chars()
        .map(|c| entity(c).map_or(c.len_utf8(), str::len))
        .sum()
}

/// Escapes `input`, borrowing it when nothing needs replacing.
pub fn html_escape(input: &str) -> Cow<'_, str> {
    if input.chars().all(|c| entity(c).is_none()) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(html_escaped_len(input));
    html_escape_into(input, &mut out);
    Cow::Owned(out)
}
