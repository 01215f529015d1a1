//! Field sanitizing and line framing for dataset files.
//!
//! Values pass through [`sanitize`] once, right before they are written.
//! Sanitizing is never reversed: a reader gets the escaped text back. The
//! line framing ([`encode_line`] / [`decode_line`]) is reversed: characters
//! with a meaning in the format are backslash-escaped on write, so a value
//! survives a write/read cycle without splitting the field.

use crate::config::{DELIMITER, ESCAPE, LINE_TERMINATOR, QUOTE};

/// Control characters replaced by two-character escape sequences, applied in
/// this order.
const SUBSTITUTIONS: [(u8, &[u8]); 6] = [
    (0x08, b"\\b"),
    (0x1b, b"\\e"),
    (0x0c, b"\\f"),
    (b'\n', b"\\n"),
    (b'\r', b"\\r"),
    (b'\t', b"\\t"),
];

/// Escapes control characters in a value bound for storage.
pub fn sanitize(value: &str) -> String {
    sanitize_bytes(value.as_bytes())
}

/// Escapes control characters, then drops any byte sequences that are not
/// valid UTF-8.
pub fn sanitize_bytes(value: &[u8]) -> String {
    let mut escaped = Vec::with_capacity(value.len());
    for &byte in value {
        match SUBSTITUTIONS.iter().find(|(raw, _)| *raw == byte) {
            Some((_, replacement)) => escaped.extend_from_slice(replacement),
            None => escaped.push(byte),
        }
    }
    drop_invalid_utf8(&escaped)
}

fn drop_invalid_utf8(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(err) => {
                let (valid, rest) = bytes.split_at(err.valid_up_to());
                if let Ok(valid) = std::str::from_utf8(valid) {
                    out.push_str(valid);
                }
                let skip = err.error_len().unwrap_or(rest.len());
                bytes = &rest[skip..];
            }
        }
    }
}

/// Joins fields into one terminated line. Delimiter, quote and escape
/// characters inside a field are preceded by the escape character.
pub fn encode_line<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = String::new();
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            line.push(DELIMITER);
        }
        for ch in field.as_ref().chars() {
            if ch == DELIMITER || ch == QUOTE || ch == ESCAPE {
                line.push(ESCAPE);
            }
            line.push(ch);
        }
    }
    line.push(LINE_TERMINATOR);
    line
}

/// Splits one line (terminator already stripped) into its fields.
pub fn decode_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(ch) = chars.next() {
        if ch == ESCAPE {
            match chars.next() {
                Some(next) => current.push(next),
                None => current.push(ESCAPE),
            }
        } else if ch == DELIMITER {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_escapes_tab() {
        assert_eq!(sanitize("embedded \ttab"), "embedded \\ttab");
    }

    #[test]
    fn sanitize_escapes_newline() {
        assert_eq!(sanitize("embedded \nnewline"), "embedded \\nnewline");
    }

    #[test]
    fn sanitize_escapes_every_control_character() {
        assert_eq!(sanitize("\u{8}\u{1b}\u{c}\n\r\t"), "\\b\\e\\f\\n\\r\\t");
    }

    #[test]
    fn sanitize_drops_invalid_utf8() {
        assert_eq!(sanitize_bytes(b"abcdefghijk\xa0"), "abcdefghijk");
        assert_eq!(sanitize_bytes(b"a\xff\xfeb\tc"), "ab\\tc");
    }

    #[test]
    fn sanitize_keeps_multibyte_text() {
        assert_eq!(sanitize("température 21°"), "température 21°");
    }

    #[test]
    fn encode_line_plain_fields() {
        assert_eq!(
            encode_line(&["unixtime", "timestamp", "key_1", "key_2"]),
            "unixtime|timestamp|key_1|key_2\n"
        );
    }

    #[test]
    fn empty_fields_survive_framing() {
        let line = encode_line(&["0", "", "v", ""]);
        assert_eq!(line, "0||v|\n");
        assert_eq!(decode_line(line.trim_end_matches('\n')), vec!["0", "", "v", ""]);
    }

    #[test]
    fn delimiter_inside_value_does_not_split() {
        let line = encode_line(&["1", "a|b", "c\\d"]);
        assert_eq!(line, "1|a\\|b|c\\\\d\n");
        let fields = decode_line(line.trim_end_matches('\n'));
        assert_eq!(fields, vec!["1", "a|b", "c\\d"]);
    }

    #[test]
    fn quote_is_escaped_on_disk_and_read_back_plain() {
        let line = encode_line(&["1", "say \"hi\""]);
        assert_eq!(line, "1|say \\\"hi\\\"\n");
        let fields = decode_line(line.trim_end_matches('\n'));
        assert_eq!(fields, vec!["1", "say \"hi\""]);
    }

    #[test]
    fn sanitized_tab_reads_back_escaped() {
        let stored = sanitize("x\ty");
        let line = encode_line(&["1", stored.as_str()]);
        let fields = decode_line(line.trim_end_matches('\n'));
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1], "x\\ty");
    }
}
