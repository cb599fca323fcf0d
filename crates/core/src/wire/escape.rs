//! Server Query escaping
//!
//! Every structural or control character is written as a backslash followed
//! by a one-character code. The table is shared by both directions.

/// (raw character, escape code) pairs
const ESCAPES: [(char, char); 11] = [
    ('\\', '\\'),
    ('/', '/'),
    (' ', 's'),
    ('|', 'p'),
    ('\u{07}', 'a'),
    ('\u{08}', 'b'),
    ('\u{0C}', 'f'),
    ('\n', 'n'),
    ('\r', 'r'),
    ('\t', 't'),
    ('\u{0B}', 'v'),
];

fn code_for(c: char) -> Option<char> {
    ESCAPES.iter().find(|(raw, _)| *raw == c).map(|(_, code)| *code)
}

fn raw_for(code: char) -> Option<char> {
    ESCAPES.iter().find(|(_, c)| *c == code).map(|(raw, _)| *raw)
}

/// Escape a value for the wire
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match code_for(c) {
            Some(code) => {
                out.push('\\');
                out.push(code);
            }
            None => out.push(c),
        }
    }
    out
}

/// Unescape a value read from the wire
///
/// Lossy on malformed input: a trailing lone backslash is dropped, and so is
/// a backslash followed by an unknown code (both characters disappear).
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        if let Some(raw) = chars.next().and_then(raw_for) {
            out.push(raw);
        }
    }
    out
}
