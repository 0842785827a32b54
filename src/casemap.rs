//! IRC case-mapping helpers.
//!
//! Nicknames and channel names compare case-insensitively under the
//! `rfc1459` mapping, where `[]\~` are the uppercase forms of `{}|^`.
//! The client uses this to recognise its own nickname and to key
//! per-channel and per-nickname state.

#[inline]
fn fold(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        _ => c.to_ascii_lowercase(),
    }
}

/// Convert a string to IRC lowercase using RFC 1459 case mapping.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(fold).collect()
}

/// Compare two strings using IRC case-insensitive comparison.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.chars().map(fold).eq(b.chars().map(fold))
}
