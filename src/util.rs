//! Utility functions for outbound text handling.
//!
//! Helpers for fitting message text into the per-line byte budget without
//! breaking UTF-8 codepoints or words.

/// Truncates a string to at most `max_bytes` bytes without breaking
/// a multi-byte UTF-8 codepoint at the end.
///
/// # Examples
///
/// ```
/// use slirc_client::util::truncate_utf8_safe;
///
/// assert_eq!(truncate_utf8_safe("hello world", 5), "hello");
/// assert_eq!(truncate_utf8_safe("Hello 👋 World", 8), "Hello ");
/// assert_eq!(truncate_utf8_safe("hi", 10), "hi");
/// ```
#[inline]
pub fn truncate_utf8_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    // Find the last valid UTF-8 boundary at or before max_bytes
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}

/// Splits message text into parts of at most `max_bytes` bytes, breaking
/// only at single spaces.
///
/// Each break consumes exactly one space, so joining the parts with `" "`
/// gives back the input. A word longer than `max_bytes` is yielded whole on
/// its own. Empty input yields a single empty part.
///
/// # Examples
///
/// ```
/// use slirc_client::util::split_message;
///
/// let parts: Vec<_> = split_message("the quick brown fox", 10).collect();
/// assert_eq!(parts, vec!["the quick", "brown fox"]);
///
/// let parts: Vec<_> = split_message("a supercalifragilistic word", 8).collect();
/// assert_eq!(parts, vec!["a", "supercalifragilistic", "word"]);
/// ```
pub fn split_message(s: &str, max_bytes: usize) -> impl Iterator<Item = &str> {
    SplitMessage {
        remaining: Some(s),
        max_bytes,
    }
}

struct SplitMessage<'a> {
    remaining: Option<&'a str>,
    max_bytes: usize,
}

impl<'a> Iterator for SplitMessage<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.remaining?;
        if rest.len() <= self.max_bytes {
            self.remaining = None;
            return Some(rest);
        }

        // The space itself may sit right at the budget boundary.
        let window = truncate_utf8_safe(rest, self.max_bytes + 1);
        let cut = window.rfind(' ').or_else(|| rest.find(' '));

        match cut {
            Some(at) => {
                self.remaining = Some(&rest[at + 1..]);
                Some(&rest[..at])
            }
            None => {
                self.remaining = None;
                Some(rest)
            }
        }
    }
}
