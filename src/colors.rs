//! mIRC color and style codes.
//!
//! Inbound lines can be stripped of formatting before parsing, and
//! outbound text can be wrapped in one of the sixteen standard colors.
//!
//! # IRC Format Codes
//! - 0x02 (^B): Bold
//! - 0x03 (^C): Color (followed by optional foreground,background)
//! - 0x0F (^O): Reset all formatting
//! - 0x11 (^Q): Monospace
//! - 0x16 (^V): Reverse/Inverse
//! - 0x1D (^]): Italic
//! - 0x1E (^^): Strikethrough
//! - 0x1F (^_): Underline

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Color control character; also closes a colored span.
pub const COLOR_CHAR: char = '\x03';

const FORMAT_CHARS: &[char] = &[
    '\x02', '\x03', '\x0F', '\x11', '\x16', '\x1D', '\x1E', '\x1F',
];

/// One of the sixteen standard IRC colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Color {
    White,
    Black,
    Blue,
    Green,
    Red,
    Brown,
    Purple,
    Orange,
    Yellow,
    LightGreen,
    Cyan,
    LightCyan,
    LightBlue,
    Pink,
    Grey,
    LightGrey,
}

impl Color {
    const ALL: [Color; 16] = [
        Color::White,
        Color::Black,
        Color::Blue,
        Color::Green,
        Color::Red,
        Color::Brown,
        Color::Purple,
        Color::Orange,
        Color::Yellow,
        Color::LightGreen,
        Color::Cyan,
        Color::LightCyan,
        Color::LightBlue,
        Color::Pink,
        Color::Grey,
        Color::LightGrey,
    ];

    /// Numeric mIRC color code (0-15).
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Lowercase name as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Red => "red",
            Color::Brown => "brown",
            Color::Purple => "purple",
            Color::Orange => "orange",
            Color::Yellow => "yellow",
            Color::LightGreen => "light_green",
            Color::Cyan => "cyan",
            Color::LightCyan => "light_cyan",
            Color::LightBlue => "light_blue",
            Color::Pink => "pink",
            Color::Grey => "grey",
            Color::LightGrey => "light_grey",
        }
    }

    /// Opening control sequence, always two digits so text starting with a
    /// digit is not swallowed into the code.
    pub fn prefix(self) -> String {
        format!("{}{:02}", COLOR_CHAR, self.code())
    }

    /// Bytes added around a part by [`Color::wrap`].
    pub fn overhead(self) -> usize {
        // ^C + two digits, then the closing ^C
        4
    }

    /// Wrap `text` in this color.
    pub fn wrap(self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + self.overhead());
        out.push_str(&self.prefix());
        out.push_str(text);
        out.push(COLOR_CHAR);
        out
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Color {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Color::ALL
            .iter()
            .copied()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "message_color",
                reason: format!("unknown color {:?}", s),
            })
    }
}

/// Extension trait for handling formatted IRC strings.
pub trait FormattedStringExt<'a> {
    /// Check if the string contains any IRC formatting codes.
    fn is_formatted(&self) -> bool;

    /// Strip all IRC formatting codes from the string.
    fn strip_formatting(self) -> Cow<'a, str>;
}

impl<'a> FormattedStringExt<'a> for &'a str {
    fn is_formatted(&self) -> bool {
        self.contains(FORMAT_CHARS)
    }

    fn strip_formatting(self) -> Cow<'a, str> {
        if !self.is_formatted() {
            return Cow::Borrowed(self);
        }

        let mut result = String::with_capacity(self.len());
        let mut stripper = Stripper::default();
        for c in self.chars() {
            stripper.feed(c, &mut result);
        }
        Cow::Owned(result)
    }
}

/// Where we are inside a `^C[fg[,bg]]` sequence.
#[derive(Default, Clone, Copy)]
enum State {
    #[default]
    Text,
    /// Saw ^C
    Color,
    /// Saw one foreground digit
    Fg1,
    /// Saw two foreground digits
    Fg2,
    /// Saw a comma after the foreground; it is text unless a digit follows
    Comma,
    /// Saw one background digit
    Bg1,
}

#[derive(Default)]
struct Stripper {
    state: State,
}

impl Stripper {
    fn feed(&mut self, c: char, out: &mut String) {
        let next = match (self.state, c) {
            (State::Color, d) if d.is_ascii_digit() => State::Fg1,
            (State::Fg1, d) if d.is_ascii_digit() => State::Fg2,
            (State::Fg1 | State::Fg2, ',') => State::Comma,
            (State::Comma, d) if d.is_ascii_digit() => State::Bg1,
            (State::Bg1, d) if d.is_ascii_digit() => State::Text,
            (State::Comma, _) => {
                out.push(',');
                return self.text(c, out);
            }
            _ => return self.text(c, out),
        };
        self.state = next;
    }

    fn text(&mut self, c: char, out: &mut String) {
        if c == COLOR_CHAR {
            self.state = State::Color;
        } else {
            self.state = State::Text;
            if !FORMAT_CHARS.contains(&c) {
                out.push(c);
            }
        }
    }
}
