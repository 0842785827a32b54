//! Nom-based IRC line grammar.
//!
//! ```text
//! [:prefix SPACE+] command [SPACE+ middle]* [SPACE+ :trailing]
//! ```
//!
//! The parser borrows from the input line; [`Message`](super::Message)
//! copies the pieces it keeps.

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0, space1},
    combinator::opt,
    sequence::{preceded, terminated},
    IResult,
};

use crate::error::MessageParseError;

/// Parse the message prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> IResult<&str, &str> {
    terminated(preceded(char(':'), take_while1(|c: char| c != ' ')), space1)(input)
}

/// Parse the command token.
fn parse_command(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != ' ')(input)
}

/// A tokenised IRC line with borrowed string slices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine<'a> {
    /// Raw prefix (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    /// The command token exactly as sent.
    pub command: &'a str,
    /// Middle parameters followed by the trailing parameter, if any.
    pub params: Vec<&'a str>,
}

impl<'a> ParsedLine<'a> {
    /// Tokenise a single line (CR/LF already removed).
    pub fn parse(line: &'a str) -> Result<Self, MessageParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let missing = || MessageParseError::MissingCommand(line.to_string());

        let (rest, _) = space0::<_, nom::error::Error<&str>>(line).map_err(|_| missing())?;
        let (rest, prefix) = opt(parse_prefix)(rest).map_err(|_| missing())?;
        if rest.starts_with(':') {
            // A lone `:prefix` with nothing after it.
            return Err(missing());
        }
        let (mut rest, command) = parse_command(rest).map_err(|_| missing())?;

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing);
                break;
            }
            let end = rest.find(' ').unwrap_or(rest.len());
            params.push(&rest[..end]);
            rest = &rest[end..];
        }

        Ok(ParsedLine {
            prefix,
            command,
            params,
        })
    }
}
