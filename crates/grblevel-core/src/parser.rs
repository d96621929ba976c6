//! Line-oriented text to `Block` parsing: strips comments and whitespace,
//! uppercases, then lexes into `Word`s.

use std::io::BufRead;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::block::Block;
use crate::error::ParseError;
use crate::reader::GcodeReader;
use crate::word::Word;

static LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z][0-9.\-]+)+$").unwrap());
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z][0-9.\-]+").unwrap());

/// Parses G-code text off a buffered byte source, one `Block` per call to
/// `read`. Blank lines (after comment/whitespace stripping) are skipped.
pub struct Parser<R> {
    inner: R,
}

impl<R: BufRead> Parser<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: BufRead> GcodeReader for Parser<R> {
    fn read(&mut self) -> Result<Option<Block>, ParseError> {
        loop {
            let mut line = String::new();
            let n = self
                .inner
                .read_line(&mut line)
                .map_err(|e| ParseError::MalformedFrame(e.to_string()))?;
            if n == 0 {
                return Ok(None);
            }

            let line = line.split(';').next().unwrap_or("");
            let line: String = line.chars().filter(|c| !c.is_whitespace()).collect();
            let line = line.to_uppercase();

            if line.is_empty() {
                continue;
            }

            if !LINE_RE.is_match(&line) {
                return Err(ParseError::InvalidWord(line));
            }

            let words = WORD_RE
                .find_iter(&line)
                .map(|m| parse_word(m.as_str()))
                .collect::<Result<Vec<_>, _>>()?;

            return Ok(Some(Block::new(words)));
        }
    }
}

fn parse_word(token: &str) -> Result<Word, ParseError> {
    let letter = token.as_bytes()[0];
    let arg: f64 = token[1..]
        .parse()
        .map_err(|_| ParseError::InvalidWord(token.to_string()))?;
    Ok(Word::new(letter, arg))
}

/// Parses a complete text buffer into its constituent blocks, for tests and
/// synthetic (non-streaming) G-code sources.
pub fn parse(data: &str) -> Result<Vec<Block>, ParseError> {
    let mut p = Parser::new(std::io::Cursor::new(data.as_bytes()));
    let mut out = Vec::new();
    while let Some(b) = p.read()? {
        out.push(b);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_blocks_stripping_comments_and_whitespace() {
        let blocks = parse("G91 X10\n;comment\nG0 Y-3.5\n").unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].arg(b'G'), Some(91.0));
        assert_eq!(blocks[0].arg(b'X'), Some(10.0));
        assert_eq!(blocks[1].arg(b'G'), Some(0.0));
        assert_eq!(blocks[1].arg(b'Y'), Some(-3.5));
    }

    #[test]
    fn rejects_an_invalid_line() {
        assert!(parse("hello world\n").is_err());
    }

    #[test]
    fn skips_comment_only_lines() {
        let blocks = parse(";just a comment\nG1 X1\n").unwrap();
        assert_eq!(blocks.len(), 1);
    }
}
