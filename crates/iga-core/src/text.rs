//! Whitespace-separated token reader for the NURBS text formats.
//!
//! Comments start with `#` and run to the end of the line; they may appear
//! anywhere between tokens.

use std::io::Read;
use std::str::FromStr;

use crate::error::{IgaError, Result};

/// Cursor over the tokens of a text document.
#[derive(Debug, Clone)]
pub struct TokenReader {
    tokens: Vec<String>,
    pos: usize,
}

impl TokenReader {
    pub fn new(input: &str) -> Self {
        let tokens = input
            .lines()
            .map(|line| match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            })
            .flat_map(str::split_whitespace)
            .map(str::to_owned)
            .collect();
        Self { tokens, pos: 0 }
    }

    /// Read the whole stream and tokenize it.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut input = String::new();
        reader.read_to_string(&mut input)?;
        Ok(Self::new(&input))
    }

    pub fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Number of tokens consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn next_token(&mut self) -> Result<&str> {
        if self.pos >= self.tokens.len() {
            return Err(IgaError::Parse("Unexpected end of input".into()));
        }
        let tok = &self.tokens[self.pos];
        self.pos += 1;
        Ok(tok)
    }

    pub fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        match self.next_token()? {
            k if k == kw => Ok(()),
            other => Err(IgaError::Parse(format!(
                "Expected keyword '{kw}', got '{other}'"
            ))),
        }
    }

    /// Consume the next token if it equals `kw`.
    pub fn accept_keyword(&mut self, kw: &str) -> bool {
        if self.peek() == Some(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn parse<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let tok = self.next_token()?;
        tok.parse::<T>().map_err(|_| {
            IgaError::Parse(format!("Expected {what}, got '{tok}'"))
        })
    }

    pub fn parse_usize(&mut self) -> Result<usize> {
        self.parse("a non-negative integer")
    }

    pub fn parse_i64(&mut self) -> Result<i64> {
        self.parse("an integer")
    }

    pub fn parse_f64(&mut self) -> Result<f64> {
        self.parse("a real number")
    }

    /// Read `n` reals.
    pub fn parse_f64_vec(&mut self, n: usize) -> Result<Vec<f64>> {
        (0..n).map(|_| self.parse_f64()).collect()
    }

    /// Read a count followed by that many integers.
    pub fn parse_counted_i64(&mut self) -> Result<Vec<i64>> {
        let n = self.parse_usize()?;
        (0..n).map(|_| self.parse_i64()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_are_skipped() {
        let mut r = TokenReader::new("# header\nknotvectors # trailing\n 2\n#\n 0.5");
        r.expect_keyword("knotvectors").unwrap();
        assert_eq!(r.parse_usize().unwrap(), 2);
        assert_eq!(r.parse_f64().unwrap(), 0.5);
        assert!(r.is_empty());
    }

    #[test]
    fn test_expect_keyword_mismatch() {
        let mut r = TokenReader::new("patches");
        let err = r.expect_keyword("knotvectors").unwrap_err();
        assert!(matches!(err, IgaError::Parse(_)));
    }

    #[test]
    fn test_accept_keyword_does_not_consume_on_mismatch() {
        let mut r = TokenReader::new("weights 1.0");
        assert!(!r.accept_keyword("periodic"));
        assert!(r.accept_keyword("weights"));
        assert_eq!(r.peek(), Some("1.0"));
    }

    #[test]
    fn test_bad_number() {
        let mut r = TokenReader::new("abc");
        assert!(r.parse_f64().is_err());
    }

    #[test]
    fn test_end_of_input() {
        let mut r = TokenReader::new("");
        assert!(r.next_token().is_err());
    }
}
