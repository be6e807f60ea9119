// src/parser.rs
use crate::errors::ContextError;

#[derive(Debug)]
pub enum ParseError {
    InvalidSyntax(String),
}

impl From<ParseError> for ContextError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidSyntax(msg) => ContextError::Path(msg),
        }
    }
}

/// Cursor over a path string. Shared by the attribute path grammar.
pub struct Parser<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    /// Attribute names: alphanumerics plus `_ - : %`. The `%` lets
    /// delimiter-encoded scene paths be used as bare names.
    pub fn parse_name(&mut self) -> Result<String, ParseError> {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '%') {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
        if self.i == start {
            return Err(ParseError::InvalidSyntax(format!(
                "name expected at offset {start}"
            )));
        }
        Ok(self.s[start..self.i].to_string())
    }

    pub fn parse_index(&mut self) -> Result<usize, ParseError> {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.i += 1;
            } else {
                break;
            }
        }
        if self.i == start {
            return Err(ParseError::InvalidSyntax("expected index".into()));
        }
        self.s[start..self.i]
            .parse::<usize>()
            .map_err(|_| ParseError::InvalidSyntax("bad index".into()))
    }

    pub fn parse_quoted_string(&mut self) -> Result<String, ParseError> {
        let quote = self
            .peek_char()
            .ok_or_else(|| ParseError::InvalidSyntax("string".into()))?;
        if quote != '\'' && quote != '"' {
            return Err(ParseError::InvalidSyntax("expected quoted string".into()));
        }
        self.i += 1;
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            self.i += c.len_utf8();
            if c == quote {
                return Ok(out);
            }
            if c == '\\' {
                if let Some(nc) = self.peek_char() {
                    self.i += nc.len_utf8();
                    match nc {
                        '\\' | '"' | '\'' => out.push(nc),
                        _ => {
                            out.push('\\');
                            out.push(nc);
                        }
                    }
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        Err(ParseError::InvalidSyntax("unterminated string".into()))
    }

    pub fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.consume_char(c) {
            Ok(())
        } else {
            Err(ParseError::InvalidSyntax(format!(
                "expected '{c}' at offset {}",
                self.i
            )))
        }
    }

    pub fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn consume_str(&mut self, lit: &str) -> bool {
        if self.s[self.i..].starts_with(lit) {
            self.i += lit.len();
            true
        } else {
            false
        }
    }

    pub fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
    }

    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_accepts_encoded_characters() {
        let mut p = Parser::new("%2Froot%2Fworld.rest");
        assert_eq!(p.parse_name().unwrap(), "%2Froot%2Fworld");
        assert!(p.consume_char('.'));
        assert_eq!(p.parse_name().unwrap(), "rest");
        assert!(p.eof());
    }

    #[test]
    fn quoted_string_handles_escapes() {
        let mut p = Parser::new(r#"'it\'s /a.b'"#);
        assert_eq!(p.parse_quoted_string().unwrap(), "it's /a.b");
    }

    #[test]
    fn unterminated_string_is_rejected() {
        let mut p = Parser::new("'abc");
        assert!(p.parse_quoted_string().is_err());
    }
}
