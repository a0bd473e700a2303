//! Hand-written lexer for the surface language
//!
//! Tracks 1-based line/column positions for every token. `//` starts a
//! line comment. Numbers are floats with optional exponent; identifiers
//! match `[A-Za-z_][A-Za-z0-9_]*` and are checked against the keyword
//! table.

use crate::error::{LangError, Result};
use crate::token::{Token, TokenKind};

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

/// Tokenize a whole source file, ending with an `Eof` token
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        bytes: source.as_bytes(),
        pos: 0,
        line: 1,
        col: 1,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_ahead(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.advance();
                }
                Some(b'/') if self.peek_ahead(1) == Some(b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia();
        let (line, col) = (self.line, self.col);
        let Some(b) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                line,
                col,
            });
        };

        let kind = match b {
            b'[' => self.punct(TokenKind::LBracket),
            b']' => self.punct(TokenKind::RBracket),
            b'{' => self.punct(TokenKind::LBrace),
            b'}' => self.punct(TokenKind::RBrace),
            b'(' => self.punct(TokenKind::LParen),
            b')' => self.punct(TokenKind::RParen),
            b';' => self.punct(TokenKind::Semicolon),
            b'#' => self.punct(TokenKind::Hash),
            b'.' => self.punct(TokenKind::Dot),
            b':' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::ColonEq
                } else {
                    TokenKind::Colon
                }
            }
            b'*' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::StarEq
                } else {
                    return Err(LangError::syntax(line, col, "expected '*='"));
                }
            }
            b'"' => self.string(line, col)?,
            b'0'..=b'9' => self.number(line, col)?,
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.word(),
            other => {
                return Err(LangError::syntax(
                    line,
                    col,
                    format!("unexpected character '{}'", other as char),
                ))
            }
        };

        Ok(Token { kind, line, col })
    }

    fn punct(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn word(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.advance();
            } else {
                break;
            }
        }
        let word = std::str::from_utf8(&self.bytes[start..self.pos])
            .expect("identifier bytes are ASCII")
            .to_string();
        TokenKind::keyword(&word).unwrap_or(TokenKind::Ident(word))
    }

    fn number(&mut self, line: usize, col: usize) -> Result<TokenKind> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.advance();
        }
        if self.peek() == Some(b'.') && matches!(self.peek_ahead(1), Some(b'0'..=b'9')) {
            self.advance();
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mut offset = 1;
            if matches!(self.peek_ahead(1), Some(b'+' | b'-')) {
                offset = 2;
            }
            if matches!(self.peek_ahead(offset), Some(b'0'..=b'9')) {
                for _ in 0..=offset {
                    self.advance();
                }
                while matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.advance();
                }
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .expect("number bytes are ASCII");
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| LangError::syntax(line, col, format!("malformed number '{text}'")))
    }

    fn string(&mut self, line: usize, col: usize) -> Result<TokenKind> {
        self.advance();
        let start = self.pos;
        loop {
            match self.peek() {
                Some(b'"') => {
                    let text = std::str::from_utf8(&self.bytes[start..self.pos])
                        .map_err(|_| {
                            LangError::syntax(line, col, "string literal is not valid UTF-8")
                        })?
                        .to_string();
                    self.advance();
                    return Ok(TokenKind::Str(text));
                }
                Some(_) => {
                    self.advance();
                }
                None => return Err(LangError::syntax(line, col, "unterminated string literal")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            kinds("def pf proof"),
            vec![
                TokenKind::Def,
                TokenKind::Ident("pf".into()),
                TokenKind::Proof,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("[q] *= X ; q := 0"),
            vec![
                TokenKind::LBracket,
                TokenKind::Ident("q".into()),
                TokenKind::RBracket,
                TokenKind::StarEq,
                TokenKind::Ident("X".into()),
                TokenKind::Semicolon,
                TokenKind::Ident("q".into()),
                TokenKind::ColonEq,
                TokenKind::Number(0.0),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("1e-7"), vec![TokenKind::Number(1e-7), TokenKind::Eof]);
        assert_eq!(
            kinds("0.5 2"),
            vec![TokenKind::Number(0.5), TokenKind::Number(2.0), TokenKind::Eof]
        );
    }

    #[test]
    fn test_comments_and_positions() {
        let tokens = tokenize("// comment\nskip").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Skip);
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[0].col, 1);
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(
            kinds("load \"ops/h.json\""),
            vec![
                TokenKind::Load,
                TokenKind::Str("ops/h.json".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_lone_star_rejected() {
        assert!(tokenize("q * X").is_err());
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            tokenize("load \"oops"),
            Err(LangError::Syntax { .. })
        ));
    }
}
