use crate::Result;
use crate::error::ParseSnafu;

#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub(crate) enum Token {
    /// Mnemonics, keywords and element types.
    #[display("'{_0}'")]
    Ident(String),
    /// `%name` or `%name#k`.
    #[display("'%{name}'")]
    Value { name: String, index: Option<usize> },
    /// `@name`.
    #[display("'@{_0}'")]
    Symbol(String),
    /// Raw text of a `tensor<..>`, `vector<..>` or `!tile<..>` literal.
    #[display("type '{_0}'")]
    Type(String),
    #[display("integer {_0}")]
    Int(i64),
    /// Non-negative integer literal above `i64::MAX`.
    #[display("integer {_0}")]
    UInt(u64),
    #[display("float {_0}")]
    Float(f64),
    #[display("string {_0:?}")]
    Str(String),
    #[display("'('")]
    LParen,
    #[display("')'")]
    RParen,
    #[display("'['")]
    LBracket,
    #[display("']'")]
    RBracket,
    #[display("'{{'")]
    LBrace,
    #[display("'}}'")]
    RBrace,
    #[display("','")]
    Comma,
    #[display("':'")]
    Colon,
    #[display("'='")]
    Eq,
    #[display("'->'")]
    Arrow,
    #[display("end of input")]
    Eof,
}

/// Token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    pub(crate) line: usize,
    pub(crate) column: usize,
}

pub(crate) struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    line: usize,
    line_start: usize,
}

impl<'src> Lexer<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        Self { source: source.as_bytes(), pos: 0, line: 1, line_start: 0 }
    }

    pub(crate) fn tokenize(mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.token == Token::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Spanned> {
        self.skip_whitespace_and_comments();

        let (line, column) = (self.line, self.column());
        let token = match self.peek() {
            None => Token::Eof,
            Some(ch) if is_ident_start(ch) => self.scan_ident_or_type(),
            Some(ch) if ch.is_ascii_digit() => self.scan_number(false)?,
            Some(b'-') if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.pos += 1;
                self.scan_number(true)?
            }
            Some(b'-') if self.starts_with(b"-inf") => {
                self.pos += 4;
                Token::Float(f64::NEG_INFINITY)
            }
            Some(b'%') => {
                self.pos += 1;
                self.scan_value()?
            }
            Some(b'@') => {
                self.pos += 1;
                Token::Symbol(self.scan_word(is_ident_continue).to_string())
            }
            Some(b'!') if self.starts_with(b"!tile<") => self.scan_type_literal(),
            Some(b'"') => self.scan_string()?,
            Some(_) => self.scan_symbol()?,
        };
        Ok(Spanned { token, line, column })
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while let Some(ch) = self.peek() {
                if !ch.is_ascii_whitespace() {
                    break;
                }
                self.bump();
            }

            if self.starts_with(b"//") {
                while self.peek().is_some_and(|c| c != b'\n') {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn scan_ident_or_type(&mut self) -> Token {
        let start = self.pos;
        let word = self.scan_word(is_ident_continue);
        if (word == "tensor" || word == "vector") && self.peek() == Some(b'<') {
            self.pos = start;
            return self.scan_type_literal();
        }
        Token::Ident(word.to_string())
    }

    /// Consume up to and including the closing `>`.
    fn scan_type_literal(&mut self) -> Token {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            self.pos += 1;
            if ch == b'>' {
                break;
            }
        }
        Token::Type(self.text(start).to_string())
    }

    fn scan_number(&mut self, negative: bool) -> Result<Token> {
        let (line, column) = (self.line, self.column());
        let start = self.pos;
        self.scan_word(|c| c.is_ascii_digit());

        let mut is_float = false;
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            self.scan_word(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            self.scan_word(|c| c.is_ascii_digit());
        }

        let text = self.text(start);
        let sign = if negative { "-" } else { "" };
        let literal = format!("{sign}{text}");
        if is_float {
            return match literal.parse::<f64>() {
                Ok(v) => Ok(Token::Float(v)),
                Err(_) => ParseSnafu { line, column, message: format!("invalid float literal '{literal}'") }.fail(),
            };
        }
        if let Ok(v) = literal.parse::<i64>() {
            return Ok(Token::Int(v));
        }
        match literal.parse::<u64>() {
            Ok(v) => Ok(Token::UInt(v)),
            Err(_) => ParseSnafu { line, column, message: format!("integer literal '{literal}' is out of range") }.fail(),
        }
    }

    fn scan_value(&mut self) -> Result<Token> {
        let (line, column) = (self.line, self.column());
        let name = self.scan_word(is_ident_continue).to_string();
        if name.is_empty() {
            return ParseSnafu { line, column, message: "expected value name after '%'" }.fail();
        }
        let mut index = None;
        if self.peek() == Some(b'#') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            let digits = self.scan_word(|c| c.is_ascii_digit());
            index = digits.parse().ok();
        }
        Ok(Token::Value { name, index })
    }

    /// Quoted string; `\\`, `\"`, `\n` and `\t` are the only escapes.
    fn scan_string(&mut self) -> Result<Token> {
        let (line, column) = (self.line, self.column());
        self.pos += 1;
        let mut bytes = Vec::new();
        while let Some(ch) = self.peek() {
            match ch {
                b'"' => {
                    self.pos += 1;
                    return match String::from_utf8(bytes) {
                        Ok(text) => Ok(Token::Str(text)),
                        Err(_) => ParseSnafu { line, column, message: "string literal is not valid UTF-8" }.fail(),
                    };
                }
                b'\\' => {
                    let escaped = match self.peek_at(1) {
                        Some(b'\\') => b'\\',
                        Some(b'"') => b'"',
                        Some(b'n') => b'\n',
                        Some(b't') => b'\t',
                        other => {
                            let (line, column) = (self.line, self.column());
                            let shown = other.map(|c| (c as char).to_string()).unwrap_or_default();
                            return ParseSnafu { line, column, message: format!("unknown escape '\\{shown}'") }.fail();
                        }
                    };
                    bytes.push(escaped);
                    self.pos += 2;
                }
                _ => {
                    bytes.push(ch);
                    self.bump();
                }
            }
        }
        ParseSnafu { line, column, message: "unterminated string literal" }.fail()
    }

    fn scan_symbol(&mut self) -> Result<Token> {
        let (line, column) = (self.line, self.column());
        let Some(ch) = self.peek() else {
            return Ok(Token::Eof);
        };
        self.pos += 1;
        let token = match ch {
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            b',' => Token::Comma,
            b':' => Token::Colon,
            b'=' => Token::Eq,
            b'-' if self.peek() == Some(b'>') => {
                self.pos += 1;
                Token::Arrow
            }
            other => {
                return ParseSnafu { line, column, message: format!("unexpected character '{}'", other as char) }
                    .fail();
            }
        };
        Ok(token)
    }

    fn scan_word(&mut self, accept: impl Fn(u8) -> bool) -> &'src str {
        let start = self.pos;
        while self.peek().is_some_and(&accept) {
            self.pos += 1;
        }
        self.text(start)
    }

    fn text(&self, start: usize) -> &'src str {
        // Token boundaries fall on ASCII bytes, so the slice stays valid UTF-8.
        std::str::from_utf8(&self.source[start..self.pos]).unwrap_or_default()
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn starts_with(&self, prefix: &[u8]) -> bool {
        self.source[self.pos..].starts_with(prefix)
    }

    fn bump(&mut self) {
        if self.peek() == Some(b'\n') {
            self.line += 1;
            self.line_start = self.pos + 1;
        }
        self.pos += 1;
    }

    fn column(&self) -> usize {
        self.pos - self.line_start + 1
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}
