// This module turns raw assembly text into the token stream the statement parser
// consumes. It is single-pass over byte buffers owned by the SourceMgr: identifiers
// keep a leading dot (directive dispatch happens on the identifier text), integer
// literals cover decimal, 0x hex, 0b binary and leading-0 octal, strings get C escape
// processing at lex time, and all of #, // and /* */ comments are stripped here. Runs
// of newlines and semicolons collapse into exactly one EndOfStatement token. The
// lexer also owns the include stack: `.include` pushes the current buffer position
// and end of the included buffer pops back to it, so the parser never notices the
// buffer switch. Malformed input becomes an Error token carrying the message; the
// parser turns it into a located diagnostic.

//! Streaming assembly lexer.

use crate::diag::{BufferId, SourceLoc};

use super::source::SourceMgr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Lex-level failure; the token text is the message.
    Error,
    Eof,
    EndOfStatement,
    Identifier,
    String,
    Integer,
    Real,
    Register,
    LParen,
    RParen,
    LBrac,
    RBrac,
    LCurly,
    RCurly,
    Comma,
    Colon,
    Equal,
    Plus,
    Minus,
    Tilde,
    Exclaim,
    Star,
    Slash,
    Percent,
    Pipe,
    PipePipe,
    Caret,
    Amp,
    AmpAmp,
    Less,
    LessLess,
    LessEqual,
    LessGreater,
    Greater,
    GreaterGreater,
    GreaterEqual,
    EqualEqual,
    ExclaimEqual,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Lexeme for most kinds; the message for `Error` tokens.
    pub text: String,
    pub loc: SourceLoc,
    /// Value of an `Integer` token.
    pub int_value: i64,
    /// Unescaped contents of a `String` token.
    pub bytes: Vec<u8>,
}

impl Token {
    fn eof(loc: SourceLoc) -> Self {
        Self {
            kind: TokenKind::Eof,
            text: String::new(),
            loc,
            int_value: 0,
            bytes: Vec::new(),
        }
    }
}

pub struct AsmLexer {
    sources: SourceMgr,
    buffer: BufferId,
    pos: usize,
    include_stack: Vec<(BufferId, usize)>,
    tok: Token,
}

impl AsmLexer {
    /// Lex from `main` inside `sources`. The first token is not available
    /// until the caller primes the stream with [`lex`](Self::lex).
    pub fn new(sources: SourceMgr, main: BufferId) -> Self {
        Self {
            sources,
            buffer: main,
            pos: 0,
            include_stack: Vec::new(),
            tok: Token::eof(SourceLoc::new(main, 0)),
        }
    }

    pub fn sources(&self) -> &SourceMgr {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> &mut SourceMgr {
        &mut self.sources
    }

    pub fn tok(&self) -> &Token {
        &self.tok
    }

    pub fn kind(&self) -> TokenKind {
        self.tok.kind
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.tok.kind == kind
    }

    pub fn is_not(&self, kind: TokenKind) -> bool {
        self.tok.kind != kind
    }

    pub fn loc(&self) -> SourceLoc {
        self.tok.loc
    }

    /// Switch to an included buffer, stacking the current position. The
    /// current token (normally the statement end) stays current.
    pub fn enter_include(&mut self, filename: &str) -> bool {
        match self.sources.open_include(filename) {
            Some(buffer) => {
                self.include_stack.push((self.buffer, self.pos));
                self.buffer = buffer;
                self.pos = 0;
                true
            }
            None => false,
        }
    }

    /// Advance to the next token and return it.
    pub fn lex(&mut self) -> &Token {
        self.tok = self.lex_token();
        &self.tok
    }

    fn byte(&self, at: usize) -> Option<u8> {
        self.sources
            .buffer(self.buffer)
            .contents
            .as_bytes()
            .get(at)
            .copied()
    }

    fn lexeme(&self, start: usize, end: usize) -> String {
        let bytes = &self.sources.buffer(self.buffer).contents.as_bytes()[start..end];
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn token(&self, kind: TokenKind, start: usize, end: usize) -> Token {
        Token {
            kind,
            text: self.lexeme(start, end),
            loc: SourceLoc::new(self.buffer, start as u32),
            int_value: 0,
            bytes: Vec::new(),
        }
    }

    fn error_token(&self, start: usize, message: impl Into<String>) -> Token {
        Token {
            kind: TokenKind::Error,
            text: message.into(),
            loc: SourceLoc::new(self.buffer, start as u32),
            int_value: 0,
            bytes: Vec::new(),
        }
    }

    fn lex_token(&mut self) -> Token {
        loop {
            while matches!(self.byte(self.pos), Some(b' ' | b'\t' | b'\r')) {
                self.pos += 1;
            }
            let start = self.pos;
            let first = match self.byte(self.pos) {
                Some(b) => b,
                None => {
                    if let Some((buffer, pos)) = self.include_stack.pop() {
                        self.buffer = buffer;
                        self.pos = pos;
                        continue;
                    }
                    return Token::eof(SourceLoc::new(self.buffer, start as u32));
                }
            };

            match first {
                b'#' => {
                    self.skip_line_comment();
                    continue;
                }
                b'/' if self.byte(self.pos + 1) == Some(b'/') => {
                    self.skip_line_comment();
                    continue;
                }
                b'/' if self.byte(self.pos + 1) == Some(b'*') => {
                    if !self.skip_block_comment() {
                        return self.error_token(start, "unterminated block comment");
                    }
                    continue;
                }
                b'\n' | b';' => {
                    self.skip_statement_separators();
                    return self.token(TokenKind::EndOfStatement, start, start + 1);
                }
                b'A'..=b'Z' | b'a'..=b'z' | b'_' | b'.' => return self.lex_identifier(start),
                b'0'..=b'9' => return self.lex_number(start),
                b'"' => return self.lex_string(start),
                b'%' => {
                    if matches!(self.byte(self.pos + 1), Some(b) if b.is_ascii_alphanumeric() || b == b'_')
                    {
                        return self.lex_register(start);
                    }
                    self.pos += 1;
                    return self.token(TokenKind::Percent, start, self.pos);
                }
                _ => return self.lex_punctuation(start, first),
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while matches!(self.byte(self.pos), Some(b) if b != b'\n') {
            self.pos += 1;
        }
    }

    /// Returns false when the comment never closes.
    fn skip_block_comment(&mut self) -> bool {
        self.pos += 2;
        while let Some(b) = self.byte(self.pos) {
            if b == b'*' && self.byte(self.pos + 1) == Some(b'/') {
                self.pos += 2;
                return true;
            }
            self.pos += 1;
        }
        false
    }

    /// Consume the whole run of statement separators, including blank
    /// lines and comments, so consecutive ends collapse into one token.
    fn skip_statement_separators(&mut self) {
        loop {
            match self.byte(self.pos) {
                Some(b'\n' | b';' | b' ' | b'\t' | b'\r') => self.pos += 1,
                Some(b'#') => self.skip_line_comment(),
                Some(b'/') if self.byte(self.pos + 1) == Some(b'/') => self.skip_line_comment(),
                Some(b'/') if self.byte(self.pos + 1) == Some(b'*') => {
                    if !self.skip_block_comment() {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_identifier(&mut self, start: usize) -> Token {
        self.pos += 1;
        while matches!(
            self.byte(self.pos),
            Some(b) if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'$')
        ) {
            self.pos += 1;
        }
        self.token(TokenKind::Identifier, start, self.pos)
    }

    fn lex_register(&mut self, start: usize) -> Token {
        self.pos += 1;
        while matches!(self.byte(self.pos), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        self.token(TokenKind::Register, start, self.pos)
    }

    fn lex_number(&mut self, start: usize) -> Token {
        if self.byte(self.pos) == Some(b'0')
            && matches!(self.byte(self.pos + 1), Some(b'x' | b'X'))
        {
            self.pos += 2;
            let digits = self.pos;
            while matches!(self.byte(self.pos), Some(b) if b.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            if self.pos == digits {
                return self.error_token(start, "invalid hexadecimal literal");
            }
            return self.integer_token(start, digits, 16);
        }

        if self.byte(self.pos) == Some(b'0')
            && matches!(self.byte(self.pos + 1), Some(b'b' | b'B'))
        {
            self.pos += 2;
            let digits = self.pos;
            while matches!(self.byte(self.pos), Some(b'0' | b'1')) {
                self.pos += 1;
            }
            if self.pos == digits {
                return self.error_token(start, "invalid binary literal");
            }
            return self.integer_token(start, digits, 2);
        }

        while matches!(self.byte(self.pos), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }

        // digits '.' digits makes a real; a bare trailing '.' does not.
        if self.byte(self.pos) == Some(b'.')
            && matches!(self.byte(self.pos + 1), Some(b) if b.is_ascii_digit())
        {
            self.pos += 1;
            while matches!(self.byte(self.pos), Some(b) if b.is_ascii_digit()) {
                self.pos += 1;
            }
            if matches!(self.byte(self.pos), Some(b'e' | b'E')) {
                let mut exp_end = self.pos + 1;
                if matches!(self.byte(exp_end), Some(b'+' | b'-')) {
                    exp_end += 1;
                }
                if matches!(self.byte(exp_end), Some(b) if b.is_ascii_digit()) {
                    self.pos = exp_end;
                    while matches!(self.byte(self.pos), Some(b) if b.is_ascii_digit()) {
                        self.pos += 1;
                    }
                }
            }
            return self.token(TokenKind::Real, start, self.pos);
        }

        if self.byte(start) == Some(b'0') && self.pos > start + 1 {
            let text = self.lexeme(start, self.pos);
            if text.bytes().any(|b| b >= b'8') {
                return self.error_token(start, "invalid digit in octal literal");
            }
            return self.integer_token(start, start + 1, 8);
        }

        self.integer_token(start, start, 10)
    }

    fn integer_token(&mut self, start: usize, digits_start: usize, radix: u32) -> Token {
        let digits = self.lexeme(digits_start, self.pos);
        match u64::from_str_radix(&digits, radix) {
            Ok(value) => {
                let mut tok = self.token(TokenKind::Integer, start, self.pos);
                tok.int_value = value as i64;
                tok
            }
            Err(_) => self.error_token(start, "integer literal too large"),
        }
    }

    fn lex_string(&mut self, start: usize) -> Token {
        self.pos += 1;
        let mut bytes = Vec::new();
        loop {
            match self.byte(self.pos) {
                None | Some(b'\n') => {
                    return self.error_token(start, "unterminated string literal");
                }
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.byte(self.pos) {
                        Some(b'n') => bytes.push(b'\n'),
                        Some(b't') => bytes.push(b'\t'),
                        Some(b'r') => bytes.push(b'\r'),
                        Some(b'v') => bytes.push(0x0B),
                        Some(b'a') => bytes.push(0x07),
                        Some(b'b') => bytes.push(0x08),
                        Some(b'f') => bytes.push(0x0C),
                        Some(b'\\') => bytes.push(b'\\'),
                        Some(b'"') => bytes.push(b'"'),
                        Some(b'\'') => bytes.push(b'\''),
                        Some(b'x') => {
                            let hi = self.byte(self.pos + 1);
                            let lo = self.byte(self.pos + 2);
                            match (
                                hi.and_then(|b| (b as char).to_digit(16)),
                                lo.and_then(|b| (b as char).to_digit(16)),
                            ) {
                                (Some(hi), Some(lo)) => {
                                    bytes.push((hi * 16 + lo) as u8);
                                    self.pos += 2;
                                }
                                _ => {
                                    return self.error_token(
                                        start,
                                        "invalid hex escape in string literal",
                                    )
                                }
                            }
                        }
                        _ => {
                            return self.error_token(start, "invalid escape in string literal");
                        }
                    }
                    self.pos += 1;
                }
                Some(b) => {
                    bytes.push(b);
                    self.pos += 1;
                }
            }
        }
        Token {
            kind: TokenKind::String,
            text: String::from_utf8_lossy(&bytes).into_owned(),
            loc: SourceLoc::new(self.buffer, start as u32),
            int_value: 0,
            bytes,
        }
    }

    fn lex_punctuation(&mut self, start: usize, first: u8) -> Token {
        use TokenKind::*;
        let second = self.byte(self.pos + 1);
        let (kind, len) = match (first, second) {
            (b'(', _) => (LParen, 1),
            (b')', _) => (RParen, 1),
            (b'[', _) => (LBrac, 1),
            (b']', _) => (RBrac, 1),
            (b'{', _) => (LCurly, 1),
            (b'}', _) => (RCurly, 1),
            (b',', _) => (Comma, 1),
            (b':', _) => (Colon, 1),
            (b'+', _) => (Plus, 1),
            (b'-', _) => (Minus, 1),
            (b'~', _) => (Tilde, 1),
            (b'*', _) => (Star, 1),
            (b'/', _) => (Slash, 1),
            (b'^', _) => (Caret, 1),
            (b'=', Some(b'=')) => (EqualEqual, 2),
            (b'=', _) => (Equal, 1),
            (b'!', Some(b'=')) => (ExclaimEqual, 2),
            (b'!', _) => (Exclaim, 1),
            (b'|', Some(b'|')) => (PipePipe, 2),
            (b'|', _) => (Pipe, 1),
            (b'&', Some(b'&')) => (AmpAmp, 2),
            (b'&', _) => (Amp, 1),
            (b'<', Some(b'<')) => (LessLess, 2),
            (b'<', Some(b'=')) => (LessEqual, 2),
            (b'<', Some(b'>')) => (LessGreater, 2),
            (b'<', _) => (Less, 1),
            (b'>', Some(b'>')) => (GreaterGreater, 2),
            (b'>', Some(b'=')) => (GreaterEqual, 2),
            (b'>', _) => (Greater, 1),
            _ => {
                self.pos += 1;
                return self.error_token(start, format!("unexpected character {:?}", first as char));
            }
        };
        self.pos += len;
        self.token(kind, start, self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexer_for(text: &str) -> AsmLexer {
        let mut sources = SourceMgr::new();
        let main = sources.add_buffer("test.s", text);
        AsmLexer::new(sources, main)
    }

    fn kinds(text: &str) -> Vec<TokenKind> {
        let mut lexer = lexer_for(text);
        let mut out = Vec::new();
        loop {
            let tok = lexer.lex();
            out.push(tok.kind);
            if tok.kind == TokenKind::Eof {
                return out;
            }
        }
    }

    #[test]
    fn identifiers_keep_leading_dot() {
        let mut lexer = lexer_for(".globl foo$bar");
        assert_eq!(lexer.lex().text, ".globl");
        assert_eq!(lexer.lex().text, "foo$bar");
    }

    #[test]
    fn integer_radixes() {
        let mut lexer = lexer_for("10 0x1F 0b101 017 0");
        assert_eq!(lexer.lex().int_value, 10);
        assert_eq!(lexer.lex().int_value, 0x1F);
        assert_eq!(lexer.lex().int_value, 5);
        assert_eq!(lexer.lex().int_value, 15);
        assert_eq!(lexer.lex().int_value, 0);
    }

    #[test]
    fn bad_octal_is_an_error() {
        let mut lexer = lexer_for("019");
        assert_eq!(lexer.lex().kind, TokenKind::Error);
    }

    #[test]
    fn string_escapes() {
        let mut lexer = lexer_for(r#""a\tb\x41\n""#);
        let tok = lexer.lex();
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.bytes, b"a\tbA\n");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut lexer = lexer_for("\"abc\n");
        assert_eq!(lexer.lex().kind, TokenKind::Error);
    }

    #[test]
    fn consecutive_separators_collapse() {
        assert_eq!(
            kinds("a\n\n;;\nb\n"),
            vec![
                TokenKind::Identifier,
                TokenKind::EndOfStatement,
                TokenKind::Identifier,
                TokenKind::EndOfStatement,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("a # one\nb // two\nc /* three */ d\n"),
            vec![
                TokenKind::Identifier,
                TokenKind::EndOfStatement,
                TokenKind::Identifier,
                TokenKind::EndOfStatement,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::EndOfStatement,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn multi_char_operators() {
        assert_eq!(
            kinds("<< <= <> >= >> == != && ||\n"),
            vec![
                TokenKind::LessLess,
                TokenKind::LessEqual,
                TokenKind::LessGreater,
                TokenKind::GreaterEqual,
                TokenKind::GreaterGreater,
                TokenKind::EqualEqual,
                TokenKind::ExclaimEqual,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::EndOfStatement,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn registers_and_percent() {
        let mut lexer = lexer_for("%eax 5 % 3\n");
        let tok = lexer.lex();
        assert_eq!(tok.kind, TokenKind::Register);
        assert_eq!(tok.text, "%eax");
        assert_eq!(lexer.lex().kind, TokenKind::Integer);
        assert_eq!(lexer.lex().kind, TokenKind::Percent);
        assert_eq!(lexer.lex().kind, TokenKind::Integer);
    }

    #[test]
    fn include_stack_resumes_outer_buffer() {
        let mut sources = SourceMgr::new();
        sources.add_buffer("b.s", "two\n");
        let main = sources.add_buffer("a.s", "one\nrest\n");
        let mut lexer = AsmLexer::new(sources, main);

        assert_eq!(lexer.lex().text, "one");
        assert!(lexer.enter_include("b.s"));
        assert_eq!(lexer.lex().text, "two");
        assert_eq!(lexer.lex().kind, TokenKind::EndOfStatement);
        // Inner EOF pops back to the outer buffer, which still holds the
        // newline after "one".
        assert_eq!(lexer.lex().kind, TokenKind::EndOfStatement);
        assert_eq!(lexer.lex().text, "rest");
        assert!(!lexer.enter_include("missing.s"));
    }

    #[test]
    fn real_literals() {
        let mut lexer = lexer_for("3.14 1.0e-3\n");
        assert_eq!(lexer.lex().kind, TokenKind::Real);
        assert_eq!(lexer.lex().kind, TokenKind::Real);
    }
}
