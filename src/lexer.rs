use std::{iter::Peekable, num::ParseFloatError};

use log::trace;

use crate::token::{Span, Spanned, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 1_024;

/// Longest accepted identifier, in characters.
pub const MAX_IDENTIFIER_LEN: usize = 12;

/// Lexes the provided string, producing the tokens into the provided buffer.
///
/// On error the buffer is left empty: no partial token stream is handed
/// downstream.
pub fn lex(src: &str, tokens: &mut Vec<Token>) -> Result<(), Spanned<Error>> {
    let result = Lexer::new(src, tokens).lex();
    match result {
        Ok(()) => trace!("lexed {} tokens", tokens.len()),
        Err(_) => tokens.clear(),
    }
    result
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> Result<Vec<Token>, Spanned<Error>> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens)?;
    Ok(tokens)
}

/// Returns whether `name` is a well-formed identifier: 1 to 12 lowercase
/// ASCII letters.
pub fn is_valid_identifier(name: &str) -> bool {
    (1..=MAX_IDENTIFIER_LEN).contains(&name.len()) && name.bytes().all(|b| b.is_ascii_lowercase())
}

struct Lexer<'src, 'tok> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    /// Whether only tabs have been seen since the last line break.
    at_line_start: bool,
    indent_level: u32,
    tokens: &'tok mut Vec<Token>,
}

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted.
    fn lex(mut self) -> Result<()> {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        loop {
            let Some(next) = self.scan_token_kind()? else {
                continue;
            };
            self.produce(next);
            if next == TokenKind::Eof {
                break Ok(());
            }
        }
    }

    /// Tries to scan the current character. Returns `None` for trivia
    /// (spaces, non-leading tabs and comments).
    fn scan_token_kind(&mut self) -> Result<Option<TokenKind>> {
        use TokenKind::*;
        let at_line_start = self.at_line_start;
        let Some(current) = self.mark_advance() else {
            return Ok(Some(Eof));
        };
        if current != '\t' {
            self.at_line_start = false;
        }
        let kind = match current {
            '\t' if at_line_start => {
                let level = self.indent_level;
                self.indent_level += 1;
                Indent(level)
            }
            '\n' => {
                self.at_line_start = true;
                self.indent_level = 0;
                Newline
            }
            '#' => {
                self.comment();
                return Ok(None);
            }
            c if c.is_ascii_whitespace() => return Ok(None),
            '+' => Plus,
            '-' => Minus,
            '*' => Star,
            '/' => Slash,
            '(' => LParen,
            ')' => RParen,
            ',' => Comma,
            '<' => match self.peek() {
                Some('-') => self.advance_with(Assign),
                _ => return Err(self.span().wrap(Error::IllegalCharacter('<'))),
            },
            c if c.is_ascii_lowercase() => self.word()?,
            c if c.is_ascii_digit() => self.number()?,
            c => return Err(self.span().wrap(Error::IllegalCharacter(c))),
        };
        Ok(Some(kind))
    }

    /// Lexes a lowercase-led run as a keyword, an argument reference or an
    /// identifier, in that order.
    fn word(&mut self) -> Result<TokenKind> {
        // Digits and underscores are swallowed so that the whole run is
        // reported as one invalid identifier instead of being split.
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let word = self.substr();

        if let Some(keyword) = KEYWORDS.get(word).copied() {
            return Ok(keyword);
        }
        if let Some(digits) = word.strip_prefix("arg") {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                return match digits.parse() {
                    Ok(index) => Ok(TokenKind::ArgRef(index)),
                    Err(_) => Err(self.span().wrap(Error::ArgumentIndexOutOfRange)),
                };
            }
        }
        if is_valid_identifier(word) {
            Ok(TokenKind::Identifier)
        } else {
            Err(self.span().wrap(Error::InvalidIdentifier(word.into())))
        }
    }

    fn number(&mut self) -> Result<TokenKind> {
        self.digits();
        if self.peek() == Some('.') {
            self.advance();
            self.digits();
            if self.peek() == Some('.') {
                self.advance();
                return Err(self.span().wrap(Error::MultipleDecimalPoints));
            }
        }
        match self.peek() {
            None => {}
            Some(c) if c.is_ascii_whitespace() => {}
            Some('+' | '-' | '*' | '/' | '(' | ')' | ',') => {}
            Some(c) => {
                let (_, span) = self.advance_with_span();
                return Err(span.wrap(Error::InvalidCharacterAfterNumber(c)));
            }
        }
        Ok(TokenKind::Real)
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    /// Skips a `#` comment up to (not including) the line break.
    fn comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.advance();
        }
    }
}

impl Lexer<'_, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            at_line_start: true,
            indent_level: 0,
            tokens,
        }
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> Option<char> {
        self.current_lo = self.cursor;
        self.advance()
    }

    /// Returns the next char and advances the iterator.
    fn advance(&mut self) -> Option<char> {
        self.iter
            .next()
            .inspect(|c| self.cursor += c.len_utf8())
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next char (with its span) and advances the iterator.
    fn advance_with_span(&mut self) -> (Option<char>, Span) {
        let lo = self.cursor;
        let char = self.advance();
        let span = Span::new_of_bounds(lo..self.cursor);
        (char, span)
    }

    /// Returns the next char without advancing the iterator.
    fn peek(&mut self) -> Option<char> {
        self.iter.peek().copied()
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        self.span().substr(self.src)
    }

    /// Produces a token using the marked bounds.
    fn produce(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.span()));
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    IllegalCharacter(char),
    MultipleDecimalPoints,
    InvalidCharacterAfterNumber(char),
    InvalidIdentifier(Box<str>),
    ArgumentIndexOutOfRange,
}

pub mod extract {
    use super::*;

    pub fn ident(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.text(src).into()
    }

    pub fn real(token: Token, src: &str) -> Result<f64, ParseFloatError> {
        debug_assert_eq!(token.kind, TokenKind::Real);
        token.text(src).parse()
    }
}
