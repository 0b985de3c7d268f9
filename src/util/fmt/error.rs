use std::fmt;

use crate::{
    driver, lexer, parser,
    token::{Spanned, TokenKind},
    util::fmt::{Context, Show},
};

impl Show for Spanned<lexer::Error> {
    fn show(&self, f: &mut fmt::Formatter<'_>, ctx: &Context<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}: ", ctx.location(self.span))?;
        }
        lexer_message(f, &self.inner)
    }
}

impl Show for Spanned<parser::Error> {
    fn show(&self, f: &mut fmt::Formatter<'_>, ctx: &Context<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}: ", ctx.location(self.span))?;
        }
        parser_message(f, ctx, &self.inner)
    }
}

/// Prefixes the message with the stage that rejected the program, as in
/// `3:7: parser error: expected ')', but got newline`.
impl Show for driver::Error {
    fn show(&self, f: &mut fmt::Formatter<'_>, ctx: &Context<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}: ", ctx.location(self.span()))?;
        }
        write!(f, "{} error: ", self.stage())?;
        match self {
            driver::Error::Lex(e) => lexer_message(f, &e.inner),
            driver::Error::Parse(e) => parser_message(f, ctx, &e.inner),
        }
    }
}

impl fmt::Display for driver::Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.span())?;
        self.show(f, &Context::without_source())
    }
}

impl std::error::Error for driver::Error {}

fn lexer_message(f: &mut fmt::Formatter<'_>, error: &lexer::Error) -> fmt::Result {
    use lexer::Error::*;
    match error {
        IllegalCharacter(c) => write!(f, "illegal character {c:?}"),
        MultipleDecimalPoints => write!(f, "multiple decimal points in number"),
        InvalidCharacterAfterNumber(c) => write!(f, "invalid character {c:?} after number"),
        InvalidIdentifier(name) => write!(
            f,
            "invalid identifier {name:?} (identifiers are 1 to {} lowercase letters)",
            lexer::MAX_IDENTIFIER_LEN,
        ),
        ArgumentIndexOutOfRange => write!(f, "argument index out of range"),
    }
}

fn parser_message(
    f: &mut fmt::Formatter<'_>,
    ctx: &Context<'_>,
    error: &parser::Error,
) -> fmt::Result {
    use parser::Error::*;
    match error {
        Unexpected { actual, expected } => write!(f, "expected {expected}, but got {actual}"),
        UnexpectedAny { actual, expected } => {
            write!(f, "expected one of ")?;
            write_list(f, expected)?;
            write!(f, ", but got {actual}")
        }
        ExpectedProgramItem { actual } => {
            write!(f, "expected function definition or statement, but got {actual}")
        }
        ExpectedStatement { actual } => write!(
            f,
            "expected statement (assignment, function call, print or return), \
            but got {actual}"
        ),
        ExpectedFactor { actual } => write!(
            f,
            "expected real constant, argument, identifier, function call or '(', \
            but got {actual}"
        ),
        DuplicateFunction {
            name,
            first_definition,
        } => write!(
            f,
            "function {name} is already defined at {}",
            ctx.location(*first_definition)
        ),
        UndefinedFunction { name } => write!(f, "call to undefined function {name}"),
        EmptyFunctionBody { name } => write!(
            f,
            "function {name} must contain at least one indented statement"
        ),
        TooManyParameters { limit } => {
            write!(f, "too many parameters (limit is {limit})")
        }
        TooDeep { limit } => {
            write!(f, "expression nested too deeply (limit is {limit})")
        }
        ParseReal => write!(f, "malformed real constant"),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, kinds: &[TokenKind]) -> fmt::Result {
    for (i, kind) in kinds.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{kind}")?;
    }
    Ok(())
}
