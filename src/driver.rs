use std::{collections::BTreeSet, fmt};

use log::{debug, info};

use crate::{
    codegen::{self, CodeGen},
    lexer,
    parser::{self, ParseOptions},
    resolve::{resolve, Resolution},
    session::Session,
    token::{Span, Spanned, Token, TokenKind},
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
    pub parse: ParseOptions,
}

/// The products of every stage for one source text.
#[derive(Debug)]
pub struct Compilation {
    pub tokens: Vec<Token>,
    pub session: Session,
    /// Generated C, still carrying placeholder declarations.
    pub generated: String,
    pub resolution: Resolution,
}

impl Compilation {
    /// The finalized C program.
    pub fn code(&self) -> &str {
        &self.resolution.code
    }
}

/// Runs every stage over `src`. The first error of any stage aborts.
pub fn compile(src: &str, options: &Options) -> Result<Compilation, Error> {
    let tokens = lexer::lex_in_new(src).map_err(Error::Lex)?;
    compile_tokens(src, tokens, options)
}

/// Like [`compile`], starting from the already lexed `tokens` of `src`.
pub fn compile_tokens(
    src: &str,
    tokens: Vec<Token>,
    options: &Options,
) -> Result<Compilation, Error> {
    info!("compiling {} bytes ({} tokens)", src.len(), tokens.len());

    let mut session = parser::parse(src, &tokens, options.parse).map_err(Error::Parse)?;
    let generated = CodeGen::generate(&session);
    let resolution = resolve(&generated);

    for var in &resolution.variables {
        if let Some(name) = codegen::source_name(&var.name) {
            if var.storage.is_operated() {
                session.variables.mark_operated(name);
            }
        }
    }
    debug!(
        "resolved {} variables, {} operated",
        resolution.variables.len(),
        session.variables.iter().filter(|var| var.operated).count(),
    );

    Ok(Compilation {
        tokens,
        session,
        generated,
        resolution,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Lex(Spanned<lexer::Error>),
    Parse(Spanned<parser::Error>),
}

impl Error {
    pub fn stage(&self) -> Stage {
        match self {
            Error::Lex(_) => Stage::Lexer,
            Error::Parse(_) => Stage::Parser,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Error::Lex(e) => e.span,
            Error::Parse(e) => e.span,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Lexer,
    Parser,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Lexer => f.write_str("lexer"),
            Stage::Parser => f.write_str("parser"),
        }
    }
}

/// The distinct `argN` indices referenced by a program, ascending.
pub fn argument_refs(tokens: &[Token]) -> Vec<u32> {
    let refs: BTreeSet<_> = tokens
        .iter()
        .filter_map(|token| match token.kind {
            TokenKind::ArgRef(index) => Some(index),
            _ => None,
        })
        .collect();
    refs.into_iter().collect()
}

/// Checks that `supplied` runtime arguments cover the program's references.
pub fn check_arguments(tokens: &[Token], supplied: usize) -> Result<(), ArgumentError> {
    let refs = argument_refs(tokens);
    if refs.len() != supplied {
        return Err(ArgumentError::CountMismatch {
            expected: refs.len(),
            supplied,
        });
    }
    // Distinct indices with a gap, e.g. `arg0` and `arg2` for two values.
    if let Some(&index) = refs.iter().find(|&&index| index as usize >= supplied) {
        return Err(ArgumentError::Missing { index, supplied });
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgumentError {
    CountMismatch { expected: usize, supplied: usize },
    Missing { index: u32, supplied: usize },
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentError::CountMismatch { expected, supplied } => write!(
                f,
                "program references {expected} distinct arguments, but {supplied} were supplied"
            ),
            ArgumentError::Missing { index, supplied } => write!(
                f,
                "program references arg{index}, but only {supplied} arguments were supplied"
            ),
        }
    }
}

impl std::error::Error for ArgumentError {}

/// Parses a runtime argument, which must be a finite real number such as
/// `3`, `-2.5` or `1e3`.
pub fn parse_real_argument(text: &str) -> Result<f64, InvalidArgument> {
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(InvalidArgument(text.into())),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidArgument(pub Box<str>);

impl fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "argument {:?} is not a valid number", self.0)
    }
}

impl std::error::Error for InvalidArgument {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::Storage;

    #[test]
    fn test_compile_marks_operated_variables() {
        let src = "function f(p)\n\treturn p\nx <- 1\nprint f(x)\n";
        let compilation = compile(src, &Options::default()).unwrap();
        assert_eq!(compilation.session.variables.is_operated("x"), Some(true));
        assert!(compilation.generated.contains("ML_NUMERIC ml_x;"));
        assert!(compilation.code().contains("int ml_x;"));
        assert!(!compilation.code().contains("ML_NUMERIC"));
        assert_eq!(compilation.resolution.variables[0].storage, Storage::Integer);
    }

    #[test]
    fn test_errors_name_their_stage() {
        let error = compile("x <- 1 $ 2\n", &Options::default()).unwrap_err();
        assert_eq!(error.stage(), Stage::Lexer);
        assert_eq!(error.span(), Span::new_of_bounds(7..8));

        let error = compile("f(1)\nfunction f(x)\n\treturn x\n", &Options::default()).unwrap_err();
        assert_eq!(error.stage(), Stage::Parser);
        assert!(matches!(
            error,
            Error::Parse(Spanned {
                inner: parser::Error::UndefinedFunction { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_forward_declaration_order() {
        let src = "function f(x)\n\treturn x\nf(1)\n";
        assert!(compile(src, &Options::default()).is_ok());
    }

    #[test]
    fn test_parse_options_are_forwarded() {
        let options = Options {
            parse: ParseOptions {
                max_params: 1,
                ..ParseOptions::default()
            },
        };
        let error = compile("function f(a, b)\n\treturn a\n", &options).unwrap_err();
        let Error::Parse(error) = error else {
            panic!("expected a parser error");
        };
        assert!(error.inner.is_resource_limit());
    }

    #[test]
    fn test_deep_expression_is_reported() {
        let src = format!("print {}1\n", "1 + ".repeat(50_000));
        let Error::Parse(error) = compile(&src, &Options::default()).unwrap_err() else {
            panic!("expected a parser error");
        };
        assert!(error.inner.is_resource_limit());
    }

    #[test]
    fn test_argument_refs() {
        let tokens = lexer::lex_in_new("x <- arg1 + arg0\nprint arg1 * x\n").unwrap();
        assert_eq!(argument_refs(&tokens), [0, 1]);

        assert_eq!(check_arguments(&tokens, 2), Ok(()));
        assert_eq!(
            check_arguments(&tokens, 1),
            Err(ArgumentError::CountMismatch {
                expected: 2,
                supplied: 1
            })
        );
        assert_eq!(
            check_arguments(&tokens, 3),
            Err(ArgumentError::CountMismatch {
                expected: 2,
                supplied: 3
            })
        );

        let tokens = lexer::lex_in_new("print arg0 + arg2\n").unwrap();
        assert_eq!(
            check_arguments(&tokens, 2),
            Err(ArgumentError::Missing {
                index: 2,
                supplied: 2
            })
        );

        let tokens = lexer::lex_in_new("print 1\n").unwrap();
        assert_eq!(check_arguments(&tokens, 0), Ok(()));
    }

    #[test]
    fn test_parse_real_argument() {
        assert_eq!(parse_real_argument("3"), Ok(3.0));
        assert_eq!(parse_real_argument("-2.5"), Ok(-2.5));
        assert_eq!(parse_real_argument("1e3"), Ok(1000.0));
        for bad in ["", "abc", "1.2.3", "inf", "NaN", " 1"] {
            assert_eq!(parse_real_argument(bad), Err(InvalidArgument(bad.into())));
        }
    }
}
