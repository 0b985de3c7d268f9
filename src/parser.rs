use log::{debug, trace};

use crate::{
    ast::{
        BinaryOperator, Call, Expr, ExprId, ExprKind, Exprs, FunctionDef, Ident, Item, Program,
        Stmt, StmtKind,
    },
    lexer::extract,
    registry::{DuplicateFunction, FunctionRegistry, VariableRegistry},
    session::Session,
    token::{Span, Spanned, Token, TokenKind},
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

pub const DEFAULT_MAX_PARAMS: usize = 100;

pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    /// Upper bound on the parameters of a single function definition.
    pub max_params: usize,
    /// Upper bound on expression nesting. Every operator of a chain and every
    /// parenthesis or call argument list nests one level further.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_params: DEFAULT_MAX_PARAMS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Parses an already lexed program, which must end with an [`TokenKind::Eof`]
/// token. The first error aborts parsing.
pub fn parse(src: &str, tokens: &[Token], options: ParseOptions) -> Result<Session> {
    let mut p = Parser::new(src, tokens, options);
    let program = p.parse_program()?;
    debug!(
        "parsed {} items ({} functions, {} variables, {} expressions)",
        program.items.len(),
        p.functions.len(),
        p.variables.len(),
        p.exprs.len(),
    );
    Ok(Session {
        program,
        exprs: p.exprs,
        functions: p.functions,
        variables: p.variables,
    })
}

struct Parser<'src, 'tok> {
    src: &'src str,
    tokens: &'tok [Token],
    cursor: usize,
    depth: usize,
    options: ParseOptions,
    exprs: Exprs,
    functions: FunctionRegistry,
    variables: VariableRegistry,
}

impl Parser<'_, '_> {
    fn parse_program(&mut self) -> Result<Program> {
        let mut items = Vec::with_capacity(16);
        loop {
            // Blank and comment-only lines between items.
            while self.take(TokenKind::Newline) || self.skip_blank_indented_line() {}
            if self.is(TokenKind::Eof) {
                break;
            }
            items.push(self.parse_item()?);
        }
        Ok(Program { items })
    }

    fn parse_item(&mut self) -> Result<Item> {
        let c = self.peek();
        match c.kind {
            TokenKind::Function => self.parse_function().map(Item::Function),
            TokenKind::Identifier | TokenKind::Print | TokenKind::Return => {
                let stmt = self.parse_stmt()?;
                self.end_of_line()?;
                Ok(Item::Stmt(stmt))
            }
            actual => Err(c.span().wrap(Error::ExpectedProgramItem { actual })),
        }
    }

    fn parse_function(&mut self) -> Result<FunctionDef> {
        self.consume(TokenKind::Function)?;
        let name = self.parse_ident()?;

        // Registered before the body so that it may call itself.
        if let Err(DuplicateFunction { first_definition }) =
            self.functions.register(&name.name, name.span)
        {
            return Err(name.span.wrap(Error::DuplicateFunction {
                name: name.name,
                first_definition,
            }));
        }
        trace!("registered function {name}");

        let params = if self.take(TokenKind::LParen) {
            let params = self.parse_list(TokenKind::RParen, TokenKind::Comma, Self::parse_ident)?;
            self.consume(TokenKind::RParen)?;
            params
        } else {
            Vec::new()
        };
        if let Some(excess) = params.get(self.options.max_params) {
            return Err(excess.span.wrap(Error::TooManyParameters {
                limit: self.options.max_params,
            }));
        }
        self.consume(TokenKind::Newline)?;

        let mut body = Vec::with_capacity(4);
        loop {
            if self.skip_blank_indented_line() {
                continue;
            }
            if !self.take_indent() {
                break;
            }
            body.push(self.parse_stmt()?);
            self.end_of_line()?;
        }
        if body.is_empty() {
            let c = self.peek();
            return Err(c.span().wrap(Error::EmptyFunctionBody { name: name.name }));
        }

        let has_return = body.iter().any(Stmt::is_return);
        Ok(FunctionDef {
            name,
            params,
            body,
            has_return,
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let token = self.peek();
        let (kind, span) = match token.kind {
            TokenKind::Print => {
                self.advance();
                let expr = self.parse_expr()?;
                (StmtKind::Print(expr), token.span().to(self.exprs[expr].span))
            }
            TokenKind::Return => {
                self.advance();
                let expr = self.parse_expr()?;
                (StmtKind::Return(expr), token.span().to(self.exprs[expr].span))
            }
            TokenKind::Identifier => {
                let ident = self.parse_ident()?;
                if self.functions.contains(&ident.name) {
                    let (call, span) = self.parse_call(ident)?;
                    (StmtKind::Call(call), span)
                } else {
                    if self.is(TokenKind::LParen) {
                        // An unregistered name can only be assigned to.
                        return Err(ident.span.wrap(Error::UndefinedFunction { name: ident.name }));
                    }
                    self.consume(TokenKind::Assign)?;
                    let value = self.parse_expr()?;
                    self.variables.register(&ident.name);
                    let span = ident.span.to(self.exprs[value].span);
                    (StmtKind::Assignment { target: ident, value }, span)
                }
            }
            actual => return Err(token.span().wrap(Error::ExpectedStatement { actual })),
        };
        Ok(Stmt { kind, span })
    }

    /// expr ::= term [('+' | '-') expr]
    fn parse_expr(&mut self) -> Result<ExprId> {
        self.nested(|this| {
            let lhs = this.parse_term()?;
            let op = match this.peek().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => return Ok(lhs),
            };
            this.advance();
            let rhs = this.parse_expr()?;
            Ok(this.binary(op, lhs, rhs))
        })
    }

    /// term ::= factor [('*' | '/') term]
    fn parse_term(&mut self) -> Result<ExprId> {
        self.nested(|this| {
            let lhs = this.parse_factor()?;
            let op = match this.peek().kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                _ => return Ok(lhs),
            };
            this.advance();
            let rhs = this.parse_term()?;
            Ok(this.binary(op, lhs, rhs))
        })
    }

    fn parse_factor(&mut self) -> Result<ExprId> {
        let token = self.advance();
        let (kind, span) = match token.kind {
            TokenKind::Real => {
                let Ok(value) = extract::real(token, self.src) else {
                    return Err(token.span().wrap(Error::ParseReal));
                };
                (ExprKind::Real(value), token.span())
            }
            TokenKind::ArgRef(index) => (ExprKind::Arg(index), token.span()),
            TokenKind::Identifier => {
                let ident = Ident {
                    name: extract::ident(token, self.src),
                    span: token.span(),
                };
                if self.functions.contains(&ident.name) {
                    let (call, span) = self.parse_call(ident)?;
                    (ExprKind::Call(call), span)
                } else {
                    (ExprKind::Var(ident), token.span())
                }
            }
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                let end = self.consume(TokenKind::RParen)?;
                (ExprKind::Paren(inner), token.span().to(end.span()))
            }
            actual => return Err(token.span().wrap(Error::ExpectedFactor { actual })),
        };
        Ok(self.exprs.alloc(Expr { kind, span }))
    }

    /// Parses the argument list of a call to `name`, whose identifier has
    /// already been consumed.
    fn parse_call(&mut self, name: Ident) -> Result<(Call, Span)> {
        self.consume(TokenKind::LParen)?;
        let args = self.parse_list(TokenKind::RParen, TokenKind::Comma, Self::parse_expr)?;
        let end = self.consume(TokenKind::RParen)?;
        let span = name.span.to(end.span());
        Ok((Call { name, args }, span))
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(Ident {
            name: extract::ident(token, self.src),
            span: token.span(),
        })
    }

    /// Parses `[item (separator item)*]` up to `end_delim`. Does **NOT**
    /// consume the end delimiter.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        separator: TokenKind,
        parse_item: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        debug_assert_ne!(end_delim, separator);

        let mut items = Vec::new();
        if self.is(end_delim) {
            return Ok(items);
        }
        loop {
            items.push(parse_item(self)?);
            if self.take(separator) {
                continue;
            }
            if self.is(end_delim) {
                break Ok(items);
            }
            let c = self.peek();
            break Err(c.span().wrap(Error::UnexpectedAny {
                actual: c.kind,
                expected: Box::from([separator, end_delim]),
            }));
        }
    }

    /// A statement ends at a line break, or at the end of the input.
    fn end_of_line(&mut self) -> Result<()> {
        if self.take(TokenKind::Newline) || self.is(TokenKind::Eof) {
            return Ok(());
        }
        let c = self.peek();
        Err(c.span().wrap(Error::UnexpectedAny {
            actual: c.kind,
            expected: Box::from([TokenKind::Newline, TokenKind::Eof]),
        }))
    }

    /// Runs `f` one expression level deeper. Fails at the current token once
    /// the configured depth is reached, before the stack could run out.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let limit = self.options.max_depth;
        if self.depth >= limit {
            let c = self.peek();
            return Err(c.span().wrap(Error::TooDeep { limit }));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn binary(&mut self, op: BinaryOperator, lhs: ExprId, rhs: ExprId) -> ExprId {
        let span = self.exprs[lhs].span.to(self.exprs[rhs].span);
        let kind = ExprKind::Binary { op, lhs, rhs };
        self.exprs.alloc(Expr { kind, span })
    }
}

impl Parser<'_, '_> {
    fn new<'src, 'tok>(
        src: &'src str,
        tokens: &'tok [Token],
        options: ParseOptions,
    ) -> Parser<'src, 'tok> {
        Parser {
            src,
            tokens,
            cursor: 0,
            depth: 0,
            options,
            exprs: Exprs::with_capacity(tokens.len() / 2),
            functions: FunctionRegistry::with_capacity(8),
            variables: VariableRegistry::with_capacity(16),
        }
    }

    /// Returns the current token.
    #[inline]
    fn peek(&self) -> Token {
        match self.tokens.get(self.cursor) {
            Some(token) => *token,
            None => Token::eof_for(self.src),
        }
    }

    /// Returns the current token and advances.
    fn advance(&mut self) -> Token {
        let c = self.peek();
        if !c.is_eof() {
            self.cursor += 1;
        }
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances over a body line's indentation, whatever its level.
    fn take_indent(&mut self) -> bool {
        if matches!(self.peek().kind, TokenKind::Indent(_)) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skips a line holding nothing but indentation (and perhaps a comment).
    fn skip_blank_indented_line(&mut self) -> bool {
        let kind_at = |i: usize| self.tokens.get(i).map(|token| token.kind);
        let mut i = self.cursor;
        while matches!(kind_at(i), Some(TokenKind::Indent(_))) {
            i += 1;
        }
        if i > self.cursor && kind_at(i) == Some(TokenKind::Newline) {
            self.cursor = i + 1;
            return true;
        }
        false
    }

    /// Advances if the current token matches the provided one. If not,
    /// returns an error.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if self.is(expect) {
            self.advance();
            Ok(c)
        } else {
            Err(c.span().wrap(Error::Unexpected {
                actual: c.kind,
                expected: expect,
            }))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    UnexpectedAny {
        actual: TokenKind,
        expected: Box<[TokenKind]>,
    },
    ExpectedProgramItem {
        actual: TokenKind,
    },
    ExpectedStatement {
        actual: TokenKind,
    },
    ExpectedFactor {
        actual: TokenKind,
    },
    DuplicateFunction {
        name: Box<str>,
        first_definition: Span,
    },
    UndefinedFunction {
        name: Box<str>,
    },
    EmptyFunctionBody {
        name: Box<str>,
    },
    /// A configured resource limit, not a grammar violation.
    TooManyParameters {
        limit: usize,
    },
    /// Likewise, for expression nesting.
    TooDeep {
        limit: usize,
    },
    ParseReal,
}

impl Error {
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, Error::TooManyParameters { .. } | Error::TooDeep { .. })
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use crate::lexer;

    pub fn parse_program(src: &str) -> Session {
        let tokens = lexer::lex_in_new(src).expect("failed to lex");
        super::parse(src, &tokens, ParseOptions::default()).expect("failed to parse")
    }
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use parser;

        fn test_assignment() {
            let program = "x <- 3 + 4\n";
            let tree_ok = "
                assignment x (0..10)
                  binary Add (5..10)
                    real 3 (5..6)
                    real 4 (9..10)
            ";
        }

        fn test_print_real() {
            let program = "print 2.5";
            let tree_ok = "
                print (0..9)
                  real 2.5 (6..9)
            ";
        }

        fn test_return_argument() {
            let program = "return arg3";
            let tree_ok = "
                return (0..11)
                  arg 3 (7..11)
            ";
        }

        fn test_subtraction_is_right_associative() {
            let program = "print 10 - 3 - 2";
            let tree_ok = "
                print (0..16)
                  binary Sub (6..16)
                    real 10 (6..8)
                    binary Sub (11..16)
                      real 3 (11..12)
                      real 2 (15..16)
            ";
        }

        fn test_division_is_right_associative() {
            let program = "print 20 / 4 / 2";
            let tree_ok = "
                print (0..16)
                  binary Div (6..16)
                    real 20 (6..8)
                    binary Div (11..16)
                      real 4 (11..12)
                      real 2 (15..16)
            ";
        }

        fn test_precedence_mul_plus() {
            let program = "print 1 + 2 * 3";
            let tree_ok = "
                print (0..15)
                  binary Add (6..15)
                    real 1 (6..7)
                    binary Mul (10..15)
                      real 2 (10..11)
                      real 3 (14..15)
            ";
        }

        fn test_precedence_plus_mul() {
            let program = "print 1 * 2 + 3";
            let tree_ok = "
                print (0..15)
                  binary Add (6..15)
                    binary Mul (6..11)
                      real 1 (6..7)
                      real 2 (10..11)
                    real 3 (14..15)
            ";
        }

        fn test_parenthesized() {
            let program = "print (a - b) - c";
            let tree_ok = "
                print (0..17)
                  binary Sub (6..17)
                    paren (6..13)
                      binary Sub (7..12)
                        var a (7..8)
                        var b (11..12)
                    var c (16..17)
            ";
        }

        fn test_function_with_params() {
            let program = "function mul(a, b)\n\treturn a * b\nprint mul(2, 3)\n";
            let tree_ok = "
                function mul(a, b) returns
                  return (20..32)
                    binary Mul (27..32)
                      var a (27..28)
                      var b (31..32)
                print (33..48)
                  call mul (39..48)
                    real 2 (43..44)
                    real 3 (46..47)
            ";
        }

        fn test_function_without_parens() {
            let program = "function hello\n\tprint 1\n";
            let tree_ok = "
                function hello()
                  print (16..23)
                    real 1 (22..23)
            ";
        }

        fn test_function_empty_parens_and_call_statement() {
            let program = "function f()\n\tx <- 1\n\tprint x\nf()\n";
            let tree_ok = "
                function f()
                  assignment x (14..20)
                    real 1 (19..20)
                  print (22..29)
                    var x (28..29)
                call f (30..33)
            ";
        }

        fn test_function_body_at_end_of_input() {
            let program = "function f(x)\n\treturn x";
            let tree_ok = "
                function f(x) returns
                  return (15..23)
                    var x (22..23)
            ";
        }

        fn test_recursive_call_is_allowed() {
            let program = "function f(x)\n\treturn f(x)\n";
            let tree_ok = "
                function f(x) returns
                  return (15..26)
                    call f (22..26)
                      var x (24..25)
            ";
        }

        fn test_nested_calls() {
            let program = "function f(x)\n\treturn x\nprint f(f(1) + 2)\n";
            let tree_ok = "
                function f(x) returns
                  return (15..23)
                    var x (22..23)
                print (24..41)
                  call f (30..41)
                    binary Add (32..40)
                      call f (32..36)
                        real 1 (34..35)
                      real 2 (39..40)
            ";
        }

        fn test_blank_lines_and_comments() {
            let program = "# leading comment\n\nx <- 1 # trailing\n\n\nprint x\n";
            let tree_ok = "
                assignment x (19..25)
                  real 1 (24..25)
                print (39..46)
                  var x (45..46)
            ";
        }

        fn test_indented_blank_and_comment_lines() {
            let program = "function f()\n\t# note\n\t\t\n\tprint 1\n\t\n";
            let tree_ok = "
                function f()
                  print (25..32)
                    real 1 (31..32)
            ";
        }

        fn test_empty_program() {
            let program = "";
            let tree_ok = "";
        }

        fn test_error_call_before_definition() {
            let program = "f(1)\nfunction f(x)\n\treturn x\n";
            let expected_errors = &["1:1: call to undefined function f"];
        }

        fn test_error_duplicate_function() {
            let program = "function f()\n\tprint 1\nfunction f()\n\tprint 2\n";
            let expected_errors = &["3:10: function f is already defined at 1:10"];
        }

        fn test_error_empty_function_body() {
            let program = "function f(x)\nprint 1\n";
            let expected_errors =
                &["2:1: function f must contain at least one indented statement"];
        }

        fn test_error_missing_newline_after_header() {
            let program = "function f(x) print 1";
            let expected_errors = &["1:15: expected newline, but got 'print'"];
        }

        fn test_error_missing_comma_in_params() {
            let program = "function f(a b)\n\treturn a\n";
            let expected_errors = &["1:14: expected one of ',', ')', but got identifier"];
        }

        fn test_error_missing_comma_in_args() {
            let program = "function f(a, b)\n\treturn a\nprint f(1 2)\n";
            let expected_errors = &["3:11: expected one of ',', ')', but got real constant"];
        }

        fn test_error_missing_right_bracket() {
            let program = "print (1 + 2\n";
            let expected_errors = &["1:13: expected ')', but got newline"];
        }

        fn test_error_unindented_comment_ends_function_body() {
            let program = "function f()\n\tprint 1\n# note\n\tprint 2\n";
            let expected_errors =
                &["4:1: expected function definition or statement, but got indentation"];
        }

        fn test_error_missing_assignment_operator() {
            let program = "x 1\n";
            let expected_errors = &["1:3: expected '<-', but got real constant"];
        }

        fn test_error_two_statements_on_one_line() {
            let program = "x <- 1 print x\n";
            let expected_errors = &["1:8: expected one of newline, end of input, but got 'print'"];
        }

        fn test_error_invalid_factor() {
            let program = "print * 2\n";
            let expected_errors = &[
                "1:7: expected real constant, argument, identifier, function call or '(', \
                but got '*'",
            ];
        }

        fn test_error_statement_cannot_start_with_real() {
            let program = "3 <- x\n";
            let expected_errors =
                &["1:1: expected function definition or statement, but got real constant"];
        }

        fn test_error_indented_top_level_statement() {
            let program = "\tprint 1\n";
            let expected_errors =
                &["1:1: expected function definition or statement, but got indentation"];
        }

        fn test_error_double_indentation_in_body() {
            let program = "function f()\n\t\tprint 1\n";
            let expected_errors = &[
                "2:2: expected statement (assignment, function call, print or return), \
                but got indentation",
            ];
        }

        fn test_error_assigning_to_function_name() {
            let program = "function f()\n\tprint 1\nf <- 2\n";
            let expected_errors = &["3:3: expected '(', but got '<-'"];
        }

        fn test_unknown_call_in_expression_is_a_variable_read() {
            let program = "x <- g(1)\n";
            let expected_errors = &["1:7: expected one of newline, end of input, but got '('"];
        }
    );

    #[test]
    fn test_too_many_parameters() {
        use super::*;
        use crate::lexer;

        let src = "function f(a, b, c)\n\treturn a\n";
        let tokens = lexer::lex_in_new(src).unwrap();
        let options = ParseOptions {
            max_params: 2,
            ..ParseOptions::default()
        };
        let error = parse(src, &tokens, options).map(|_| ()).unwrap_err();
        assert_eq!(
            error,
            Span::new_of_bounds(17..18).wrap(Error::TooManyParameters { limit: 2 })
        );
        assert!(error.inner.is_resource_limit());

        let options = ParseOptions {
            max_params: 3,
            ..ParseOptions::default()
        };
        assert!(parse(src, &tokens, options).is_ok());
    }

    #[test]
    fn test_too_deep() {
        use super::*;
        use crate::lexer;

        let src = "print 1 + 1 + 1\n";
        let tokens = lexer::lex_in_new(src).unwrap();
        let options = ParseOptions {
            max_depth: 3,
            ..ParseOptions::default()
        };
        let error = parse(src, &tokens, options).map(|_| ()).unwrap_err();
        assert_eq!(
            error,
            Span::new_of_bounds(14..15).wrap(Error::TooDeep { limit: 3 })
        );
        assert!(error.inner.is_resource_limit());

        let options = ParseOptions {
            max_depth: 4,
            ..ParseOptions::default()
        };
        assert!(parse(src, &tokens, options).is_ok());
    }

    #[test]
    fn test_long_chains_hit_the_depth_limit() {
        use super::*;
        use crate::lexer;

        let sums = format!("print {}1\n", "1 + ".repeat(10_000));
        let parens = format!("print {}1{}\n", "(".repeat(10_000), ")".repeat(10_000));
        let calls = format!(
            "function f(x)\n\treturn x\nprint {}1{}\n",
            "f(".repeat(10_000),
            ")".repeat(10_000)
        );
        for src in [sums, parens, calls] {
            let tokens = lexer::lex_in_new(&src).unwrap();
            let error = parse(&src, &tokens, ParseOptions::default())
                .map(|_| ())
                .unwrap_err();
            assert_eq!(
                error.inner,
                Error::TooDeep {
                    limit: DEFAULT_MAX_DEPTH
                }
            );
        }

        let src = format!("print {}1\n", "1 + ".repeat(200));
        let tokens = lexer::lex_in_new(&src).unwrap();
        assert!(parse(&src, &tokens, ParseOptions::default()).is_ok());
    }

    #[test]
    fn test_samples_parse() {
        let samples = [
            include_str!("../samples/arithmetic.ml"),
            include_str!("../samples/functions.ml"),
            include_str!("../samples/arguments.ml"),
            include_str!("../samples/big.ml"),
        ];
        for sample in samples {
            let session = super::test_utils::parse_program(sample);
            assert!(!session.program.items.is_empty());
        }
    }

    #[test]
    fn test_registries_are_populated() {
        let session = super::test_utils::parse_program(
            "a <- 1\nfunction f(p)\n\tb <- p\n\ta <- 2\nfunction g()\n\tprint 1\nc <- f(a)\n",
        );
        assert_eq!(session.functions.iter().collect::<Vec<_>>(), ["f", "g"]);
        assert_eq!(session.variables.names().collect::<Vec<_>>(), ["a", "b", "c"]);
    }
}
