use crate::{
    codegen::CodeGen,
    lexer,
    parser::{self, ParseOptions},
    resolve,
    token::Spanned,
    util::fmt::{tree, Context, Show},
};

pub fn format_errors<E>(src: &str, e: &[Spanned<E>]) -> Vec<String>
where
    Spanned<E>: Show,
{
    let ctx = Context::new(src);
    e.iter().map(|e| format!("{:#}", e.display(&ctx))).collect()
}

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    CodegenProgram(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

/// Runs the pipeline up to the stage under test, returning the printed result
/// (an AST tree or C code) and the formatted errors, if any.
#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    let (input, codegen) = match test {
        Test::ParserProgram(input) => (input, false),
        Test::CodegenProgram(input) => (input, true),
    };

    let tokens = match lexer::lex_in_new(input) {
        Ok(tokens) => tokens,
        Err(error) => return (String::new(), format_errors(input, &[error])),
    };
    let session = match parser::parse(input, &tokens, ParseOptions::default()) {
        Ok(session) => session,
        Err(error) => return (String::new(), format_errors(input, &[error])),
    };

    if codegen {
        let code = CodeGen::generate(&session);
        (resolve::resolve(&code).code, vec![])
    } else {
        (tree::print_program_string(&session), vec![])
    }
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors)
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, code_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(codegen, program), $source:expr) => {
        crate::util::test_utils::Test::CodegenProgram($source)
    };
}
pub(crate) use tree_tests;
