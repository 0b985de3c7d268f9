use std::{
    fmt::{self, Write},
    format_args as f,
};

use log::debug;

use crate::{ast::*, session::Session};


const DEFAULT_CODE_CAPACITY: usize = 4 * 1024; // 4 KiB

const INDENT: &str = "    ";

/// Declared type of every program variable until [`crate::resolve`] replaces
/// it. Uppercase, so never a valid identifier in the source language.
pub const PLACEHOLDER_TYPE: &str = "ML_NUMERIC";

/// Prefix of every program-defined name in the generated C. Keeps variables
/// and functions apart from C keywords, the C library and `main`'s own
/// parameters.
pub const NAME_PREFIX: &str = "ml_";

/// Source name of a program-defined C name, if it is one.
pub fn source_name(c_name: &str) -> Option<&str> {
    c_name.strip_prefix(NAME_PREFIX)
}

/// Formats a source name as it appears in the generated C.
struct CName<'a>(&'a str);

impl fmt::Display for CName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{NAME_PREFIX}{}", self.0)
    }
}

/// Walks a parsed program, emitting C source text.
pub struct CodeGen<'s> {
    code: String,
    exprs: &'s Exprs,
    indent: bool,
}

impl CodeGen<'_> {
    pub fn generate(session: &Session) -> String {
        let mut this = CodeGen {
            code: String::with_capacity(DEFAULT_CODE_CAPACITY),
            exprs: &session.exprs,
            indent: false,
        };
        this.gen_program(session);
        debug!("generated {} bytes of C", this.code.len());
        this.code
    }

    fn gen_program(&mut self, session: &Session) {
        self.line(f!("#include <stdio.h>"));
        self.line(f!("#include <stdlib.h>"));
        self.line(f!(""));

        if !session.variables.is_empty() {
            for name in session.variables.names() {
                self.line(f!("{PLACEHOLDER_TYPE} {};", CName(name)));
            }
            self.line(f!(""));
        }

        for function in session.program.functions() {
            self.gen_function(function);
        }
        self.gen_main(&session.program);
    }

    fn gen_function(&mut self, function: &FunctionDef) {
        let return_ty = if function.has_return { "double" } else { "void" };
        self.emit(f!("{return_ty} {}(", CName(&function.name.name)));
        if function.params.is_empty() {
            self.emit(f!("void"));
        }
        for (i, param) in function.params.iter().enumerate() {
            if i > 0 {
                self.emit(f!(", "));
            }
            self.emit(f!("double {}", CName(&param.name)));
        }
        self.emit(f!(") {{\n"));

        self.indented(|this| {
            for stmt in &function.body {
                this.gen_stmt(stmt);
            }
        });
        self.line(f!("}}"));
        self.line(f!(""));
    }

    /// Top-level statements run, in order, inside the C entry point.
    fn gen_main(&mut self, program: &Program) {
        self.line(f!("int main(int argc, char *argv[]) {{"));
        self.indented(|this| {
            for stmt in program.statements() {
                this.gen_stmt(stmt);
            }
            if !program.statements().any(Stmt::is_return) {
                this.line(f!("return 0;"));
            }
        });
        self.line(f!("}}"));
    }

    fn gen_stmt(&mut self, stmt: &Stmt) {
        self.start_line();
        match &stmt.kind {
            StmtKind::Assignment { target, value } => {
                self.emit(f!("{} = ", CName(&target.name)));
                self.gen_expr(*value);
            }
            StmtKind::Print(expr) => {
                let format = PrintFormat::of(self.exprs, *expr);
                let (directive, ty) = (format.directive(), format.c_type());
                self.emit(f!("printf(\"{directive}\\n\", ({ty})("));
                self.gen_expr(*expr);
                self.emit(f!("))"));
            }
            StmtKind::Return(expr) => {
                self.emit(f!("return "));
                self.gen_expr(*expr);
            }
            StmtKind::Call(call) => self.gen_call(call),
        }
        self.emit(f!(";\n"));
    }

    fn gen_expr(&mut self, id: ExprId) {
        let exprs = self.exprs;
        match &exprs[id].kind {
            ExprKind::Binary { op, lhs, rhs } => {
                self.gen_expr(*lhs);
                self.emit(f!(" {} ", op.symbol()));
                // C groups left to right; keep the parsed right-leaning shape.
                if matches!(exprs[*rhs].kind, ExprKind::Binary { .. }) {
                    self.emit(f!("("));
                    self.gen_expr(*rhs);
                    self.emit(f!(")"));
                } else {
                    self.gen_expr(*rhs);
                }
            }
            // Six decimals, as `%f` would print them.
            ExprKind::Real(value) => self.emit(f!("{value:.6}")),
            ExprKind::Var(name) => self.emit(f!("{}", CName(&name.name))),
            ExprKind::Arg(index) => self.emit(f!("atof(argv[{index} + 1])")),
            ExprKind::Call(call) => self.gen_call(call),
            ExprKind::Paren(inner) => {
                self.emit(f!("("));
                self.gen_expr(*inner);
                self.emit(f!(")"));
            }
        }
    }

    fn gen_call(&mut self, call: &Call) {
        self.emit(f!("{}(", CName(&call.name.name)));
        for (i, arg) in call.args.iter().enumerate() {
            if i > 0 {
                self.emit(f!(", "));
            }
            self.gen_expr(*arg);
        }
        self.emit(f!(")"));
    }
}

// Utility functions.
impl CodeGen<'_> {
    fn emit(&mut self, f: fmt::Arguments<'_>) {
        self.code
            .write_fmt(f)
            .expect("code emit should be infallible");
    }

    /// Emits a whole line, indented if inside a block.
    fn line(&mut self, f: fmt::Arguments<'_>) {
        self.start_line();
        self.emit(f);
        self.code.push('\n');
    }

    fn start_line(&mut self) {
        if self.indent {
            self.code.push_str(INDENT);
        }
    }

    fn indented(&mut self, f: impl FnOnce(&mut Self)) {
        self.indent = true;
        f(self);
        self.indent = false;
    }
}

/// How a `print` statement renders its value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrintFormat {
    /// `%d`, chosen when the printed expression calls a function or applies an
    /// operator anywhere.
    Integer,
    /// `%f`, for plain values.
    Real,
}

impl PrintFormat {
    pub fn of(exprs: &Exprs, id: ExprId) -> PrintFormat {
        if computes(exprs, id) {
            PrintFormat::Integer
        } else {
            PrintFormat::Real
        }
    }

    pub const fn directive(self) -> &'static str {
        match self {
            PrintFormat::Integer => "%d",
            PrintFormat::Real => "%f",
        }
    }

    /// The C type the printed value is converted to before formatting.
    pub const fn c_type(self) -> &'static str {
        match self {
            PrintFormat::Integer => "int",
            PrintFormat::Real => "double",
        }
    }
}

fn computes(exprs: &Exprs, id: ExprId) -> bool {
    match &exprs[id].kind {
        ExprKind::Binary { .. } | ExprKind::Call(_) => true,
        ExprKind::Paren(inner) => computes(exprs, *inner),
        ExprKind::Real(_) | ExprKind::Var(_) | ExprKind::Arg(_) => false,
    }
}
