use std::io::Write;

use crate::{ast::*, session::Session};

const INDENT_WIDTH: usize = 2;

pub fn print_program_string(session: &Session) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, session).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_program(w: &mut impl Write, session: &Session) -> std::io::Result<()> {
    let exprs = &session.exprs;
    for item in &session.program.items {
        match item {
            Item::Function(function) => print_function(w, exprs, 0, function)?,
            Item::Stmt(stmt) => print_stmt(w, exprs, 0, stmt)?,
        }
    }
    Ok(())
}

fn print_function(
    w: &mut impl Write,
    exprs: &Exprs,
    i: usize,
    function: &FunctionDef,
) -> std::io::Result<()> {
    sp(w, i)?;
    write!(w, "function {}(", function.name)?;
    for (n, param) in function.params.iter().enumerate() {
        if n > 0 {
            write!(w, ", ")?;
        }
        write!(w, "{param}")?;
    }
    write!(w, ")")?;
    if function.has_return {
        write!(w, " returns")?;
    }
    writeln!(w)?;
    for stmt in &function.body {
        print_stmt(w, exprs, i + 1, stmt)?;
    }
    Ok(())
}

fn print_stmt(w: &mut impl Write, exprs: &Exprs, i: usize, stmt: &Stmt) -> std::io::Result<()> {
    sp(w, i)?;
    match &stmt.kind {
        StmtKind::Assignment { target, value } => {
            writeln!(w, "assignment {target} ({})", stmt.span)?;
            print_expr(w, exprs, i + 1, *value)
        }
        StmtKind::Print(expr) => {
            writeln!(w, "print ({})", stmt.span)?;
            print_expr(w, exprs, i + 1, *expr)
        }
        StmtKind::Return(expr) => {
            writeln!(w, "return ({})", stmt.span)?;
            print_expr(w, exprs, i + 1, *expr)
        }
        StmtKind::Call(call) => {
            writeln!(w, "call {} ({})", call.name, stmt.span)?;
            print_args(w, exprs, i + 1, &call.args)
        }
    }
}

pub fn print_expr(w: &mut impl Write, exprs: &Exprs, i: usize, id: ExprId) -> std::io::Result<()> {
    let expr = &exprs[id];
    let span = expr.span;
    sp(w, i)?;
    match &expr.kind {
        ExprKind::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?} ({span})")?;
            print_expr(w, exprs, i + 1, *lhs)?;
            print_expr(w, exprs, i + 1, *rhs)?;
        }
        ExprKind::Real(value) => writeln!(w, "real {value} ({span})")?,
        ExprKind::Var(name) => writeln!(w, "var {name} ({span})")?,
        ExprKind::Arg(index) => writeln!(w, "arg {index} ({span})")?,
        ExprKind::Call(call) => {
            writeln!(w, "call {} ({span})", call.name)?;
            print_args(w, exprs, i + 1, &call.args)?;
        }
        ExprKind::Paren(inner) => {
            writeln!(w, "paren ({span})")?;
            print_expr(w, exprs, i + 1, *inner)?;
        }
    }
    Ok(())
}

fn print_args(w: &mut impl Write, exprs: &Exprs, i: usize, args: &[ExprId]) -> std::io::Result<()> {
    for arg in args {
        print_expr(w, exprs, i, *arg)?;
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}
