// program      ::= item*
// item         ::= statement | function
// function     ::= 'function' ID ['(' [ID (',' ID)*] ')'] NEWLINE (INDENT statement NEWLINE)+
// statement    ::= ID '<-' expr
//                | ID '(' [expr (',' expr)*] ')'
//                | 'print' expr
//                | 'return' expr
// expr         ::= term [('+' | '-') expr]
// term         ::= factor [('*' | '/') term]
// factor       ::= REAL
//                | ARG
//                | ID '(' [expr (',' expr)*] ')'
//                | ID
//                | '(' expr ')'

// Both binary tiers recurse on their right operand, so `a - b - c` groups as
// `a - (b - c)`.

use std::fmt;

use crate::{
    token::Span,
    util::arena::{Arena, Id},
};

pub type ExprId = Id<Expr>;

/// Storage for every expression node of a program.
pub type Exprs = Arena<Expr>;

#[derive(Debug, PartialEq, Default)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    /// Top-level statements in source order, skipping function definitions.
    pub fn statements(&self) -> impl Iterator<Item = &Stmt> {
        self.items.iter().filter_map(|item| match item {
            Item::Stmt(stmt) => Some(stmt),
            Item::Function(_) => None,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(function) => Some(function),
            Item::Stmt(_) => None,
        })
    }
}

#[derive(Debug, PartialEq)]
pub enum Item {
    Function(FunctionDef),
    Stmt(Stmt),
}

#[derive(Debug, PartialEq)]
pub struct FunctionDef {
    pub name: Ident,
    pub params: Vec<Ident>,
    /// Non empty list of statements.
    pub body: Vec<Stmt>,
    /// Whether some body statement is a `return`.
    pub has_return: bool,
}

#[derive(Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn is_return(&self) -> bool {
        matches!(self.kind, StmtKind::Return(_))
    }
}

#[derive(Debug, PartialEq)]
pub enum StmtKind {
    Assignment { target: Ident, value: ExprId },
    Print(ExprId),
    Return(ExprId),
    Call(Call),
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Binary {
        op: BinaryOperator,
        lhs: ExprId,
        rhs: ExprId,
    },
    Real(f64),
    Var(Ident),
    /// `argN`, carrying `N`.
    Arg(u32),
    Call(Call),
    Paren(ExprId),
}

#[derive(Debug, PartialEq)]
pub struct Call {
    pub name: Ident,
    pub args: Vec<ExprId>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOperator {
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: Box<str>,
    pub span: Span,
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
