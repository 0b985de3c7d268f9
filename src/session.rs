use crate::{
    ast::{Exprs, Program},
    registry::{FunctionRegistry, VariableRegistry},
};

/// Everything the parser knows about a program once it has been accepted.
/// Lives for a single compilation.
#[derive(Debug, Default)]
pub struct Session {
    pub program: Program,
    pub exprs: Exprs,
    pub functions: FunctionRegistry,
    pub variables: VariableRegistry,
}
