/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST and filling
/// the function and variable registries.
pub mod parser;

/// The code generator walks the AST, emitting C source text whose variables
/// are declared with a placeholder type.
pub mod codegen;

/// Type resolution rewrites the placeholder declarations of the generated
/// text into concrete C types.
pub mod resolve;

/// The driver runs every stage over one source text.
pub mod driver;

/// The backend compiles finalized C with the host toolchain and runs it.
pub mod backend;

pub mod ast;
pub mod registry;
pub mod session;
pub mod token;

pub mod util {
    pub mod arena;
    pub mod fmt;
    #[cfg(test)]
    pub(crate) mod test_utils;
}

pub use driver::{compile, Compilation, Error, Options};
