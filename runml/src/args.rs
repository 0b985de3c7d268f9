use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;
use ml::parser::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_PARAMS};

/// Compiles an ml program to C, then builds and runs it with the host C
/// compiler.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Arguments {
    /// The program to run. Must have the `.ml` extension.
    pub file: PathBuf,

    /// Real numbers bound, in order, to `arg0`, `arg1` and so on.
    #[arg(allow_negative_numbers = true)]
    pub args: Vec<String>,

    /// Print an intermediate form instead of running the program.
    #[arg(long, value_enum)]
    pub emit: Option<Emit>,

    /// Keep the generated C file and executable.
    #[arg(long, action = ArgAction::SetTrue)]
    pub keep: bool,

    /// The C compiler to use instead of the detected one.
    #[arg(long, value_name = "PATH")]
    pub cc: Option<PathBuf>,

    /// Directory for generated files. Defaults to the system temporary
    /// directory.
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Maximum number of parameters of a function.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_PARAMS)]
    pub max_params: usize,

    /// Maximum nesting of an expression.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Log more (repeatable). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Arguments {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Emit {
    Tokens,
    Ast,
    C,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::*;

    #[test]
    fn test_command() {
        Arguments::command().debug_assert();
    }

    #[test]
    fn test_parse_arguments() {
        let args =
            Arguments::try_parse_from(["runml", "-vv", "--emit", "c", "prog.ml", "1.5", "-2"])
                .unwrap();
        assert_eq!(args.file, PathBuf::from("prog.ml"));
        assert_eq!(args.args, ["1.5", "-2"]);
        assert_eq!(args.emit, Some(Emit::C));
        assert_eq!(args.log_level(), LevelFilter::Debug);
        assert_eq!(args.max_params, DEFAULT_MAX_PARAMS);
        assert_eq!(args.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!args.keep);
    }
}
