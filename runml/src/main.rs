mod args;

use std::{
    env,
    ffi::OsStr,
    fs,
    io::{self, Write},
    path::Path,
    process::{ExitCode, ExitStatus},
};

use anyhow::{bail, Context as _};
use clap::Parser;
use log::debug;
use ml::{
    backend::{Backend, BackendConfig},
    driver::{self, Options},
    lexer,
    parser::ParseOptions,
    util::fmt::{tree, Context, Show},
};

use crate::args::{Arguments, Emit};

fn main() -> ExitCode {
    let args = Arguments::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .init();

    match run(&args) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Arguments) -> anyhow::Result<ExitCode> {
    for arg in &args.args {
        driver::parse_real_argument(arg)?;
    }

    let path = &args.file;
    check_extension(path)?;
    let src = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    debug!("read {} bytes from {}", src.len(), path.display());

    let tokens = match lexer::lex_in_new(&src) {
        Ok(tokens) => tokens,
        Err(error) => return Ok(report(path, &src, &driver::Error::Lex(error))),
    };
    if args.emit == Some(Emit::Tokens) {
        for token in &tokens {
            let (line, col) = token.span().line_col(&src);
            println!("{line}:{col} {:?} {:?}", token.kind, token.text(&src));
        }
        return Ok(ExitCode::SUCCESS);
    }
    if args.emit.is_none() {
        driver::check_arguments(&tokens, args.args.len())?;
    }

    let options = Options {
        parse: ParseOptions {
            max_params: args.max_params,
            max_depth: args.max_depth,
        },
    };
    let compilation = match driver::compile_tokens(&src, tokens, &options) {
        Ok(compilation) => compilation,
        Err(error) => return Ok(report(path, &src, &error)),
    };

    match args.emit {
        Some(Emit::Ast) => print!("{}", tree::print_program_string(&compilation.session)),
        Some(Emit::C) => print!("{}", compilation.code()),
        Some(Emit::Tokens) => unreachable!("tokens are emitted right after lexing"),
        None => {
            let backend = Backend::new(BackendConfig {
                work_dir: args.work_dir.clone().unwrap_or_else(env::temp_dir),
                keep_artifacts: args.keep,
                compiler: args.cc.clone(),
            });
            let output = backend.run(compilation.code(), &args.args)?;
            io::stdout().write_all(&output.stdout)?;
            io::stderr().write_all(&output.stderr)?;
            return Ok(exit_code(output.status));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn check_extension(path: &Path) -> anyhow::Result<()> {
    if path.extension() != Some(OsStr::new("ml")) {
        bail!("file name must end with '.ml': {}", path.display());
    }
    Ok(())
}

/// Prints a compiler diagnostic as `file:line:col: stage error: message`.
fn report(path: &Path, src: &str, error: &driver::Error) -> ExitCode {
    let ctx = Context::new(src);
    eprintln!("{}:{:#}", path.display(), error.display(&ctx));
    ExitCode::FAILURE
}

/// The program's own exit code, truncated to a byte as the OS does.
fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(code) => ExitCode::from(code as u8),
        None => ExitCode::FAILURE,
    }
}
