use std::{
    env,
    ffi::{OsStr, OsString},
    fmt, fs, io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Output},
};

use cc::Build;
use log::{debug, info};
use target_lexicon::Triple;
use tempfile::TempDir;

#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Where the C file and the executable are written.
    pub work_dir: PathBuf,
    pub keep_artifacts: bool,
    /// Overrides the C compiler `cc` would pick for the host.
    pub compiler: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            work_dir: env::temp_dir(),
            keep_artifacts: false,
            compiler: None,
        }
    }
}

/// Compiles finalized C programs with the host toolchain and runs them.
pub struct Backend {
    config: BackendConfig,
    host: Triple,
}

impl Backend {
    pub fn new(config: BackendConfig) -> Backend {
        Backend {
            config,
            host: Triple::host(),
        }
    }

    /// Compiles `code` and runs the resulting executable with `args`,
    /// capturing its output. Artifacts are removed afterwards unless
    /// configured otherwise, whether or not the run succeeded.
    pub fn run<S>(&self, code: &str, args: &[S]) -> Result<Output, BackendError>
    where
        S: AsRef<OsStr>,
    {
        fs::create_dir_all(&self.config.work_dir)?;
        let artifacts = Artifacts::new(&self.config.work_dir)?;
        debug!("writing artifacts to {}", artifacts.dir.path().display());

        let result = self.build_and_run(&artifacts, code, args);
        if self.config.keep_artifacts {
            info!("kept {}", artifacts.keep().display());
        }
        result
    }

    fn build_and_run<S>(
        &self,
        artifacts: &Artifacts,
        code: &str,
        args: &[S],
    ) -> Result<Output, BackendError>
    where
        S: AsRef<OsStr>,
    {
        fs::write(&artifacts.source, code)?;
        self.compile(&artifacts.source, &artifacts.executable)?;

        let mut cmd = Command::new(&artifacts.executable);
        cmd.args(args);
        debug!("running {cmd:?}");
        let output = cmd.output()?;
        info!("program exited with {}", output.status);
        Ok(output)
    }

    fn compile(&self, source: &Path, executable: &Path) -> Result<(), BackendError> {
        let host = self.host.to_string();
        let mut build = Build::new();
        build
            .opt_level(0)
            .debug(false)
            .target(&host)
            .host(&host)
            .cargo_metadata(false)
            .warnings(false);
        if let Some(compiler) = &self.config.compiler {
            build.compiler(compiler);
        }

        let tool = build
            .try_get_compiler()
            .map_err(BackendError::CompilerNotFound)?;
        let mut cmd = tool.to_command();
        cmd.arg(source);
        if tool.is_like_msvc() {
            let mut out = OsString::from("/Fe");
            out.push(executable);
            cmd.arg(out);
        } else {
            cmd.arg("-o").arg(executable);
        }

        debug!("compiling with {cmd:?}");
        let output = cmd.output()?;
        if !output.status.success() {
            return Err(BackendError::CompilationFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// The files of one run, in a fresh directory under the work directory.
/// Dropping removes the directory.
struct Artifacts {
    dir: TempDir,
    source: PathBuf,
    executable: PathBuf,
}

impl Artifacts {
    fn new(work_dir: &Path) -> io::Result<Artifacts> {
        let dir = tempfile::Builder::new().prefix("ml-").tempdir_in(work_dir)?;
        let source = dir.path().join("program.c");
        let executable = dir
            .path()
            .join(format!("program{}", env::consts::EXE_SUFFIX));
        Ok(Artifacts {
            dir,
            source,
            executable,
        })
    }

    /// Leaves the files on disk, returning their directory.
    fn keep(self) -> PathBuf {
        self.dir.keep()
    }
}

#[derive(Debug)]
pub enum BackendError {
    Io(io::Error),
    CompilerNotFound(cc::Error),
    CompilationFailed { status: ExitStatus, stderr: String },
}

impl From<io::Error> for BackendError {
    fn from(error: io::Error) -> Self {
        BackendError::Io(error)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Io(e) => write!(f, "i/o error: {e}"),
            BackendError::CompilerNotFound(e) => write!(f, "no usable C compiler: {e}"),
            BackendError::CompilationFailed { status, stderr } => {
                write!(f, "C compiler failed ({status})")?;
                if !stderr.is_empty() {
                    write!(f, ":\n{}", stderr.trim_end())?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Io(e) => Some(e),
            BackendError::CompilerNotFound(e) => Some(e),
            BackendError::CompilationFailed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifacts_are_removed_on_drop() {
        let work_dir = tempfile::tempdir().unwrap();
        let artifacts = Artifacts::new(work_dir.path()).unwrap();
        let dir = artifacts.dir.path().to_owned();
        assert!(dir.starts_with(work_dir.path()));
        assert_eq!(artifacts.source.extension(), Some(OsStr::new("c")));
        fs::write(&artifacts.source, "int main(void) { return 0; }").unwrap();

        drop(artifacts);
        assert!(!dir.exists());
    }

    #[test]
    fn test_artifacts_can_be_kept() {
        let work_dir = tempfile::tempdir().unwrap();
        let artifacts = Artifacts::new(work_dir.path()).unwrap();
        let source = artifacts.source.clone();
        fs::write(&source, "").unwrap();

        let dir = artifacts.keep();
        assert!(source.exists());
        assert!(dir.starts_with(work_dir.path()));
    }

    #[test]
    fn test_runs_do_not_share_artifacts() {
        let work_dir = tempfile::tempdir().unwrap();
        let first = Artifacts::new(work_dir.path()).unwrap();
        let second = Artifacts::new(work_dir.path()).unwrap();
        assert_ne!(first.source, second.source);
        assert_ne!(first.executable, second.executable);
    }

    #[test]
    fn test_keep_artifacts_after_compile_error() {
        let work_dir = tempfile::tempdir().unwrap();
        let backend = Backend::new(BackendConfig {
            work_dir: work_dir.path().to_owned(),
            keep_artifacts: true,
            compiler: None,
        });
        match backend.run("this is not C", &[] as &[&str]) {
            Err(BackendError::CompilationFailed { .. }) => {}
            Err(BackendError::CompilerNotFound(_)) => return,
            Err(BackendError::Io(e)) if e.kind() == io::ErrorKind::NotFound => return,
            other => panic!("expected a compilation failure, got {other:?}"),
        }
        let kept: Vec<_> = fs::read_dir(work_dir.path()).unwrap().collect();
        assert_eq!(kept.len(), 1);
    }
}
