use std::path::{Path, PathBuf};

const VENV_DIRS: [&str; 2] = ["venv", ".venv"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpreterSource {
    Configured,
    /// Found inside a virtual environment next to the script.
    Environment,
    PlatformDefault,
}

/// The program used to run the retrieval script. Resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    program: PathBuf,
    source: InterpreterSource,
}

impl Interpreter {
    pub fn resolve(script_dir: &Path, configured: Option<&str>) -> Self {
        if let Some(program) = configured {
            return Self {
                program: PathBuf::from(program),
                source: InterpreterSource::Configured,
            };
        }

        let search_dirs = std::iter::once(script_dir).chain(script_dir.parent());
        for dir in search_dirs {
            for venv in VENV_DIRS {
                let candidate = venv_python(&dir.join(venv));
                if candidate.is_file() {
                    return Self {
                        program: candidate,
                        source: InterpreterSource::Environment,
                    };
                }
            }
        }

        Self {
            program: PathBuf::from(platform_default()),
            source: InterpreterSource::PlatformDefault,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn source(&self) -> &InterpreterSource {
        &self.source
    }
}

fn venv_python(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}

fn platform_default() -> &'static str {
    if cfg!(windows) { "python" } else { "python3" }
}
