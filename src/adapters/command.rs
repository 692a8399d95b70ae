//! Command resolution for external tools.
//!
//! Tools either run directly (`manim -pql temp_scene.py`) or through a
//! named-environment launcher (`conda run -n <env> manim -pql temp_scene.py`).
//! Both pipeline stages resolve their commands through [`resolve_tool`], so
//! they always agree on how the environment is applied.

use std::fmt;
use std::path::PathBuf;

/// Default launcher for named environments
pub const DEFAULT_LAUNCHER: &str = "conda";

/// A fully resolved program + argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute
    pub program: String,

    /// Arguments, in order
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Full argv, program first
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}

/// Resolve `tool` into a program and argument prefix.
///
/// With an environment the launcher runs the tool inside it
/// (`<launcher> run -n <env> <tool>`); without one the tool is the program.
pub fn resolve_tool(tool: &str, environment: Option<&str>, launcher: &str) -> Invocation {
    match environment {
        Some(env) => Invocation::new(launcher).args(["run", "-n", env, tool]),
        None => Invocation::new(tool),
    }
}

/// Options for a single process run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Working directory for the child
    pub cwd: Option<PathBuf>,

    /// Text written to the child's stdin, which is closed afterwards
    pub input_text: Option<String>,
}

impl RunOptions {
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn input_text(mut self, input: impl Into<String>) -> Self {
        self.input_text = Some(input.into());
        self
    }
}
