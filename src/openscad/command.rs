// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Renderer command-line construction

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Quoting rules of the host command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// Arguments reach the process verbatim; quotes only appear in diagnostics
    Posix,
    /// Windows re-parses one command-line string, spaces and parentheses need quotes
    Windows,
}

impl QuoteStyle {
    pub fn host() -> Self {
        if cfg!(windows) {
            QuoteStyle::Windows
        } else {
            QuoteStyle::Posix
        }
    }

    pub fn needs_quotes(self, arg: &str) -> bool {
        if arg.starts_with('"') && arg.ends_with('"') && arg.len() >= 2 {
            return false;
        }
        match self {
            QuoteStyle::Posix => arg.contains(' '),
            QuoteStyle::Windows => arg.contains([' ', '(', ')']),
        }
    }

    pub fn quote(self, arg: &str) -> String {
        if !self.needs_quotes(arg) {
            return arg.to_string();
        }
        match self {
            QuoteStyle::Posix => format!("'{}'", arg.replace('\'', r"'\''")),
            QuoteStyle::Windows => format!("\"{}\"", arg),
        }
    }
}

/// Builds `[args..] -o <output> <input>`
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    args: Vec<OsString>,
    output: Option<PathBuf>,
    input: Option<PathBuf>,
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self {
            args: Vec::new(),
            output: None,
            input: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn arg_value(mut self, arg: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self.args.push(value.into());
        self
    }

    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        self.output = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.input = Some(path.as_ref().to_path_buf());
        self
    }

    /// Unquoted argument vector; the process runner applies host quoting
    pub fn build(&self) -> Vec<OsString> {
        let mut args = self.args.clone();
        if let Some(output) = &self.output {
            args.push("-o".into());
            args.push(output.clone().into_os_string());
        }
        if let Some(input) = &self.input {
            args.push(input.clone().into_os_string());
        }
        args
    }
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Human-readable command line for logs
pub fn display_command(executable: &Path, args: &[OsString], style: QuoteStyle) -> String {
    std::iter::once(executable.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|a| style.quote(&a.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}
