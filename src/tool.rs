// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External tool capabilities.
//!
//! Every program the installer hands work off to sits behind a small trait
//! here. The workflow only ever talks to these traits, so it can be driven by
//! fakes in tests instead of real system calls.
//!
//! # Capabilities
//!
//! - [`VersionControlClient`]: clone or update the dotfile repository.
//! - [`FileSynchronizer`]: copy the checkout into the destination.
//! - [`ArchiveExtractor`]: unpack a bundled archive.
//! - [`SystemIntegrator`]: apply an optional system integration.
//!
//! External programs always inherit standard input, output, and error. Any
//! diagnostics they print reach the user as is.

pub mod archive;
pub mod git;
pub mod sync;
pub mod system;

use crate::integration::Integration;

use std::{
    ffi::{OsStr, OsString},
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
    process::Command,
};
use tracing::debug;

/// Remote dotfile repository and its local checkout.
///
/// # Invariant
///
/// - Local path either does not exist, or is a working copy of the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySource {
    pub url: String,
    pub local_path: PathBuf,
    pub branch: Option<String>,
}

impl RepositorySource {
    /// Check if local path looks like a version-controlled checkout.
    pub fn is_checkout(&self) -> bool {
        self.local_path.join(".git").exists()
    }
}

/// Files to copy from a checkout into a destination.
///
/// # Invariant
///
/// - Paths matching an exclusion pattern are never copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransferSpec {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub exclusions: Vec<String>,
}

/// Bundled archive to unpack in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveBundle {
    pub name: String,
    pub archive_path: PathBuf,
    pub extract_to: PathBuf,
}

/// Clone or update a repository.
pub trait VersionControlClient {
    /// Clone repository into its local path.
    fn clone_repository(&mut self, source: &RepositorySource) -> Result<()>;

    /// Pull latest changes into existing checkout.
    fn update(&mut self, source: &RepositorySource) -> Result<()>;
}

/// Copy files into destination without deleting unrelated files.
pub trait FileSynchronizer {
    fn synchronize(&mut self, spec: &FileTransferSpec) -> Result<()>;
}

/// Unpack an archive.
///
/// Must only return `Ok` once every entry has been written. Deleting the
/// archive is the caller's business.
pub trait ArchiveExtractor {
    fn extract(&mut self, bundle: &ArchiveBundle) -> Result<()>;
}

/// Apply a system integration.
pub trait SystemIntegrator {
    fn apply(&mut self, integration: &Integration) -> Result<()>;
}

/// Single external program call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl Invocation {
    /// Construct new invocation.
    pub fn new(
        program: impl Into<OsString>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Run invocation through another program, e.g., sudo.
    pub fn elevated(self, elevate: impl Into<OsString>) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);

        Self {
            program: elevate.into(),
            args,
        }
    }

    /// Run invocation to completion, blocking current process.
    ///
    /// # Errors
    ///
    /// - Return [`ToolError::Spawn`] if program could not be started.
    /// - Return [`ToolError::Failed`] if program exits with failure.
    pub fn run(&self) -> Result<()> {
        syscall_interactive(&self.program, &self.args)
    }
}

impl Display for Invocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.program.to_string_lossy().as_ref())?;
        for arg in &self.args {
            write!(fmt, " {}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

pub(crate) fn syscall_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<()> {
    let program = cmd.as_ref().to_string_lossy().into_owned();
    let mut command = Command::new(cmd.as_ref());
    command.args(args);
    debug!("run {command:?}");

    let status = command
        .spawn()
        .and_then(|mut child| child.wait())
        .map_err(|source| ToolError::Spawn {
            source,
            program: program.clone(),
        })?;

    if !status.success() {
        return Err(ToolError::Failed {
            program,
            code: status.code(),
        });
    }

    Ok(())
}

/// External tool error types.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Program could not be started at all.
    #[error("failed to run {program:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        program: String,
    },

    /// Program ran, but exited with failure.
    #[error("command {program:?} failed with {}", describe_exit(code))]
    Failed { program: String, code: Option<i32> },

    /// Local branch and its remote counterpart have diverged.
    #[error("cannot fast-forward branch {branch:?}, local and remote history diverged")]
    Diverged { branch: String },

    /// Checkout is not on any branch, so there is nothing to update.
    #[error("checkout at {:?} has detached HEAD, configure a branch to update", path.display())]
    DetachedHead { path: PathBuf },

    /// File system operation fails.
    #[error("failed to access {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Exclusion pattern is invalid.
    #[error(transparent)]
    Pattern(#[from] ignore::Error),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    ProgressTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

impl ToolError {
    /// Exit code of failing program, if it exited with one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { code, .. } => *code,
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".into(),
    }
}

/// Friendly result alias :3
pub type Result<T, E = ToolError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn elevated_invocation_wraps_program() {
        let result =
            Invocation::new("grub-mkconfig", ["-o", "/boot/grub/grub.cfg"]).elevated("sudo");
        let expect = Invocation::new("sudo", ["grub-mkconfig", "-o", "/boot/grub/grub.cfg"]);
        assert_eq!(result, expect);
        assert_eq!(result.to_string(), "sudo grub-mkconfig -o /boot/grub/grub.cfg");
    }

    #[test]
    fn failing_program_keeps_exit_code() {
        let result = Invocation::new("sh", ["-c", "exit 3"]).run();
        match result {
            Err(err @ ToolError::Failed { .. }) => assert_eq!(err.exit_code(), Some(3)),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let result = Invocation::new("dotinstall-no-such-program", Vec::<OsString>::new()).run();
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }

    #[test]
    fn succeeding_program_is_ok() {
        assert!(Invocation::new("true", Vec::<OsString>::new()).run().is_ok());
    }
}
