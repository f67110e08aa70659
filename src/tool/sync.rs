// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! File synchronization from checkout to destination.
//!
//! Both synchronizers merge into the destination. Files already present at
//! the destination that the checkout does not carry are never touched, and
//! files the checkout does carry are overwritten.
//!
//! # Exclusion Patterns
//!
//! Exclusions use gitignore syntax, relative to the top-level of the
//! checkout, e.g., "README.md" excludes a readme at any depth, "/README.md"
//! only the top-level one, and "docs/" an entire directory.

use crate::{
    config::SyncMethod,
    tool::{syscall_interactive, FileSynchronizer, FileTransferSpec, Result, ToolError},
};

use git2::{ObjectType, Repository};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::{
    collections::VecDeque,
    ffi::{OsStr, OsString},
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Synchronizer picked by configuration.
#[derive(Debug, Clone)]
pub enum Synchronizer {
    Rsync(RsyncSynchronizer),
    Native(NativeSynchronizer),
}

impl Synchronizer {
    /// Construct synchronizer for given method.
    pub fn from_method(method: SyncMethod) -> Self {
        match method {
            SyncMethod::Rsync => Self::Rsync(RsyncSynchronizer::new()),
            SyncMethod::Native => Self::Native(NativeSynchronizer::new()),
        }
    }
}

impl FileSynchronizer for Synchronizer {
    fn synchronize(&mut self, spec: &FileTransferSpec) -> Result<()> {
        match self {
            Self::Rsync(rsync) => rsync.synchronize(spec),
            Self::Native(native) => native.synchronize(spec),
        }
    }
}

/// Synchronize through rsync.
///
/// Copies everything in the checkout except excluded paths, preserving
/// permissions, times, and symlinks.
#[derive(Debug, Default, Clone)]
pub struct RsyncSynchronizer;

impl RsyncSynchronizer {
    /// Construct new rsync synchronizer.
    pub fn new() -> Self {
        Self
    }

    /// Arguments handed to rsync for given transfer.
    pub fn args(&self, spec: &FileTransferSpec) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--archive".into(), "--human-readable".into()];
        args.extend(
            spec.exclusions
                .iter()
                .map(|pattern| OsString::from(format!("--exclude={pattern}"))),
        );

        // INVARIANT: Trailing slash on source copies its contents, not itself.
        let mut source = spec.source.clone().into_os_string();
        source.push("/");
        args.push(source);
        args.push(spec.destination.clone().into_os_string());

        args
    }
}

impl FileSynchronizer for RsyncSynchronizer {
    #[instrument(skip(self, spec), level = "debug")]
    fn synchronize(&mut self, spec: &FileTransferSpec) -> Result<()> {
        info!(
            "copy {:?} into {:?} through rsync",
            spec.source.display(),
            spec.destination.display()
        );
        syscall_interactive("rsync", self.args(spec))
    }
}

/// Synchronize tracked files straight out of the checkout.
///
/// Only files tracked at HEAD are copied. Untracked and ignored files in the
/// checkout stay behind. Permissions are carried over, and symlinks are
/// recreated as symlinks.
#[derive(Debug, Default, Clone)]
pub struct NativeSynchronizer;

impl NativeSynchronizer {
    /// Construct new native synchronizer.
    pub fn new() -> Self {
        Self
    }
}

impl FileSynchronizer for NativeSynchronizer {
    #[instrument(skip(self, spec), level = "debug")]
    fn synchronize(&mut self, spec: &FileTransferSpec) -> Result<()> {
        info!(
            "copy tracked files of {:?} into {:?}",
            spec.source.display(),
            spec.destination.display()
        );
        let repository = Repository::open(&spec.source)?;
        let matcher = ExclusionMatcher::new(&spec.source, &spec.exclusions)?;

        let mut copied = 0usize;
        for path in tracked_files(&repository)? {
            if matcher.is_excluded(&path) {
                debug!("exclude {}", path.display());
                continue;
            }

            let from = spec.source.join(&path);
            if from.symlink_metadata().is_err() {
                warn!("tracked file {} missing from checkout", path.display());
                continue;
            }

            copy_entry(&from, &spec.destination.join(&path))?;
            copied += 1;
        }
        info!("copied {copied} files");

        Ok(())
    }
}

/// Gitignore-style exclusion matcher.
#[derive(Debug, Clone)]
pub struct ExclusionMatcher {
    matcher: Gitignore,
}

impl ExclusionMatcher {
    /// Construct new exclusion matcher rooted at target directory.
    ///
    /// # Errors
    ///
    /// - Return [`ToolError::Pattern`] if any pattern is invalid.
    pub fn new(
        root: impl AsRef<Path>,
        patterns: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root.as_ref());
        for pattern in patterns {
            builder.add_line(None, pattern.as_ref())?;
        }

        Ok(Self {
            matcher: builder.build()?,
        })
    }

    /// Check if file path relative to root is excluded.
    pub fn is_excluded(&self, path: impl AsRef<Path>) -> bool {
        self.matcher
            .matched_path_or_any_parents(path.as_ref(), false)
            .is_ignore()
    }
}

// Thank you Eric at https://www.hydrogen18.com/blog/list-all-files-git-repo-pygit2.html.
fn tracked_files(repository: &Repository) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    let tree = repository.head()?.peel_to_commit()?.tree()?;
    let mut trees_and_paths = VecDeque::new();
    trees_and_paths.push_front((tree, PathBuf::new()));

    while let Some((tree, path)) = trees_and_paths.pop_front() {
        for tree_entry in &tree {
            match tree_entry.kind() {
                // INVARIANT: Hit a tree? Traverse it!
                Some(ObjectType::Tree) => {
                    let next_tree = repository.find_tree(tree_entry.id())?;
                    let next_path = path.join(bytes_to_path(tree_entry.name_bytes()));
                    trees_and_paths.push_front((next_tree, next_path));
                }
                // INVARIANT: Hit a blob? Record our current path!
                Some(ObjectType::Blob) => {
                    entries.push(path.join(bytes_to_path(tree_entry.name_bytes())));
                }
                _ => continue,
            }
        }
    }

    Ok(entries)
}

fn copy_entry(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        mkdirp::mkdirp(parent).map_err(|source| ToolError::Io {
            source,
            path: parent.to_path_buf(),
        })?;
    }

    // INVARIANT: Never write through an existing symlink at destination.
    if to
        .symlink_metadata()
        .is_ok_and(|meta| meta.file_type().is_symlink())
    {
        fs::remove_file(to).map_err(|source| ToolError::Io {
            source,
            path: to.to_path_buf(),
        })?;
    }

    let meta = from.symlink_metadata().map_err(|source| ToolError::Io {
        source,
        path: from.to_path_buf(),
    })?;

    if meta.file_type().is_symlink() {
        let target = fs::read_link(from).map_err(|source| ToolError::Io {
            source,
            path: from.to_path_buf(),
        })?;
        std::os::unix::fs::symlink(&target, to).map_err(|source| ToolError::Io {
            source,
            path: to.to_path_buf(),
        })?;
    } else {
        fs::copy(from, to).map_err(|source| ToolError::Io {
            source,
            path: to.to_path_buf(),
        })?;
    }

    Ok(())
}

// Thanks from:
//
// https://github.com/rust-lang/git2-rs/blob/5bc3baa9694a94db2ca9cc256b5bce8a215f9013/
// src/util.rs#L85
fn bytes_to_path(bytes: &[u8]) -> &Path {
    use std::os::unix::prelude::*;
    Path::new(OsStr::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rsync_args_merge_without_delete() {
        let spec = FileTransferSpec {
            source: "/home/blah/.dotfiles".into(),
            destination: "/home/blah".into(),
            exclusions: vec![".git/".into(), "README.md".into()],
        };
        let result = RsyncSynchronizer::new().args(&spec);
        let expect: Vec<OsString> = [
            "--archive",
            "--human-readable",
            "--exclude=.git/",
            "--exclude=README.md",
            "/home/blah/.dotfiles/",
            "/home/blah",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        assert_eq!(result, expect);
        assert!(!result.iter().any(|arg| arg.to_string_lossy().starts_with("--delete")));
    }

    #[test]
    fn exclusion_matcher_follows_gitignore_rules() -> anyhow::Result<()> {
        let matcher =
            ExclusionMatcher::new("/repo", [".git/", "README.md", "/install.sh", "docs/"])?;

        assert!(matcher.is_excluded("README.md"));
        assert!(matcher.is_excluded(".config/nvim/README.md"));
        assert!(matcher.is_excluded("install.sh"));
        assert!(!matcher.is_excluded(".local/bin/install.sh"));
        assert!(matcher.is_excluded("docs/screenshot.png"));
        assert!(matcher.is_excluded(".git/config"));
        assert!(!matcher.is_excluded(".config/kitty/kitty.conf"));
        assert!(!matcher.is_excluded(".zshrc"));

        Ok(())
    }
}
