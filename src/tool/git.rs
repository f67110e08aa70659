// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository synchronization through libgit2.
//!
//! Clones and updates go through libgit2, so no git binary is needed. Network
//! progress is displayed through a progress bar. If any credentials are
//! required, the user is prompted for them, with the progress bar suspended
//! while the prompt is up.
//!
//! Updates only ever fast-forward. A checkout whose branch has diverged from
//! its remote counterpart is reported as an error instead of being merged.
//! Uncommitted edits in the checkout survive an update, unless upstream
//! changed the same file, in which case the update is refused and nothing
//! moves.

use crate::tool::{RepositorySource, Result, ToolError, VersionControlClient};

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    Config, FetchOptions, RemoteCallbacks, Repository,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    path::Path,
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument};

/// Version control through libgit2.
#[derive(Debug, Clone)]
pub struct Git2Client {
    bar: ProgressBar,
}

impl Git2Client {
    /// Construct new client that draws progress to standard error.
    pub fn new() -> Self {
        Self::with_progress(ProgressBar::new(0))
    }

    /// Construct new client that draws progress through given bar.
    pub fn with_progress(bar: ProgressBar) -> Self {
        Self { bar }
    }

    fn start_progress(&self, message: impl Into<String>) -> Result<()> {
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        self.bar.set_style(style);
        self.bar.set_message(message.into());
        self.bar.enable_steady_tick(Duration::from_millis(100));

        Ok(())
    }
}

impl Default for Git2Client {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionControlClient for Git2Client {
    /// Clone repository into its local path.
    ///
    /// Checks out the configured branch, or the remote's default branch if no
    /// branch was configured.
    ///
    /// # Errors
    ///
    /// - Return [`ToolError::Git2`] if libgit2 operations fail.
    #[instrument(skip(self, source), level = "debug")]
    fn clone_repository(&mut self, source: &RepositorySource) -> Result<()> {
        info!("clone {} into {:?}", source.url, source.local_path.display());
        self.start_progress(source.url.as_str())?;

        let prompter = IndicatifPrompter::new(self.bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter);
        let config = Config::open_default()?;

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(remote_callbacks(&authenticator, &config, &self.bar));

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fo);
        if let Some(branch) = &source.branch {
            builder.branch(branch);
        }

        let result = builder.clone(source.url.as_str(), source.local_path.as_path());
        self.bar.finish_and_clear();
        result?;

        Ok(())
    }

    /// Pull latest changes into existing checkout.
    ///
    /// Fetches the currently checked out branch from "origin", and
    /// fast-forwards the working tree to it.
    ///
    /// # Errors
    ///
    /// - Return [`ToolError::Git2`] if libgit2 operations fail.
    /// - Return [`ToolError::Diverged`] if fast-forward is not possible.
    /// - Return [`ToolError::DetachedHead`] if checkout is not on a branch,
    ///   and no branch was configured.
    #[instrument(skip(self, source), level = "debug")]
    fn update(&mut self, source: &RepositorySource) -> Result<()> {
        info!("update {:?} from {}", source.local_path.display(), source.url);
        let repository = Repository::open(source.local_path.as_path())?;
        let branch = current_branch(&repository, source)?;

        self.start_progress(source.url.as_str())?;
        let prompter = IndicatifPrompter::new(self.bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter);
        let config = repository.config()?;

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(remote_callbacks(&authenticator, &config, &self.bar));

        let mut remote = repository.find_remote("origin")?;
        let result = remote.fetch(&[branch.as_str()], Some(&mut fo), None);
        self.bar.finish_and_clear();
        result?;

        fast_forward(&repository, &branch)
    }
}

fn remote_callbacks<'a>(
    authenticator: &'a GitAuthenticator,
    config: &'a Config,
    bar: &'a ProgressBar,
) -> RemoteCallbacks<'a> {
    let mut throttle = Instant::now();
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(config));
    rc.transfer_progress(move |progress| {
        if throttle.elapsed() > Duration::from_millis(10) {
            throttle = Instant::now();
            bar.set_length(progress.total_objects() as u64);
            bar.set_position(progress.received_objects() as u64);
        }
        true
    });

    rc
}

fn current_branch(repository: &Repository, source: &RepositorySource) -> Result<String> {
    if let Some(branch) = &source.branch {
        return Ok(branch.clone());
    }

    // INVARIANT: Detached HEAD has shorthand "HEAD", never treat it as branch name.
    if repository.head_detached()? {
        return Err(ToolError::DetachedHead {
            path: source.local_path.clone(),
        });
    }

    let head = repository.head()?;
    head.shorthand()
        .map(ToString::to_string)
        .ok_or_else(|| ToolError::DetachedHead {
            path: source.local_path.clone(),
        })
}

fn fast_forward(repository: &Repository, branch: &str) -> Result<()> {
    let fetch_head = repository.find_reference("FETCH_HEAD")?;
    let fetch_commit = repository.reference_to_annotated_commit(&fetch_head)?;
    let (analysis, _) = repository.merge_analysis(&[&fetch_commit])?;

    if analysis.is_up_to_date() {
        info!("branch {branch:?} already up to date");
        return Ok(());
    }

    if !analysis.is_fast_forward() {
        return Err(ToolError::Diverged {
            branch: branch.into(),
        });
    }

    let refname = format!("refs/heads/{branch}");
    debug!("fast-forward {refname} to {}", fetch_commit.id());

    // INVARIANT: Update work tree before moving any ref.
    //   - Safe checkout keeps local edits, and refuses on conflict.
    //   - Refused checkout must leave branch and HEAD where they were.
    let target = repository.find_commit(fetch_commit.id())?;
    repository.checkout_tree(target.as_object(), Some(CheckoutBuilder::new().safe()))?;

    match repository.find_reference(&refname) {
        Ok(mut reference) => {
            reference.set_target(fetch_commit.id(), "dotinstall: fast-forward")?;
        }
        // INVARIANT: Configured branch may not exist locally yet.
        Err(_) => {
            repository.reference(&refname, fetch_commit.id(), true, "dotinstall: create branch")?;
        }
    }
    repository.set_head(&refname)?;

    Ok(())
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}
