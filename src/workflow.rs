// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Installer workflow.
//!
//! The installer runs a fixed, linear sequence of stages:
//!
//! ```text
//! RepositoryCheck -> SizeReport -> FileTransferGate -> ArchiveExtraction
//!     -> OptionalIntegrations -> Done
//! ```
//!
//! There are no backward transitions, and nothing is retried. Only two stages
//! can end the run early with an abort: declining to clone or update the
//! repository, since nothing can be installed without a usable checkout, and
//! declining the file transfer gate. An abort is a normal, successful exit.
//! All remaining prompts are independent gates that only skip their own step.
//!
//! # Failure
//!
//! Any failing external tool ends the run immediately. Nothing is rolled back,
//! so files already copied and bundles already extracted stay in place. This
//! holds for optional integrations too: once accepted, a failing integration
//! ends the run, and later integrations are never offered.

use crate::{
    config::InstallerConfig,
    integration::{Integration, IntegrationKind},
    prompt::{Confirmation, ConfirmationPrompt, InquirePrompter, PromptError},
    report::{report_sizes, SizeLine},
    tool::{
        archive::TarExtractor, git::Git2Client, sync::Synchronizer, system::CommandIntegrator,
        ArchiveBundle, ArchiveExtractor, FileSynchronizer, FileTransferSpec, RepositorySource,
        SystemIntegrator, ToolError, VersionControlClient,
    },
};

use std::{fs, path::PathBuf};
use tracing::{debug, info, instrument, warn};

/// Stage of installer workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RepositoryCheck,
    SizeReport,
    FileTransferGate,
    ArchiveExtraction,
    OptionalIntegrations,
    Done,
}

impl Stage {
    /// Stage that follows this one. Done is final.
    pub const fn next(self) -> Self {
        match self {
            Self::RepositoryCheck => Self::SizeReport,
            Self::SizeReport => Self::FileTransferGate,
            Self::FileTransferGate => Self::ArchiveExtraction,
            Self::ArchiveExtraction => Self::OptionalIntegrations,
            Self::OptionalIntegrations | Self::Done => Self::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Advance,
    Abort,
}

/// Result of repository check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOutcome {
    Cloned,
    Updated,
    Skipped,
}

/// Result of file transfer gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Copied,
    Aborted,
}

/// Result of bundle extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleOutcome {
    Extracted,
    Skipped,
}

/// Result of optional integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationOutcome {
    Applied,
    Declined,
}

/// Record of everything a run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub repository: Option<RepositoryOutcome>,
    pub sizes: Vec<SizeLine>,
    pub transfer: Option<TransferOutcome>,
    pub bundles: Vec<(String, BundleOutcome)>,
    pub integrations: Vec<(IntegrationKind, IntegrationOutcome)>,

    /// Stage at which user aborted, if any.
    pub aborted_at: Option<Stage>,
}

impl RunSummary {
    /// Check if user aborted the run.
    pub fn is_aborted(&self) -> bool {
        self.aborted_at.is_some()
    }
}

/// External tools used by workflow.
#[derive(Debug, Default, Clone)]
pub struct Toolbox<P, V, S, A, I> {
    pub prompter: P,
    pub vcs: V,
    pub synchronizer: S,
    pub extractor: A,
    pub integrator: I,
}

/// Toolbox backed by real terminal prompts and system programs.
pub type SystemToolbox =
    Toolbox<InquirePrompter, Git2Client, Synchronizer, TarExtractor, CommandIntegrator>;

impl SystemToolbox {
    /// Construct toolbox matching configuration.
    pub fn from_config(config: &InstallerConfig) -> Self {
        Self {
            prompter: InquirePrompter::new(),
            vcs: Git2Client::new(),
            synchronizer: Synchronizer::from_method(config.transfer.method),
            extractor: TarExtractor::new(),
            integrator: CommandIntegrator::new(),
        }
    }
}

/// Sequential, prompt-gated dotfile installation.
#[derive(Debug)]
pub struct InstallerWorkflow<P, V, S, A, I> {
    config: InstallerConfig,
    tools: Toolbox<P, V, S, A, I>,
}

impl<P, V, S, A, I> InstallerWorkflow<P, V, S, A, I>
where
    P: Confirmation,
    V: VersionControlClient,
    S: FileSynchronizer,
    A: ArchiveExtractor,
    I: SystemIntegrator,
{
    /// Construct new workflow.
    pub fn new(config: InstallerConfig, tools: Toolbox<P, V, S, A, I>) -> Self {
        Self { config, tools }
    }

    /// Configuration workflow runs with.
    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Tools workflow runs with.
    pub fn tools(&self) -> &Toolbox<P, V, S, A, I> {
        &self.tools
    }

    /// Run every stage in order until done, or until user aborts.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Prompt`] if user confirmation cannot be read.
    /// - Return any other [`Error`] if an external tool fails, ending the run
    ///   at that point.
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut stage = Stage::RepositoryCheck;

        while stage != Stage::Done {
            debug!("enter stage {stage:?}");
            match self.step(stage, &mut summary)? {
                Transition::Advance => stage = stage.next(),
                Transition::Abort => {
                    info!("installation aborted");
                    summary.aborted_at = Some(stage);
                    return Ok(summary);
                }
            }
        }

        info!("installation complete");
        Ok(summary)
    }

    fn step(&mut self, stage: Stage, summary: &mut RunSummary) -> Result<Transition> {
        match stage {
            Stage::RepositoryCheck => {
                let source = self.config.repository_source();
                let outcome = self.ensure_repository(&source)?;
                summary.repository = Some(outcome);
                if outcome == RepositoryOutcome::Skipped {
                    return Ok(Transition::Abort);
                }
            }
            Stage::SizeReport => {
                for line in report_sizes(self.config.report_paths()) {
                    info!("{line}");
                    summary.sizes.push(line);
                }
            }
            Stage::FileTransferGate => {
                let spec = self.config.transfer_spec();
                let outcome = self.transfer_files(&spec)?;
                summary.transfer = Some(outcome);
                if outcome == TransferOutcome::Aborted {
                    return Ok(Transition::Abort);
                }
            }
            Stage::ArchiveExtraction => {
                for bundle in self.config.archive_bundles() {
                    let outcome = self.extract_bundle(&bundle)?;
                    summary.bundles.push((bundle.name, outcome));
                }
            }
            Stage::OptionalIntegrations => {
                for integration in self.config.integrations() {
                    let outcome = self.apply_integration(&integration)?;
                    summary.integrations.push((integration.kind, outcome));
                }
            }
            Stage::Done => {}
        }

        Ok(Transition::Advance)
    }

    /// Clone repository, or update existing checkout.
    ///
    /// Offers an update if the local path looks like a checkout, and a clone
    /// otherwise. Never offers both.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Repository`] if clone or update fails.
    /// - Return [`Error::Prompt`] if user confirmation cannot be read.
    #[instrument(skip(self, source), level = "debug")]
    pub fn ensure_repository(&mut self, source: &RepositorySource) -> Result<RepositoryOutcome> {
        let wrap = |error: ToolError| Error::Repository {
            source: error,
            url: source.url.clone(),
            path: source.local_path.clone(),
        };

        if source.is_checkout() {
            let prompt = ConfirmationPrompt::default_allow(format!(
                "Dotfiles already cloned at {:?}. Pull latest changes?",
                source.local_path.display()
            ));
            if !self.tools.prompter.confirm(&prompt)? {
                return Ok(RepositoryOutcome::Skipped);
            }

            self.tools.vcs.update(source).map_err(wrap)?;
            return Ok(RepositoryOutcome::Updated);
        }

        let prompt = ConfirmationPrompt::default_allow(format!(
            "Clone {} into {:?}?",
            source.url,
            source.local_path.display()
        ));
        if !self.tools.prompter.confirm(&prompt)? {
            return Ok(RepositoryOutcome::Skipped);
        }

        self.tools.vcs.clone_repository(source).map_err(wrap)?;
        Ok(RepositoryOutcome::Cloned)
    }

    /// Copy checkout into destination after confirmation.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Transfer`] if synchronization fails.
    /// - Return [`Error::Prompt`] if user confirmation cannot be read.
    #[instrument(skip(self, spec), level = "debug")]
    pub fn transfer_files(&mut self, spec: &FileTransferSpec) -> Result<TransferOutcome> {
        let prompt = ConfirmationPrompt::default_deny(format!(
            "Copy dotfiles into {:?}? Existing files with the same name are overwritten.",
            spec.destination.display()
        ));
        if !self.tools.prompter.confirm(&prompt)? {
            return Ok(TransferOutcome::Aborted);
        }

        self.tools
            .synchronizer
            .synchronize(spec)
            .map_err(|source| Error::Transfer {
                source,
                destination: spec.destination.clone(),
            })?;

        Ok(TransferOutcome::Copied)
    }

    /// Extract bundle in place, then remove its archive.
    ///
    /// A missing archive counts as already extracted.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Archive`] if extraction fails. Archive is kept.
    /// - Return [`Error::RemoveArchive`] if archive cannot be removed.
    #[instrument(skip(self, bundle), fields(bundle = %bundle.name), level = "debug")]
    pub fn extract_bundle(&mut self, bundle: &ArchiveBundle) -> Result<BundleOutcome> {
        if !bundle.archive_path.exists() {
            warn!(
                "archive {:?} not found, assume bundle {} already extracted",
                bundle.archive_path.display(),
                bundle.name
            );
            return Ok(BundleOutcome::Skipped);
        }

        self.tools
            .extractor
            .extract(bundle)
            .map_err(|source| Error::Archive {
                source,
                name: bundle.name.clone(),
            })?;

        // INVARIANT: Archive is only removed once extraction succeeded.
        fs::remove_file(&bundle.archive_path).map_err(|source| Error::RemoveArchive {
            source,
            archive: bundle.archive_path.clone(),
        })?;

        Ok(BundleOutcome::Extracted)
    }

    /// Apply integration after its own confirmation.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Integration`] if integration fails.
    /// - Return [`Error::Prompt`] if user confirmation cannot be read.
    #[instrument(skip(self, integration), fields(kind = %integration.kind), level = "debug")]
    pub fn apply_integration(&mut self, integration: &Integration) -> Result<IntegrationOutcome> {
        let prompt = ConfirmationPrompt::default_deny(integration.question.as_str());
        if !self.tools.prompter.confirm(&prompt)? {
            debug!("skip {}", integration.kind);
            return Ok(IntegrationOutcome::Declined);
        }

        self.tools
            .integrator
            .apply(integration)
            .map_err(|source| Error::Integration {
                source,
                kind: integration.kind,
            })?;

        Ok(IntegrationOutcome::Applied)
    }
}

/// Installer workflow error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Clone or update of repository fails.
    #[error("failed to sync {url} into {:?}", path.display())]
    Repository {
        #[source]
        source: ToolError,
        url: String,
        path: PathBuf,
    },

    /// File synchronization fails.
    #[error("failed to copy dotfiles into {:?}", destination.display())]
    Transfer {
        #[source]
        source: ToolError,
        destination: PathBuf,
    },

    /// Bundle extraction fails.
    #[error("failed to extract bundle {name:?}")]
    Archive {
        #[source]
        source: ToolError,
        name: String,
    },

    /// Extracted archive cannot be removed.
    #[error("failed to remove archive {:?}", archive.display())]
    RemoveArchive {
        #[source]
        source: std::io::Error,
        archive: PathBuf,
    },

    /// Accepted integration fails.
    #[error("failed to apply integration {kind}")]
    Integration {
        #[source]
        source: ToolError,
        kind: IntegrationKind,
    },

    /// User confirmation cannot be read.
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

impl Error {
    /// Process exit code for this error.
    ///
    /// Uses exit code of failing program if it has one.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Repository { source, .. }
            | Self::Transfer { source, .. }
            | Self::Archive { source, .. }
            | Self::Integration { source, .. } => source.exit_code().unwrap_or(1),
            Self::RemoveArchive { .. } | Self::Prompt(_) => 1,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
