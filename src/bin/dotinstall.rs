// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotinstall::{
    config::InstallerConfig,
    path::default_config_path,
    workflow::{Error as WorkflowError, InstallerWorkflow, SystemToolbox},
};

use anyhow::{Context, Result};
use clap::Parser;
use std::{fs::read_to_string, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install or update dotfiles interactively.
///
/// Every step asks for confirmation before it runs.
#[derive(Debug, Clone, Parser)]
#[command(about, long_about, version)]
struct Cli {
    /// Path to installer configuration file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,
}

impl Cli {
    fn run(self) -> Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => default_config_path()?,
        };
        let data = read_to_string(&path)
            .with_context(|| format!("failed to read configuration at {:?}", path.display()))?;
        let config: InstallerConfig = data
            .parse()
            .with_context(|| format!("invalid configuration at {:?}", path.display()))?;

        let tools = SystemToolbox::from_config(&config);
        let summary = InstallerWorkflow::new(config, tools).run()?;
        if let Some(stage) = summary.aborted_at {
            info!("nothing more to do, stopped at {stage:?}");
        }

        Ok(())
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = Cli::parse().run() {
        error!("{error:?}");
        exit(exit_code(&error));
    }

    exit(0)
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<WorkflowError>()
        .map(WorkflowError::exit_code)
        .unwrap_or(1)
}
