// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! System integration through external programs.

use crate::{
    integration::Integration,
    tool::{Result, SystemIntegrator},
};

use tracing::{info, instrument};

/// Apply integrations by running their plans step by step.
///
/// Stops at the first failing step. Steps that already ran are not undone.
#[derive(Debug, Default, Clone)]
pub struct CommandIntegrator;

impl CommandIntegrator {
    /// Construct new command integrator.
    pub fn new() -> Self {
        Self
    }
}

impl SystemIntegrator for CommandIntegrator {
    #[instrument(skip(self, integration), fields(kind = %integration.kind), level = "debug")]
    fn apply(&mut self, integration: &Integration) -> Result<()> {
        for step in &integration.plan {
            info!("{step}");
            step.run()?;
        }

        Ok(())
    }
}
