// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! User confirmation.
//!
//! Every destructive or system-altering step of the installer is gated by a
//! yes/no question. Questions block until answered.

use inquire::{Confirm, InquireError};

/// Yes/no question asked at a single decision point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPrompt {
    pub question: String,
    pub default_deny: bool,
}

impl ConfirmationPrompt {
    /// Construct question whose default answer is "yes".
    pub fn default_allow(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            default_deny: false,
        }
    }

    /// Construct question whose default answer is "no".
    pub fn default_deny(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            default_deny: true,
        }
    }
}

/// Ask the user to confirm something.
pub trait Confirmation {
    /// Ask question, and return whether user said yes.
    fn confirm(&mut self, prompt: &ConfirmationPrompt) -> Result<bool>;
}

/// Terminal confirmation through inquire.
///
/// Cancelling a question with Esc counts as "no". Interrupting with Ctrl-C is
/// reported as an error.
#[derive(Debug, Default, Clone)]
pub struct InquirePrompter;

impl InquirePrompter {
    /// Construct new terminal prompter.
    pub fn new() -> Self {
        Self
    }
}

impl Confirmation for InquirePrompter {
    fn confirm(&mut self, prompt: &ConfirmationPrompt) -> Result<bool> {
        let answer = Confirm::new(prompt.question.as_str())
            .with_default(!prompt.default_deny)
            .prompt();

        match answer {
            Ok(answer) => Ok(answer),
            Err(InquireError::OperationCanceled) => Ok(false),
            Err(error) => Err(PromptError::Inquire(error)),
        }
    }
}

/// Confirmation error types.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Terminal prompt fails, or was interrupted.
    #[error("failed to read confirmation")]
    Inquire(#[source] InquireError),
}

/// Friendly result alias :3
pub type Result<T, E = PromptError> = std::result::Result<T, E>;
