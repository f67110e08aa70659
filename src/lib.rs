// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Interactive dotfile installer.
//!
//! Installs or updates a personal dotfile collection kept in a git
//! repository. The installer walks through a fixed sequence of steps, asking
//! before anything destructive or system-altering happens:
//!
//! 1. Clone the repository, or pull the latest changes into an existing
//!    checkout.
//! 2. Report disk usage of the locations about to be touched.
//! 3. Copy the checkout into the home directory.
//! 4. Unpack bundled font, theme, icon, and cursor archives in place.
//! 5. Offer optional system integrations one by one, e.g., login shell,
//!    bootloader theme, and login manager theme.
//!
//! Whether something was already done is inferred from the file system
//! alone. No installation log or manifest is kept.
//!
//! # See Also
//!
//! 1. [`workflow`] for the stage sequence and its failure rules.
//! 2. [`config`] for the configuration file layout.
//! 3. [`tool`] for the external programs the installer relies on.

pub mod config;
pub mod integration;
pub mod path;
pub mod prompt;
pub mod report;
pub mod tool;
pub mod workflow;
