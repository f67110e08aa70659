// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Archive extraction through tar.

use crate::tool::{syscall_interactive, ArchiveBundle, ArchiveExtractor, Result, ToolError};

use std::ffi::OsString;
use tracing::{info, instrument};

/// Extract compressed tarballs through tar.
///
/// Compression is detected by tar itself, so gzip, xz, bzip2, and zstd
/// tarballs all work as long as tar supports them.
#[derive(Debug, Default, Clone)]
pub struct TarExtractor;

impl TarExtractor {
    /// Construct new tar extractor.
    pub fn new() -> Self {
        Self
    }

    /// Arguments handed to tar for given bundle.
    pub fn args(&self, bundle: &ArchiveBundle) -> Vec<OsString> {
        vec![
            "--extract".into(),
            "--file".into(),
            bundle.archive_path.clone().into_os_string(),
            "--directory".into(),
            bundle.extract_to.clone().into_os_string(),
        ]
    }
}

impl ArchiveExtractor for TarExtractor {
    #[instrument(skip(self, bundle), level = "debug")]
    fn extract(&mut self, bundle: &ArchiveBundle) -> Result<()> {
        info!(
            "extract {} into {:?}",
            bundle.name,
            bundle.extract_to.display()
        );
        mkdirp::mkdirp(&bundle.extract_to).map_err(|source| ToolError::Io {
            source,
            path: bundle.extract_to.clone(),
        })?;

        syscall_interactive("tar", self.args(bundle))
    }
}
